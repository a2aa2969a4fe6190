//! Open a page, edit it, save it, reload it.

use crate::backend::Backend;
use crate::catalog::{PageRequest, TableRef};
use crate::commit::batch::BatchResult;
use crate::commit::coordinator::TransactionCoordinator;
use crate::config::EngineConfig;
use crate::error::BatchError;
use crate::tracker::{EditTracker, Reconciliation};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    NothingPending,
    /// The batch committed and the page was reloaded.
    Committed(BatchResult),
    /// The batch committed but the page could not be reloaded. Edits are
    /// cleared and the grid shows pre-save rows until the next refresh.
    CommittedNotReloaded {
        result: BatchResult,
        reload_error: String,
    },
    /// The batch was rolled back; pending edits are kept for a retry.
    Failed(BatchResult),
}

pub struct EditSession<B: Backend> {
    coordinator: TransactionCoordinator<B>,
    tracker: EditTracker,
}

impl<B: Backend> EditSession<B> {
    pub async fn open(
        backend: B,
        config: EngineConfig,
        request: PageRequest,
    ) -> Result<Self, BatchError> {
        let request = PageRequest::new(
            request.table,
            request.page,
            config.clamp_page_size(request.page_size),
        );
        let coordinator = TransactionCoordinator::new(backend, config)?;
        let loaded = coordinator.source().load_page(&request).await?;
        let tracker = EditTracker::open(loaded)?;
        Ok(Self {
            coordinator,
            tracker,
        })
    }

    /// Opens `page` of `table` with the configured default page size.
    pub async fn open_table(
        backend: B,
        config: EngineConfig,
        table: TableRef,
        page: u32,
    ) -> Result<Self, BatchError> {
        let page_size = config.default_page_size;
        Self::open(backend, config, PageRequest::new(table, page, page_size)).await
    }

    pub fn tracker(&self) -> &EditTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut EditTracker {
        &mut self.tracker
    }

    pub fn backend(&self) -> &B {
        self.coordinator.source()
    }

    /// Reloads the current page. Pending edits are dropped.
    pub async fn refresh(&mut self) -> Result<(), BatchError> {
        self.load(self.tracker.page_request()).await
    }

    pub async fn go_to_page(&mut self, page: u32) -> Result<(), BatchError> {
        let request = self.tracker.page_request().with_page(page);
        self.load(request).await
    }

    pub async fn discard(&mut self) -> Result<(), BatchError> {
        let request = self.tracker.discard();
        self.load(request).await
    }

    pub async fn save(&mut self) -> Result<SaveOutcome, BatchError> {
        let Some(request) = self.tracker.build_batch_request() else {
            return Ok(SaveOutcome::NothingPending);
        };
        let result = self.coordinator.execute_batch(&request).await;
        match self.tracker.reconcile(&result) {
            Reconciliation::Reload(page) => {
                info!(table = %self.tracker.table(), rows_affected = result.rows_affected, "changes saved");
                match self.load(page).await {
                    Ok(()) => Ok(SaveOutcome::Committed(result)),
                    Err(err) => {
                        warn!(table = %self.tracker.table(), error = %err, "saved but reload failed");
                        Ok(SaveOutcome::CommittedNotReloaded {
                            result,
                            reload_error: err.to_string(),
                        })
                    }
                }
            }
            Reconciliation::Retained { error } => {
                warn!(table = %self.tracker.table(), error = %error, "save failed; edits kept");
                Ok(SaveOutcome::Failed(result))
            }
        }
    }

    async fn load(&mut self, request: PageRequest) -> Result<(), BatchError> {
        let page_size = self.coordinator.config().clamp_page_size(request.page_size);
        let request = PageRequest::new(request.table, request.page, page_size);
        let page = self.coordinator.source().load_page(&request).await?;
        self.tracker.replace_page(page)
    }
}
