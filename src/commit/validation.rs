use crate::commit::batch::BatchRequest;
use crate::config::EngineConfig;
use crate::error::BatchError;
use crate::statement::{StatementPlan, build_statement_plan};

/// Every check that must pass before a connection is acquired. Returns the
/// rendered statement plan on success.
pub fn validate_batch_request(
    request: &BatchRequest,
    config: &EngineConfig,
) -> Result<StatementPlan, BatchError> {
    if request.is_empty() {
        return Err(BatchError::validation("batch contains no changes"));
    }
    for (what, name) in [
        ("database", &request.database),
        ("schema", &request.schema),
        ("table", &request.table),
    ] {
        if name.trim().is_empty() {
            return Err(BatchError::validation(format!("{what} name must not be empty")));
        }
    }
    let rows = request.row_count();
    if rows > config.max_batch_rows {
        return Err(BatchError::validation(format!(
            "batch touches {rows} rows, maximum is {}",
            config.max_batch_rows
        )));
    }
    build_statement_plan(request)
}
