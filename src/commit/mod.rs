pub mod batch;
pub mod coordinator;
pub mod validation;

pub use batch::{BatchRequest, BatchResult, RowUpdate};
pub use coordinator::{TransactionCoordinator, TransactionState};
