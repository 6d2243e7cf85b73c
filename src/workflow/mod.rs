pub mod types;
pub mod update;

pub use types::{Company, StageError, UpdateResult, UpdateStatus, WorkflowStage};
pub use update::{UpdateWorkflow, WorkflowSettings};
