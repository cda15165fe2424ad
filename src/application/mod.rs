//! Use cases and the services they share.

pub mod context;
pub mod operation;
pub mod services;
pub mod use_cases;

pub use context::{ExecutionMode, WorkspaceContext};
pub use operation::{OutcomeData, OutcomeKind, ProjectOperation, ProjectOutcome, ProjectStatus};
