pub mod command;
pub mod git_cli;
pub mod operations;

pub use git_cli::GitCli;
pub use operations::GitOperations;
