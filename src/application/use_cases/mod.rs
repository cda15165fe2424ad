//! One module per command. Each exposes a [`ProjectOperation`] that runs
//! against a single resolved project.
//!
//! [`ProjectOperation`]: crate::application::operation::ProjectOperation

pub mod branch;
pub mod checkout;
pub mod clean;
pub mod foreach_command;
pub mod herd;
pub mod prune;
pub mod reset;
pub mod start;
pub mod stash;
pub mod status_check;
pub mod sync_fork;
