//! Cross-cutting error, result and logging helpers.

pub mod error;
pub mod logging;
pub mod result;
