//! Command-line surface: argument parsing and terminal rendering.

pub mod cli;
pub mod ui;
