pub mod manifest_service;
pub mod parallel_runner;
pub mod reconciler;
pub mod snapshot_service;
