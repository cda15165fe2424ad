/// Infrastructure layer modules
///
/// This layer provides concrete implementations for external system interactions:
/// - Git operations through the `git` executable
/// - File system operations (settings, manifests)
pub mod filesystem;
pub mod git;

// Re-export commonly used types
pub use filesystem::{config_store::ConfigStore, manifest_store::ManifestStore};
pub use git::{GitCli, GitOperations};
