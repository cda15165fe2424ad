pub mod manifest;
pub mod resolved_project;
pub mod source;
pub mod workspace;
