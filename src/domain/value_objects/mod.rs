pub mod git_ref;
pub mod git_url;
pub mod protocol;
