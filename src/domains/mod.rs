pub mod diff;
pub mod git;
pub mod github;
pub mod sessions;
