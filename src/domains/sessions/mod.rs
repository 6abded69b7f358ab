pub mod entity;
pub mod manager;
pub mod session;
pub mod threads;

pub use entity::{
    Account, AnnotationLevel, BranchRef, InlineAnchor, InlineAnnotation, InlineCommentThread,
    LocalRepository, PullRequestModel, Review, ReviewComment, ReviewState, SessionFile,
};
pub use manager::{PullRequestResolver, SessionManager};
pub use session::Session;
pub use threads::{build_comment_threads, changed_lines};
