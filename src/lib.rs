//! Inline pull-request review core.
//!
//! Parses unified diffs with review-API position bookkeeping, anchors
//! existing comment threads against fresh diffs by trailing-context
//! matching, and manages per-pull-request sessions with cached git
//! plumbing and lazily computed per-file snapshots.
//!
//! The crate is host-agnostic: git access goes through
//! [`GitGateway`](domains::git::GitGateway), the review API through
//! [`ReviewClient`](domains::github::ReviewClient), and "which pull request
//! is checked out" through
//! [`PullRequestResolver`](domains::sessions::PullRequestResolver).

pub mod domains;
pub mod errors;
pub mod events;
pub mod shared;

pub use domains::diff::{DiffChunk, DiffLine, DiffLineKind, DiffSide, parse_fragment};
pub use domains::git::{GitGateway, GitGatewayError, GitOperationsCache};
pub use domains::github::{NewCommentParams, ReviewClient, ReviewEvent};
pub use domains::sessions::{
    Account, BranchRef, InlineAnchor, InlineCommentThread, LocalRepository, PullRequestModel,
    PullRequestResolver, Review, ReviewComment, ReviewState, Session, SessionFile, SessionManager,
};
pub use errors::ReviewError;
pub use events::{EventHub, SessionEvent};
