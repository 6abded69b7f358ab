use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domains::sessions::entity::{
    LocalRepository, PullRequestModel, Review, ReviewComment,
};

/// Review lifecycle events accepted by the review API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewEvent {
    Approve,
    Comment,
    RequestChanges,
}

/// Parameters for a new inline comment, anchored by commit and diff position.
#[derive(Debug, Clone)]
pub struct NewCommentParams {
    pub body: String,
    pub commit_id: String,
    pub path: String,
    pub position: u32,
}

/// Boundary to the REST/GraphQL review API.
///
/// The core delegates every mutation verbatim and only consumes the fields
/// needed to build new [`ReviewComment`]/[`Review`] snapshots. Errors are
/// propagated unchanged; retrying is the caller's decision.
#[async_trait]
pub trait ReviewClient: Send + Sync {
    async fn create_pending_review(
        &self,
        repo: &LocalRepository,
        pr: &PullRequestModel,
    ) -> Result<Review>;

    async fn cancel_pending_review(&self, repo: &LocalRepository, review_id: u64) -> Result<()>;

    async fn submit_pending_review(
        &self,
        repo: &LocalRepository,
        review_id: u64,
        body: Option<&str>,
        event: ReviewEvent,
    ) -> Result<Review>;

    async fn post_pending_review_comment(
        &self,
        repo: &LocalRepository,
        review_id: u64,
        params: &NewCommentParams,
    ) -> Result<ReviewComment>;

    async fn post_standalone_comment(
        &self,
        repo: &LocalRepository,
        pr: &PullRequestModel,
        params: &NewCommentParams,
    ) -> Result<ReviewComment>;

    async fn post_pending_reply(
        &self,
        repo: &LocalRepository,
        review_id: u64,
        body: &str,
        in_reply_to: u64,
    ) -> Result<ReviewComment>;

    async fn post_standalone_reply(
        &self,
        repo: &LocalRepository,
        pr: &PullRequestModel,
        body: &str,
        in_reply_to: u64,
    ) -> Result<ReviewComment>;
}
