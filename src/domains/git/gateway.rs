use async_trait::async_trait;
use thiserror::Error;

use crate::domains::sessions::entity::LocalRepository;

#[derive(Debug, Error)]
pub enum GitGatewayError {
    /// The commit or blob is not present in the local object database. The
    /// operations cache reacts by fetching the pull request's head ref once
    /// and retrying.
    #[error("object not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Boundary to the embedded git plumbing.
///
/// Implementations drive real git commands or libgit2; the core only ever
/// sees shas, blobs and unified-diff text. All methods are expected to run
/// off any UI-affiliated thread.
#[async_trait]
pub trait GitGateway: Send + Sync {
    /// Resolves the merge base of `base_sha` and `head_sha`.
    async fn merge_base(
        &self,
        repo: &LocalRepository,
        base_url: &str,
        head_url: &str,
        base_sha: &str,
        head_sha: &str,
        base_ref: &str,
    ) -> Result<String, GitGatewayError>;

    /// Fetches `refspec` from `remote_url` into the local repository.
    async fn fetch(
        &self,
        repo: &LocalRepository,
        remote_url: &str,
        refspec: &str,
    ) -> Result<(), GitGatewayError>;

    /// Returns the blob content for `path` at `sha`.
    async fn extract_blob(
        &self,
        repo: &LocalRepository,
        sha: &str,
        path: &str,
    ) -> Result<Vec<u8>, GitGatewayError>;

    /// Unified-diff text between two commits for one path. When
    /// `live_content` is supplied the head side is diffed against those bytes
    /// instead of the committed blob, which supports unsaved editor buffers.
    async fn diff(
        &self,
        repo: &LocalRepository,
        base_sha: &str,
        head_sha: &str,
        path: &str,
        live_content: Option<&[u8]>,
    ) -> Result<String, GitGatewayError>;

    /// True when `contents` matches the committed blob at HEAD and HEAD has
    /// been pushed to its upstream.
    async fn is_unmodified_and_pushed(
        &self,
        repo: &LocalRepository,
        path: &str,
        contents: &[u8],
    ) -> Result<bool, GitGatewayError>;

    /// Sha of the checked-out HEAD commit.
    async fn head_sha(&self, repo: &LocalRepository) -> Result<String, GitGatewayError>;
}
