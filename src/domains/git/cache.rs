use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};

use super::gateway::{GitGateway, GitGatewayError};
use crate::domains::sessions::entity::{LocalRepository, PullRequestModel};
use crate::errors::ReviewError;

/// Memoizes expensive git plumbing calls for the lifetime of one session.
///
/// Merge bases are keyed by `(base_sha, head_sha)` and append-only: entries
/// are only removed through [`invalidate`](Self::invalidate) when a session
/// update moves the pull request's shas. A history rewrite that changes
/// neither sha keeps serving the cached merge base until the session itself
/// is replaced; that staleness window is accepted.
pub struct GitOperationsCache {
    gateway: Arc<dyn GitGateway>,
    merge_bases: Mutex<HashMap<(String, String), String>>,
}

impl GitOperationsCache {
    pub fn new(gateway: Arc<dyn GitGateway>) -> Self {
        Self {
            gateway,
            merge_bases: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the merge base between the pull request's base and head.
    ///
    /// On a cache miss the gateway is consulted; if it reports the commits as
    /// locally unavailable, the pull request's head ref is fetched exactly
    /// once and the resolution retried once. A second failure surfaces as
    /// [`ReviewError::MergeBaseNotFound`].
    pub async fn merge_base(
        &self,
        repo: &LocalRepository,
        pr: &PullRequestModel,
    ) -> Result<String, ReviewError> {
        let key = (pr.base.sha.clone(), pr.head.sha.clone());
        if let Some(hit) = self.lock_merge_bases().get(&key) {
            debug!("merge base cache hit for {}..{}", key.0, key.1);
            return Ok(hit.clone());
        }

        let resolved = match self.resolve_merge_base(repo, pr).await {
            Ok(sha) => sha,
            Err(GitGatewayError::NotFound(missing)) => {
                info!(
                    "merge base objects missing ({missing}); fetching {} for #{}",
                    pr.head_refspec(),
                    pr.number
                );
                self.gateway
                    .fetch(repo, &pr.head.repository_clone_url, &pr.head_refspec())
                    .await
                    .map_err(|e| ReviewError::git("fetch", e))?;
                self.resolve_merge_base(repo, pr).await.map_err(|_| {
                    ReviewError::MergeBaseNotFound {
                        base_sha: pr.base.sha.clone(),
                        head_sha: pr.head.sha.clone(),
                    }
                })?
            }
            Err(GitGatewayError::Other(e)) => {
                return Err(ReviewError::git("merge-base", format!("{e:#}")));
            }
        };

        self.lock_merge_bases().insert(key, resolved.clone());
        Ok(resolved)
    }

    /// Drops a single superseded `(base_sha, head_sha)` entry. Called when a
    /// pull request update moves either sha; never a full flush.
    pub fn invalidate(&self, base_sha: &str, head_sha: &str) {
        self.lock_merge_bases()
            .remove(&(base_sha.to_string(), head_sha.to_string()));
    }

    pub async fn diff(
        &self,
        repo: &LocalRepository,
        base_sha: &str,
        head_sha: &str,
        path: &str,
        live_content: Option<&[u8]>,
    ) -> Result<String, ReviewError> {
        self.gateway
            .diff(repo, base_sha, head_sha, path, live_content)
            .await
            .map_err(|e| ReviewError::git("diff", e))
    }

    /// Extracts a blob with the same one-shot fetch-and-retry policy as
    /// merge-base resolution.
    pub async fn extract_blob(
        &self,
        repo: &LocalRepository,
        pr: &PullRequestModel,
        sha: &str,
        path: &str,
    ) -> Result<Vec<u8>, ReviewError> {
        match self.gateway.extract_blob(repo, sha, path).await {
            Ok(bytes) => Ok(bytes),
            Err(GitGatewayError::NotFound(_)) => {
                info!("blob {sha} missing for '{path}'; fetching {}", pr.head_refspec());
                self.gateway
                    .fetch(repo, &pr.head.repository_clone_url, &pr.head_refspec())
                    .await
                    .map_err(|e| ReviewError::git("fetch", e))?;
                self.gateway
                    .extract_blob(repo, sha, path)
                    .await
                    .map_err(|_| ReviewError::BlobNotFound {
                        sha: sha.to_string(),
                        path: path.to_string(),
                    })
            }
            Err(GitGatewayError::Other(e)) => Err(ReviewError::git("cat-file", format!("{e:#}"))),
        }
    }

    /// Commit sha a file snapshot can be attributed to: the pushed HEAD when
    /// the given contents match it, otherwise none (the anchor would need a
    /// push before the review API could see it).
    pub async fn commit_sha_for(
        &self,
        repo: &LocalRepository,
        path: &str,
        contents: &[u8],
    ) -> Result<Option<String>, ReviewError> {
        let unmodified = self
            .gateway
            .is_unmodified_and_pushed(repo, path, contents)
            .await
            .map_err(|e| ReviewError::git("status", e))?;
        if !unmodified {
            return Ok(None);
        }
        let head = self
            .gateway
            .head_sha(repo)
            .await
            .map_err(|e| ReviewError::git("rev-parse", e))?;
        Ok(Some(head))
    }

    async fn resolve_merge_base(
        &self,
        repo: &LocalRepository,
        pr: &PullRequestModel,
    ) -> Result<String, GitGatewayError> {
        self.gateway
            .merge_base(
                repo,
                &pr.base.repository_clone_url,
                &pr.head.repository_clone_url,
                &pr.base.sha,
                &pr.head.sha,
                &pr.base.ref_name,
            )
            .await
    }

    fn lock_merge_bases(&self) -> MutexGuard<'_, HashMap<(String, String), String>> {
        match self.merge_bases.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
