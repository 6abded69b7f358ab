use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, info, warn};
use tokio::sync::RwLock;

use super::entity::{
    Account, InlineCommentThread, LocalRepository, PullRequestModel, Review, ReviewComment,
    ReviewState, SessionFile,
};
use super::threads::{build_comment_threads, changed_lines};
use crate::domains::diff::entity::DiffSide;
use crate::domains::diff::parser::parse_fragment;
use crate::domains::git::cache::GitOperationsCache;
use crate::domains::git::gateway::GitGateway;
use crate::domains::github::client::{NewCommentParams, ReviewClient, ReviewEvent};
use crate::errors::ReviewError;
use crate::events::{EventHub, SessionEvent};
use crate::shared::normalize_path;

type FileFuture = Shared<BoxFuture<'static, Result<Arc<SessionFile>, ReviewError>>>;

#[derive(Default)]
struct FileSlot {
    ready: Option<Arc<SessionFile>>,
    inflight: Option<FileFuture>,
    /// Last editor buffer pushed via [`Session::refresh_live`]; used instead
    /// of the head blob until the next session replacement.
    live: Option<String>,
    /// Threads last announced via [`SessionEvent::LinesChanged`]. Starts
    /// empty so the first computation announces every anchored line.
    published: Vec<InlineCommentThread>,
}

struct SessionState {
    pull_request: PullRequestModel,
    has_pending_review: bool,
    /// Database id of the user's pending review, when one is resolvable.
    /// `has_pending_review` can be true while this is `None` if the pending
    /// review was created by a client that only exposes node ids.
    pending_review_id: Option<u64>,
}

/// One open pull request being reviewed against one local repository.
///
/// File snapshots are computed lazily per path and cached until the model or
/// the editor buffer changes. Concurrent requests for the same path share a
/// single in-flight computation; failures are not cached, so the next
/// request retries.
pub struct Session {
    repository: LocalRepository,
    user: Account,
    git: GitOperationsCache,
    client: Arc<dyn ReviewClient>,
    events: Arc<EventHub>,
    state: RwLock<SessionState>,
    files: Mutex<HashMap<String, FileSlot>>,
}

impl Session {
    pub fn new(
        repository: LocalRepository,
        user: Account,
        pull_request: PullRequestModel,
        gateway: Arc<dyn GitGateway>,
        client: Arc<dyn ReviewClient>,
        events: Arc<EventHub>,
    ) -> Arc<Self> {
        let (has_pending_review, pending_review_id) =
            scan_pending_review(&pull_request, &user);
        Arc::new(Self {
            repository,
            user,
            git: GitOperationsCache::new(gateway),
            client,
            events,
            state: RwLock::new(SessionState {
                pull_request,
                has_pending_review,
                pending_review_id,
            }),
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn repository(&self) -> &LocalRepository {
        &self.repository
    }

    pub fn user(&self) -> &Account {
        &self.user
    }

    pub async fn pull_request(&self) -> PullRequestModel {
        self.state.read().await.pull_request.clone()
    }

    pub async fn has_pending_review(&self) -> bool {
        self.state.read().await.has_pending_review
    }

    pub async fn pending_review_id(&self) -> Option<u64> {
        self.state.read().await.pending_review_id
    }

    /// Returns the cached snapshot for a file, computing it on first access.
    ///
    /// Requests for a path not changed by the pull request fail with
    /// [`ReviewError::FileNotInPullRequest`]; the failure is not cached.
    pub async fn get_file(
        self: &Arc<Self>,
        relative_path: &str,
    ) -> Result<Arc<SessionFile>, ReviewError> {
        let path = normalize_path(relative_path);

        let future = {
            let mut files = self.lock_files();
            let slot = files.entry(path.clone()).or_default();
            if let Some(ready) = &slot.ready {
                return Ok(ready.clone());
            }
            match &slot.inflight {
                Some(inflight) => inflight.clone(),
                None => {
                    let session = self.clone();
                    let live = slot.live.clone();
                    let compute_path = path.clone();
                    let future: FileFuture = async move {
                        session.compute_file(&compute_path, live).await.map(Arc::new)
                    }
                    .boxed()
                    .shared();
                    slot.inflight = Some(future.clone());
                    future
                }
            }
        };

        let outcome = future.clone().await;

        let mut announce = None;
        {
            let mut files = self.lock_files();
            if let Some(slot) = files.get_mut(&path)
                && slot
                    .inflight
                    .as_ref()
                    .is_some_and(|current| current.ptr_eq(&future))
            {
                slot.inflight = None;
                if let Ok(file) = &outcome {
                    let changed = changed_lines(&slot.published, &file.threads);
                    if !changed.is_empty() {
                        announce = Some(changed);
                    }
                    slot.published = file.threads.clone();
                    slot.ready = Some(file.clone());
                }
            }
        }
        if let Some(lines) = announce {
            self.events.emit(&SessionEvent::LinesChanged {
                path: path.clone(),
                lines,
            });
        }

        outcome
    }

    /// Replaces the snapshot source for a file with the given editor buffer
    /// and recomputes it, notifying listeners of any anchor movement.
    pub async fn refresh_live(
        self: &Arc<Self>,
        relative_path: &str,
        contents: &str,
    ) -> Result<Arc<SessionFile>, ReviewError> {
        let path = normalize_path(relative_path);
        {
            let mut files = self.lock_files();
            let slot = files.entry(path.clone()).or_default();
            slot.live = Some(contents.to_string());
        }
        self.recompute_file(&path).await
    }

    /// Replaces the pull request model and recomputes every previously
    /// requested file against it.
    ///
    /// Recomputation failures are collected rather than aborting the sweep;
    /// the first one is returned after every path has been attempted.
    pub async fn update(self: &Arc<Self>, model: PullRequestModel) -> Result<(), ReviewError> {
        let number = model.number;
        {
            let mut state = self.state.write().await;
            let old = &state.pull_request;
            if old.base.sha != model.base.sha || old.head.sha != model.head.sha {
                debug!(
                    "#{number}: endpoints moved {}..{} -> {}..{}",
                    old.base.sha, old.head.sha, model.base.sha, model.head.sha
                );
                self.git.invalidate(&old.base.sha, &old.head.sha);
            }
            let (has_pending_review, pending_review_id) =
                scan_pending_review(&model, &self.user);
            state.pull_request = model;
            state.has_pending_review = has_pending_review;
            state.pending_review_id = pending_review_id;
        }

        let paths: Vec<String> = {
            let files = self.lock_files();
            files.keys().cloned().collect()
        };

        let mut first_error = None;
        for path in paths {
            if let Err(error) = self.recompute_file(&path).await {
                warn!("#{number}: recomputing '{path}' failed: {error}");
                first_error.get_or_insert(error);
            }
        }

        self.events.emit(&SessionEvent::PullRequestUpdated { number });
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// The file's bytes at the pull request head, fetching the head ref if
    /// the blob is not available locally.
    pub async fn read_head_file(&self, relative_path: &str) -> Result<Vec<u8>, ReviewError> {
        let path = normalize_path(relative_path);
        let pr = self.pull_request().await;
        self.git
            .extract_blob(&self.repository, &pr, &pr.head.sha, &path)
            .await
    }

    /// Posts an inline comment at a 0-based editor line.
    ///
    /// The comment joins the user's pending review when one exists, otherwise
    /// it is published immediately. On success the model is updated in place
    /// so the comment is visible to the next [`get_file`](Self::get_file).
    pub async fn post_review_comment(
        self: &Arc<Self>,
        relative_path: &str,
        line_number: u32,
        side: DiffSide,
        body: &str,
    ) -> Result<ReviewComment, ReviewError> {
        let path = normalize_path(relative_path);
        let file = self.get_file(&path).await?;

        let Some(commit_id) = file.commit_sha.clone() else {
            return Err(ReviewError::CommentPostFailure {
                message: format!("'{path}' has local changes that are not pushed"),
            });
        };
        let Some(position) = file.position_of_line(line_number, side) else {
            return Err(ReviewError::CommentPostFailure {
                message: format!("line {line_number} of '{path}' is not part of the diff"),
            });
        };

        let params = NewCommentParams {
            body: body.to_string(),
            commit_id,
            path: path.clone(),
            position,
        };

        let (pr, route) = self.comment_route().await?;
        let comment = match route {
            CommentRoute::Pending(review_id) => {
                self.client
                    .post_pending_review_comment(&self.repository, review_id, &params)
                    .await
            }
            CommentRoute::Standalone => {
                self.client
                    .post_standalone_comment(&self.repository, &pr, &params)
                    .await
            }
        }
        .map_err(|e| ReviewError::CommentPostFailure {
            message: format!("{e:#}"),
        })?;

        info!("#{}: posted comment {} on '{path}'", pr.number, comment.id);
        self.absorb_comment(pr, comment.clone()).await?;
        Ok(comment)
    }

    /// Posts a reply to an existing comment, following the same pending vs
    /// standalone routing as [`post_review_comment`](Self::post_review_comment).
    pub async fn post_review_reply(
        self: &Arc<Self>,
        body: &str,
        in_reply_to: u64,
    ) -> Result<ReviewComment, ReviewError> {
        let (pr, route) = self.comment_route().await?;
        let comment = match route {
            CommentRoute::Pending(review_id) => {
                self.client
                    .post_pending_reply(&self.repository, review_id, body, in_reply_to)
                    .await
            }
            CommentRoute::Standalone => {
                self.client
                    .post_standalone_reply(&self.repository, &pr, body, in_reply_to)
                    .await
            }
        }
        .map_err(|e| ReviewError::CommentPostFailure {
            message: format!("{e:#}"),
        })?;

        self.absorb_comment(pr, comment.clone()).await?;
        Ok(comment)
    }

    /// Creates a pending review for the session user.
    pub async fn start_review(self: &Arc<Self>) -> Result<Review, ReviewError> {
        let pr = {
            let state = self.state.read().await;
            if state.has_pending_review {
                return Err(ReviewError::review_action(
                    "start review",
                    "a pending review already exists",
                ));
            }
            state.pull_request.clone()
        };

        let review = self
            .client
            .create_pending_review(&self.repository, &pr)
            .await
            .map_err(|e| ReviewError::review_action("start review", format!("{e:#}")))?;

        let mut model = pr;
        model.reviews.push(review.clone());
        self.update(model).await?;
        Ok(review)
    }

    /// Cancels the pending review, discarding it and its comments.
    pub async fn cancel_review(self: &Arc<Self>) -> Result<(), ReviewError> {
        let (pr, review_id) = self.pending_review().await?;

        self.client
            .cancel_pending_review(&self.repository, review_id)
            .await
            .map_err(|e| ReviewError::review_action("cancel review", format!("{e:#}")))?;

        let mut model = pr;
        model.reviews.retain(|r| r.id != Some(review_id));
        model
            .review_comments
            .retain(|c| c.pending_review_id != Some(review_id));
        self.update(model).await
    }

    /// Submits the pending review; its comments become public.
    pub async fn submit_review(
        self: &Arc<Self>,
        body: Option<&str>,
        event: ReviewEvent,
    ) -> Result<Review, ReviewError> {
        let (pr, review_id) = self.pending_review().await?;

        let submitted = self
            .client
            .submit_pending_review(&self.repository, review_id, body, event)
            .await
            .map_err(|e| ReviewError::review_action("submit review", format!("{e:#}")))?;

        let mut model = pr;
        for review in &mut model.reviews {
            if review.id == Some(review_id) {
                *review = submitted.clone();
            }
        }
        for comment in &mut model.review_comments {
            if comment.pending_review_id == Some(review_id) {
                comment.pending_review_id = None;
            }
        }
        self.update(model).await?;
        Ok(submitted)
    }

    async fn compute_file(
        &self,
        path: &str,
        live: Option<String>,
    ) -> Result<SessionFile, ReviewError> {
        let pr = self.pull_request().await;
        if !pr
            .changed_files
            .iter()
            .any(|f| normalize_path(f) == path)
        {
            return Err(ReviewError::FileNotInPullRequest {
                path: path.to_string(),
            });
        }

        let merge_base = self.git.merge_base(&self.repository, &pr).await?;

        let commit_sha = match &live {
            Some(contents) => {
                self.git
                    .commit_sha_for(&self.repository, path, contents.as_bytes())
                    .await?
            }
            None => Some(pr.head.sha.clone()),
        };

        let diff_text = self
            .git
            .diff(
                &self.repository,
                &merge_base,
                &pr.head.sha,
                path,
                live.as_deref().map(str::as_bytes),
            )
            .await?;
        let diff = parse_fragment(&diff_text);
        let threads = build_comment_threads(&pr, path, &diff);

        Ok(SessionFile {
            relative_path: path.to_string(),
            base_sha: merge_base,
            commit_sha,
            diff,
            threads,
            annotations: Vec::new(),
        })
    }

    /// Drops the cached snapshot for a path and rebuilds it. Anchors that
    /// moved are announced by the rebuild itself.
    async fn recompute_file(
        self: &Arc<Self>,
        path: &str,
    ) -> Result<Arc<SessionFile>, ReviewError> {
        {
            let mut files = self.lock_files();
            let slot = files.entry(path.to_string()).or_default();
            slot.ready = None;
            slot.inflight = None;
        }
        self.get_file(path).await
    }

    async fn comment_route(&self) -> Result<(PullRequestModel, CommentRoute), ReviewError> {
        let state = self.state.read().await;
        let route = if state.has_pending_review {
            match state.pending_review_id {
                Some(id) => CommentRoute::Pending(id),
                None => {
                    return Err(ReviewError::NoPendingReview {
                        operation: "post review comment".to_string(),
                    });
                }
            }
        } else {
            CommentRoute::Standalone
        };
        Ok((state.pull_request.clone(), route))
    }

    async fn pending_review(&self) -> Result<(PullRequestModel, u64), ReviewError> {
        let state = self.state.read().await;
        match (state.has_pending_review, state.pending_review_id) {
            (true, Some(id)) => Ok((state.pull_request.clone(), id)),
            _ => Err(ReviewError::NoPendingReview {
                operation: "resolve pending review".to_string(),
            }),
        }
    }

    async fn absorb_comment(
        self: &Arc<Self>,
        mut model: PullRequestModel,
        comment: ReviewComment,
    ) -> Result<(), ReviewError> {
        model.review_comments.push(comment);
        self.update(model).await
    }

    fn lock_files(&self) -> MutexGuard<'_, HashMap<String, FileSlot>> {
        match self.files.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

enum CommentRoute {
    Pending(u64),
    Standalone,
}

fn scan_pending_review(pr: &PullRequestModel, user: &Account) -> (bool, Option<u64>) {
    let pending = pr
        .reviews
        .iter()
        .find(|r| r.state == ReviewState::Pending && r.user.login == user.login);
    match pending {
        Some(review) => (true, review.id),
        None => (false, None),
    }
}
