use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domains::diff::entity::{DiffChunk, DiffSide};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
}

/// The repository checked out on disk that the session operates against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRepository {
    pub local_path: PathBuf,
    pub clone_url: String,
    pub name: String,
}

/// One endpoint of a pull request: a ref pinned to a sha in some repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub sha: String,
    pub ref_name: String,
    pub repository_clone_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewState {
    Pending,
    Commented,
    Approved,
    ChangesRequested,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Stable database id. A pending review created outside this process may
    /// lack one; the session then reports a degraded pending state.
    pub id: Option<u64>,
    pub node_id: Option<String>,
    pub body: String,
    pub state: ReviewState,
    pub commit_id: String,
    pub user: Account,
}

/// A review comment as supplied by the host's pull-request model.
///
/// Immutable once created: `diff_hunk` and `original_position` are frozen at
/// post time and never recomputed; edits arrive as new snapshots from the
/// host layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub path: String,
    pub diff_hunk: String,
    pub original_position: Option<u32>,
    pub original_commit_id: String,
    pub position: Option<u32>,
    pub body: String,
    pub author: Account,
    pub updated_at: DateTime<Utc>,
    pub pending_review_id: Option<u64>,
    pub in_reply_to: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestModel {
    pub number: u64,
    pub title: String,
    /// Owner of the base repository; together with `number` this identifies
    /// the pull request across sessions.
    pub owner: String,
    pub node_id: Option<String>,
    pub base: BranchRef,
    pub head: BranchRef,
    pub changed_files: Vec<String>,
    pub review_comments: Vec<ReviewComment>,
    pub reviews: Vec<Review>,
}

impl PullRequestModel {
    pub fn identity(&self) -> (&str, u64) {
        (&self.owner, self.number)
    }

    pub fn head_refspec(&self) -> String {
        format!("refs/pull/{}/head", self.number)
    }
}

/// A group of comments anchored to one line of one file.
///
/// `is_stale` means the anchor could not be reconciled against the current
/// diff with confidence; the thread stays visible but flagged, it is never
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineCommentThread {
    /// 0-based editor line the thread is anchored to; `None` while the
    /// anchor is unresolved.
    pub line_number: Option<u32>,
    pub side: DiffSide,
    pub is_stale: bool,
    pub comments: Vec<ReviewComment>,
}

impl InlineCommentThread {
    /// Key that identifies this thread across wholesale recomputations.
    pub fn key(&self) -> Option<u64> {
        self.comments.first().map(|c| c.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationLevel {
    Notice,
    Warning,
    Failure,
}

/// A check-run annotation surfaced at a line, alongside comment threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineAnnotation {
    pub line_number: u32,
    pub side: DiffSide,
    pub level: AnnotationLevel,
    pub message: String,
}

/// What the rendering layer finds at a line: a spot where a new thread can
/// be started, an existing thread, or an annotation. Dispatched by pattern
/// match instead of runtime type tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InlineAnchor {
    NewThread { line_number: u32, side: DiffSide },
    ExistingThread(InlineCommentThread),
    Annotation(InlineAnnotation),
}

/// Immutable per-file snapshot owned by a session: the current diff for the
/// path plus the reconciled comment threads. Recomputed wholesale on every
/// relevant change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    pub relative_path: String,
    pub base_sha: String,
    /// Pushed commit the snapshot contents correspond to. `None` when the
    /// snapshot was built from edited or unpushed content: anchors produced
    /// against it need a push before the review API can see them.
    pub commit_sha: Option<String>,
    pub diff: Vec<DiffChunk>,
    pub threads: Vec<InlineCommentThread>,
    pub annotations: Vec<InlineAnnotation>,
}

impl SessionFile {
    pub fn requires_push(&self) -> bool {
        self.commit_sha.is_none()
    }

    /// The anchors the rendering layer should show: every thread with a
    /// resolved line, plus annotations.
    pub fn anchors(&self) -> Vec<InlineAnchor> {
        let mut anchors: Vec<InlineAnchor> = self
            .threads
            .iter()
            .cloned()
            .map(InlineAnchor::ExistingThread)
            .collect();
        anchors.extend(
            self.annotations
                .iter()
                .cloned()
                .map(InlineAnchor::Annotation),
        );
        anchors
    }

    /// Diff position (review-API semantics) for a 0-based editor line, used
    /// when posting a new comment at that line.
    pub fn position_of_line(&self, line_number: u32, side: DiffSide) -> Option<u32> {
        let wanted = line_number + 1;
        for chunk in &self.diff {
            for line in &chunk.lines {
                let number = match side {
                    DiffSide::Left => line.old_line_number,
                    DiffSide::Right => line.new_line_number,
                };
                if number == Some(wanted) {
                    return Some(line.diff_line_number);
                }
            }
        }
        None
    }
}
