use std::collections::BTreeMap;

use log::warn;

use super::entity::{InlineCommentThread, PullRequestModel, ReviewComment};
use crate::domains::diff::entity::{DiffChunk, DiffLineKind, DiffSide};
use crate::domains::diff::parser::parse_fragment;
use crate::domains::diff::position::{match_trailing_context, trailing_context};
use crate::shared::normalize_path;

/// Groups a pull request's review comments for one file into threads and
/// anchors each thread against the given freshly computed diff.
///
/// Comments belong to the same thread when they share `(original_commit_id,
/// original_position)`; replies inherit both from the comment they answer.
/// Anchoring replays the thread root's stored hunk tail against `diff` by
/// content. A thread whose window no longer appears is kept and marked
/// stale rather than dropped.
pub fn build_comment_threads(
    pr: &PullRequestModel,
    relative_path: &str,
    diff: &[DiffChunk],
) -> Vec<InlineCommentThread> {
    let path = normalize_path(relative_path);

    let mut groups: BTreeMap<(String, Option<u32>), Vec<ReviewComment>> = BTreeMap::new();
    for comment in &pr.review_comments {
        if normalize_path(&comment.path) != path {
            continue;
        }
        groups
            .entry((
                comment.original_commit_id.clone(),
                comment.original_position,
            ))
            .or_default()
            .push(comment.clone());
    }

    let mut threads = Vec::new();
    for (key, mut comments) in groups {
        comments.sort_by_key(|c| c.id);

        let root = &comments[0];
        let stored = parse_fragment(&root.diff_hunk);
        let window = trailing_context(&stored);
        if window.is_empty() {
            warn!(
                "comment {} on '{}' has an empty diff hunk (commit {}, position {:?}); skipping",
                root.id, path, key.0, key.1
            );
            continue;
        }

        let side = match window.last().map(|l| l.kind) {
            Some(DiffLineKind::Deleted) => DiffSide::Left,
            _ => DiffSide::Right,
        };

        let line_number = match_trailing_context(diff, &window).and_then(|line| {
            let number = match side {
                DiffSide::Left => line.old_line_number,
                DiffSide::Right => line.new_line_number,
            };
            number.map(|n| n - 1)
        });

        threads.push(InlineCommentThread {
            is_stale: line_number.is_none(),
            line_number,
            side,
            comments,
        });
    }

    // Stable presentation order: by the root comment's id.
    threads.sort_by_key(|t| t.key());
    threads
}

/// The `(line, side)` pairs whose thread set differs between two wholesale
/// recomputations, matched by thread identity. Both the vacated and the
/// newly occupied line of a moved thread are reported, each pair once.
pub fn changed_lines(
    previous: &[InlineCommentThread],
    next: &[InlineCommentThread],
) -> Vec<(u32, DiffSide)> {
    let anchor = |t: &InlineCommentThread| t.line_number.map(|line| (line, t.side));
    let prev_by_key: BTreeMap<_, _> = previous.iter().filter_map(|t| t.key().map(|k| (k, t))).collect();
    let next_by_key: BTreeMap<_, _> = next.iter().filter_map(|t| t.key().map(|k| (k, t))).collect();

    let mut changed: Vec<(u32, DiffSide)> = Vec::new();
    let mut push = |pair: Option<(u32, DiffSide)>| {
        if let Some(pair) = pair
            && !changed.contains(&pair)
        {
            changed.push(pair);
        }
    };

    for (key, before) in &prev_by_key {
        match next_by_key.get(key) {
            Some(after) if anchor(before) == anchor(after) => {}
            Some(after) => {
                push(anchor(before));
                push(anchor(after));
            }
            None => push(anchor(before)),
        }
    }
    for (key, after) in &next_by_key {
        if !prev_by_key.contains_key(key) {
            push(anchor(after));
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sessions::entity::{Account, BranchRef};
    use chrono::Utc;

    fn comment(id: u64, path: &str, hunk: &str, position: Option<u32>, commit: &str) -> ReviewComment {
        ReviewComment {
            id,
            path: path.into(),
            diff_hunk: hunk.into(),
            original_position: position,
            original_commit_id: commit.into(),
            position,
            body: format!("comment {id}"),
            author: Account { login: "reviewer".into() },
            updated_at: Utc::now(),
            pending_review_id: None,
            in_reply_to: None,
        }
    }

    fn pr_with(comments: Vec<ReviewComment>) -> PullRequestModel {
        PullRequestModel {
            number: 7,
            title: "t".into(),
            owner: "acme".into(),
            node_id: None,
            base: BranchRef {
                sha: "base0".into(),
                ref_name: "main".into(),
                repository_clone_url: String::new(),
            },
            head: BranchRef {
                sha: "head0".into(),
                ref_name: "feature".into(),
                repository_clone_url: String::new(),
            },
            changed_files: vec!["src/lib.rs".into()],
            review_comments: comments,
            reviews: vec![],
        }
    }

    const HUNK: &str = "@@ -1,3 +1,4 @@\n a\n+b\n c\n d";

    #[test]
    fn anchors_thread_on_the_matched_line() {
        let pr = pr_with(vec![comment(1, "src/lib.rs", HUNK, Some(4), "head0")]);
        let diff = parse_fragment(HUNK);

        let threads = build_comment_threads(&pr, "src/lib.rs", &diff);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].line_number, Some(3));
        assert_eq!(threads[0].side, DiffSide::Right);
        assert!(!threads[0].is_stale);
    }

    #[test]
    fn thread_follows_content_after_lines_are_inserted_above() {
        let pr = pr_with(vec![comment(1, "src/lib.rs", HUNK, Some(4), "head0")]);
        let shifted = parse_fragment("@@ -1,5 +1,6 @@\n x\n y\n a\n+b\n c\n d");

        let threads = build_comment_threads(&pr, "src/lib.rs", &shifted);
        assert_eq!(threads[0].line_number, Some(5));
        assert!(!threads[0].is_stale);
    }

    #[test]
    fn unmatched_thread_is_retained_as_stale() {
        let pr = pr_with(vec![comment(1, "src/lib.rs", HUNK, Some(4), "head0")]);
        let unrelated = parse_fragment("@@ -1,2 +1,2 @@\n p\n q");

        let threads = build_comment_threads(&pr, "src/lib.rs", &unrelated);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].line_number, None);
        assert!(threads[0].is_stale);
    }

    #[test]
    fn deleted_tail_anchors_on_the_left_side() {
        let hunk = "@@ -1,2 +1,1 @@\n a\n-b";
        let pr = pr_with(vec![comment(1, "src/lib.rs", hunk, Some(2), "head0")]);
        let diff = parse_fragment(hunk);

        let threads = build_comment_threads(&pr, "src/lib.rs", &diff);
        assert_eq!(threads[0].side, DiffSide::Left);
        assert_eq!(threads[0].line_number, Some(1));
    }

    #[test]
    fn replies_join_the_root_comment_thread() {
        let mut reply = comment(9, "src/lib.rs", HUNK, Some(4), "head0");
        reply.in_reply_to = Some(1);
        let pr = pr_with(vec![reply, comment(1, "src/lib.rs", HUNK, Some(4), "head0")]);
        let diff = parse_fragment(HUNK);

        let threads = build_comment_threads(&pr, "src/lib.rs", &diff);
        assert_eq!(threads.len(), 1);
        let ids: Vec<u64> = threads[0].comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 9]);
    }

    #[test]
    fn comments_at_distinct_positions_form_distinct_threads() {
        let pr = pr_with(vec![
            comment(1, "src/lib.rs", HUNK, Some(2), "head0"),
            comment(2, "src/lib.rs", HUNK, Some(4), "head0"),
        ]);
        let diff = parse_fragment(HUNK);

        let threads = build_comment_threads(&pr, "src/lib.rs", &diff);
        assert_eq!(threads.len(), 2);
    }

    #[test]
    fn other_files_and_empty_hunks_are_ignored() {
        let pr = pr_with(vec![
            comment(1, "src/other.rs", HUNK, Some(4), "head0"),
            comment(2, "src/lib.rs", "", Some(4), "head0"),
        ]);
        let diff = parse_fragment(HUNK);

        assert!(build_comment_threads(&pr, "src/lib.rs", &diff).is_empty());
    }

    #[test]
    fn backslash_paths_match_their_normalized_form() {
        let pr = pr_with(vec![comment(1, "src\\lib.rs", HUNK, Some(4), "head0")]);
        let diff = parse_fragment(HUNK);

        assert_eq!(build_comment_threads(&pr, "src/lib.rs", &diff).len(), 1);
    }

    fn thread(id: u64, line: Option<u32>, side: DiffSide) -> InlineCommentThread {
        InlineCommentThread {
            line_number: line,
            side,
            is_stale: line.is_none(),
            comments: vec![comment(id, "src/lib.rs", HUNK, Some(4), "head0")],
        }
    }

    #[test]
    fn changed_lines_reports_both_ends_of_a_move() {
        let before = vec![thread(1, Some(3), DiffSide::Right)];
        let after = vec![thread(1, Some(5), DiffSide::Right)];

        assert_eq!(
            changed_lines(&before, &after),
            vec![(3, DiffSide::Right), (5, DiffSide::Right)]
        );
    }

    #[test]
    fn changed_lines_is_empty_when_anchors_are_unchanged() {
        let before = vec![thread(1, Some(3), DiffSide::Right)];
        let after = vec![thread(1, Some(3), DiffSide::Right)];
        assert!(changed_lines(&before, &after).is_empty());
    }

    #[test]
    fn changed_lines_covers_added_removed_and_stale_threads() {
        let before = vec![thread(1, Some(3), DiffSide::Right)];
        // Thread 1 went stale, thread 2 appeared.
        let after = vec![thread(1, None, DiffSide::Right), thread(2, Some(0), DiffSide::Right)];

        assert_eq!(
            changed_lines(&before, &after),
            vec![(3, DiffSide::Right), (0, DiffSide::Right)]
        );
    }
}
