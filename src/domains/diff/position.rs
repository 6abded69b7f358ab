use super::entity::{DiffChunk, DiffLine, DiffLineKind};

/// Number of trailing hunk lines used as the context window when re-anchoring
/// a comment. Trailing context sits closest to the code the comment concerns
/// and is most likely to survive unrelated edits earlier in the hunk.
pub const TRAILING_CONTEXT_LINES: usize = 5;

/// Extracts the trailing context window from a comment's stored diff hunk:
/// the last up to [`TRAILING_CONTEXT_LINES`] lines of the last chunk, in
/// original order.
pub fn trailing_context(chunks: &[DiffChunk]) -> Vec<DiffLine> {
    trailing_context_with(chunks, TRAILING_CONTEXT_LINES)
}

pub fn trailing_context_with(chunks: &[DiffChunk], window_size: usize) -> Vec<DiffLine> {
    let Some(last) = chunks.last() else {
        return Vec::new();
    };
    let skip = last.lines.len().saturating_sub(window_size);
    last.lines[skip..].to_vec()
}

/// Strategy A: replays diff-position bookkeeping against the hunk headers of
/// a freshly parsed diff for the *same* endpoints, resolving each historical
/// position to the 1-based new-side line number it now denotes.
///
/// A target that lands on a hunk header, on a deleted line, or past the end
/// of the diff resolves to `None`. Used to validate and relocate stored
/// positions when a file's metadata (not its content identity) has changed.
pub fn map_positions(diff: &[DiffChunk], targets: &[u32]) -> Vec<(u32, Option<u32>)> {
    targets
        .iter()
        .map(|&target| (target, map_position(diff, target)))
        .collect()
}

fn map_position(diff: &[DiffChunk], target: u32) -> Option<u32> {
    let mut position: u32 = 0;
    for chunk in diff {
        // The hunk header occupies a position of its own.
        position += 1;
        let mut source_line = chunk.new_start.saturating_sub(1);
        for line in &chunk.lines {
            if line.kind != DiffLineKind::Deleted {
                source_line += 1;
            }
            if position == target {
                return (line.kind != DiffLineKind::Deleted).then_some(source_line);
            }
            position += 1;
        }
        if position == target {
            // Target points at the next hunk header (or one past the end).
            return None;
        }
    }
    None
}

/// Strategy B: locates a stored context window inside a freshly computed
/// diff by matching line text, ignoring line numbers.
///
/// Scans the diff's lines in document order, advancing a match counter on
/// every exact content match. A mismatch restarts the window at the current
/// line (the line is re-tested against the window head, never skipped). The
/// first complete match wins; the returned line is the one on which the
/// match completed. `None` means the caller should mark the thread stale.
pub fn match_trailing_context<'a>(
    diff: &'a [DiffChunk],
    window: &[DiffLine],
) -> Option<&'a DiffLine> {
    if window.is_empty() {
        return None;
    }

    let mut matched = 0;
    for chunk in diff {
        for line in &chunk.lines {
            if line.content == window[matched].content {
                matched += 1;
            } else {
                matched = 0;
                if line.content == window[0].content {
                    matched = 1;
                }
            }
            if matched == window.len() {
                return Some(line);
            }
        }
    }
    None
}
