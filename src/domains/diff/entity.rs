use serde::{Deserialize, Serialize};

/// Classification of a single diff line by its leading marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffLineKind {
    Context,
    Added,
    Deleted,
}

/// Which pane of a two-sided diff view a line belongs to: the base version
/// ("left") or the head/working version ("right").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffSide {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    /// Line text without the leading diff marker character.
    pub content: String,
    /// 1-based line number in the old version; absent on added lines.
    pub old_line_number: Option<u32>,
    /// 1-based line number in the new version; absent on deleted lines.
    pub new_line_number: Option<u32>,
    /// 1-based ordinal within the whole diff for one path, counting every
    /// physical line after the first hunk header (including later hunk
    /// headers). Matches the review API's "position" semantics and is
    /// independent of old/new numbering.
    pub diff_line_number: u32,
}

/// One hunk of a unified diff, as described by its `@@` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffChunk {
    pub old_start: u32,
    pub old_length: u32,
    pub new_start: u32,
    pub new_length: u32,
    pub lines: Vec<DiffLine>,
}
