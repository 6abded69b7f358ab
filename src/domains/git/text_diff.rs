use similar::TextDiff;

/// Unified-diff text for one path, shaped like `git diff` output so it can
/// be fed straight into the diff parser. Used for diffing a committed blob
/// against live editor bytes without shelling out to git.
pub fn unified_diff(old: &str, new: &str, path: &str) -> String {
    unified_diff_with_context(old, new, path, 3)
}

pub fn unified_diff_with_context(old: &str, new: &str, path: &str, context: usize) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(context)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}
