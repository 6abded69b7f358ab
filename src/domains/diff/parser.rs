use log::debug;

use super::entity::{DiffChunk, DiffLine, DiffLineKind};

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Parses unified-diff text into an ordered sequence of hunks.
///
/// Never fails: a hunk with an unparsable `@@` header is dropped (together
/// with its lines) and parsing resumes at the next valid header. Preamble
/// lines before the first header (`diff --git`, `index`, `---`, `+++`) are
/// ignored and do not advance position numbering; binary-file markers and the
/// no-newline marker are skipped without affecting numbering either.
pub fn parse_fragment(diff: &str) -> Vec<DiffChunk> {
    let mut chunks = Vec::new();
    let mut chunk: Option<DiffChunk> = None;
    let mut in_fragment = false;
    let mut diff_line: u32 = 0;
    let mut old_line: u32 = 0;
    let mut new_line: u32 = 0;

    for line in diff.lines() {
        if line.starts_with("@@") {
            if let Some(done) = chunk.take() {
                chunks.push(done);
            }
            match parse_hunk_header(line) {
                Some(header) => {
                    old_line = header.old_start;
                    new_line = header.new_start;
                    chunk = Some(header);
                }
                None => {
                    debug!("dropping hunk with unparsable header: {line}");
                }
            }
            in_fragment = true;
            diff_line += 1;
            continue;
        }

        if !in_fragment {
            continue;
        }

        if line == NO_NEWLINE_MARKER || line.starts_with("Binary files ") {
            continue;
        }

        if let Some(current) = chunk.as_mut() {
            let (kind, content) = classify(line);
            current.lines.push(DiffLine {
                kind,
                content,
                old_line_number: (kind != DiffLineKind::Added).then_some(old_line),
                new_line_number: (kind != DiffLineKind::Deleted).then_some(new_line),
                diff_line_number: diff_line,
            });
            match kind {
                DiffLineKind::Context => {
                    old_line += 1;
                    new_line += 1;
                }
                DiffLineKind::Deleted => old_line += 1,
                DiffLineKind::Added => new_line += 1,
            }
        }
        diff_line += 1;
    }

    if let Some(done) = chunk.take() {
        chunks.push(done);
    }
    chunks
}

/// Classifies a diff line by its first character and strips the marker.
/// Anything that is not `+` or `-` counts as context, including a bare space
/// and a completely empty line.
fn classify(line: &str) -> (DiffLineKind, String) {
    match line.as_bytes().first() {
        Some(b'+') => (DiffLineKind::Added, line[1..].to_string()),
        Some(b'-') => (DiffLineKind::Deleted, line[1..].to_string()),
        Some(b' ') => (DiffLineKind::Context, line[1..].to_string()),
        _ => (DiffLineKind::Context, line.to_string()),
    }
}

/// Parses `@@ -oldStart[,oldLength] +newStart[,newLength] @@[ context]`.
/// An absent length defaults to 1; a length of 0 marks a pure insertion or
/// deletion point.
fn parse_hunk_header(line: &str) -> Option<DiffChunk> {
    let mut parts = line.strip_prefix("@@")?.trim_start().splitn(3, ' ');
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    if !parts.next().is_some_and(|rest| rest.starts_with("@@")) {
        return None;
    }

    let (old_start, old_length) = parse_range(old)?;
    let (new_start, new_length) = parse_range(new)?;
    Some(DiffChunk {
        old_start,
        old_length,
        new_start,
        new_length,
        lines: Vec::new(),
    })
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, length)) => Some((start.parse().ok()?, length.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}
