pub mod entity;
pub mod parser;
pub mod position;

pub use entity::{DiffChunk, DiffLine, DiffLineKind, DiffSide};
pub use parser::parse_fragment;
pub use position::{TRAILING_CONTEXT_LINES, map_positions, match_trailing_context, trailing_context};
