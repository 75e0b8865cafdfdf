//! Vim highlight patterns derived from search-tool patterns.

pub mod pattern;
pub mod translate;

pub use pattern::{highlight_pattern, HighlightOptions, HighlightSet};
pub use translate::{translate, Dialect};
