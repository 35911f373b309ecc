//! Error types for the extraction engine.

use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, DistillError>;

/// Errors that can abort an extraction run.
///
/// Heuristic irregularities (malformed attributes, unparseable structured
/// data, missing expected children) never surface here; they degrade to
/// "not a match" locally so extraction can still produce a best-effort
/// result.
#[derive(Error, Debug)]
pub enum DistillError {
    /// Document exceeds the configured element-count ceiling
    #[error("document too large: {0} elements")]
    TooManyElements(usize),

    /// Document has no body-equivalent root
    #[error("document has no body")]
    NoBody,

    /// Every relaxation attempt produced zero-length content
    #[error("no article content found in document")]
    NoArticleFound,

    /// Invalid base URL provided
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
