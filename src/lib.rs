//! # distiller
//!
//! Extracts the main article from an arbitrary HTML document, stripping
//! navigation, advertising, and boilerplate while keeping the narrative
//! content, its structure, and key metadata (title, byline, excerpt,
//! site name, language, direction). Typical use is as a preprocessing
//! stage before converting content to another text format.
//!
//! ## How it works
//!
//! The engine runs a multi-pass pipeline over a mutable node tree: a
//! preprocessor normalizes legacy markup, a destructive filter walk
//! drops hidden and unlikely-content nodes, a scoring pass assigns
//! content scores and propagates weighted shares to ancestors, the
//! best-scoring candidate is expanded with qualifying siblings, and a
//! structural cleaner prunes low-signal tables, lists, forms, and
//! widgets from the result. If the output is too short, the run is
//! retried from a pristine parse with one heuristic relaxed at a time.
//!
//! ## Basic usage
//!
//! ```rust,no_run
//! use distiller::{Distiller, DistillOptions};
//!
//! let html = r#"<html><body><article><h1>Title</h1><p>Content...</p></article></body></html>"#;
//!
//! let distiller = Distiller::new(html, Some("https://example.com/article"), None)?;
//! let article = distiller.parse()?;
//!
//! println!("Title: {:?}", article.title);
//! println!("Byline: {:?}", article.byline);
//! println!("Text: {:?}", article.text_content);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use distiller::DistillOptions;
//!
//! let options = DistillOptions::builder()
//!     .char_threshold(300)
//!     .candidate_count(10)
//!     .keep_classes(true)
//!     .build();
//! ```
//!
//! ## Pre-flight check
//!
//! [`is_probably_readerable`] estimates cheaply whether a full parse is
//! worth running:
//!
//! ```rust,no_run
//! use distiller::is_probably_readerable;
//! # let html = "<html>...</html>";
//!
//! if is_probably_readerable(html, None) {
//!     // run the full extraction
//! }
//! ```
//!
//! ## Errors
//!
//! [`Distiller::parse`] fails only for fatal conditions: a document over
//! the configured element ceiling, a missing body, or a run where every
//! relaxation attempt produced zero content. Everything else degrades to
//! a best-effort result.

mod article;
mod cleaner;
mod constants;
mod distiller;
mod dom;
mod error;
mod extract;
mod metadata;
mod options;
mod postprocess;
mod preprocess;
mod readerable;
mod scoring;
mod text;

pub use article::Article;
pub use distiller::Distiller;
pub use error::{DistillError, Result};
pub use options::{DistillOptions, DistillOptionsBuilder};
pub use readerable::{is_probably_readerable, ReaderableOptions};
