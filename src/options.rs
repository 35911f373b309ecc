//! Configuration options for the extraction engine.
//!
//! All configuration is per-run: an options value is threaded explicitly
//! through every pipeline stage, so independent documents can be processed
//! on independent engine instances without shared state.
//!
//! ## Example
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

use regex::Regex;

/// Configuration for a single extraction run.
#[derive(Debug, Clone)]
pub struct DistillOptions {
    /// Log heuristic decisions to stderr.
    ///
    /// Default: `false`
    pub debug_logging: bool,

    /// Abort before extraction when the document holds more elements than
    /// this. `0` disables the ceiling.
    ///
    /// Default: `0`
    pub max_elements_to_parse: usize,

    /// Capacity of the ranked candidate shortlist.
    ///
    /// Default: `5`
    pub candidate_count: usize,

    /// Minimum accepted text length. Attempts below it trigger heuristic
    /// relaxation, see the retry controller.
    ///
    /// Default: `500`
    pub char_threshold: usize,

    /// Class names exempt from class stripping in the final output.
    ///
    /// Default: `["page"]`
    pub preserved_classes: Vec<String>,

    /// Keep every class attribute instead of stripping them.
    ///
    /// Default: `false`
    pub keep_classes: bool,

    /// Skip JSON-LD structured-data parsing.
    ///
    /// Default: `false`
    pub disable_json_ld: bool,

    /// Override the built-in video-host pattern used to spare embeds
    /// from removal.
    ///
    /// Default: `None` (built-in host list)
    pub allowed_video_regex: Option<Regex>,

    /// Added to the `(1 - linkDensity)` factor when adjusting candidate
    /// scores. Positive values tolerate more links.
    ///
    /// Default: `0.0`
    pub link_density_modifier: f64,
}

impl Default for DistillOptions {
    fn default() -> Self {
        Self {
            debug_logging: false,
            max_elements_to_parse: 0,
            candidate_count: 5,
            char_threshold: 500,
            preserved_classes: vec!["page".to_string()],
            keep_classes: false,
            disable_json_ld: false,
            allowed_video_regex: None,
            link_density_modifier: 0.0,
        }
    }
}

impl DistillOptions {
    /// Creates a builder initialized with the defaults
    pub fn builder() -> DistillOptionsBuilder {
        DistillOptionsBuilder::default()
    }
}

/// Fluent builder for [`DistillOptions`].
#[derive(Default)]
pub struct DistillOptionsBuilder {
    debug_logging: Option<bool>,
    max_elements_to_parse: Option<usize>,
    candidate_count: Option<usize>,
    char_threshold: Option<usize>,
    preserved_classes: Option<Vec<String>>,
    keep_classes: Option<bool>,
    disable_json_ld: Option<bool>,
    allowed_video_regex: Option<Regex>,
    link_density_modifier: Option<f64>,
}

impl DistillOptionsBuilder {
    pub fn debug_logging(mut self, debug: bool) -> Self {
        self.debug_logging = Some(debug);
        self
    }

    pub fn max_elements_to_parse(mut self, max: usize) -> Self {
        self.max_elements_to_parse = Some(max);
        self
    }

    pub fn candidate_count(mut self, count: usize) -> Self {
        self.candidate_count = Some(count);
        self
    }

    pub fn char_threshold(mut self, threshold: usize) -> Self {
        self.char_threshold = Some(threshold);
        self
    }

    pub fn preserved_classes(mut self, classes: Vec<String>) -> Self {
        self.preserved_classes = Some(classes);
        self
    }

    pub fn keep_classes(mut self, keep: bool) -> Self {
        self.keep_classes = Some(keep);
        self
    }

    pub fn disable_json_ld(mut self, disable: bool) -> Self {
        self.disable_json_ld = Some(disable);
        self
    }

    pub fn allowed_video_regex(mut self, regex: Regex) -> Self {
        self.allowed_video_regex = Some(regex);
        self
    }

    pub fn link_density_modifier(mut self, modifier: f64) -> Self {
        self.link_density_modifier = Some(modifier);
        self
    }

    pub fn build(self) -> DistillOptions {
        let defaults = DistillOptions::default();
        DistillOptions {
            debug_logging: self.debug_logging.unwrap_or(defaults.debug_logging),
            max_elements_to_parse: self
                .max_elements_to_parse
                .unwrap_or(defaults.max_elements_to_parse),
            candidate_count: self.candidate_count.unwrap_or(defaults.candidate_count),
            char_threshold: self.char_threshold.unwrap_or(defaults.char_threshold),
            preserved_classes: self
                .preserved_classes
                .unwrap_or(defaults.preserved_classes),
            keep_classes: self.keep_classes.unwrap_or(defaults.keep_classes),
            disable_json_ld: self.disable_json_ld.unwrap_or(defaults.disable_json_ld),
            allowed_video_regex: self.allowed_video_regex.or(defaults.allowed_video_regex),
            link_density_modifier: self
                .link_density_modifier
                .unwrap_or(defaults.link_density_modifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = DistillOptions::default();
        assert_eq!(options.candidate_count, 5);
        assert_eq!(options.char_threshold, 500);
        assert_eq!(options.max_elements_to_parse, 0);
        assert_eq!(options.preserved_classes, vec!["page".to_string()]);
        assert!(!options.keep_classes);
    }

    #[test]
    fn builder_overrides_only_what_is_set() {
        let options = DistillOptions::builder()
            .char_threshold(200)
            .keep_classes(true)
            .build();
        assert_eq!(options.char_threshold, 200);
        assert!(options.keep_classes);
        assert_eq!(options.candidate_count, 5);
    }
}
