//! # Tighten Core
//!
//! Finds ActiveRecord models that declare an association as
//! `belongs_to :user, optional: true` and then validate its presence anyway,
//! and rewrites them into the single `required: true` form:
//! - Statement span scanning shared by detection and rewriting
//! - Shallow declaration parsing with byte-exact argument ranges
//! - The [`Matcher`] and [`Rewriter`] engines
//! - Test-expectation rewriting for `belong_to` matchers
//! - File and directory drivers with dry-run line diffs
//!
//! Detection and rewriting are pure functions of the input text. Everything
//! touching the filesystem lives in [`files`].

#![warn(clippy::all)]

use std::path::PathBuf;

pub mod buffer;
pub mod declaration;
pub mod diff;
pub mod expectations;
pub mod files;
pub mod matcher;
pub mod notifier;
pub mod rewriter;
pub mod rules;
pub mod span;

// Re-export commonly used types
pub use diff::{line_diff, DiffLine, LineDiff};
pub use expectations::rewrite_expectations;
pub use files::{FileRewriter, RewriteSummary};
pub use matcher::{Finding, Matcher, MatcherConfig, SourceFinding, UNKNOWN_TYPE};
pub use notifier::{ConsoleNotifier, RewriteNotifier};
pub use rewriter::Rewriter;
pub use rules::{ExpectationRule, ModelRule, RewriteContext, RewriteRule, RuleStats};
pub use span::{span_at, Span, SpanScanner};

/// Tighten version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for tighten components
///
/// `RUST_LOG` wins when set; otherwise core logs at `warn`, or `debug` when
/// `debug` is requested. Logs go to stderr so reports on stdout stay clean.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "tighten_core={default_level},tighten_cli={default_level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Locations and naming conventions of a Rails application
#[derive(Debug, Clone)]
pub struct TightenConfig {
    /// Directory holding model sources
    pub model_dir: PathBuf,
    /// Directory holding model test specifications
    pub spec_dir: PathBuf,
    /// Extension of source files
    pub source_extension: String,
    /// File-name suffix that marks a test specification
    pub spec_suffix: String,
    /// Appended to an association name to form its foreign-key column
    pub foreign_key_suffix: String,
}

impl Default for TightenConfig {
    fn default() -> Self {
        Self {
            model_dir: "app/models".into(),
            spec_dir: "spec/models".into(),
            source_extension: "rb".to_string(),
            spec_suffix: "_spec.rb".to_string(),
            foreign_key_suffix: "_id".to_string(),
        }
    }
}

impl TightenConfig {
    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig {
            foreign_key_suffix: self.foreign_key_suffix.clone(),
            source_extension: self.source_extension.clone(),
        }
    }

    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.matcher_config())
    }
}

/// Error types for tighten operations
#[derive(thiserror::Error, Debug)]
pub enum TightenError {
    /// The target file or directory does not exist
    #[error("Path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    /// Reading or writing a source file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal failed
    #[error("Directory traversal error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result type for tighten operations
pub type Result<T> = std::result::Result<T, TightenError>;
