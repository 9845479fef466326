//! Output notification for file rewrites
//!
//! Provides a trait-based system for reporting what the file rewriter did,
//! allowing different output backends (console, test recorder, etc.) to be
//! plugged in.

use std::path::Path;

use crate::diff::LineDiff;

/// Trait for handling rewrite notifications
pub trait RewriteNotifier: Send + Sync {
    /// A file was rewritten on disk
    fn on_updated(&self, path: &Path);

    /// A dry run computed a change for a file without writing it
    fn on_diff(&self, path: &Path, diff: &LineDiff<'_>);

    /// A file could not be processed
    fn on_error(&self, path: &Path, message: &str);
}

/// Default console-based notifier
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Create a new console notifier
    pub fn new() -> Self {
        Self
    }
}

impl RewriteNotifier for ConsoleNotifier {
    fn on_updated(&self, path: &Path) {
        println!("Updated: {}", path.display());
    }

    fn on_diff(&self, path: &Path, diff: &LineDiff<'_>) {
        println!("=== {} ===", path.display());
        print!("{diff}");
        println!("===");
        println!();
    }

    fn on_error(&self, path: &Path, message: &str) {
        eprintln!("Error processing {}: {}", path.display(), message);
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}
