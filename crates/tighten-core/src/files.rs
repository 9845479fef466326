/*!
# FileRewriter - File and Directory Driver

Reads source files, runs the registered rewrite rules over them and either
writes the result back in place or, in dry-run mode, reports a line diff
without touching the file.
*/

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::diff::line_diff;
use crate::matcher::source_files;
use crate::notifier::{ConsoleNotifier, RewriteNotifier};
use crate::rules::{RewriteContext, RewriteRule, RuleStats};
use crate::{Result, TightenError};

/// File-based rewrite driver
///
/// Rules run in the order they were added, each one reading the previous
/// rule's output.
pub struct FileRewriter {
    rules: Vec<Box<dyn RewriteRule>>,
    stats: HashMap<String, RuleStats>,
    notifier: Box<dyn RewriteNotifier>,
    known_fields: BTreeSet<String>,
    source_extension: String,
}

impl FileRewriter {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            stats: HashMap::new(),
            notifier: Box::new(ConsoleNotifier::new()),
            known_fields: BTreeSet::new(),
            source_extension: "rb".to_string(),
        }
    }

    /// Set where change reports go
    pub fn notifier(mut self, notifier: Box<dyn RewriteNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Association fields known to have been made required, for rules that
    /// work across files
    pub fn known_fields(mut self, fields: BTreeSet<String>) -> Self {
        self.known_fields = fields;
        self
    }

    /// Set the extension of files visited by directory runs
    pub fn source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    /// Add a rewrite rule
    pub fn add_rule(&mut self, rule: Box<dyn RewriteRule>) {
        let rule_name = rule.name().to_string();
        self.stats
            .insert(rule_name.clone(), RuleStats::new(rule_name));
        self.rules.push(rule);
    }

    /// Run every applicable rule over one file's contents
    pub fn rewrite_source(&mut self, path: &Path, source: &str) -> String {
        let context = RewriteContext::new()
            .with_source_file(path.to_path_buf())
            .with_known_fields(self.known_fields.clone());

        let mut current = source.to_string();
        for rule in &self.rules {
            if !rule.applies_to(path) {
                continue;
            }

            let started = Instant::now();
            let rewritten = rule.rewrite(&current, &context);

            if let Some(stats) = self.stats.get_mut(rule.name()) {
                stats.applications += 1;
                stats.total_time_ms += started.elapsed().as_millis() as u64;
                if rewritten != current {
                    stats.rewrites += 1;
                }
            }
            current = rewritten;
        }

        current
    }

    /// Rewrite a single file
    ///
    /// Returns whether the file changed, or would change in dry-run mode.
    pub fn rewrite_file<P: AsRef<Path>>(&mut self, path: P, dry_run: bool) -> Result<bool> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TightenError::PathNotFound(path.to_path_buf()));
        }

        let source = fs::read_to_string(path)?;
        let rewritten = self.rewrite_source(path, &source);

        if rewritten == source {
            debug!(path = %path.display(), "unchanged");
            return Ok(false);
        }

        if dry_run {
            self.notifier.on_diff(path, &line_diff(&source, &rewritten));
        } else {
            fs::write(path, &rewritten)?;
            info!(path = %path.display(), "rewrote file");
            self.notifier.on_updated(path);
        }

        Ok(true)
    }

    /// Rewrite every matching file under a directory
    ///
    /// A file that cannot be read or written is recorded in the summary and
    /// the run carries on with the next one.
    pub fn rewrite_directory<P: AsRef<Path>>(
        &mut self,
        directory: P,
        dry_run: bool,
    ) -> Result<RewriteSummary> {
        let directory = directory.as_ref();
        if !directory.exists() {
            return Err(TightenError::PathNotFound(directory.to_path_buf()));
        }

        let mut summary = RewriteSummary::new();
        for path in source_files(directory, &self.source_extension)? {
            if !self.rules.iter().any(|rule| rule.applies_to(&path)) {
                continue;
            }

            summary.files_processed += 1;
            match self.rewrite_file(&path, dry_run) {
                Ok(true) => summary.changed_files.push(path),
                Ok(false) => {}
                Err(error) => {
                    self.notifier.on_error(&path, &error.to_string());
                    summary
                        .errors
                        .push(format!("Error processing {}: {}", path.display(), error));
                }
            }
        }

        info!(
            processed = summary.files_processed,
            changed = summary.changed_files.len(),
            "directory rewrite finished"
        );
        Ok(summary)
    }

    /// Get rewrite statistics
    pub fn stats(&self) -> &HashMap<String, RuleStats> {
        &self.stats
    }
}

impl Default for FileRewriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a directory rewrite
#[derive(Debug, Default)]
pub struct RewriteSummary {
    pub files_processed: u64,
    pub changed_files: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl RewriteSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: RewriteSummary) {
        self.files_processed += other.files_processed;
        self.changed_files.extend(other.changed_files);
        self.errors.extend(other.errors);
    }

    pub fn files_changed(&self) -> usize {
        self.changed_files.len()
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}
