/*!
# Rewrite Rules

Core trait for text rewrites applied by the [`FileRewriter`](crate::files::FileRewriter),
plus the two rules this tool ships with.
*/

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::expectations::rewrite_expectations;
use crate::matcher::{Matcher, MatcherConfig};
use crate::rewriter::Rewriter;

/// Context handed to every rule application
#[derive(Debug, Clone, Default)]
pub struct RewriteContext {
    pub source_file: Option<PathBuf>,
    /// Association fields made required anywhere in the scanned tree
    pub known_fields: BTreeSet<String>,
}

impl RewriteContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_file(mut self, file: PathBuf) -> Self {
        self.source_file = Some(file);
        self
    }

    pub fn with_known_fields(mut self, fields: BTreeSet<String>) -> Self {
        self.known_fields = fields;
        self
    }
}

/// Core trait for rewrite rules
///
/// A rule is a pure text transformation. It must return its input unchanged
/// when it has nothing to do, and applying it twice must equal applying it
/// once.
pub trait RewriteRule: Send + Sync {
    /// Human-readable name for this rule
    fn name(&self) -> &'static str;

    /// Detailed description of what this rule does
    fn description(&self) -> &'static str;

    /// Whether this rule should run on the file at `path`
    fn applies_to(&self, path: &Path) -> bool;

    /// Rewrite one file's contents
    fn rewrite(&self, source: &str, context: &RewriteContext) -> String;
}

/// Rewrites model sources: `optional: true` becomes `required: true` and
/// redundant presence validations go away
pub struct ModelRule {
    matcher: Matcher,
    spec_suffix: String,
}

impl ModelRule {
    pub fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            spec_suffix: "_spec.rb".to_string(),
        }
    }

    /// Files ending in this suffix are specs and are never treated as models
    pub fn spec_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.spec_suffix = suffix.into();
        self
    }
}

impl Default for ModelRule {
    fn default() -> Self {
        Self::new(Matcher::new(MatcherConfig::default()))
    }
}

impl RewriteRule for ModelRule {
    fn name(&self) -> &'static str {
        "ModelRule"
    }

    fn description(&self) -> &'static str {
        "Makes optional belongs_to associations required and removes their redundant presence validations"
    }

    fn applies_to(&self, path: &Path) -> bool {
        has_extension(path, &self.matcher.config().source_extension)
            && !has_suffix(path, &self.spec_suffix)
    }

    fn rewrite(&self, source: &str, _context: &RewriteContext) -> String {
        Rewriter::new(&self.matcher).rewrite(source)
    }
}

/// Adds `.required` to `belong_to` expectations in model specs
pub struct ExpectationRule {
    spec_suffix: String,
}

impl ExpectationRule {
    pub fn new() -> Self {
        Self {
            spec_suffix: "_spec.rb".to_string(),
        }
    }

    pub fn spec_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.spec_suffix = suffix.into();
        self
    }
}

impl Default for ExpectationRule {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriteRule for ExpectationRule {
    fn name(&self) -> &'static str {
        "ExpectationRule"
    }

    fn description(&self) -> &'static str {
        "Qualifies belong_to expectations with .required for associations made required"
    }

    fn applies_to(&self, path: &Path) -> bool {
        has_suffix(path, &self.spec_suffix)
    }

    fn rewrite(&self, source: &str, context: &RewriteContext) -> String {
        if context.known_fields.is_empty() {
            return source.to_string();
        }
        rewrite_expectations(source, &context.known_fields)
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(suffix))
}

/// Rule execution statistics
#[derive(Debug, Default, Clone)]
pub struct RuleStats {
    pub rule_name: String,
    pub applications: u64,
    pub rewrites: u64,
    pub total_time_ms: u64,
}

impl RuleStats {
    pub fn new(rule_name: String) -> Self {
        Self {
            rule_name,
            ..Self::default()
        }
    }

    /// Share of applications that changed the file
    pub fn rewrite_rate(&self) -> f64 {
        if self.applications == 0 {
            0.0
        } else {
            (self.rewrites as f64) / (self.applications as f64)
        }
    }

    pub fn average_time_ms(&self) -> f64 {
        if self.applications == 0 {
            0.0
        } else {
            (self.total_time_ms as f64) / (self.applications as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_pick_their_files() {
        let model = ModelRule::default();
        let expectation = ExpectationRule::default();

        assert!(model.applies_to(Path::new("app/models/post.rb")));
        assert!(!model.applies_to(Path::new("spec/models/post_spec.rb")));
        assert!(!model.applies_to(Path::new("app/models/post.py")));

        assert!(expectation.applies_to(Path::new("spec/models/post_spec.rb")));
        assert!(!expectation.applies_to(Path::new("app/models/post.rb")));
    }

    #[test]
    fn test_expectation_rule_needs_known_fields() {
        let rule = ExpectationRule::new();
        let spec = "it { is_expected.to belong_to(:user) }\n";

        assert_eq!(rule.rewrite(spec, &RewriteContext::new()), spec);

        let context = RewriteContext::new().with_known_fields(["user".to_string()].into());
        assert_eq!(
            rule.rewrite(spec, &context),
            "it { is_expected.to belong_to(:user).required }\n"
        );
    }

    #[test]
    fn test_rule_stats_rates() {
        let mut stats = RuleStats::new("ModelRule".to_string());
        assert_eq!(stats.rewrite_rate(), 0.0);

        stats.applications = 4;
        stats.rewrites = 1;
        stats.total_time_ms = 8;
        assert_eq!(stats.rewrite_rate(), 0.25);
        assert_eq!(stats.average_time_ms(), 2.0);
    }
}
