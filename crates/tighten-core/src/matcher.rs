/*!
# Matcher

Finds `belongs_to ..., optional: true` associations whose field also carries
a presence validation, either on the association name itself or on its
foreign-key column (`user` / `user_id`).

The matcher is a pure function of the input text. Directory scanning is a
thin loop over [`Matcher::find_in_source`].
*/

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::buffer::SourceBuffer;
use crate::declaration::{Declaration, Keyword};
use crate::{Result, TightenError};

/// Type name used when a finding has no enclosing `class` declaration
pub const UNKNOWN_TYPE: &str = "Unknown";

static CLASS_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*class\s+([A-Z]\w*(?:::[A-Z]\w*)*)").expect("class declaration regex")
});

/// Settings shared by the matcher and the rewriter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Appended to an association name to form its foreign-key column
    pub foreign_key_suffix: String,
    /// Extension of the source files visited by [`Matcher::scan`]
    pub source_extension: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            foreign_key_suffix: "_id".to_string(),
            source_extension: "rb".to_string(),
        }
    }
}

/// An optional association with a redundant presence validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Finding {
    pub type_name: String,
    pub field: String,
}

impl Finding {
    pub fn new(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
        }
    }
}

/// A finding together with the file it was found in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFinding {
    #[serde(flatten)]
    pub finding: Finding,
    pub path: PathBuf,
}

/// Detects optional associations paired with presence validations
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Conventional foreign-key column for an association name
    pub fn foreign_key(&self, field: &str) -> String {
        format!("{field}{}", self.config.foreign_key_suffix)
    }

    /// Field names of every `optional: true` association, in order of
    /// first appearance and without duplicates
    pub fn optional_fields(&self, text: &str) -> Vec<String> {
        optional_associations(&SourceBuffer::new(text))
            .into_iter()
            .map(|(field, _)| field)
            .collect()
    }

    /// Every field named by a presence validation, in either recognised form
    pub fn presence_fields(&self, text: &str) -> HashSet<String> {
        presence_fields(&SourceBuffer::new(text))
    }

    /// Optional association fields that also have a presence validation
    ///
    /// A validation on either the field or its foreign-key column counts.
    /// The result is in the order the rewriter applies it.
    pub fn fields(&self, text: &str) -> Vec<String> {
        self.qualifying(&SourceBuffer::new(text))
            .into_iter()
            .map(|(field, _)| field)
            .collect()
    }

    /// Find redundant validations in a text blob
    ///
    /// Findings carry the [`UNKNOWN_TYPE`] placeholder as their type name.
    pub fn find(&self, text: &str) -> Vec<Finding> {
        self.fields(text)
            .into_iter()
            .map(|field| Finding::new(UNKNOWN_TYPE, field))
            .collect()
    }

    /// Find redundant validations in the contents of one source file
    ///
    /// Each finding is attributed to the nearest `class` declaration above
    /// its association.
    pub fn find_in_source(&self, text: &str) -> Vec<Finding> {
        let buffer = SourceBuffer::new(text);
        self.qualifying(&buffer)
            .into_iter()
            .map(|(field, line)| Finding::new(enclosing_type(&buffer, line), field))
            .collect()
    }

    pub fn find_in_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Finding>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TightenError::PathNotFound(path.to_path_buf()));
        }
        let source = fs::read_to_string(path)?;
        Ok(self.find_in_source(&source))
    }

    /// Recursively scan a directory of source files
    ///
    /// Files are visited in path order. Unreadable files are logged and
    /// skipped.
    pub fn scan<P: AsRef<Path>>(&self, directory: P) -> Result<Vec<SourceFinding>> {
        let directory = directory.as_ref();
        if !directory.exists() {
            return Err(TightenError::PathNotFound(directory.to_path_buf()));
        }

        let mut findings = Vec::new();
        for path in source_files(directory, &self.config.source_extension)? {
            let source = match fs::read_to_string(&path) {
                Ok(source) => source,
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unreadable source file");
                    continue;
                }
            };

            let found = self.find_in_source(&source);
            debug!(path = %path.display(), findings = found.len(), "scanned source file");
            findings.extend(found.into_iter().map(|finding| SourceFinding {
                finding,
                path: path.clone(),
            }));
        }

        Ok(findings)
    }

    fn qualifying(&self, buffer: &SourceBuffer) -> Vec<(String, usize)> {
        let presence = presence_fields(buffer);
        optional_associations(buffer)
            .into_iter()
            .filter(|(field, _)| {
                presence.contains(field) || presence.contains(&self.foreign_key(field))
            })
            .collect()
    }
}

/// Files under `directory` with the given extension, sorted by path
pub(crate) fn source_files(directory: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).follow_links(false) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// `optional: true` association fields with the line of their first
/// declaration
fn optional_associations(buffer: &SourceBuffer) -> Vec<(String, usize)> {
    let mut seen = HashSet::new();
    let mut fields = Vec::new();

    for span in buffer.declaration_spans() {
        let text = buffer.span_text(span);
        let Some(declaration) = Declaration::parse(&text) else {
            continue;
        };
        if declaration.keyword != Keyword::BelongsTo || !declaration.is_optional() {
            continue;
        }
        if let Some(field) = declaration.field() {
            if seen.insert(field.name.to_string()) {
                fields.push((field.name.to_string(), span.start));
            }
        }
    }

    fields
}

fn presence_fields(buffer: &SourceBuffer) -> HashSet<String> {
    buffer
        .declaration_spans()
        .into_iter()
        .flat_map(|span| {
            let text = buffer.span_text(span);
            Declaration::parse(&text)
                .map(|declaration| {
                    declaration
                        .presence_fields()
                        .into_iter()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })
        .collect()
}

fn enclosing_type(buffer: &SourceBuffer, line: usize) -> String {
    (0..=line)
        .rev()
        .find_map(|index| {
            CLASS_DECLARATION
                .captures(buffer.code(index))
                .map(|captures| captures[1].to_string())
        })
        .unwrap_or_else(|| UNKNOWN_TYPE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST: &str = r#"
class Post < ApplicationRecord
  belongs_to :author, optional: true
  belongs_to "editor", optional: true
  belongs_to :category,
             class_name: "Taxonomy",
             optional: true
  belongs_to :blog, optional: false
  belongs_to :series, optional: true

  validates :author, presence: true
  validates :editor_id, presence: { message: "needs an editor" }
  validates_presence_of :title, :category
  validates :blog, presence: true
end
"#;

    #[test]
    fn test_optional_fields_cover_both_forms() {
        let matcher = Matcher::default();
        assert_eq!(
            matcher.optional_fields(POST),
            vec!["author", "editor", "category", "series"]
        );
    }

    #[test]
    fn test_presence_fields_cover_both_forms() {
        let matcher = Matcher::default();
        let fields = matcher.presence_fields(POST);
        for field in ["author", "editor_id", "title", "category", "blog"] {
            assert!(fields.contains(field), "missing {field}");
        }
        assert_eq!(fields.len(), 5);
    }

    #[test]
    fn test_find_pairs_associations_with_validations() {
        let matcher = Matcher::default();
        assert_eq!(
            matcher.find(POST),
            vec![
                Finding::new(UNKNOWN_TYPE, "author"),
                Finding::new(UNKNOWN_TYPE, "editor"),
                Finding::new(UNKNOWN_TYPE, "category"),
            ]
        );
    }

    #[test]
    fn test_shared_presence_list_counts_for_each_field() {
        let matcher = Matcher::default();
        let source = "belongs_to :user, optional: true\nvalidates :title, :user, presence: true\n";
        assert_eq!(matcher.find(source), vec![Finding::new(UNKNOWN_TYPE, "user")]);
    }

    #[test]
    fn test_find_in_source_recovers_type_names() {
        let source = "\
module Blog
  class Post < ApplicationRecord
    belongs_to :author, optional: true
    validates :author, presence: true
  end

  class Comment < ApplicationRecord
    belongs_to :post, optional: true
    validates_presence_of :post_id
  end
end
";
        let matcher = Matcher::default();
        assert_eq!(
            matcher.find_in_source(source),
            vec![Finding::new("Post", "author"), Finding::new("Comment", "post")]
        );
    }

    #[test]
    fn test_duplicate_associations_are_reported_once() {
        let source = "\
belongs_to :owner, optional: true
belongs_to :owner,
  optional: true
validates :owner, presence: true
";
        assert_eq!(Matcher::default().fields(source), vec!["owner"]);
    }

    #[test]
    fn test_custom_foreign_key_suffix() {
        let matcher = Matcher::new(MatcherConfig {
            foreign_key_suffix: "_uuid".to_string(),
            ..MatcherConfig::default()
        });
        let source = "belongs_to :user, optional: true\nvalidates :user_uuid, presence: true\n";
        assert_eq!(matcher.fields(source), vec!["user"]);
        assert_eq!(matcher.foreign_key("user"), "user_uuid");
    }

    #[test]
    fn test_malformed_input_yields_nothing() {
        let source = "belongs_to\nvalidates :user presence: true\nbelongs_to :user, optional: true";
        assert!(Matcher::default().find(source).is_empty());
    }
}
