/*!
# Rewriter

Turns each finding into text edits:

1. every `belongs_to` for the field that carries `optional: true` gets that
   argument replaced by `required: true`;
2. every presence validation of the field (or its foreign-key column) is
   deleted, or narrowed to drop only the presence part when other
   validations share the statement;
3. blank lines left behind by deletions are tidied.

Findings are applied one at a time, in the order the [`Matcher`] reports
them, each step reading the text produced by the previous one.
*/

use tracing::{debug, trace};

use crate::buffer::SourceBuffer;
use crate::declaration::{Declaration, Keyword};
use crate::matcher::Matcher;
use crate::span::Span;

/// Replacement for an `optional: true` argument
const REQUIRED: &str = "required: true";

/// Edit planned for one validation statement
#[derive(Debug, Clone, PartialEq, Eq)]
enum ValidationEdit {
    Delete(Span),
    Replace(Span, String),
}

/// Rewrites optional associations with redundant presence validations
pub struct Rewriter<'m> {
    matcher: &'m Matcher,
}

impl<'m> Rewriter<'m> {
    pub fn new(matcher: &'m Matcher) -> Self {
        Self { matcher }
    }

    /// Rewrite every finding in `text`
    ///
    /// Text without findings is returned unchanged, and rewriting already
    /// rewritten text is a no-op.
    pub fn rewrite(&self, text: &str) -> String {
        let fields = self.matcher.fields(text);
        debug!(fields = ?fields, "rewriting findings");
        fields
            .iter()
            .fold(text.to_string(), |text, field| self.rewrite_field(&text, field))
    }

    /// Apply the rewrite for a single association field
    ///
    /// When no `optional: true` association for `field` can be found the
    /// text is returned untouched, validations included.
    pub fn rewrite_field(&self, text: &str, field: &str) -> String {
        let mut buffer = SourceBuffer::new(text);

        let associations = optional_association_spans(&buffer, field);
        if associations.is_empty() {
            debug!(field, "no optional association left to rewrite, skipping");
            return text.to_string();
        }
        for span in associations {
            require_association(&mut buffer, span);
        }

        let foreign_key = self.matcher.foreign_key(field);
        let targets = [field, foreign_key.as_str()];
        let edits = validation_edits(&buffer, field, &targets);
        trace!(field, edits = edits.len(), "planned validation edits");

        for edit in edits.into_iter().rev() {
            match edit {
                ValidationEdit::Delete(span) => buffer.delete_span(span),
                ValidationEdit::Replace(span, text) => buffer.replace_span(span, &text),
            }
        }

        buffer.to_text()
    }
}

fn optional_association_spans(buffer: &SourceBuffer, field: &str) -> Vec<Span> {
    buffer
        .declaration_spans()
        .into_iter()
        .filter(|span| {
            let text = buffer.span_text(*span);
            Declaration::parse(&text).is_some_and(|declaration| {
                declaration.keyword == Keyword::BelongsTo
                    && declaration.is_optional()
                    && declaration.field().is_some_and(|token| token.name == field)
            })
        })
        .collect()
}

/// Swap each `optional: true` argument of the association for `required: true`
fn require_association(buffer: &mut SourceBuffer, span: Span) {
    let mut text = buffer.span_text(span);
    let ranges: Vec<_> = match Declaration::parse(&text) {
        Some(declaration) => declaration
            .options()
            .filter(|(_, option)| option.is_optional())
            .map(|(index, _)| declaration.arguments[index].range.clone())
            .collect(),
        None => return,
    };

    for range in ranges.into_iter().rev() {
        text.replace_range(range, REQUIRED);
    }
    buffer.replace_span(span, &text);
}

fn validation_edits(buffer: &SourceBuffer, field: &str, targets: &[&str]) -> Vec<ValidationEdit> {
    let is_target = |name: &str| targets.iter().any(|target| *target == name);

    buffer
        .declaration_spans()
        .into_iter()
        .filter_map(|span| {
            let text = buffer.span_text(span);
            let declaration = Declaration::parse(&text)?;
            if !declaration.presence_fields().into_iter().any(is_target) {
                return None;
            }

            match declaration.keyword {
                Keyword::Validates if declaration.is_shared_presence() => {
                    Some(narrow_presence_list(&text, span, &is_target))
                }
                Keyword::Validates => Some(narrow_validates(&declaration, span, field)),
                Keyword::ValidatesPresenceOf => Some(narrow_presence_list(&text, span, &is_target)),
                Keyword::BelongsTo => None,
            }
        })
        .collect()
}

/// `validates :field, presence: ..., other: ...`
///
/// Presence alone deletes the statement. Otherwise the presence argument is
/// cut out and the field is re-emitted under the association's own name.
fn narrow_validates(declaration: &Declaration<'_>, span: Span, field: &str) -> ValidationEdit {
    let (Some(presence), Some(token)) = (declaration.presence_argument(), declaration.field()) else {
        return ValidationEdit::Delete(span);
    };
    if declaration.arguments.len() == 2 {
        return ValidationEdit::Delete(span);
    }

    let mut text = declaration.text.to_string();
    text.replace_range(declaration.removal_range(presence), "");
    if token.name != field {
        text.replace_range(declaration.arguments[0].range.clone(), &token.render(field));
    }
    ValidationEdit::Replace(span, text)
}

/// `validates_presence_of :a, :field, :b, message: ...` or
/// `validates :a, :field, presence: true`
///
/// Targeted names are removed from the list one at a time, keeping the
/// others in order along with any trailing options. An emptied list deletes
/// the statement.
fn narrow_presence_list(text: &str, span: Span, is_target: &dyn Fn(&str) -> bool) -> ValidationEdit {
    let mut current = text.to_string();

    loop {
        let removal = {
            let Some(declaration) = Declaration::parse(&current) else {
                break;
            };
            let fields = declaration.leading_fields();
            let Some(&(index, _)) = fields.iter().find(|(_, token)| is_target(token.name)) else {
                break;
            };
            if fields.len() == 1 {
                return ValidationEdit::Delete(span);
            }
            declaration.removal_range(index)
        };
        current.replace_range(removal, "");
    }

    ValidationEdit::Replace(span, current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rewrite(text: &str) -> String {
        let matcher = Matcher::default();
        Rewriter::new(&matcher).rewrite(text)
    }

    #[test]
    fn test_single_line_rewrite_deletes_validation() {
        let input = "\
class Post < ApplicationRecord
  belongs_to :user, optional: true
  validates :user, presence: true
end
";
        let expected = "\
class Post < ApplicationRecord
  belongs_to :user, required: true
end
";
        assert_eq!(rewrite(input), expected);
    }

    #[test]
    fn test_narrowing_keeps_other_validations() {
        let input = "\
class Post < ApplicationRecord
  belongs_to :user, optional: true
  validates :user, presence: true, uniqueness: true
end
";
        let expected = "\
class Post < ApplicationRecord
  belongs_to :user, required: true
  validates :user, uniqueness: true
end
";
        assert_eq!(rewrite(input), expected);
    }

    #[test]
    fn test_presence_list_keeps_remaining_fields_in_order() {
        let input = "\
class Post < ApplicationRecord
  belongs_to :user, optional: true
  validates_presence_of :title, :user, :body
end
";
        let expected = "\
class Post < ApplicationRecord
  belongs_to :user, required: true
  validates_presence_of :title, :body
end
";
        assert_eq!(rewrite(input), expected);
    }

    #[test]
    fn test_presence_list_with_both_names() {
        let input = "\
belongs_to :user, optional: true
validates_presence_of :user, :user_id, :title, message: \"is missing\"
";
        let expected = "\
belongs_to :user, required: true
validates_presence_of :title, message: \"is missing\"
";
        assert_eq!(rewrite(input), expected);
    }

    #[test]
    fn test_presence_list_of_only_the_field_is_deleted() {
        let input = "belongs_to :user, optional: true\nvalidates_presence_of :user_id\nscope :recent, -> { order(:created_at) }\n";
        let expected = "belongs_to :user, required: true\nscope :recent, -> { order(:created_at) }\n";
        assert_eq!(rewrite(input), expected);
    }

    #[test]
    fn test_foreign_key_validation_is_reemitted_with_field_name() {
        let input = "\
belongs_to :account, optional: true
validates :account_id, presence: { message: \"pick one\" }, numericality: true
";
        let expected = "\
belongs_to :account, required: true
validates :account, numericality: true
";
        assert_eq!(rewrite(input), expected);
    }

    #[test]
    fn test_multi_line_declarations() {
        let input = "\
class Comment < ApplicationRecord
  belongs_to :author,
             class_name: \"User\",
             optional: true
  validates :author,
            presence: true,
            length: { maximum: 3 }
end
";
        let expected = "\
class Comment < ApplicationRecord
  belongs_to :author,
             class_name: \"User\",
             required: true
  validates :author,
            length: { maximum: 3 }
end
";
        assert_eq!(rewrite(input), expected);
    }

    #[test]
    fn test_multi_line_validation_is_deleted_whole() {
        let input = "\
class Comment < ApplicationRecord
  belongs_to :author, optional: true

  validates :author,
            presence: true

end
";
        let expected = "\
class Comment < ApplicationRecord
  belongs_to :author, required: true
end
";
        assert_eq!(rewrite(input), expected);
    }

    #[test]
    fn test_quoted_field_names() {
        let input = "belongs_to \"owner\", optional: true\nvalidates 'owner', presence: true\n";
        assert_eq!(rewrite(input), "belongs_to \"owner\", required: true\n");
    }

    #[test]
    fn test_rewrite_field_without_association_is_skipped() {
        let matcher = Matcher::default();
        let input = "validates :user, presence: true\n";
        assert_eq!(Rewriter::new(&matcher).rewrite_field(input, "user"), input);
    }

    #[test]
    fn test_unrelated_text_is_untouched() {
        let input = "\
class Post < ApplicationRecord


  belongs_to :blog
  validates :blog, presence: true   # keep
  belongs_to :user, optional: true
end
";
        assert_eq!(rewrite(input), input);
    }

    #[test]
    fn test_shared_presence_validation_is_narrowed() {
        let input = "\
belongs_to :user, optional: true
validates :title, :user_id, :body, presence: true
";
        let expected = "\
belongs_to :user, required: true
validates :title, :body, presence: true
";
        assert_eq!(rewrite(input), expected);

        let only_field = "belongs_to :user, optional: true\nvalidates :user, :user_id, presence: true\n";
        assert_eq!(rewrite(only_field), "belongs_to :user, required: true\n");
    }

    #[test]
    fn test_shared_validation_with_other_options_is_untouched() {
        let input = "belongs_to :user, optional: true\nvalidates :user, :title, presence: true, uniqueness: true\n";
        let matcher = Matcher::default();
        assert!(matcher.find(input).is_empty());
        assert_eq!(rewrite(input), input);
    }

    #[test]
    fn test_regex_literals_do_not_hide_later_declarations() {
        for format in [r"/\A#\h{6}\z/", r"/\A[^']*\z/"] {
            let input = format!(
                "class Theme < ApplicationRecord\n  validates :color, format: {{ with: {format} }}\n  belongs_to :user, optional: true\n  validates :user, presence: true\nend\n"
            );
            let expected = format!(
                "class Theme < ApplicationRecord\n  validates :color, format: {{ with: {format} }}\n  belongs_to :user, required: true\nend\n"
            );
            assert_eq!(rewrite(&input), expected);
        }
    }
}
