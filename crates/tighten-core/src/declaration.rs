/*!
# Declaration Parsing

Shallow parsing of the statements this tool cares about: `belongs_to`,
`validates` and `validates_presence_of`. A declaration is the keyword followed
by its top-level argument list; every argument keeps its byte range in the
span text so the rewriter can cut exactly the bytes it has to.

This is not a parser for the host language. Anything that does not look like
one of the recognised forms is simply not a declaration.
*/

use std::ops::Range;

use crate::span::{Lexeme, LiteralTracker};

/// Statement keywords recognised by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// `belongs_to :field, ...`
    BelongsTo,
    /// `validates :field, presence: true, ...` or
    /// `validates :a, :b, presence: true`
    Validates,
    /// `validates_presence_of :a, :b, ...`
    ValidatesPresenceOf,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "belongs_to" => Some(Keyword::BelongsTo),
            "validates" => Some(Keyword::Validates),
            "validates_presence_of" => Some(Keyword::ValidatesPresenceOf),
            _ => None,
        }
    }

    /// Whether a line's code starts with any recognised keyword
    pub fn starts_line(line: &str) -> Option<Self> {
        let trimmed = line.trim_start();
        let word_len = trimmed
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(trimmed.len());
        Self::from_word(&trimmed[..word_len])
    }
}

/// Lexical spelling of a field name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStyle {
    /// `:user`
    Symbol,
    /// `:"user"`
    QuotedSymbol(char),
    /// `"user"` or `'user'`
    Quoted(char),
}

/// A field name argument such as `:user` or `"user"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldToken<'a> {
    pub name: &'a str,
    pub style: FieldStyle,
}

impl<'a> FieldToken<'a> {
    pub fn parse(token: &'a str) -> Option<Self> {
        let token = token.trim();

        let (inner, style) = if let Some(symbol) = token.strip_prefix(':') {
            match unquote(symbol) {
                Some((inner, quote)) => (inner, FieldStyle::QuotedSymbol(quote)),
                None => (symbol, FieldStyle::Symbol),
            }
        } else {
            let (inner, quote) = unquote(token)?;
            (inner, FieldStyle::Quoted(quote))
        };

        is_identifier(inner).then_some(Self { name: inner, style })
    }

    /// Render a token with the same spelling but a different name
    pub fn render(&self, name: &str) -> String {
        match self.style {
            FieldStyle::Symbol => format!(":{name}"),
            FieldStyle::QuotedSymbol(quote) => format!(":{quote}{name}{quote}"),
            FieldStyle::Quoted(quote) => format!("{quote}{name}{quote}"),
        }
    }
}

fn unquote(token: &str) -> Option<(&str, char)> {
    let quote = token.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = token.strip_prefix(quote)?.strip_suffix(quote)?;
    Some((inner, quote))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A `key: value` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionArg<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl<'a> OptionArg<'a> {
    pub fn parse(token: &'a str) -> Option<Self> {
        let colon = token.find(':')?;
        let key = &token[..colon];
        let value = &token[colon + 1..];
        if !is_identifier(key) || value.starts_with(':') {
            return None;
        }
        Some(Self {
            key,
            value: value.trim(),
        })
    }

    /// `presence: true` or `presence: { ... }`
    pub fn is_presence(&self) -> bool {
        self.key == "presence"
            && (self.value == "true" || (self.value.starts_with('{') && self.value.ends_with('}')))
    }

    /// `optional: true`
    pub fn is_optional(&self) -> bool {
        self.key == "optional" && self.value == "true"
    }
}

/// One top-level argument and its byte range in the declaration text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument<'a> {
    pub text: &'a str,
    pub range: Range<usize>,
}

impl<'a> Argument<'a> {
    pub fn field(&self) -> Option<FieldToken<'a>> {
        FieldToken::parse(self.text)
    }

    pub fn option(&self) -> Option<OptionArg<'a>> {
        OptionArg::parse(self.text)
    }
}

/// A parsed association or validation statement
#[derive(Debug, Clone)]
pub struct Declaration<'a> {
    pub keyword: Keyword,
    pub text: &'a str,
    pub arguments: Vec<Argument<'a>>,
}

impl<'a> Declaration<'a> {
    /// Parse the joined text of a span
    ///
    /// Returns `None` when the text does not start with a recognised keyword
    /// or the keyword has no arguments.
    pub fn parse(text: &'a str) -> Option<Self> {
        let leading = text.len() - text.trim_start().len();
        let rest = &text[leading..];
        let word_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let keyword = Keyword::from_word(&rest[..word_len])?;

        let after_keyword = leading + word_len;
        let arguments_from = match text[after_keyword..].chars().next()? {
            '(' => after_keyword + 1,
            c if c.is_whitespace() => after_keyword,
            _ => return None,
        };

        let arguments: Vec<_> = split_arguments(text, arguments_from)
            .into_iter()
            .map(|range| Argument {
                text: &text[range.clone()],
                range,
            })
            .collect();

        if arguments.is_empty() {
            return None;
        }

        Some(Self {
            keyword,
            text,
            arguments,
        })
    }

    /// The first argument as a field name
    pub fn field(&self) -> Option<FieldToken<'a>> {
        self.arguments.first()?.field()
    }

    /// The leading run of field-name arguments, with their argument indices
    pub fn leading_fields(&self) -> Vec<(usize, FieldToken<'a>)> {
        self.arguments
            .iter()
            .map_while(Argument::field)
            .enumerate()
            .collect()
    }

    /// Option arguments, with their argument indices
    pub fn options(&self) -> impl Iterator<Item = (usize, OptionArg<'a>)> + '_ {
        self.arguments
            .iter()
            .enumerate()
            .filter_map(|(index, argument)| argument.option().map(|option| (index, option)))
    }

    /// Whether the declaration carries `optional: true`
    pub fn is_optional(&self) -> bool {
        self.options().any(|(_, option)| option.is_optional())
    }

    /// Index of the `presence` argument when it is `true` or a brace structure
    pub fn presence_argument(&self) -> Option<usize> {
        self.options()
            .find(|(_, option)| option.is_presence())
            .map(|(index, _)| index)
    }

    /// Names of every field this declaration requires to be present
    ///
    /// `belongs_to` never validates presence and yields nothing.
    pub fn presence_fields(&self) -> Vec<&'a str> {
        match self.keyword {
            Keyword::BelongsTo => Vec::new(),
            Keyword::Validates => match (self.leading_fields().as_slice(), self.presence_argument()) {
                ([(_, field)], Some(_)) => vec![field.name],
                (fields, Some(_)) if self.is_shared_presence() => {
                    fields.iter().map(|(_, field)| field.name).collect()
                }
                _ => Vec::new(),
            },
            Keyword::ValidatesPresenceOf => self
                .leading_fields()
                .into_iter()
                .map(|(_, field)| field.name)
                .collect(),
        }
    }

    /// `validates :a, :b, presence: ...` with presence as the only option
    ///
    /// Lists that carry further options such as `uniqueness:` share them
    /// between every field and are not treated as presence validations.
    pub fn is_shared_presence(&self) -> bool {
        let fields = self.leading_fields().len();
        self.keyword == Keyword::Validates
            && fields > 1
            && self.arguments.len() == fields + 1
            && self.presence_argument() == Some(fields)
    }

    /// Byte range covering argument `index` and the separator that joins it
    /// to its neighbours
    ///
    /// Removing the range leaves the remaining arguments correctly separated
    /// and keeps their original layout.
    pub fn removal_range(&self, index: usize) -> Range<usize> {
        let argument = &self.arguments[index].range;
        if index > 0 {
            self.arguments[index - 1].range.end..argument.end
        } else if let Some(next) = self.arguments.get(1) {
            argument.start..next.range.start
        } else {
            argument.clone()
        }
    }
}

/// Split an argument list into top-level argument byte ranges
///
/// Commas nested in brackets or literals do not split. The list ends at an
/// unmatched closing bracket or at the end of the text; comments are skipped
/// up to the end of their line.
fn split_arguments(text: &str, from: usize) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut literals = LiteralTracker::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut end = from;

    for (offset, ch) in text[from..].char_indices() {
        let index = from + offset;

        match literals.step(ch) {
            Lexeme::Comment => continue,
            Lexeme::Literal => {
                start.get_or_insert(index);
                end = index + ch.len_utf8();
                continue;
            }
            Lexeme::Code => {}
        }

        match ch {
            ',' if depth == 0 => {
                if let Some(start) = start.take() {
                    ranges.push(start..end);
                }
                continue;
            }
            ')' | ']' | '}' if depth == 0 => break,
            c if c.is_whitespace() => continue,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }

        start.get_or_insert(index);
        end = index + ch.len_utf8();
    }

    if let Some(start) = start {
        ranges.push(start..end);
    }

    ranges
}
