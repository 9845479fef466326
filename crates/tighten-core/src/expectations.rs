/*!
# Expectation Rewriter

Keeps model specs in step with rewritten models. For every association field
that was made required, shoulda-style expectations such as

```text
it { is_expected.to belong_to(:user) }
expect(subject).to belong_to(:user).optional
```

get a `.required` qualifier: an existing `.optional` qualifier is replaced,
otherwise `.required` is appended after the matcher call. Negated
expectations are left alone.
*/

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::span::{Lexeme, LiteralTracker};

static BELONG_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bbelong_to\(\s*(?::(\w+)|:?"(\w+)"|:?'(\w+)')"#).expect("belong_to matcher regex")
});

const NEGATIONS: [&str; 3] = ["not_to ", "to_not ", "should_not "];

/// Add `.required` to `belong_to` expectations for the given fields
///
/// Idempotent: an expectation that already carries `.required` is skipped.
pub fn rewrite_expectations(text: &str, fields: &BTreeSet<String>) -> String {
    let mut output = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        output.push_str(&rewrite_line(line, fields));
    }

    output
}

fn rewrite_line(line: &str, fields: &BTreeSet<String>) -> String {
    let mut edits: Vec<(usize, usize, &str)> = Vec::new();

    for captures in BELONG_TO.captures_iter(line) {
        let (Some(call), Some(name)) = (
            captures.get(0),
            captures.get(1).or(captures.get(2)).or(captures.get(3)),
        ) else {
            continue;
        };
        if !fields.contains(name.as_str()) || is_negated(&line[..call.start()]) {
            continue;
        }

        let Some(close) = closing_paren(line, call.start() + "belong_to".len()) else {
            continue;
        };
        let chain = qualifier_chain(line, close + 1);

        if chain.iter().any(|(name, _)| *name == "required") {
            continue;
        }
        match chain.iter().find(|(name, _)| *name == "optional") {
            Some((_, range)) => edits.push((range.0, range.1, ".required")),
            None => edits.push((close + 1, close + 1, ".required")),
        }
    }

    let mut rewritten = line.to_string();
    for (start, end, replacement) in edits.into_iter().rev() {
        rewritten.replace_range(start..end, replacement);
    }
    rewritten
}

fn is_negated(prefix: &str) -> bool {
    NEGATIONS.iter().any(|negation| prefix.contains(negation))
}

/// Byte offset of the parenthesis closing the one at `open`
fn closing_paren(line: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut literals = LiteralTracker::new();

    for (offset, ch) in line[open..].char_indices() {
        if literals.step(ch) != Lexeme::Code {
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }

    None
}

/// `.name` / `.name(args)` qualifiers chained after the matcher call, with
/// the byte range of each one
fn qualifier_chain(line: &str, from: usize) -> Vec<(&str, (usize, usize))> {
    let mut chain = Vec::new();
    let mut position = from;

    while line[position..].starts_with('.') {
        let name_start = position + 1;
        let name_len = line[name_start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(line.len() - name_start);
        if name_len == 0 {
            break;
        }

        let mut end = name_start + name_len;
        if line[end..].starts_with('(') {
            match closing_paren(line, end) {
                Some(close) => end = close + 1,
                None => break,
            }
        }

        chain.push((&line[name_start..name_start + name_len], (position, end)));
        position = end;
    }

    chain
}
