/*!
# Rewrite Properties

Generated model bodies mixing associations, validations, regex literals and
blank lines.
*/

use proptest::prelude::*;
use proptest::test_runner::Config;
use tighten_core::{Matcher, Rewriter};

const FIELDS: [&str; 3] = ["user", "account", "owner"];

/// Lines that never mark an association optional
const PLAIN_LINES: [&str; 11] = [
    "  belongs_to {f}",
    "  belongs_to {f}, optional: false",
    "  validates {f}, presence: true",
    "  validates {k}, presence: true, uniqueness: true",
    "  validates_presence_of :title, {f}",
    "  validates :title, {f}, presence: true",
    "  validates :title, {f}, presence: true, length: { maximum: 9 }",
    r"  validates :color, format: { with: /\A#\h{6}\z/ }",
    r"  validates :name, format: { with: /\A[^']*\z/ }, presence: true",
    "",
    "  has_many :posts # {f}",
];

const OPTIONAL_LINES: [&str; 2] = [
    "  belongs_to {f}, optional: true",
    "  belongs_to {f},\n             class_name: \"Account\",\n             optional: true",
];

fn token(name: &str, style: usize) -> String {
    match style {
        0 => format!(":{name}"),
        1 => format!("\"{name}\""),
        _ => format!(":\"{name}\""),
    }
}

fn line(templates: Vec<&'static str>) -> impl Strategy<Value = String> {
    (
        prop::sample::select(templates),
        prop::sample::select(FIELDS.to_vec()),
        0usize..3,
    )
        .prop_map(|(template, field, style)| {
            template
                .replace("{f}", &token(field, style))
                .replace("{k}", &token(&format!("{field}_id"), style))
        })
}

fn model(templates: Vec<&'static str>) -> impl Strategy<Value = String> {
    prop::collection::vec(line(templates), 0..12).prop_map(|lines| {
        let mut text = "class Model < ApplicationRecord\n".to_string();
        for line in lines {
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str("end\n");
        text
    })
}

fn any_lines() -> Vec<&'static str> {
    PLAIN_LINES.iter().chain(OPTIONAL_LINES.iter()).copied().collect()
}

fn rewrite(text: &str) -> String {
    let matcher = Matcher::default();
    Rewriter::new(&matcher).rewrite(text)
}

proptest! {
    #![proptest_config(Config::with_cases(256))]

    #[test]
    fn test_rewrite_is_idempotent(text in model(any_lines())) {
        let once = rewrite(&text);
        prop_assert_eq!(rewrite(&once), once);
    }

    #[test]
    fn test_rewritten_text_has_no_findings(text in model(any_lines())) {
        let once = rewrite(&text);
        prop_assert!(Matcher::default().find(&once).is_empty(), "left over in:\n{}", once);
    }

    #[test]
    fn test_text_without_optional_associations_is_unchanged(text in model(PLAIN_LINES.to_vec())) {
        prop_assert_eq!(rewrite(&text), text);
    }
}
