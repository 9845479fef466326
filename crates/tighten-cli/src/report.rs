//! Plain-text rendering of detection findings and rewrite summaries.

use std::fmt::Write;

use tighten_core::{RewriteSummary, SourceFinding};

/// One block per finding, followed by a count line
pub fn findings_text(findings: &[SourceFinding]) -> String {
    if findings.is_empty() {
        return "No redundant presence validations found.\n".to_string();
    }

    let mut out = String::new();
    for found in findings {
        let _ = writeln!(out, "{}", found.finding.type_name);
        let _ = writeln!(out, "  field: {}", found.finding.field);
        let _ = writeln!(out, "  file:  {}", found.path.display());
        out.push('\n');
    }
    let _ = writeln!(out, "{} finding(s)", findings.len());
    out
}

pub fn rewrite_summary_text(summary: &RewriteSummary, dry_run: bool) -> String {
    let mut out = String::new();
    let verb = if dry_run { "would change" } else { "updated" };
    let _ = writeln!(
        out,
        "{} of {} file(s) {}",
        summary.files_changed(),
        summary.files_processed,
        verb
    );
    if !summary.success() {
        let _ = writeln!(out, "{} file(s) could not be processed", summary.errors.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tighten_core::Finding;

    #[test]
    fn test_findings_text() {
        let findings = vec![SourceFinding {
            finding: Finding::new("Post", "author"),
            path: PathBuf::from("app/models/post.rb"),
        }];
        assert_eq!(
            findings_text(&findings),
            "Post\n  field: author\n  file:  app/models/post.rb\n\n1 finding(s)\n"
        );
    }

    #[test]
    fn test_no_findings() {
        assert_eq!(
            findings_text(&[]),
            "No redundant presence validations found.\n"
        );
    }

    #[test]
    fn test_summary_mentions_errors() {
        let mut summary = RewriteSummary::new();
        summary.files_processed = 3;
        summary.changed_files.push(PathBuf::from("a.rb"));
        summary.errors.push("Error processing b.rb: denied".to_string());

        assert_eq!(
            rewrite_summary_text(&summary, true),
            "1 of 3 file(s) would change\n1 file(s) could not be processed\n"
        );
    }
}
