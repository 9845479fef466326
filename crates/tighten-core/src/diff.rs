/*!
# Line Diff

Minimal line diff used to preview rewrites in dry-run mode. Common leading
and trailing lines are stripped first; the rest is aligned with a longest
common subsequence table, which is plenty for model-sized files.
*/

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLine<'a> {
    Unchanged(&'a str),
    Removed(&'a str),
    Added(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiff<'a> {
    lines: Vec<DiffLine<'a>>,
}

impl<'a> LineDiff<'a> {
    pub fn lines(&self) -> &[DiffLine<'a>] {
        &self.lines
    }

    /// Only the added and removed lines
    pub fn changes(&self) -> impl Iterator<Item = &DiffLine<'a>> {
        self.lines
            .iter()
            .filter(|line| !matches!(line, DiffLine::Unchanged(_)))
    }

    pub fn has_changes(&self) -> bool {
        self.changes().next().is_some()
    }

    pub fn added(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| matches!(line, DiffLine::Added(_)))
            .count()
    }

    pub fn removed(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| matches!(line, DiffLine::Removed(_)))
            .count()
    }
}

/// Renders changed lines as `- old` / `+ new`
impl fmt::Display for LineDiff<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.changes() {
            match line {
                DiffLine::Removed(text) => writeln!(f, "- {text}")?,
                DiffLine::Added(text) => writeln!(f, "+ {text}")?,
                DiffLine::Unchanged(_) => {}
            }
        }
        Ok(())
    }
}

pub fn line_diff<'a>(old: &'a str, new: &'a str) -> LineDiff<'a> {
    let old: Vec<&str> = old.lines().collect();
    let new: Vec<&str> = new.lines().collect();

    let prefix = old
        .iter()
        .zip(&new)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut lines: Vec<DiffLine<'a>> = old[..prefix].iter().copied().map(DiffLine::Unchanged).collect();
    lines.extend(align(
        &old[prefix..old.len() - suffix],
        &new[prefix..new.len() - suffix],
    ));
    lines.extend(
        old[old.len() - suffix..]
            .iter()
            .copied()
            .map(DiffLine::Unchanged),
    );

    LineDiff { lines }
}

fn align<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<DiffLine<'a>> {
    // table[i][j] = LCS length of old[i..] and new[j..]
    let mut table = vec![vec![0usize; new.len() + 1]; old.len() + 1];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            table[i][j] = if old[i] == new[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(old.len() + new.len());
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            lines.push(DiffLine::Unchanged(old[i]));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            lines.push(DiffLine::Removed(old[i]));
            i += 1;
        } else {
            lines.push(DiffLine::Added(new[j]));
            j += 1;
        }
    }
    lines.extend(old[i..].iter().copied().map(DiffLine::Removed));
    lines.extend(new[j..].iter().copied().map(DiffLine::Added));
    lines
}
