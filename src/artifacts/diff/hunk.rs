//! Line-level diffs grouped into hunks
//!
//! Lines keep their terminator, so `"a"` and `"a\n"` differ and a missing final newline is
//! reported. Whitespace options only change the comparison keys; rendered lines are always
//! the original bytes.

use crate::artifacts::diff::diff_algorithm::{DiffAlgorithm, Edit, MyersDiff};
use std::borrow::Cow;

pub const DEFAULT_CONTEXT: usize = 3;
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// How whitespace differences are treated when comparing lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum WhitespaceMode {
    #[default]
    Exact,
    /// `--ignore-space-at-eol`
    IgnoreAtEol,
    /// `-b`
    IgnoreChange,
    /// `-w`
    IgnoreAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDiffOptions {
    pub context: usize,
    pub inter_hunk_context: usize,
    pub whitespace: WhitespaceMode,
}

impl Default for LineDiffOptions {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT,
            inter_hunk_context: 0,
            whitespace: WhitespaceMode::Exact,
        }
    }
}

/// Split into lines, each keeping its `\n` (the last one may lack it)
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    data.split_inclusive(|&b| b == b'\n').collect()
}

fn is_blank(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\x0b' | b'\x0c')
}

/// Comparison key of a line under `mode`.
///
/// Exact comparison keeps the terminator, so a missing final newline is a change; every other
/// mode counts the newline as whitespace and drops it.
pub fn normalize(line: &[u8], mode: WhitespaceMode) -> Cow<'_, [u8]> {
    let body = line.strip_suffix(b"\n").unwrap_or(line);

    match mode {
        WhitespaceMode::Exact => Cow::Borrowed(line),
        WhitespaceMode::IgnoreAtEol => {
            let end = body.iter().rposition(|&b| !is_blank(b)).map_or(0, |i| i + 1);
            Cow::Borrowed(&body[..end])
        }
        WhitespaceMode::IgnoreChange => {
            let end = body.iter().rposition(|&b| !is_blank(b)).map_or(0, |i| i + 1);
            let mut key = Vec::with_capacity(end);
            let mut in_blank = false;
            for &b in &body[..end] {
                if is_blank(b) {
                    if !in_blank {
                        key.push(b' ');
                    }
                    in_blank = true;
                } else {
                    key.push(b);
                    in_blank = false;
                }
            }
            Cow::Owned(key)
        }
        WhitespaceMode::IgnoreAll => {
            Cow::Owned(body.iter().copied().filter(|&b| !is_blank(b)).collect())
        }
    }
}

/// Edit script between two line sequences under a whitespace mode
pub fn diff_lines(a: &[&[u8]], b: &[&[u8]], whitespace: WhitespaceMode) -> Vec<Edit> {
    let a_keys = a.iter().map(|line| normalize(line, whitespace)).collect::<Vec<_>>();
    let b_keys = b.iter().map(|line| normalize(line, whitespace)).collect::<Vec<_>>();

    MyersDiff::new(&a_keys, &b_keys).diff()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine<'l> {
    Context(&'l [u8]),
    Delete(&'l [u8]),
    Insert(&'l [u8]),
}

impl HunkLine<'_> {
    pub fn sigil(&self) -> char {
        match self {
            HunkLine::Context(_) => ' ',
            HunkLine::Delete(_) => '-',
            HunkLine::Insert(_) => '+',
        }
    }

    pub fn text(&self) -> &[u8] {
        match self {
            HunkLine::Context(text) | HunkLine::Delete(text) | HunkLine::Insert(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk<'l> {
    pub a_start: usize,
    pub a_len: usize,
    pub b_start: usize,
    pub b_len: usize,
    pub lines: Vec<HunkLine<'l>>,
}

impl Hunk<'_> {
    /// `@@ -a,b +c,d @@`, with counts of 1 omitted
    pub fn header(&self) -> String {
        format!(
            "@@ -{} +{} @@",
            format_range(self.a_start, self.a_len),
            format_range(self.b_start, self.b_len)
        )
    }
}

fn format_range(start: usize, len: usize) -> String {
    match len {
        1 => start.to_string(),
        _ => format!("{start},{len}"),
    }
}

/// Lazily groups an edit script into hunks; cloning restarts from the current position
#[derive(Debug, Clone)]
pub struct Hunks<'e, 'l> {
    edits: &'e [Edit],
    a: &'e [&'l [u8]],
    b: &'e [&'l [u8]],
    options: LineDiffOptions,
    position: usize,
}

impl<'e, 'l> Hunks<'e, 'l> {
    pub fn new(
        edits: &'e [Edit],
        a: &'e [&'l [u8]],
        b: &'e [&'l [u8]],
        options: LineDiffOptions,
    ) -> Self {
        Self {
            edits,
            a,
            b,
            options,
            position: 0,
        }
    }

    fn next_change(&self, from: usize) -> Option<usize> {
        (from..self.edits.len()).find(|&i| self.edits[i].is_change())
    }

    /// Number of a-side and b-side lines consumed by the edits before `end`
    fn offsets(&self, end: usize) -> (usize, usize) {
        self.edits[..end].iter().fold((0, 0), |(a, b), edit| match edit {
            Edit::Delete { .. } => (a + 1, b),
            Edit::Insert { .. } => (a, b + 1),
            Edit::Equal { .. } => (a + 1, b + 1),
        })
    }
}

impl<'l> Iterator for Hunks<'_, 'l> {
    type Item = Hunk<'l>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.next_change(self.position)?;
        let context = self.options.context;
        let max_gap = 2 * context + self.options.inter_hunk_context;

        let start = first.saturating_sub(context).max(self.position);
        let mut last = first;
        while let Some(next) = self.next_change(last + 1) {
            // unchanged lines between two changes
            if next - last - 1 > max_gap {
                break;
            }
            last = next;
        }
        let end = (last + context + 1).min(self.edits.len());
        self.position = end;

        let (a_before, b_before) = self.offsets(start);
        let mut hunk = Hunk {
            a_start: 0,
            a_len: 0,
            b_start: 0,
            b_len: 0,
            lines: Vec::with_capacity(end - start),
        };

        for edit in &self.edits[start..end] {
            match *edit {
                Edit::Equal { b, .. } => {
                    hunk.a_len += 1;
                    hunk.b_len += 1;
                    hunk.lines.push(HunkLine::Context(self.b[b]));
                }
                Edit::Delete { a } => {
                    hunk.a_len += 1;
                    hunk.lines.push(HunkLine::Delete(self.a[a]));
                }
                Edit::Insert { b } => {
                    hunk.b_len += 1;
                    hunk.lines.push(HunkLine::Insert(self.b[b]));
                }
            }
        }

        // an empty side is addressed by the line before the change
        hunk.a_start = if hunk.a_len == 0 { a_before } else { a_before + 1 };
        hunk.b_start = if hunk.b_len == 0 { b_before } else { b_before + 1 };

        Some(hunk)
    }
}

/// Inserted and deleted line counts of an edit script
pub fn count_changes(edits: &[Edit]) -> (usize, usize) {
    edits.iter().fold((0, 0), |(added, deleted), edit| match edit {
        Edit::Insert { .. } => (added + 1, deleted),
        Edit::Delete { .. } => (added, deleted + 1),
        Edit::Equal { .. } => (added, deleted),
    })
}

/// Render hunks as unified diff body text
pub fn render_hunks<'l>(hunks: impl Iterator<Item = Hunk<'l>>) -> Vec<u8> {
    let mut out = Vec::new();
    for hunk in hunks {
        out.extend_from_slice(hunk.header().as_bytes());
        out.push(b'\n');
        for line in &hunk.lines {
            out.push(line.sigil() as u8);
            out.extend_from_slice(line.text());
            if !line.text().ends_with(b"\n") {
                out.push(b'\n');
                out.extend_from_slice(NO_NEWLINE_MARKER.as_bytes());
                out.push(b'\n');
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn hunks_for(a: &str, b: &str, options: LineDiffOptions) -> Vec<Hunk<'static>> {
        let a: &'static str = Box::leak(a.to_string().into_boxed_str());
        let b: &'static str = Box::leak(b.to_string().into_boxed_str());
        let a_lines: &'static [&'static [u8]] =
            Box::leak(split_lines(a.as_bytes()).into_boxed_slice());
        let b_lines: &'static [&'static [u8]] =
            Box::leak(split_lines(b.as_bytes()).into_boxed_slice());
        let edits: &'static [Edit] =
            Box::leak(diff_lines(a_lines, b_lines, options.whitespace).into_boxed_slice());

        Hunks::new(edits, a_lines, b_lines, options).collect()
    }

    fn numbered(count: usize) -> String {
        (1..=count).map(|i| format!("line {i}\n")).collect()
    }

    fn with_changes(count: usize, changed: &[usize]) -> String {
        (1..=count)
            .map(|i| match changed.contains(&i) {
                true => format!("changed {i}\n"),
                false => format!("line {i}\n"),
            })
            .collect()
    }

    #[test]
    fn lines_keep_their_terminators() {
        assert_eq!(split_lines(b"a\nb"), vec![&b"a\n"[..], &b"b"[..]]);
        assert_eq!(split_lines(b""), Vec::<&[u8]>::new());
    }

    #[test]
    fn missing_final_newline_is_a_change() {
        let hunks = hunks_for("a\nb\n", "a\nb", LineDiffOptions::default());
        let rendered = String::from_utf8(render_hunks(hunks.into_iter())).unwrap();

        assert_eq!(
            rendered,
            "@@ -1,2 +1,2 @@\n a\n-b\n+b\n\\ No newline at end of file\n"
        );
    }

    #[test]
    fn headers_omit_single_counts_and_address_empty_sides() {
        let added = hunks_for("", "new\n", LineDiffOptions::default());
        assert_eq!(added[0].header(), "@@ -0,0 +1 @@");

        let deleted = hunks_for("old\n", "", LineDiffOptions::default());
        assert_eq!(deleted[0].header(), "@@ -1 +0,0 @@");

        let inserted_after_two = hunks_for("a\nb\n", "a\nb\nc\n", LineDiffOptions {
            context: 0,
            ..Default::default()
        });
        assert_eq!(inserted_after_two[0].header(), "@@ -2,0 +3 @@");
    }

    #[test]
    fn zero_context_includes_no_unrelated_lines() {
        let hunks = hunks_for(&numbered(10), &with_changes(10, &[5]), LineDiffOptions {
            context: 0,
            ..Default::default()
        });

        assert_eq!(hunks.len(), 1);
        assert_eq!(
            hunks[0].lines,
            vec![
                HunkLine::Delete(b"line 5\n"),
                HunkLine::Insert(b"changed 5\n")
            ]
        );
        assert_eq!(hunks[0].header(), "@@ -5 +5 @@");
    }

    #[rstest]
    #[case(0, 3)]
    #[case(1, 3)]
    #[case(2, 2)]
    #[case(3, 1)]
    fn distant_changes_split_into_hunks(#[case] context: usize, #[case] expected: usize) {
        let hunks = hunks_for(&numbered(30), &with_changes(30, &[5, 12, 17]), LineDiffOptions {
            context,
            ..Default::default()
        });

        assert_eq!(hunks.len(), expected);
    }

    #[test]
    fn inter_hunk_context_fuses_nearby_hunks() {
        let old = numbered(30);
        let new = with_changes(30, &[5, 15]);
        let separate = hunks_for(&old, &new, LineDiffOptions {
            context: 1,
            ..Default::default()
        });
        let fused = hunks_for(&old, &new, LineDiffOptions {
            context: 1,
            inter_hunk_context: 8,
            whitespace: WhitespaceMode::Exact,
        });

        assert_eq!(separate.len(), 2);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].header(), "@@ -4,13 +4,13 @@");
    }

    #[rstest]
    #[case(WhitespaceMode::IgnoreAtEol, "a  \n", "a\n", true)]
    #[case(WhitespaceMode::IgnoreAtEol, "a b\n", "a  b\n", false)]
    #[case(WhitespaceMode::IgnoreChange, "a b\n", "a \t b\n", true)]
    #[case(WhitespaceMode::IgnoreChange, "ab\n", "a b\n", false)]
    #[case(WhitespaceMode::IgnoreAll, "ab\n", "a b \n", true)]
    #[case(WhitespaceMode::Exact, "a\n", "a \n", false)]
    #[case(WhitespaceMode::Exact, "c", "c\n", false)]
    #[case(WhitespaceMode::IgnoreAtEol, "c", "c\n", true)]
    #[case(WhitespaceMode::IgnoreChange, "c", "c \n", true)]
    #[case(WhitespaceMode::IgnoreAll, "c\n", "c", true)]
    fn whitespace_modes_normalize_for_comparison(
        #[case] mode: WhitespaceMode,
        #[case] a: &str,
        #[case] b: &str,
        #[case] equal: bool,
    ) {
        assert_eq!(normalize(a.as_bytes(), mode) == normalize(b.as_bytes(), mode), equal);
    }

    #[test]
    fn ignored_whitespace_renders_the_new_side() {
        let hunks = hunks_for("a \nb\n", "a\nc\n", LineDiffOptions {
            whitespace: WhitespaceMode::IgnoreAll,
            ..Default::default()
        });

        assert_eq!(hunks[0].lines[0], HunkLine::Context(b"a\n"));
    }

    #[rstest]
    #[case(WhitespaceMode::IgnoreAtEol)]
    #[case(WhitespaceMode::IgnoreChange)]
    #[case(WhitespaceMode::IgnoreAll)]
    fn ignored_whitespace_covers_the_final_newline(#[case] whitespace: WhitespaceMode) {
        let options = LineDiffOptions {
            whitespace,
            ..Default::default()
        };

        assert_eq!(hunks_for("a\nb\nc", "a\nb\nc\n", options), vec![]);
    }

    /// Whether the lines of `inner` on both sides sit inside one hunk of `outer`
    fn covered_by(inner: &Hunk, outer: &[Hunk]) -> bool {
        let within = |start: usize, len: usize, outer_start: usize, outer_len: usize| {
            len == 0 || (outer_start <= start && start + len <= outer_start + outer_len)
        };
        outer.iter().any(|hunk| {
            within(inner.a_start, inner.a_len, hunk.a_start, hunk.a_len)
                && within(inner.b_start, inner.b_len, hunk.b_start, hunk.b_len)
        })
    }

    proptest! {
        #[test]
        fn more_context_never_adds_hunks(
            changed in proptest::collection::btree_set(1usize..=40, 1..8),
            context in 0usize..6,
        ) {
            let changed = changed.into_iter().collect::<Vec<_>>();
            let old = numbered(40);
            let new = with_changes(40, &changed);

            let narrow = hunks_for(&old, &new, LineDiffOptions { context, ..Default::default() });
            let wide = hunks_for(&old, &new, LineDiffOptions {
                context: context + 1,
                ..Default::default()
            });
            let fused = hunks_for(&old, &new, LineDiffOptions {
                context,
                inter_hunk_context: 3,
                whitespace: WhitespaceMode::Exact,
            });

            prop_assert!(wide.len() <= narrow.len());
            prop_assert!(fused.len() <= narrow.len());
            prop_assert!(narrow.iter().all(|hunk| covered_by(hunk, &wide)));
            prop_assert!(narrow.iter().all(|hunk| covered_by(hunk, &fused)));
        }
    }
}
