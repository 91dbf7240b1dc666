//! Line-level three-way merge
//!
//! Both sides are diffed against the base; runs of base lines that both sides keep are stable
//! and split the files into chunks. A chunk changed on one side only takes that side, a chunk
//! changed identically on both sides takes either, and anything else is a conflict rendered
//! between markers:
//!
//! ```text
//! <<<<<<< HEAD
//! our lines
//! =======
//! their lines
//! >>>>>>> topic
//! ```

use crate::artifacts::diff::diff_algorithm::Edit;
use crate::artifacts::diff::hunk::{WhitespaceMode, diff_lines, split_lines};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk<'l> {
    Clean(Vec<&'l [u8]>),
    Conflict {
        ours: Vec<&'l [u8]>,
        theirs: Vec<&'l [u8]>,
    },
}

/// Result of merging one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedContent {
    pub content: Vec<u8>,
    pub conflicted: bool,
}

/// Base line index to the matching line index on one side
fn matches(base: &[&[u8]], side: &[&[u8]]) -> HashMap<usize, usize> {
    diff_lines(base, side, WhitespaceMode::Exact)
        .into_iter()
        .filter_map(|edit| match edit {
            Edit::Equal { a, b } => Some((a, b)),
            _ => None,
        })
        .collect()
}

struct Diff3<'l> {
    base: Vec<&'l [u8]>,
    ours: Vec<&'l [u8]>,
    theirs: Vec<&'l [u8]>,
    match_ours: HashMap<usize, usize>,
    match_theirs: HashMap<usize, usize>,
    pos_base: usize,
    pos_ours: usize,
    pos_theirs: usize,
    chunks: Vec<Chunk<'l>>,
}

impl<'l> Diff3<'l> {
    fn new(base: &'l [u8], ours: &'l [u8], theirs: &'l [u8]) -> Self {
        let (base, ours, theirs) = (split_lines(base), split_lines(ours), split_lines(theirs));
        let match_ours = matches(&base, &ours);
        let match_theirs = matches(&base, &theirs);

        Diff3 {
            base,
            ours,
            theirs,
            match_ours,
            match_theirs,
            pos_base: 0,
            pos_ours: 0,
            pos_theirs: 0,
            chunks: Vec::new(),
        }
    }

    fn in_bounds(&self, offset: usize) -> bool {
        self.pos_base + offset < self.base.len()
            || self.pos_ours + offset < self.ours.len()
            || self.pos_theirs + offset < self.theirs.len()
    }

    fn is_stable(&self, offset: usize) -> bool {
        let line = self.pos_base + offset;
        self.match_ours.get(&line) == Some(&(self.pos_ours + offset))
            && self.match_theirs.get(&line) == Some(&(self.pos_theirs + offset))
    }

    fn next_mismatch(&self) -> Option<usize> {
        let mut offset = 0;
        while self.in_bounds(offset) && self.is_stable(offset) {
            offset += 1;
        }
        self.in_bounds(offset).then_some(offset)
    }

    /// Next base line kept by both sides, with its position on each side
    fn next_match(&self) -> Option<(usize, usize, usize)> {
        (self.pos_base..self.base.len()).find_map(|line| {
            let ours = self.match_ours.get(&line)?;
            let theirs = self.match_theirs.get(&line)?;
            Some((line, *ours, *theirs))
        })
    }

    fn emit_chunk(&mut self, base_end: usize, ours_end: usize, theirs_end: usize) {
        let base = &self.base[self.pos_base..base_end];
        let ours = &self.ours[self.pos_ours..ours_end];
        let theirs = &self.theirs[self.pos_theirs..theirs_end];

        let chunk = if ours == base || ours == theirs {
            Chunk::Clean(theirs.to_vec())
        } else if theirs == base {
            Chunk::Clean(ours.to_vec())
        } else {
            Chunk::Conflict {
                ours: ours.to_vec(),
                theirs: theirs.to_vec(),
            }
        };
        self.chunks.push(chunk);

        self.pos_base = base_end;
        self.pos_ours = ours_end;
        self.pos_theirs = theirs_end;
    }

    fn emit_final_chunk(&mut self) {
        self.emit_chunk(self.base.len(), self.ours.len(), self.theirs.len());
    }

    fn into_chunks(mut self) -> Vec<Chunk<'l>> {
        loop {
            match self.next_mismatch() {
                Some(0) => match self.next_match() {
                    Some((base, ours, theirs)) => self.emit_chunk(base, ours, theirs),
                    None => {
                        self.emit_final_chunk();
                        break;
                    }
                },
                Some(offset) => self.emit_chunk(
                    self.pos_base + offset,
                    self.pos_ours + offset,
                    self.pos_theirs + offset,
                ),
                None => {
                    self.emit_final_chunk();
                    break;
                }
            }
        }

        self.chunks
    }
}

fn push_section(output: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        output.extend_from_slice(line);
    }
    if output.last().is_some_and(|&byte| byte != b'\n') {
        output.push(b'\n');
    }
}

/// Merge `ours` and `theirs` against `base`, labelling conflict markers with the side names
pub fn merge_content(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    ours_label: &str,
    theirs_label: &str,
) -> MergedContent {
    let chunks = Diff3::new(base, ours, theirs).into_chunks();
    let mut content = Vec::with_capacity(ours.len().max(theirs.len()));
    let mut conflicted = false;

    for chunk in chunks {
        match chunk {
            Chunk::Clean(lines) => {
                for line in lines {
                    content.extend_from_slice(line);
                }
            }
            Chunk::Conflict { ours, theirs } => {
                conflicted = true;
                if content.last().is_some_and(|&byte| byte != b'\n') {
                    content.push(b'\n');
                }
                content.extend_from_slice(format!("<<<<<<< {ours_label}\n").as_bytes());
                push_section(&mut content, &ours);
                content.extend_from_slice(b"=======\n");
                push_section(&mut content, &theirs);
                content.extend_from_slice(format!(">>>>>>> {theirs_label}\n").as_bytes());
            }
        }
    }

    MergedContent {
        content,
        conflicted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn merge(base: &str, ours: &str, theirs: &str) -> (String, bool) {
        let merged = merge_content(
            base.as_bytes(),
            ours.as_bytes(),
            theirs.as_bytes(),
            "HEAD",
            "topic",
        );
        (String::from_utf8(merged.content).unwrap(), merged.conflicted)
    }

    #[rstest]
    #[case::ours_only("a\nb\nc\n", "a\nB\nc\n", "a\nb\nc\n", "a\nB\nc\n")]
    #[case::theirs_only("a\nb\nc\n", "a\nb\nc\n", "a\nb\nC\n", "a\nb\nC\n")]
    #[case::both_apart("a\nb\nc\nd\ne\n", "A\nb\nc\nd\ne\n", "a\nb\nc\nd\nE\n", "A\nb\nc\nd\nE\n")]
    #[case::same_change("a\nb\n", "a\nX\n", "a\nX\n", "a\nX\n")]
    #[case::insertions_apart(
        "a\nb\nc\n",
        "a\nnew\nb\nc\n",
        "a\nb\nc\nend\n",
        "a\nnew\nb\nc\nend\n"
    )]
    fn clean_merges(
        #[case] base: &str,
        #[case] ours: &str,
        #[case] theirs: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(merge(base, ours, theirs), (expected.to_string(), false));
    }

    #[test]
    fn overlapping_changes_are_marked() {
        let (content, conflicted) = merge("a\nb\nc\n", "a\nours\nc\n", "a\ntheirs\nc\n");

        assert!(conflicted);
        assert_eq!(
            content,
            "a\n<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> topic\nc\n"
        );
    }

    #[test]
    fn add_add_against_an_empty_base() {
        let (content, conflicted) = merge("", "one\n", "two\n");

        assert!(conflicted);
        assert_eq!(content, "<<<<<<< HEAD\none\n=======\ntwo\n>>>>>>> topic\n");
    }

    #[test]
    fn missing_final_newlines_do_not_glue_markers() {
        let (content, conflicted) = merge("base", "ours", "theirs");

        assert!(conflicted);
        assert_eq!(content, "<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> topic\n");
    }
}
