//! Diff algorithms and tree comparison
//!
//! - `diff_algorithm`: Myers' diff over arbitrary comparable items
//! - `hunk`: line diffs with whitespace modes, grouped into hunks
//! - `tree_diff`: path-level comparison of trees and snapshots
//! - `diff_target`: the sides of a diff (tree, index, worktree) and their contents
//! - `rename`: pairing deletions with additions by content similarity
//! - `file_delta`: per-file results and diff options
//! - `format`: patch, stat and listing output

pub mod diff_algorithm;
pub mod diff_target;
pub mod file_delta;
pub mod format;
pub mod hunk;
pub mod rename;
pub mod tree_diff;
