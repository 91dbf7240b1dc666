//! Commit history traversal
//!
//! - `rev_list`: lazy walk in committer-time order with excludes, limits and path filters
//! - `decoration`: ref names attached to commits
//! - `path_filter`: path selection backed by a trie
//!
//! ## Algorithm
//!
//! The walk keeps a priority queue ordered by committer timestamp, ties going to the commit
//! queued first. Commits reachable from excluded starts are collected up front and never
//! enter the queue, so `a..b` and `^a b` only ever show what `b` adds.

pub mod decoration;
pub mod path_filter;
pub mod rev_list;
