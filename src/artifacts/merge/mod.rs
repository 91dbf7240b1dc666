//! Merge machinery
//!
//! - `bca_finder`: best common ancestor (merge base) search
//! - `content`: line-level three-way merge with conflict markers
//! - `tree_merge`: path-wise merge of three trees
//! - `apply`: writing a merge result into the index and working tree

pub mod apply;
pub mod bca_finder;
pub mod content;
pub mod tree_merge;
