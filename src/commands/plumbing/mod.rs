//! Plumbing commands
//!
//! Direct access to objects, refs and the index, mostly used by scripts and tests:
//!
//! - `cat-file`, `hash-object`: read and write single objects
//! - `ls-tree`, `ls-files`, `write-tree`: trees and the index
//! - `update-ref`, `rev-parse`, `rev-list`, `merge-base`: refs and history
//! - `config`: the repository configuration file

pub mod cat_file;
pub mod config;
pub mod hash_object;
pub mod ls_files;
pub mod ls_tree;
pub mod merge_base;
pub mod rev_list;
pub mod rev_parse;
pub mod update_ref;
pub mod write_commit;
