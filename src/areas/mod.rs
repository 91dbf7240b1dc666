//! On-disk areas of a repository
//!
//! - `config`: git's INI configuration file
//! - `database`: loose object database for blobs, trees, commits and tags
//! - `index`: staging area with conflict stages
//! - `operations`: persisted state of an in-progress merge or rebase
//! - `refs`: branches, tags, remote-tracking refs, HEAD and the stash
//! - `repository`: discovery and the handle tying the areas together
//! - `workspace`: working tree file system access

pub mod config;
pub mod database;
pub mod index;
pub mod operations;
pub mod refs;
pub mod repository;
pub mod workspace;
