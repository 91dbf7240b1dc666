//! Command implementations
//!
//! `plumbing` holds the object and ref level commands scripts build on (`cat-file`,
//! `update-ref`, `rev-list`, ...). `porcelain` holds the everyday workflows.

pub mod plumbing;
pub mod porcelain;
