//! Comparing HEAD, the index and the working tree
//!
//! `status_info` runs the scan and collects its findings, `inspector` decides what changed
//! for a single path, `ignore` evaluates exclude rules and `file_change` names the kinds of
//! change and how they print.

pub mod file_change;
pub mod ignore;
pub mod inspector;
pub mod status_info;
