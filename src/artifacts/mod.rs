//! Value types and the algorithms over them
//!
//! Nothing in here touches the terminal; the command layer decides what gets printed.

pub mod branch;
pub mod checkout;
pub mod core;
pub mod database;
pub mod diff;
pub mod index;
pub mod log;
pub mod merge;
pub mod objects;
pub mod operation;
pub mod status;
