//! Moving the working tree and index from one tree to another
//!
//! A `Migration` checks every path it is about to touch first and refuses to start when
//! local changes or untracked files are in the way, so a refused checkout, merge or reset
//! leaves the working tree untouched.

pub mod conflict;
pub mod migration;
