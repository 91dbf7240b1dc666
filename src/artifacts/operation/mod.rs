//! Multi-step operations that survive between commands
//!
//! - `state`: the persisted state of an in-progress merge or rebase and its transitions

pub mod state;
