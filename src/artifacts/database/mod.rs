//! Entries of flattened trees

pub mod database_entry;
