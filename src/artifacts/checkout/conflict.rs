use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};

#[derive(Debug)]
pub struct ConflictMessage {
    pub header: String,
    pub footer: String,
}

impl ConflictMessage {
    /// Message for a conflict raised by `operation` (`checkout`, `merge`, ...)
    pub fn new(conflict_type: &ConflictType, operation: &str) -> Self {
        // only a checkout switches branches, everything else merges
        let action = match operation {
            "checkout" => "switch branches",
            _ => "merge",
        };
        match conflict_type {
            ConflictType::StaleFile => Self {
                header: format!(
                    "Your local changes to the following files would be overwritten by {operation}:"
                ),
                footer: format!("Please commit your changes or stash them before you {action}."),
            },
            ConflictType::StaleDirectory => Self {
                header: "Updating the following directories would lose untracked files in them:"
                    .to_string(),
                footer: String::new(),
            },
            ConflictType::UntrackedOverwritten => Self {
                header: format!(
                    "The following untracked working tree files would be overwritten by \
                     {operation}:"
                ),
                footer: format!("Please move or remove them before you {action}."),
            },
            ConflictType::UntrackedRemoved => Self {
                header: format!(
                    "The following untracked working tree files would be removed by {operation}:"
                ),
                footer: format!("Please move or remove them before you {action}."),
            },
        }
    }
}

/// Why a path blocks a working tree update; variants are in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictType {
    StaleFile,
    StaleDirectory,
    UntrackedOverwritten,
    UntrackedRemoved,
}

impl ConflictType {
    pub fn get_conflict_type(
        stat: Option<&EntryMetadata>,
        entry: Option<&IndexEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> ConflictType {
        if entry.is_some() {
            ConflictType::StaleFile
        } else if let Some(stat) = stat
            && stat.mode.is_tree()
        {
            ConflictType::StaleDirectory
        } else if new_entry.is_some() {
            ConflictType::UntrackedOverwritten
        } else {
            ConflictType::UntrackedRemoved
        }
    }
}
