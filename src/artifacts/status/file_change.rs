use colored::Colorize;
use std::path::PathBuf;

/// HEAD tree versus index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexChangeType {
    Added,
    Modified,
    Deleted,
    Renamed { from: PathBuf },
    TypeChanged,
}

impl IndexChangeType {
    pub fn code(&self) -> char {
        match self {
            IndexChangeType::Added => 'A',
            IndexChangeType::Modified => 'M',
            IndexChangeType::Deleted => 'D',
            IndexChangeType::Renamed { .. } => 'R',
            IndexChangeType::TypeChanged => 'T',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IndexChangeType::Added => "new file:   ",
            IndexChangeType::Modified => "modified:   ",
            IndexChangeType::Deleted => "deleted:    ",
            IndexChangeType::Renamed { .. } => "renamed:    ",
            IndexChangeType::TypeChanged => "typechange: ",
        }
    }
}

/// Index versus working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkspaceChangeType {
    Modified,
    Deleted,
    TypeChanged,
}

impl WorkspaceChangeType {
    pub fn code(&self) -> char {
        match self {
            WorkspaceChangeType::Modified => 'M',
            WorkspaceChangeType::Deleted => 'D',
            WorkspaceChangeType::TypeChanged => 'T',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkspaceChangeType::Modified => "modified:   ",
            WorkspaceChangeType::Deleted => "deleted:    ",
            WorkspaceChangeType::TypeChanged => "typechange: ",
        }
    }
}

/// Which conflict stages an unmerged path has
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConflictKind {
    BothDeleted,
    AddedByUs,
    DeletedByThem,
    AddedByThem,
    DeletedByUs,
    BothAdded,
    BothModified,
}

impl ConflictKind {
    /// Classify from the presence of the base, ours and theirs stages
    pub fn from_stages(base: bool, ours: bool, theirs: bool) -> Option<Self> {
        match (base, ours, theirs) {
            (true, false, false) => Some(ConflictKind::BothDeleted),
            (false, true, false) => Some(ConflictKind::AddedByUs),
            (true, true, false) => Some(ConflictKind::DeletedByThem),
            (false, false, true) => Some(ConflictKind::AddedByThem),
            (true, false, true) => Some(ConflictKind::DeletedByUs),
            (false, true, true) => Some(ConflictKind::BothAdded),
            (true, true, true) => Some(ConflictKind::BothModified),
            (false, false, false) => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ConflictKind::BothDeleted => "DD",
            ConflictKind::AddedByUs => "AU",
            ConflictKind::DeletedByThem => "UD",
            ConflictKind::AddedByThem => "UA",
            ConflictKind::DeletedByUs => "DU",
            ConflictKind::BothAdded => "AA",
            ConflictKind::BothModified => "UU",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConflictKind::BothDeleted => "both deleted:    ",
            ConflictKind::AddedByUs => "added by us:     ",
            ConflictKind::DeletedByThem => "deleted by them: ",
            ConflictKind::AddedByThem => "added by them:   ",
            ConflictKind::DeletedByUs => "deleted by us:   ",
            ConflictKind::BothAdded => "both added:      ",
            ConflictKind::BothModified => "both modified:   ",
        }
    }
}

/// Everything status knows about one path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PathStatus {
    pub path: PathBuf,
    pub staged: Option<IndexChangeType>,
    pub unstaged: Option<WorkspaceChangeType>,
    pub untracked: bool,
    pub conflict: Option<ConflictKind>,
}

impl PathStatus {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            staged: None,
            unstaged: None,
            untracked: false,
            conflict: None,
        }
    }

    /// Two-letter code of the short format
    pub fn short_code(&self) -> String {
        if let Some(conflict) = self.conflict {
            return conflict.code().to_string();
        }
        if self.untracked {
            return "??".to_string();
        }

        let staged = self.staged.as_ref().map_or(' ', IndexChangeType::code);
        let unstaged = self.unstaged.as_ref().map_or(' ', WorkspaceChangeType::code);
        format!("{staged}{unstaged}")
    }

    /// `old -> new` for staged renames, the path otherwise
    pub fn short_path(&self) -> String {
        match &self.staged {
            Some(IndexChangeType::Renamed { from }) => {
                format!("{} -> {}", from.display(), self.path.display())
            }
            _ => self.path.display().to_string(),
        }
    }

    /// Short format line, coloured like git when colour is on
    pub fn short_line(&self) -> String {
        let code = self.short_code();
        let mut chars = code.chars();
        let (x, y) = (chars.next().unwrap_or(' '), chars.next().unwrap_or(' '));

        let code = match (self.conflict.is_some(), self.untracked) {
            (true, _) => code.red().to_string(),
            (_, true) => code.red().to_string(),
            _ => format!("{}{}", x.to_string().green(), y.to_string().red()),
        };
        format!("{code} {}", self.short_path())
    }
}

/// Tab-indented, coloured line of the long format
pub fn long_line(label: &str, path: &str, staged: bool) -> String {
    let text = format!("{label}{path}");
    let text = match staged {
        true => text.green(),
        false => text.red(),
    };
    format!("\t{text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(true, true, true, "UU")]
    #[case(false, true, true, "AA")]
    #[case(true, true, false, "UD")]
    #[case(true, false, true, "DU")]
    #[case(false, true, false, "AU")]
    #[case(false, false, true, "UA")]
    #[case(true, false, false, "DD")]
    fn conflict_codes_follow_the_present_stages(
        #[case] base: bool,
        #[case] ours: bool,
        #[case] theirs: bool,
        #[case] code: &str,
    ) {
        assert_eq!(
            ConflictKind::from_stages(base, ours, theirs).map(|kind| kind.code()),
            Some(code)
        );
    }

    #[test]
    fn short_codes_combine_both_columns() {
        colored::control::set_override(false);

        let mut status = PathStatus::new(PathBuf::from("new.txt"));
        status.staged = Some(IndexChangeType::Renamed {
            from: PathBuf::from("old.txt"),
        });
        status.unstaged = Some(WorkspaceChangeType::Modified);

        assert_eq!(status.short_code(), "RM");
        assert_eq!(status.short_line(), "RM old.txt -> new.txt");

        let mut untracked = PathStatus::new(PathBuf::from("dir/"));
        untracked.untracked = true;
        assert_eq!(untracked.short_line(), "?? dir/");
    }

    #[test]
    fn long_lines_are_tab_indented() {
        colored::control::set_override(false);

        assert_eq!(
            long_line(IndexChangeType::Added.label(), "a.txt", true),
            "\tnew file:   a.txt"
        );
    }
}
