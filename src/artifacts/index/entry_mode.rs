use crate::artifacts::objects::object_type::ObjectType;

const TYPE_MASK: u32 = 0o170000;
const TYPE_REGULAR: u32 = 0o100000;
const TYPE_SYMLINK: u32 = 0o120000;
const TYPE_GITLINK: u32 = 0o160000;
const TYPE_DIRECTORY: u32 = 0o040000;

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

/// Mode of a tree or index entry
#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum EntryMode {
    File(FileMode),
    Symlink,
    /// Submodule commit
    Gitlink,
    #[default]
    Directory,
}

impl EntryMode {
    /// Octal mode as written inside tree objects
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Gitlink => "160000",
            EntryMode::Directory => "40000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Symlink => 0o120000,
            EntryMode::Gitlink => 0o160000,
            EntryMode::Directory => 0o40000,
        }
    }

    /// Six-digit form used by `ls-tree`, `diff` headers and `--raw`
    pub fn padded(&self) -> String {
        format!("{:06o}", self.as_u32())
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    /// Whether the entry's object is a blob (regular file, executable or symlink)
    pub fn is_blob(&self) -> bool {
        matches!(self, EntryMode::File(_) | EntryMode::Symlink)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, EntryMode::File(_))
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, EntryMode::Symlink)
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            EntryMode::File(_) | EntryMode::Symlink => ObjectType::Blob,
            EntryMode::Gitlink => ObjectType::Commit,
            EntryMode::Directory => ObjectType::Tree,
        }
    }

    /// Two modes differ in kind (file, symlink, submodule, directory), not just permissions
    pub fn is_type_change(&self, other: &EntryMode) -> bool {
        std::mem::discriminant(self) != std::mem::discriminant(other)
    }

    pub fn from_octal_str(value: &str) -> anyhow::Result<Self> {
        let mode = u32::from_str_radix(value, 8)
            .map_err(|_| anyhow::anyhow!("Invalid entry mode: {value}"))?;
        EntryMode::try_from(mode)
    }
}

impl TryFrom<u32> for EntryMode {
    type Error = anyhow::Error;

    fn try_from(mode: u32) -> anyhow::Result<Self> {
        match mode & TYPE_MASK {
            TYPE_REGULAR if mode & 0o111 != 0 => Ok(EntryMode::File(FileMode::Executable)),
            TYPE_REGULAR => Ok(EntryMode::File(FileMode::Regular)),
            TYPE_SYMLINK => Ok(EntryMode::Symlink),
            TYPE_GITLINK => Ok(EntryMode::Gitlink),
            TYPE_DIRECTORY => Ok(EntryMode::Directory),
            _ => Err(anyhow::anyhow!("Invalid entry mode: {mode:o}")),
        }
    }
}

impl From<EntryMode> for u32 {
    fn from(mode: EntryMode) -> Self {
        mode.as_u32()
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}

impl TryFrom<EntryMode> for FileMode {
    type Error = anyhow::Error;

    fn try_from(value: EntryMode) -> anyhow::Result<Self> {
        match value {
            EntryMode::File(mode) => Ok(mode),
            _ => Err(anyhow::anyhow!("Not a regular file mode: {}", value.as_str())),
        }
    }
}

impl TryFrom<&str> for EntryMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        EntryMode::from_octal_str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("100644", EntryMode::File(FileMode::Regular))]
    #[case("100755", EntryMode::File(FileMode::Executable))]
    #[case("100664", EntryMode::File(FileMode::Regular))]
    #[case("120000", EntryMode::Symlink)]
    #[case("160000", EntryMode::Gitlink)]
    #[case("40000", EntryMode::Directory)]
    #[case("040000", EntryMode::Directory)]
    fn modes_parse_from_octal(#[case] raw: &str, #[case] expected: EntryMode) {
        assert_eq!(EntryMode::from_octal_str(raw).unwrap(), expected);
    }

    #[test]
    fn unknown_modes_are_errors_not_panics() {
        assert!(EntryMode::try_from(0o777u32).is_err());
        assert!(EntryMode::from_octal_str("banana").is_err());
    }

    #[test]
    fn permission_changes_are_not_type_changes() {
        let regular = EntryMode::File(FileMode::Regular);
        let executable = EntryMode::File(FileMode::Executable);

        assert!(!regular.is_type_change(&executable));
        assert!(regular.is_type_change(&EntryMode::Symlink));
        assert_eq!(EntryMode::Directory.padded(), "040000");
    }
}
