use crate::artifacts::branch::INVALID_BRANCH_NAME_REGEX;
use anyhow::Context;
use derive_new::new;
use std::sync::LazyLock;

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";

static INVALID_NAME: LazyLock<Result<regex::Regex, regex::Error>> =
    LazyLock::new(|| regex::Regex::new(INVALID_BRANCH_NAME_REGEX));

/// Full name of a reference as stored under the metadata root: `HEAD`, `refs/heads/master`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, new)]
pub struct SymRefName(String);

impl SymRefName {
    pub fn head() -> Self {
        Self(crate::areas::refs::HEAD_REF_NAME.to_string())
    }

    pub fn is_detached_head(&self) -> bool {
        self.0 == crate::areas::refs::HEAD_REF_NAME
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.0.starts_with(TAGS_PREFIX)
    }

    pub fn is_remote(&self) -> bool {
        self.0.starts_with(REMOTES_PREFIX)
    }

    pub fn as_ref_path(&self) -> &str {
        &self.0
    }

    /// Name without its namespace, `refs/heads/topic` gives `topic`
    pub fn short_name(&self) -> &str {
        [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX]
            .iter()
            .find_map(|prefix| self.0.strip_prefix(prefix))
            .unwrap_or(&self.0)
    }
}

impl AsRef<str> for SymRefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SymRefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check a ref name component against git's `check-ref-format` rules
fn validate_ref_name(kind: &str, name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        anyhow::bail!("{kind} name cannot be empty");
    }

    let re = INVALID_NAME
        .as_ref()
        .map_err(Clone::clone)
        .with_context(|| format!("invalid ref name regex: {INVALID_BRANCH_NAME_REGEX}"))?;

    if re.is_match(name) || name.starts_with('-') || name == "HEAD" || name == "@" {
        anyhow::bail!("'{name}' is not a valid {kind} name");
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        validate_ref_name("branch", &name)?;
        Ok(Self(name))
    }

    pub fn try_parse_sym_ref_name(sym_ref_name: &SymRefName) -> anyhow::Result<Self> {
        let name = sym_ref_name.0.strip_prefix(HEADS_PREFIX).with_context(|| {
            format!(
                "symbolic ref name must start with '{}', got '{}'",
                HEADS_PREFIX, sym_ref_name.0
            )
        })?;

        Self::try_parse(name.to_string())
    }

    pub fn to_sym_ref_name(&self) -> SymRefName {
        SymRefName(format!("{HEADS_PREFIX}{}", self.0))
    }

    pub fn is_default_branch(&self) -> bool {
        self.0 == "master" || self.0 == "main"
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagName(String);

impl TagName {
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        validate_ref_name("tag", &name)?;
        Ok(Self(name))
    }

    pub fn to_sym_ref_name(&self) -> SymRefName {
        SymRefName(format!("{TAGS_PREFIX}{}", self.0))
    }
}

impl AsRef<str> for TagName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a configured remote, the `origin` of `refs/remotes/origin/master`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteName(String);

impl RemoteName {
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        validate_ref_name("remote", &name)?;
        Ok(Self(name))
    }

    /// Namespace holding the remote-tracking branches, with its trailing slash
    pub fn tracking_prefix(&self) -> String {
        format!("{REMOTES_PREFIX}{}/", self.0)
    }

    /// Refspec `remote add` records: every branch into the tracking namespace
    pub fn default_fetch_refspec(&self) -> String {
        format!("+{HEADS_PREFIX}*:{}*", self.tracking_prefix())
    }
}

impl AsRef<str> for RemoteName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::proptest;
    use rstest::rstest;

    proptest! {
        #[test]
        fn test_is_valid_branch_name_with_valid_branch_name(
            branch_name in "[a-zA-Z0-9_][a-zA-Z0-9_-]*"
        ) {
            assert!(BranchName::try_parse(branch_name).is_ok());
        }

        #[test]
        fn test_is_valid_branch_name_with_slashes(
            prefix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*",
            suffix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*"
        ) {
            let branch_name = format!("{}/{}", prefix, suffix);
            assert!(BranchName::try_parse(branch_name).is_ok());
        }

        #[test]
        fn test_is_invalid_branch_name_starting_with_dot(
            suffix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*"
        ) {
            let branch_name = format!(".{}", suffix);
            assert!(BranchName::try_parse(branch_name).is_err());
        }

        #[test]
        fn test_is_invalid_branch_name_ending_with_lock(
            prefix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*"
        ) {
            let branch_name = format!("{}.lock", prefix);
            assert!(BranchName::try_parse(branch_name).is_err());
        }

        #[test]
        fn test_is_invalid_branch_name_with_consecutive_dots(
            prefix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*",
            suffix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*"
        ) {
            let branch_name = format!("{}..{}", prefix, suffix);
            assert!(BranchName::try_parse(branch_name).is_err());
        }

        #[test]
        fn test_is_invalid_branch_name_with_slash_dot(
            prefix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*",
            suffix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*"
        ) {
            let branch_name = format!("{}/.{}", prefix, suffix);
            assert!(BranchName::try_parse(branch_name).is_err());
        }

        #[test]
        fn test_is_invalid_branch_name_starting_with_slash(
            suffix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*"
        ) {
            let branch_name = format!("/{}", suffix);
            assert!(BranchName::try_parse(branch_name).is_err());
        }

        #[test]
        fn test_is_invalid_branch_name_ending_with_slash(
            prefix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*"
        ) {
            let branch_name = format!("{}/", prefix);
            assert!(BranchName::try_parse(branch_name).is_err());
        }

        #[test]
        fn test_is_invalid_tag_name_with_reflog_syntax(
            prefix in "[a-zA-Z0-9_][a-zA-Z0-9_-]*"
        ) {
            let tag_name = format!("{}@{{1}}", prefix);
            assert!(TagName::try_parse(tag_name).is_err());
        }
    }

    #[rstest]
    #[case("refs/heads/feature/x", "feature/x")]
    #[case("refs/tags/v1.0.0", "v1.0.0")]
    #[case("refs/remotes/origin/master", "origin/master")]
    #[case("HEAD", "HEAD")]
    fn short_names_drop_the_namespace(#[case] full: &str, #[case] short: &str) {
        assert_eq!(SymRefName::new(full.to_string()).short_name(), short);
    }

    #[test]
    fn branch_names_map_to_heads_namespace() {
        let branch = BranchName::try_parse("topic".to_string()).unwrap();

        assert_eq!(branch.to_sym_ref_name().as_ref(), "refs/heads/topic");
        assert_eq!(
            BranchName::try_parse_sym_ref_name(&branch.to_sym_ref_name()).unwrap(),
            branch
        );
        assert!(BranchName::try_parse("HEAD".to_string()).is_err());
    }

    #[test]
    fn remote_names_own_a_tracking_namespace() {
        let remote = RemoteName::try_parse("upstream".to_string()).unwrap();

        assert_eq!(remote.tracking_prefix(), "refs/remotes/upstream/");
        assert_eq!(
            remote.default_fetch_refspec(),
            "+refs/heads/*:refs/remotes/upstream/*"
        );
        assert!(RemoteName::try_parse("bad name".to_string()).is_err());
    }
}
