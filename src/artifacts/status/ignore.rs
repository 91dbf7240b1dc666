//! `.gitignore` and `info/exclude` matching
//!
//! Rules are evaluated in precedence order, lowest first: `info/exclude`, then `.gitignore`
//! files from the root downwards. The last rule matching a path decides, so a deeper `!pattern`
//! can re-include what a shallower rule excluded. A path inside an excluded directory stays
//! excluded whatever later rules say about the path itself.

use crate::areas::workspace::Workspace;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::trace;

pub const IGNORE_FILE_NAME: &str = ".gitignore";

#[derive(Debug, Clone)]
struct IgnoreRule {
    /// Directory holding the ignore file, relative to the worktree root
    base: PathBuf,
    regex: regex::Regex,
    negated: bool,
    directory_only: bool,
    /// Anchored patterns match the path relative to `base`, the others only the basename
    anchored: bool,
}

impl IgnoreRule {
    fn parse(base: &Path, line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim_end_matches(['\r', '\n']);
        let line = trim_unescaped_trailing_spaces(line);

        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (negated, pattern) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line.strip_prefix('\\').unwrap_or(line)),
        };
        let (directory_only, pattern) = match pattern.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        if pattern.is_empty() {
            return Ok(None);
        }

        let anchored = pattern.contains('/');
        let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
        let regex = regex::Regex::new(&glob_to_regex(pattern))
            .with_context(|| format!("invalid ignore pattern '{line}'"))?;

        Ok(Some(Self {
            base: base.to_path_buf(),
            regex,
            negated,
            directory_only,
            anchored,
        }))
    }

    fn matches(&self, path: &Path, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }

        let Ok(relative) = path.strip_prefix(&self.base) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        match self.anchored {
            true => self.regex.is_match(&relative.to_string_lossy()),
            false => relative
                .file_name()
                .map(|name| self.regex.is_match(&name.to_string_lossy()))
                .unwrap_or(false),
        }
    }
}

fn trim_unescaped_trailing_spaces(line: &str) -> &str {
    let trimmed = line.trim_end_matches(' ');
    if trimmed.ends_with('\\') && trimmed.len() < line.len() {
        &line[..trimmed.len() + 1]
    } else {
        trimmed
    }
}

/// Translate a gitignore glob into an anchored regex over `/`-separated paths
fn glob_to_regex(pattern: &str) -> String {
    let chars = pattern.chars().collect::<Vec<_>>();
    let mut regex = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_start = i == 0 || chars[i - 1] == '/';
                let before_slash = chars.get(i + 2) == Some(&'/');
                let at_end = i + 2 == chars.len();

                if at_start && before_slash {
                    regex.push_str("(?:.*/)?");
                    i += 3;
                } else if at_start && at_end {
                    regex.push_str(".*");
                    i += 2;
                } else {
                    regex.push_str("[^/]*");
                    i += 2;
                }
            }
            '*' => {
                regex.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex.push_str("[^/]");
                i += 1;
            }
            '[' => match chars[i + 1..].iter().position(|&c| c == ']') {
                Some(offset) if offset > 0 => {
                    let class = chars[i + 1..i + 1 + offset].iter().collect::<String>();
                    let class = match class.strip_prefix('!') {
                        Some(rest) => format!("^{rest}"),
                        None => class,
                    };
                    regex.push('[');
                    regex.push_str(&class.replace('\\', "\\\\"));
                    regex.push(']');
                    i += offset + 2;
                }
                _ => {
                    regex.push_str("\\[");
                    i += 1;
                }
            },
            '\\' if i + 1 < chars.len() => {
                regex.push_str(&regex::escape(&chars[i + 1].to_string()));
                i += 2;
            }
            c => {
                regex.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    regex.push('$');
    regex
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    /// Parse the lines of one ignore file whose directory is `base`
    pub fn add_source(&mut self, base: &Path, content: &str) -> anyhow::Result<()> {
        for line in content.lines() {
            if let Some(rule) = IgnoreRule::parse(base, line)? {
                self.rules.push(rule);
            }
        }

        Ok(())
    }

    /// Load `info/exclude` from `git_dir` and every `.gitignore` of the worktree
    pub fn load(workspace: &Workspace, git_dir: &Path) -> anyhow::Result<Self> {
        let mut rules = Self::default();

        let exclude_path = git_dir.join("info").join("exclude");
        if exclude_path.is_file() {
            let content = std::fs::read_to_string(&exclude_path)
                .with_context(|| format!("Unable to read {}", exclude_path.display()))?;
            rules.add_source(Path::new(""), &content)?;
        }

        // shallower files first so deeper rules take precedence
        let mut ignore_files = workspace
            .list_files(None)?
            .into_iter()
            .filter(|path| path.file_name().is_some_and(|name| name == IGNORE_FILE_NAME))
            .collect::<Vec<_>>();
        ignore_files.sort_by_key(|path| path.components().count());

        for ignore_file in ignore_files {
            let base = ignore_file.parent().unwrap_or(Path::new("")).to_path_buf();
            let content = String::from_utf8_lossy(&workspace.read_file(&ignore_file)?).into_owned();
            rules.add_source(&base, &content)?;
        }
        trace!(count = rules.rules.len(), "loaded ignore rules");

        Ok(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `path` (relative to the worktree root) is excluded
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let ancestors = path
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect::<Vec<_>>();

        if ancestors
            .iter()
            .rev()
            .any(|dir| self.matches_single(dir, true))
        {
            return true;
        }

        self.matches_single(path, is_dir)
    }

    fn matches_single(&self, path: &Path, is_dir: bool) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(path, is_dir))
            .map(|rule| !rule.negated)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rules(content: &str) -> IgnoreRules {
        let mut rules = IgnoreRules::default();
        rules.add_source(Path::new(""), content).unwrap();
        rules
    }

    #[rstest]
    #[case("*.log", "debug.log", false, true)]
    #[case("*.log", "nested/dir/debug.log", false, true)]
    #[case("*.log", "debug.txt", false, false)]
    #[case("build/", "build", true, true)]
    #[case("build/", "build", false, false)]
    #[case("build/", "build/out.o", false, true)]
    #[case("/root.txt", "root.txt", false, true)]
    #[case("/root.txt", "sub/root.txt", false, false)]
    #[case("doc/*.txt", "doc/notes.txt", false, true)]
    #[case("doc/*.txt", "doc/deep/notes.txt", false, false)]
    #[case("**/logs", "a/b/logs", true, true)]
    #[case("a/**/z", "a/b/c/z", false, true)]
    #[case("a/**/z", "a/z", false, true)]
    #[case("file?.txt", "file1.txt", false, true)]
    #[case("file[0-9].txt", "file7.txt", false, true)]
    #[case("file[!0-9].txt", "file7.txt", false, false)]
    #[case("# comment", "# comment", false, false)]
    fn patterns_follow_gitignore_semantics(
        #[case] pattern: &str,
        #[case] path: &str,
        #[case] is_dir: bool,
        #[case] ignored: bool,
    ) {
        assert_eq!(rules(pattern).is_ignored(Path::new(path), is_dir), ignored);
    }

    #[test]
    fn negation_re_includes_files_and_last_rule_wins() {
        let rules = rules("*.log\n!keep.log\n");

        assert!(rules.is_ignored(Path::new("drop.log"), false));
        assert!(!rules.is_ignored(Path::new("keep.log"), false));
    }

    #[test]
    fn nested_ignore_files_are_scoped_to_their_directory() {
        let mut rules = IgnoreRules::default();
        rules.add_source(Path::new(""), "*.tmp\n").unwrap();
        rules.add_source(Path::new("src"), "gen.rs\n!keep.tmp\n").unwrap();

        assert!(rules.is_ignored(Path::new("src/gen.rs"), false));
        assert!(!rules.is_ignored(Path::new("gen.rs"), false));
        assert!(!rules.is_ignored(Path::new("src/keep.tmp"), false));
        assert!(rules.is_ignored(Path::new("other/keep.tmp"), false));
    }
}
