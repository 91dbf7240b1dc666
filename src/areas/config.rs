//! Repository configuration (`.git/config`)
//!
//! The file uses git's INI dialect:
//!
//! ```text
//! # comment
//! [core]
//!     bare = false
//! [remote "origin"]
//!     url = "https://example.com/repo.git" ; trailing comment
//! ```
//!
//! Section and key names are case-insensitive, subsection names are not. Lines the parser does
//! not modify are written back untouched, so comments and layout survive `config <key> <value>`.

use anyhow::Context;
use std::fs::OpenOptions;
use std::io::Write;
use std::ops::DerefMut;
use std::path::Path;
use tracing::debug;

/// A dotted key split into its parts, `remote.origin.url` -> (`remote`, `origin`, `url`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigKey {
    section: String,
    subsection: Option<String>,
    name: String,
}

impl ConfigKey {
    pub fn try_parse(key: &str) -> anyhow::Result<Self> {
        let (head, name) = key
            .rsplit_once('.')
            .with_context(|| format!("key does not contain a section: {key}"))?;
        let (section, subsection) = match head.split_once('.') {
            Some((section, subsection)) => (section, Some(subsection.to_string())),
            None => (head, None),
        };

        if section.is_empty() || name.is_empty() {
            anyhow::bail!("invalid key: {key}");
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!("invalid key: {key}");
        }

        Ok(ConfigKey {
            section: section.to_ascii_lowercase(),
            subsection,
            name: name.to_ascii_lowercase(),
        })
    }

    fn matches_section(&self, section: &str, subsection: Option<&str>) -> bool {
        self.section == section && self.subsection.as_deref() == subsection
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subsection {
            Some(subsection) => write!(f, "{}.{}.{}", self.section, subsection, self.name),
            None => write!(f, "{}.{}", self.section, self.name),
        }
    }
}

#[derive(Debug, Clone)]
enum ConfigLine {
    Section {
        section: String,
        subsection: Option<String>,
        raw: String,
    },
    Entry {
        key: ConfigKey,
        /// `None` for a bare boolean key (`[core] bare`)
        value: Option<String>,
        raw: String,
    },
    /// Blank lines, comments and anything unparseable, kept verbatim
    Other(String),
}

impl ConfigLine {
    fn raw(&self) -> &str {
        match self {
            ConfigLine::Section { raw, .. }
            | ConfigLine::Entry { raw, .. }
            | ConfigLine::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    path: Box<Path>,
    lines: Vec<ConfigLine>,
}

impl Config {
    /// Read the configuration file; a missing file is an empty configuration
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("unable to read {}", path.display()));
            }
        };

        Ok(Config {
            path: path.into(),
            lines: parse(&content)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last value wins, like git
    pub fn get(&self, key: &str) -> Option<String> {
        let key = ConfigKey::try_parse(key).ok()?;
        self.lines.iter().rev().find_map(|line| match line {
            ConfigLine::Entry {
                key: entry_key,
                value,
                ..
            } if *entry_key == key => Some(value.clone().unwrap_or_else(|| "true".to_string())),
            _ => None,
        })
    }

    pub fn get_bool(&self, key: &str) -> anyhow::Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => parse_bool(&value)
                .map(Some)
                .with_context(|| format!("bad boolean config value '{value}' for '{key}'")),
        }
    }

    /// Every value of a multi-valued key, in file order
    pub fn get_all(&self, key: &str) -> Vec<String> {
        let Ok(key) = ConfigKey::try_parse(key) else {
            return Vec::new();
        };
        self.lines
            .iter()
            .filter_map(|line| match line {
                ConfigLine::Entry {
                    key: entry_key,
                    value,
                    ..
                } if *entry_key == key => {
                    Some(value.clone().unwrap_or_else(|| "true".to_string()))
                }
                _ => None,
            })
            .collect()
    }

    /// Distinct subsection names of `section`, in order of first appearance
    pub fn subsections(&self, section: &str) -> Vec<String> {
        let section = section.to_ascii_lowercase();
        let mut names: Vec<String> = Vec::new();
        for line in &self.lines {
            if let ConfigLine::Section {
                section: line_section,
                subsection: Some(subsection),
                ..
            } = line
                && *line_section == section
                && !names.contains(subsection)
            {
                names.push(subsection.clone());
            }
        }

        names
    }

    pub fn has_section(&self, section: &str, subsection: Option<&str>) -> bool {
        let section = section.to_ascii_lowercase();
        self.lines.iter().any(|line| {
            matches!(line, ConfigLine::Section { section: s, subsection: sub, .. }
                if *s == section && sub.as_deref() == subsection)
        })
    }

    /// Drop every header of the section together with the lines under it
    pub fn remove_section(&mut self, section: &str, subsection: Option<&str>) -> bool {
        let section = section.to_ascii_lowercase();
        let before = self.lines.len();
        let mut inside = false;
        self.lines.retain(|line| {
            if let ConfigLine::Section {
                section: s,
                subsection: sub,
                ..
            } = line
            {
                inside = *s == section && sub.as_deref() == subsection;
            }
            !inside
        });

        self.lines.len() != before
    }

    /// Rename a subsection, keeping the entries and comments under it
    pub fn rename_section(&mut self, section: &str, from: &str, to: &str) -> bool {
        let section = section.to_ascii_lowercase();
        let mut inside = false;
        let mut renamed = false;
        for line in self.lines.iter_mut() {
            match line {
                ConfigLine::Section {
                    section: s,
                    subsection,
                    raw,
                } => {
                    inside = *s == section && subsection.as_deref() == Some(from);
                    if inside {
                        *subsection = Some(to.to_string());
                        *raw = format!("[{section} \"{to}\"]");
                        renamed = true;
                    }
                }
                ConfigLine::Entry { key, .. } if inside => {
                    key.subsection = Some(to.to_string());
                }
                _ => {}
            }
        }

        renamed
    }

    /// Every `key=value` pair in file order, as `config --list` prints them
    pub fn entries(&self) -> Vec<(String, String)> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                ConfigLine::Entry { key, value, .. } => Some((
                    key.to_string(),
                    value.clone().unwrap_or_else(|| "true".to_string()),
                )),
                _ => None,
            })
            .collect()
    }

    /// Set `key`, replacing its last occurrence or appending it to (a new) section
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let key = ConfigKey::try_parse(key)?;
        let raw = format!("\t{} = {}", key.name, quote_value(value));
        let entry = ConfigLine::Entry {
            key: key.clone(),
            value: Some(value.to_string()),
            raw,
        };

        let existing = self.lines.iter().rposition(|line| match line {
            ConfigLine::Entry { key: entry_key, .. } => *entry_key == key,
            _ => false,
        });
        if let Some(index) = existing {
            self.lines[index] = entry;
            return Ok(());
        }
        self.push_entry(key, entry);

        Ok(())
    }

    /// Append another value for `key`, keeping the ones already there
    pub fn add(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let key = ConfigKey::try_parse(key)?;
        let raw = format!("\t{} = {}", key.name, quote_value(value));
        let entry = ConfigLine::Entry {
            key: key.clone(),
            value: Some(value.to_string()),
            raw,
        };
        self.push_entry(key, entry);

        Ok(())
    }

    fn push_entry(&mut self, key: ConfigKey, entry: ConfigLine) {
        let section_end = self.section_end(&key);
        match section_end {
            Some(index) => self.lines.insert(index, entry),
            None => {
                let raw = match &key.subsection {
                    Some(subsection) => format!("[{} \"{}\"]", key.section, subsection),
                    None => format!("[{}]", key.section),
                };
                self.lines.push(ConfigLine::Section {
                    section: key.section.clone(),
                    subsection: key.subsection.clone(),
                    raw,
                });
                self.lines.push(entry);
            }
        }
    }

    /// Remove every occurrence of `key`, reporting whether anything was removed
    pub fn unset(&mut self, key: &str) -> anyhow::Result<bool> {
        let key = ConfigKey::try_parse(key)?;
        let before = self.lines.len();
        self.lines.retain(|line| match line {
            ConfigLine::Entry { key: entry_key, .. } => *entry_key != key,
            _ => true,
        });

        Ok(self.lines.len() != before)
    }

    /// Write the configuration back under an exclusive lock
    pub fn save(&self) -> anyhow::Result<()> {
        let mut content = self
            .lines
            .iter()
            .map(ConfigLine::raw)
            .collect::<Vec<_>>()
            .join("\n");
        content.push('\n');

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("could not lock config file {}", self.path.display()))?;
        let mut lock = file_guard::lock(&mut file, file_guard::Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(content.as_bytes())?;
        debug!(path = %self.path.display(), "config written");

        Ok(())
    }

    /// Index just past the last line belonging to the key's section
    fn section_end(&self, key: &ConfigKey) -> Option<usize> {
        let mut end = None;
        let mut inside = false;

        for (index, line) in self.lines.iter().enumerate() {
            match line {
                ConfigLine::Section {
                    section,
                    subsection,
                    ..
                } => {
                    inside = key.matches_section(section, subsection.as_deref());
                    if inside {
                        end = Some(index + 1);
                    }
                }
                ConfigLine::Entry { .. } if inside => end = Some(index + 1),
                _ => {}
            }
        }

        end
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}

fn parse(content: &str) -> anyhow::Result<Vec<ConfigLine>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = Vec::new();
    let mut current: Option<(String, Option<String>)> = None;

    for (number, raw) in content.lines().enumerate() {
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            lines.push(ConfigLine::Other(raw.to_string()));
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('[') {
            let (section, subsection) = parse_section_header(header)
                .with_context(|| format!("bad config line {} in {}", number + 1, raw))?;
            current = Some((section.clone(), subsection.clone()));
            lines.push(ConfigLine::Section {
                section,
                subsection,
                raw: raw.to_string(),
            });
            continue;
        }

        let (section, subsection) = current
            .clone()
            .with_context(|| format!("bad config line {}: key outside a section", number + 1))?;
        let (name, value) = match trimmed.split_once('=') {
            Some((name, value)) => (name.trim(), Some(parse_value(value))),
            None => (trimmed, None),
        };

        lines.push(ConfigLine::Entry {
            key: ConfigKey {
                section,
                subsection,
                name: name.to_ascii_lowercase(),
            },
            value,
            raw: raw.to_string(),
        });
    }

    Ok(lines)
}

/// `core]` or `remote "origin"]`
fn parse_section_header(header: &str) -> anyhow::Result<(String, Option<String>)> {
    let header = header
        .split_once(']')
        .map(|(inside, _)| inside)
        .context("unterminated section header")?;

    match header.split_once(char::is_whitespace) {
        Some((section, subsection)) => {
            let subsection = subsection
                .trim()
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .context("subsection name must be quoted")?
                .replace("\\\"", "\"")
                .replace("\\\\", "\\");
            Ok((section.to_ascii_lowercase(), Some(subsection)))
        }
        // legacy `[section.subsection]`
        None => match header.split_once('.') {
            Some((section, subsection)) => {
                Ok((section.to_ascii_lowercase(), Some(subsection.to_string())))
            }
            None => Ok((header.to_ascii_lowercase(), None)),
        },
    }
}

/// Unquote a value and drop its trailing comment
fn parse_value(raw: &str) -> String {
    let mut value = String::new();
    let mut pending_space = String::new();
    let mut in_quotes = false;
    let mut chars = raw.trim_start().chars();

    while let Some(c) = chars.next() {
        if !in_quotes && (c == '#' || c == ';') {
            break;
        }
        if !in_quotes && c.is_whitespace() {
            pending_space.push(c);
            continue;
        }

        value.push_str(&pending_space);
        pending_space.clear();
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(other) => value.push(other),
                None => {}
            },
            c => value.push(c),
        }
    }

    value
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['#', ';', '"']);
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t");

    match needs_quotes {
        true => format!("\"{escaped}\""),
        false => escaped,
    }
}
