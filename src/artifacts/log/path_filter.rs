use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// Restricts tree walks to a set of paths
///
/// A filter path selects itself and, when it names a directory, everything below it. The
/// empty filter selects everything.
#[derive(Debug, Clone)]
pub struct PathFilter {
    path_trie: Trie<String>,
    root_path: PathBuf,
}

impl PathFilter {
    pub fn empty() -> Self {
        Self {
            path_trie: Trie::with_matching(true),
            root_path: PathBuf::new(),
        }
    }

    pub fn new(paths: Vec<PathBuf>) -> Self {
        if paths.is_empty() {
            return Self::empty();
        }

        let mut trie = Trie::new();
        for path in paths {
            let components: Vec<String> = path
                .components()
                .filter(|comp| !matches!(comp, std::path::Component::CurDir))
                .map(|comp| comp.as_os_str().to_string_lossy().to_string())
                .collect();
            trie.insert(&components);
        }

        Self {
            path_trie: trie,
            root_path: PathBuf::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root_path
    }

    pub fn is_unrestricted(&self) -> bool {
        self.path_trie.is_matching
    }

    /// Whether a full path (relative to the filter root) is selected
    pub fn matches(&self, path: &Path) -> bool {
        let mut node = &self.path_trie;
        for component in path.components() {
            if node.is_matching {
                return true;
            }
            match node
                .children
                .get(component.as_os_str().to_string_lossy().as_ref())
            {
                Some(child) => node = child,
                None => return false,
            }
        }

        node.is_matching
    }

    /// Keep the entries of one directory level that may contain selected paths
    pub fn filter_matching_entries<'e, Entry: 'e>(
        &self,
        entries: impl Iterator<Item = (&'e String, &'e Entry)>,
    ) -> impl Iterator<Item = (&'e String, &'e Entry)> {
        entries.filter(move |(path_str, _)| self.path_trie.contains_single(path_str))
    }

    /// Narrow the filter to the subtree named `path_part`
    pub fn into_subpath_filter(self, path_part: &String) -> Self {
        Self {
            path_trie: if self.path_trie.is_matching {
                self.path_trie
            } else {
                self.path_trie
                    .children
                    .get(path_part)
                    .cloned()
                    .unwrap_or_else(Trie::new)
            },
            root_path: self.root_path.join(path_part),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trie<T: Hash + Eq + Clone> {
    is_matching: bool,
    children: HashMap<T, Trie<T>>,
}

impl<T: Hash + Eq + Clone> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Clone> Trie<T> {
    pub fn new() -> Self {
        Trie {
            is_matching: false,
            children: HashMap::new(),
        }
    }

    pub fn with_matching(is_matching: bool) -> Self {
        Trie {
            is_matching,
            children: HashMap::new(),
        }
    }

    pub fn insert(&mut self, path: &[T]) {
        let mut node = self;
        for part in path {
            node = node.children.entry(part.clone()).or_insert_with(Trie::new);
        }
        node.is_matching = true;
    }

    pub fn contains(&self, path: &[T]) -> bool {
        let mut node = self;
        for part in path {
            match node.children.get(part) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.is_matching
    }

    pub fn contains_single(&self, path_part: &T) -> bool {
        if self.is_matching {
            return true;
        }

        self.children.contains_key(path_part)
    }
}
