use crate::CommitDecoration;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::SymRefName;
use crate::artifacts::objects::object_id::ObjectId;
use colored::Colorize;
use std::collections::HashMap;

/// Ref names pointing at each commit, as shown next to commits by `log`
#[derive(Debug, Clone, Default)]
pub struct Decorations {
    refs: HashMap<ObjectId, Vec<SymRefName>>,
    /// `refs/heads/<branch>` when HEAD is attached, `HEAD` otherwise
    current_ref: SymRefName,
}

impl Decorations {
    pub fn new(refs: HashMap<ObjectId, Vec<SymRefName>>, current_ref: SymRefName) -> Self {
        Decorations { refs, current_ref }
    }

    /// Snapshot every ref of the repository, annotated tags peeled to their commit
    pub fn load(repository: &Repository) -> anyhow::Result<Self> {
        let database = repository.database();
        let refs = repository.refs().reverse_refs(|oid| {
            Ok(database.peel_to_commit(oid)?.unwrap_or_else(|| oid.clone()))
        })?;

        Ok(Self::new(refs, repository.refs().current_ref()?))
    }

    fn label(name: &SymRefName, style: CommitDecoration) -> String {
        let name_text = match style {
            CommitDecoration::Full => name.as_ref_path(),
            _ => name.short_name(),
        };

        if name.is_tag() {
            format!("tag: {name_text}").bold().yellow().to_string()
        } else if name.is_remote() {
            name_text.bold().red().to_string()
        } else if name.is_detached_head() {
            name_text.bold().cyan().to_string()
        } else {
            name_text.bold().green().to_string()
        }
    }

    /// Labels for `oid`: HEAD (with the branch it is attached to) first, then the remaining
    /// refs, tags before remote-tracking refs before local branches
    pub fn labels(&self, oid: &ObjectId, style: CommitDecoration) -> Vec<String> {
        if style == CommitDecoration::None {
            return Vec::new();
        }
        let Some(names) = self.refs.get(oid) else {
            return Vec::new();
        };

        let mut labels = Vec::with_capacity(names.len());
        let head_here = names.iter().any(SymRefName::is_detached_head);
        let attached_here = head_here
            && !self.current_ref.is_detached_head()
            && names.contains(&self.current_ref);

        if attached_here {
            labels.push(format!(
                "{} {}",
                "HEAD ->".bold().cyan(),
                Self::label(&self.current_ref, style)
            ));
        } else if head_here {
            labels.push(Self::label(&SymRefName::head(), style));
        }

        let mut rest = names
            .iter()
            .filter(|name| !name.is_detached_head())
            .filter(|name| !(attached_here && **name == self.current_ref))
            .collect::<Vec<_>>();
        rest.sort();
        labels.extend(rest.into_iter().rev().map(|name| Self::label(name, style)));

        labels
    }

    /// ` (name, name)` or nothing
    pub fn render(&self, oid: &ObjectId, style: CommitDecoration) -> String {
        let labels = self.labels(oid, style);
        if labels.is_empty() {
            return String::new();
        }

        format!(
            " {}{}{}",
            "(".yellow(),
            labels.join(&", ".yellow().to_string()),
            ")".yellow()
        )
    }
}
