use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{TAGS_PREFIX, TagName};
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::commit::IdentityRole;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::object_type::ObjectType;
use crate::commands::plumbing::write_commit::normalize_message;
use crate::errors::RepositoryError;
use tracing::info;

/// Width tag names are padded to when `-n` shows annotations
const ANNOTATION_COLUMN: usize = 15;

impl Repository {
    /// Create a tag at `target` (HEAD by default); annotated when a message is given
    pub fn tag(
        &mut self,
        name: &str,
        target: Option<&str>,
        message: Option<&str>,
        force: bool,
    ) -> anyhow::Result<()> {
        let tag_name = TagName::try_parse(name.to_string())?;
        let target = target.unwrap_or("HEAD");
        let target_oid = Revision::try_parse(target)?.resolve_object(self)?;

        let ref_oid = match message {
            Some(message) => {
                let tagger = self.identity(IdentityRole::Committer)?;
                let target_type = self.database().get_object_type(&target_oid)?;
                let tag = Tag::new(
                    target_oid.clone(),
                    target_type,
                    tag_name.to_string(),
                    Some(tagger),
                    normalize_message(message),
                );
                self.database().store(&tag)?
            }
            None => target_oid.clone(),
        };

        self.refs()
            .create(&tag_name.to_sym_ref_name(), &ref_oid, force)
            .map_err(|err| match err.downcast_ref::<RepositoryError>() {
                Some(RepositoryError::RefExists(_)) => {
                    anyhow::anyhow!("tag '{tag_name}' already exists")
                }
                _ => err,
            })?;
        info!(tag = %tag_name, oid = %ref_oid, annotated = message.is_some(), "tag created");

        Ok(())
    }

    /// `tag [-l] [-n<lines>]`: tag names in order, optionally with their annotations
    pub fn list_tags(&mut self, annotation_lines: Option<usize>) -> anyhow::Result<()> {
        for tag in self.refs().list(TAGS_PREFIX)? {
            let name = tag.short_name().to_string();
            let Some(lines) = annotation_lines else {
                writeln!(self.writer(), "{name}")?;
                continue;
            };

            let oid = self.refs().resolve(&tag)?;
            let message = match self.database().get_object_type(&oid)? {
                ObjectType::Tag => self
                    .database()
                    .parse_object_as_tag(&oid)?
                    .map(|tag| tag.message().to_string()),
                ObjectType::Commit => self
                    .database()
                    .parse_object_as_commit(&oid)?
                    .map(|commit| commit.message().to_string()),
                _ => None,
            }
            .unwrap_or_default();

            let mut message_lines = message.lines().filter(|line| !line.trim().is_empty());
            let first = message_lines.next().unwrap_or_default();
            writeln!(self.writer(), "{name:ANNOTATION_COLUMN$} {first}")?;
            for line in message_lines.take(lines.saturating_sub(1)) {
                writeln!(self.writer(), "{:ANNOTATION_COLUMN$}     {line}", "")?;
            }
        }

        Ok(())
    }

    /// `tag -d <names>`
    pub fn delete_tags(&mut self, names: &[String]) -> anyhow::Result<()> {
        for name in names {
            let tag_name = TagName::try_parse(name.clone())?;
            let oid = self
                .refs()
                .delete(&tag_name.to_sym_ref_name())
                .map_err(|err| match err.downcast_ref::<RepositoryError>() {
                    Some(RepositoryError::RefNotFound(_)) => {
                        anyhow::anyhow!("tag '{name}' not found.")
                    }
                    _ => err,
                })?;
            info!(tag = %name, "tag deleted");
            writeln!(
                self.writer(),
                "Deleted tag '{name}' (was {})",
                oid.to_short_oid()
            )?;
        }

        Ok(())
    }
}
