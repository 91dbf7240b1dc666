use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use std::path::Path;

impl Repository {
    /// List a tree, `-r` descending into subtrees instead of printing them
    pub fn ls_tree(&mut self, tree_ish: &str, recursive: bool) -> anyhow::Result<()> {
        let oid = Revision::try_parse(tree_ish)?.resolve_object(self)?;
        let tree_oid = self.database().peel_to_tree(&oid)?;

        self.print_tree(&tree_oid, None, recursive)
    }

    fn print_tree(
        &self,
        oid: &ObjectId,
        prefix: Option<&Path>,
        recursive: bool,
    ) -> anyhow::Result<()> {
        let tree = self
            .database()
            .parse_object_as_tree(oid)?
            .with_context(|| format!("not a tree object: {oid}"))?;

        for (name, entry) in tree.into_entries() {
            let path = match prefix {
                Some(prefix) => prefix.join(name),
                None => Path::new(&name).to_path_buf(),
            };

            if entry.mode.is_tree() && recursive {
                self.print_tree(&entry.oid, Some(&path), recursive)?;
            } else {
                writeln!(
                    self.writer(),
                    "{} {} {}\t{}",
                    entry.mode.padded(),
                    entry.mode.object_type(),
                    entry.oid,
                    path.display()
                )?;
            }
        }

        Ok(())
    }
}
