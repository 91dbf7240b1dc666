use crate::areas::repository::Repository;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use anyhow::Context;
use std::path::Path;

impl Repository {
    /// Print the blob id of a file, storing the blob with `write`.
    ///
    /// The file is read relative to the current directory, inside or outside the worktree.
    pub fn hash_object(&mut self, object_path: &str, write: bool) -> anyhow::Result<()> {
        let data = std::fs::read(Path::new(object_path))
            .with_context(|| format!("could not open '{object_path}' for reading"))?;
        let blob = Blob::from_bytes(data);
        let object_id = blob.object_id()?;

        writeln!(self.writer(), "{object_id}")?;

        if write {
            self.database().store(&blob)?;
        }

        Ok(())
    }
}
