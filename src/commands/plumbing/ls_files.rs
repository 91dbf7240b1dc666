use crate::areas::repository::Repository;

impl Repository {
    /// `ls-files`: tracked paths; `--stage` adds the mode, object id and stage number
    pub async fn ls_files(&mut self, stage: bool) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut last_path = None;
        for entry in index.entries() {
            if stage {
                writeln!(
                    self.writer(),
                    "{} {} {}\t{}",
                    entry.mode().as_str(),
                    entry.oid,
                    entry.stage.as_u16(),
                    entry.name.display()
                )?;
            } else if last_path != Some(&entry.name) {
                // conflicted paths have several stages but are listed once
                writeln!(self.writer(), "{}", entry.name.display())?;
            }
            last_path = Some(&entry.name);
        }

        Ok(())
    }
}
