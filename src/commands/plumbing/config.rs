use crate::areas::repository::Repository;
use crate::errors::RepositoryError;

impl Repository {
    /// `config <key>` prints a value, `config <key> <value>` sets it, `--list` prints all of
    /// them and `--unset` removes a key.
    ///
    /// Returns `false` when the key to read or unset does not exist.
    pub fn config_command(
        &mut self,
        key: Option<&str>,
        value: Option<&str>,
        list: bool,
        unset: bool,
    ) -> anyhow::Result<bool> {
        if list {
            let entries = self.config().entries();
            for (key, value) in entries {
                writeln!(self.writer(), "{key}={value}")?;
            }
            return Ok(true);
        }

        let key = key.ok_or_else(|| RepositoryError::Usage("config: key required".to_string()))?;

        if unset {
            let removed = self.config_mut().unset(key)?;
            if removed {
                self.config().save()?;
            }
            return Ok(removed);
        }

        match value {
            Some(value) => {
                self.config_mut().set(key, value)?;
                self.config().save()?;
                Ok(true)
            }
            None => {
                let value = self.config().get(key);
                match value {
                    Some(value) => {
                        writeln!(self.writer(), "{value}")?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
        }
    }
}
