use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::SymRefName;
use crate::artifacts::branch::revision::Revision;
use crate::errors::RepositoryError;

impl Repository {
    /// `update-ref <ref> <new> [<old>]` and `update-ref -d <ref>`.
    ///
    /// With `<old>` the update is a compare-and-swap against the current value.
    pub fn update_ref(
        &mut self,
        name: &str,
        new_value: Option<&str>,
        old_value: Option<&str>,
        delete: bool,
    ) -> anyhow::Result<()> {
        let name = SymRefName::new(name.to_string());

        if delete {
            self.refs().delete(&name)?;
            return Ok(());
        }

        let new_value = new_value.ok_or_else(|| {
            RepositoryError::Usage("update-ref: missing new value".to_string())
        })?;
        let new_oid = Revision::try_parse(new_value)?.resolve_object(self)?;

        match old_value {
            Some(old_value) => {
                let old_oid = Revision::try_parse(old_value)?.resolve_object(self)?;
                self.refs().update(&name, Some(&old_oid), &new_oid)
            }
            None => self.refs().force_update(&name, &new_oid),
        }
    }
}
