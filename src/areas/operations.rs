//! Persisted operation state (`<git dir>/OPERATION`)
//!
//! The file holds the TOML form of `OperationState`. A missing file is `Idle`, and saving
//! `Idle` removes it, so the file's presence doubles as the in-progress marker.

use crate::artifacts::operation::state::OperationState;
use anyhow::Context;
use fake::rand;
use std::io::Write;
use std::path::Path;
use tracing::debug;

pub const OPERATION_FILE: &str = "OPERATION";

#[derive(Debug)]
pub struct Operations {
    path: Box<Path>,
}

impl Operations {
    pub fn new(git_dir: &Path) -> Self {
        Operations {
            path: git_dir.join(OPERATION_FILE).into_boxed_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<OperationState> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(OperationState::Idle);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("unable to read {}", self.path.display()));
            }
        };

        toml::from_str(&content)
            .with_context(|| format!("corrupt operation state in {}", self.path.display()))
    }

    pub fn save(&self, state: &OperationState) -> anyhow::Result<()> {
        if state.is_idle() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => {
                    debug!("operation state cleared");
                    Ok(())
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err)
                    .with_context(|| format!("unable to remove {}", self.path.display())),
            };
        }

        let content = toml::to_string(state).context("unable to serialize operation state")?;
        let dir = self
            .path
            .parent()
            .with_context(|| format!("invalid operation path {}", self.path.display()))?;
        let temp_path = dir.join(format!("tmp-op-{}", rand::random::<u32>()));

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("unable to open {}", temp_path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("unable to write {}", temp_path.display()))?;

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| {
                format!("unable to rename operation state to {}", self.path.display())
            })?;
        debug!(kind = state.name(), "operation state saved");

        Ok(())
    }
}
