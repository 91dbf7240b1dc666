use crate::areas::repository::Repository;
use crate::artifacts::operation::state::OperationState;
use crate::artifacts::status::file_change::{IndexChangeType, long_line};
use crate::artifacts::status::status_info::StatusInfo;
use colored::Colorize;

/// Layout of `status` output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StatusFormat {
    #[default]
    Long,
    Short,
    /// Short format without colour, stable for scripts
    Porcelain,
}

impl Repository {
    pub async fn status_command(
        &mut self,
        format: StatusFormat,
        branch: bool,
    ) -> anyhow::Result<()> {
        self.require_worktree()?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let info = self.status().initialize(&mut index).await?;
        // stat refreshes found while scanning are kept
        index.write_updates()?;

        match format {
            StatusFormat::Long => self.print_long_status(&info)?,
            StatusFormat::Short | StatusFormat::Porcelain => {
                if branch {
                    let header = self.short_branch_header()?;
                    writeln!(self.writer(), "{header}")?;
                }
                self.print_short_status(&info, format == StatusFormat::Porcelain)?;
            }
        }

        Ok(())
    }

    fn short_branch_header(&self) -> anyhow::Result<String> {
        let branch = self.refs().current_branch()?;
        let head = self.refs().read_head()?;

        Ok(match (branch, head) {
            (Some(branch), Some(_)) => format!("## {}", branch.to_string().green()),
            (Some(branch), None) => format!("## No commits yet on {}", branch.to_string().green()),
            (None, _) => format!("## {}", "HEAD (no branch)".red()),
        })
    }

    fn print_short_status(&self, info: &StatusInfo, porcelain: bool) -> anyhow::Result<()> {
        let (untracked, tracked): (Vec<_>, Vec<_>) =
            info.classify().into_iter().partition(|status| status.untracked);

        for status in tracked.iter().chain(&untracked) {
            let line = match porcelain {
                true => format!("{} {}", status.short_code(), status.short_path()),
                false => status.short_line(),
            };
            writeln!(self.writer(), "{line}")?;
        }

        Ok(())
    }

    fn print_long_status(&self, info: &StatusInfo) -> anyhow::Result<()> {
        let head = self.refs().read_head()?;
        match self.refs().current_branch()? {
            Some(branch) => writeln!(self.writer(), "On branch {branch}")?,
            None => {
                let at = head
                    .as_ref()
                    .map(|oid| oid.to_short_oid())
                    .unwrap_or_default();
                writeln!(self.writer(), "{} {at}", "HEAD detached at".red())?;
            }
        }

        self.print_operation_notice(info)?;

        if head.is_none() {
            writeln!(self.writer(), "\nNo commits yet")?;
        }

        if !info.staged.is_empty() {
            writeln!(self.writer(), "\nChanges to be committed:")?;
            writeln!(
                self.writer(),
                "  (use \"twig reset HEAD <file>...\" to unstage)"
            )?;
            for (path, change) in &info.staged {
                let shown = match change {
                    IndexChangeType::Renamed { from } => {
                        format!("{} -> {}", from.display(), path.display())
                    }
                    _ => path.display().to_string(),
                };
                writeln!(self.writer(), "{}", long_line(change.label(), &shown, true))?;
            }
        }

        if !info.conflicts.is_empty() {
            writeln!(self.writer(), "\nUnmerged paths:")?;
            writeln!(
                self.writer(),
                "  (use \"twig add <file>...\" to mark resolution)"
            )?;
            for (path, kind) in &info.conflicts {
                let line = long_line(kind.label(), &path.display().to_string(), false);
                writeln!(self.writer(), "{line}")?;
            }
        }

        if !info.unstaged.is_empty() {
            writeln!(self.writer(), "\nChanges not staged for commit:")?;
            writeln!(
                self.writer(),
                "  (use \"twig add <file>...\" to update what will be committed)"
            )?;
            for (path, change) in &info.unstaged {
                let line = long_line(change.label(), &path.display().to_string(), false);
                writeln!(self.writer(), "{line}")?;
            }
        }

        if !info.untracked.is_empty() {
            writeln!(self.writer(), "\nUntracked files:")?;
            writeln!(
                self.writer(),
                "  (use \"twig add <file>...\" to include in what will be committed)"
            )?;
            for path in &info.untracked {
                writeln!(self.writer(), "{}", long_line("", &path.display().to_string(), false))?;
            }
        }

        writeln!(self.writer())?;
        if info.has_staged_changes() {
            return Ok(());
        }

        let summary = match (info.unstaged.is_empty(), info.untracked.is_empty()) {
            (false, _) => "no changes added to commit (use \"twig add\")",
            (true, false) => {
                "nothing added to commit but untracked files present (use \"twig add\" to track)"
            }
            (true, true) if head.is_none() => {
                "nothing to commit (create/copy files and use \"twig add\" to track)"
            }
            (true, true) if !info.conflicts.is_empty() => "",
            (true, true) => "nothing to commit, working tree clean",
        };
        if !summary.is_empty() {
            writeln!(self.writer(), "{summary}")?;
        }

        Ok(())
    }

    fn print_operation_notice(&self, info: &StatusInfo) -> anyhow::Result<()> {
        match self.operations().load()? {
            OperationState::Idle => {}
            OperationState::Merge(_) if info.conflicts.is_empty() => {
                writeln!(
                    self.writer(),
                    "\nAll conflicts fixed but you are still merging.\
                     \n  (use \"twig commit\" to conclude merge)"
                )?;
            }
            OperationState::Merge(_) => {
                writeln!(
                    self.writer(),
                    "\nYou have unmerged paths.\
                     \n  (fix conflicts and run \"twig commit\")\
                     \n  (use \"twig merge --abort\" to abort the merge)"
                )?;
            }
            OperationState::Rebase(rebase) => {
                let branch = rebase
                    .head_name
                    .as_deref()
                    .map(|name| name.trim_start_matches("refs/heads/").to_string())
                    .unwrap_or_else(|| "HEAD".to_string());
                writeln!(
                    self.writer(),
                    "\nYou are currently rebasing branch '{branch}' on '{}'.",
                    rebase.onto.to_short_oid()
                )?;
                let hint = match info.conflicts.is_empty() {
                    true => "  (all conflicts fixed: run \"twig rebase --continue\")",
                    false => {
                        "  (fix conflicts and then run \"twig rebase --continue\")\
                         \n  (use \"twig rebase --skip\" to skip this patch)\
                         \n  (use \"twig rebase --abort\" to check out the original branch)"
                    }
                };
                writeln!(self.writer(), "{hint}")?;
            }
        }

        Ok(())
    }
}
