use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use is_terminal::IsTerminal;
use minus::Pager;
use std::io::Write;
use std::path::{Path, PathBuf};
use twig::areas::repository::Repository;
use twig::artifacts::core::PagerWriter;
use twig::artifacts::diff::file_delta::{DiffOptions, OutputFormat};
use twig::artifacts::diff::hunk::{LineDiffOptions, WhitespaceMode};
use twig::artifacts::diff::tree_diff::DiffFilter;
use twig::artifacts::objects::object_id::SHORT_OID_LENGTH;
use twig::commands::plumbing::cat_file::CatFileMode;
use twig::commands::plumbing::rev_parse::RevParseOptions;
use twig::commands::porcelain::branch::BranchListing;
use twig::commands::porcelain::checkout::CheckoutOptions;
use twig::commands::porcelain::diff::diff_no_index;
use twig::commands::porcelain::log::LogOptions;
use twig::commands::porcelain::reset::ResetMode;
use twig::commands::porcelain::rm::RmOptions;
use twig::commands::porcelain::stash::parse_stash_index;
use twig::commands::porcelain::status::StatusFormat;
use twig::errors::{EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE, RepositoryError, report};
use twig::{CommitDecoration, CommitDisplayFormat, telemetry};

#[derive(Parser)]
#[command(
    name = "twig",
    version,
    about = "A git-compatible version control tool",
    long_about = "twig reads and writes git repositories: objects, refs and the index are kept \
    in git's on-disk formats, so a repository can be used by twig and git alike.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

COMMANDS:
{subcommands}

OPTIONS:
    {options}
"
)]
struct Cli {
    #[arg(long, global = true, help = "Never colour the output")]
    no_color: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Create an empty repository",
        long_about = "This command creates the repository metadata in the current directory or at \
        the specified path. Running it in an existing repository is safe."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<String>,
        #[arg(long, help = "Create a repository without a working tree")]
        bare: bool,
    },
    #[command(name = "add", about = "Add file contents to the index")]
    Add {
        #[arg(required = true, help = "Files or directories to stage")]
        paths: Vec<String>,
        #[arg(short, long, help = "Also add ignored files")]
        force: bool,
    },
    #[command(name = "rm", about = "Remove files from the working tree and from the index")]
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
        #[arg(long, help = "Only remove from the index")]
        cached: bool,
        #[arg(short = 'r', help = "Allow recursive removal of directories")]
        recursive: bool,
        #[arg(short, long, help = "Override the up-to-date check")]
        force: bool,
        #[arg(short, long, help = "Do not list removed files")]
        quiet: bool,
    },
    #[command(name = "mv", about = "Move or rename a file or a directory")]
    Mv {
        #[arg(required = true, num_args = 2.., help = "Sources followed by the destination")]
        args: Vec<String>,
        #[arg(short, long, help = "Overwrite an existing destination")]
        force: bool,
    },
    #[command(
        name = "commit",
        about = "Record the index as a new commit",
        long_about = "This command creates a new commit from the index with the specified message. \
        While a merge is pending the message may be omitted and the merge is concluded."
    )]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: Option<String>,
    },
    #[command(name = "status", about = "Show the working tree status")]
    Status {
        #[arg(short, long, help = "Give the output in the short format")]
        short: bool,
        #[arg(long, help = "Give the output in a stable, script-friendly format")]
        porcelain: bool,
        #[arg(long, help = "Give the output in the long format (default)")]
        long: bool,
        #[arg(short, long, help = "Show the branch in the short format")]
        branch: bool,
    },
    #[command(
        name = "diff",
        about = "Show changes between commits, the index and the working tree"
    )]
    Diff {
        #[command(flatten)]
        diff: DiffArgs,
        #[arg(long, visible_alias = "staged", help = "Compare the index with HEAD or a commit")]
        cached: bool,
        #[arg(
            long,
            conflicts_with = "cached",
            help = "Compare two paths outside of any repository"
        )]
        no_index: bool,
        #[arg(help = "Revisions, then paths")]
        args: Vec<String>,
        #[arg(last = true, help = "Paths to limit the diff to")]
        paths: Vec<String>,
    },
    #[command(name = "log", about = "Show commit logs")]
    Log {
        #[arg(long, help = "Shorthand for --format=oneline --abbrev-commit")]
        oneline: bool,
        #[arg(long, help = "Show abbreviated commit ids")]
        abbrev_commit: bool,
        #[arg(long, visible_alias = "pretty", value_enum, help = "The commit layout")]
        format: Option<CommitDisplayFormat>,
        #[arg(
            long,
            value_enum,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "short",
            help = "Show the refs pointing at each commit"
        )]
        decorate: Option<CommitDecoration>,
        #[arg(long, help = "Do not show refs")]
        no_decorate: bool,
        #[arg(short, long, help = "Show the patch of each commit")]
        patch: bool,
        #[arg(short = 'n', long, help = "Limit the number of commits")]
        max_count: Option<usize>,
        revisions: Vec<String>,
        #[arg(last = true)]
        paths: Vec<String>,
    },
    #[command(name = "branch", about = "List, create, or delete branches")]
    Branch {
        #[arg(help = "Branch name and start point, or the branches to delete")]
        names: Vec<String>,
        #[arg(short, long, help = "Delete fully merged branches")]
        delete: bool,
        #[arg(short = 'D', help = "Delete branches whatever their merge status")]
        force_delete: bool,
        #[arg(short, long, help = "Show the commit each branch points at")]
        verbose: bool,
        #[arg(short, long, help = "Reset an existing branch to the start point")]
        force: bool,
        #[arg(short, long, help = "List branches")]
        list: bool,
        #[arg(short, long, help = "List both remote-tracking and local branches")]
        all: bool,
        #[arg(short, long, help = "List or delete remote-tracking branches")]
        remotes: bool,
    },
    #[command(name = "checkout", about = "Switch branches or restore working tree files")]
    Checkout {
        #[arg(help = "Branch, commit or tag (the start point with -b)")]
        target: Option<String>,
        #[arg(short = 'b', help = "Create a branch and switch to it")]
        new_branch: Option<String>,
        #[arg(
            short = 'B',
            conflicts_with = "new_branch",
            help = "Create or reset a branch and switch to it"
        )]
        reset_branch: Option<String>,
        #[arg(short, long, help = "Throw away local changes")]
        force: bool,
        #[arg(last = true, help = "Files to restore")]
        paths: Vec<String>,
    },
    #[command(name = "merge", about = "Join another history into the current branch")]
    Merge {
        #[arg(required_unless_present_any = ["continue_merge", "abort"])]
        target: Option<String>,
        #[arg(short, long, help = "The merge commit message")]
        message: Option<String>,
        #[arg(long = "continue", help = "Conclude a merge once conflicts are resolved")]
        continue_merge: bool,
        #[arg(long, conflicts_with = "continue_merge", help = "Abandon the merge in progress")]
        abort: bool,
    },
    #[command(name = "merge-base", about = "Find the best common ancestor of two commits")]
    MergeBase {
        #[arg(required = true, num_args = 2)]
        commits: Vec<String>,
        #[arg(short, long, help = "Print every best common ancestor")]
        all: bool,
        #[arg(long, help = "Exit 0 when the first commit is an ancestor of the second")]
        is_ancestor: bool,
    },
    #[command(name = "rebase", about = "Reapply commits on top of another base")]
    Rebase {
        #[arg(required_unless_present_any = ["continue_rebase", "skip", "abort", "quit"])]
        upstream: Option<String>,
        branch: Option<String>,
        #[arg(long, help = "Replay onto this commit instead of the upstream")]
        onto: Option<String>,
        #[arg(long = "continue", help = "Continue after resolving a conflict")]
        continue_rebase: bool,
        #[arg(long, help = "Drop the commit that stopped the rebase")]
        skip: bool,
        #[arg(long, help = "Return to the branch as it was before the rebase")]
        abort: bool,
        #[arg(long, help = "Forget the rebase, keeping HEAD where it is")]
        quit: bool,
    },
    #[command(name = "remote", about = "Manage the set of tracked repositories")]
    Remote {
        #[command(subcommand)]
        action: Option<RemoteCommand>,
        #[arg(short, long, help = "Show the URLs after the names")]
        verbose: bool,
    },
    #[command(name = "stash", about = "Set changes in a dirty working tree aside")]
    Stash {
        #[command(subcommand)]
        action: Option<StashCommand>,
        #[arg(short, long, help = "Description of the stashed state")]
        message: Option<String>,
    },
    #[command(name = "reset", about = "Reset the current HEAD to the specified state")]
    Reset {
        #[arg(long, group = "mode", help = "Move HEAD only")]
        soft: bool,
        #[arg(long, group = "mode", help = "Also reset the index (default)")]
        mixed: bool,
        #[arg(long, group = "mode", help = "Also reset the working tree")]
        hard: bool,
        #[arg(help = "Commit, then paths")]
        args: Vec<String>,
        #[arg(last = true)]
        paths: Vec<String>,
    },
    #[command(name = "tag", about = "Create, list, or delete tags")]
    Tag {
        #[arg(help = "Tag name and target, or the tags to delete")]
        names: Vec<String>,
        #[arg(short, long, help = "Create an annotated tag with this message")]
        message: Option<String>,
        #[arg(short, long, help = "Delete tags")]
        delete: bool,
        #[arg(short, long, help = "Replace an existing tag")]
        force: bool,
        #[arg(short, long, help = "List tags")]
        list: bool,
        #[arg(
            short = 'n',
            num_args = 0..=1,
            default_missing_value = "1",
            help = "Print this many lines of each annotation"
        )]
        lines: Option<usize>,
    },
    #[command(name = "rev-list", about = "List commit objects in reverse chronological order")]
    RevList {
        #[arg(short = 'n', long, help = "Limit the number of commits")]
        max_count: Option<usize>,
        #[arg(required = true)]
        revisions: Vec<String>,
        #[arg(last = true)]
        paths: Vec<String>,
    },
    #[command(name = "rev-parse", about = "Resolve revisions and inspect the repository")]
    RevParse {
        revisions: Vec<String>,
        #[arg(long)]
        is_bare_repository: bool,
        #[arg(long)]
        git_dir: bool,
        #[arg(long)]
        show_toplevel: bool,
        #[arg(long)]
        abbrev_ref: bool,
        #[arg(long)]
        short: bool,
    },
    #[command(
        name = "cat-file",
        about = "Print the content, type or size of an object",
        long_about = "This command prints information about an object in the repository. \
        It requires the object to be specified by id or revision."
    )]
    CatFile {
        #[arg(short = 'p', group = "mode", help = "Pretty-print the content")]
        pretty: bool,
        #[arg(short = 't', group = "mode", help = "Print the object type")]
        object_type: bool,
        #[arg(short = 's', group = "mode", help = "Print the object size")]
        size: bool,
        #[arg(short = 'e', group = "mode", help = "Exit 0 when the object exists")]
        exists: bool,
        object: String,
    },
    #[command(
        name = "hash-object",
        about = "Hash a file and optionally write it to the object database",
        long_about = "This command hashes a file as a blob and can write it to the object \
        database. It requires the path to the file to be specified."
    )]
    HashObject {
        #[arg(short, long, required = false, help = "Write the object to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: String,
    },
    #[command(name = "ls-tree", about = "List the contents of a tree object")]
    LsTree {
        #[arg(short = 'r', help = "Recurse into subtrees")]
        recursive: bool,
        tree_ish: String,
    },
    #[command(name = "ls-files", about = "Show the files in the index")]
    LsFiles {
        #[arg(short, long, help = "Show mode, object id and stage")]
        stage: bool,
    },
    #[command(name = "write-tree", about = "Create a tree object from the index")]
    WriteTree,
    #[command(name = "update-ref", about = "Update the object name stored in a ref")]
    UpdateRef {
        #[arg(short, help = "Delete the ref")]
        delete: bool,
        name: String,
        new_value: Option<String>,
        old_value: Option<String>,
    },
    #[command(name = "config", about = "Get and set repository options")]
    Config {
        key: Option<String>,
        value: Option<String>,
        #[arg(short, long, help = "List every variable")]
        list: bool,
        #[arg(long, help = "Remove the variable")]
        unset: bool,
    },
}

#[derive(Subcommand)]
enum StashCommand {
    #[command(about = "Save local modifications to a new stash entry")]
    Push {
        #[arg(short, long)]
        message: Option<String>,
    },
    #[command(about = "List the stash entries")]
    List,
    #[command(about = "Show the changes recorded in a stash entry")]
    Show {
        stash: Option<String>,
        #[arg(short, long, help = "Show the patch instead of a diffstat")]
        patch: bool,
    },
    #[command(about = "Apply a stash entry on top of the working tree")]
    Apply { stash: Option<String> },
    #[command(about = "Apply a stash entry and drop it")]
    Pop { stash: Option<String> },
    #[command(about = "Remove a stash entry")]
    Drop { stash: Option<String> },
    #[command(about = "Remove every stash entry")]
    Clear,
}

#[derive(Subcommand)]
enum RemoteCommand {
    #[command(about = "Add a remote with the default fetch refspec")]
    Add { name: String, url: String },
    #[command(visible_alias = "rm", about = "Remove a remote and its remote-tracking branches")]
    Remove { name: String },
    #[command(about = "Rename a remote and its remote-tracking branches")]
    Rename { old: String, new: String },
    #[command(about = "Change the URL of a remote")]
    SetUrl {
        #[arg(long, help = "Set the push URL instead of the fetch URL")]
        push: bool,
        name: String,
        url: String,
    },
    #[command(about = "Describe the named remotes, or list them all")]
    Show {
        names: Vec<String>,
        #[arg(short, long, help = "Show the URLs after the names")]
        verbose: bool,
    },
}

#[derive(Args)]
struct DiffArgs {
    #[arg(short = 'U', long = "unified", help = "Lines of context around changes")]
    unified: Option<usize>,
    #[arg(long, help = "Show context between hunks up to this many lines apart")]
    inter_hunk_context: Option<usize>,
    #[arg(short = 'w', long, help = "Ignore whitespace when comparing lines")]
    ignore_all_space: bool,
    #[arg(short = 'b', long, help = "Ignore changes in the amount of whitespace")]
    ignore_space_change: bool,
    #[arg(long, help = "Ignore whitespace at the end of lines")]
    ignore_space_at_eol: bool,
    #[arg(short = 'a', long, help = "Treat every file as text")]
    text: bool,
    #[arg(
        short = 'M',
        long = "find-renames",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "50",
        help = "Detect renames at this similarity percentage"
    )]
    find_renames: Option<u8>,
    #[arg(long, help = "Select changes by kind: (A)dded, (D)eleted, (M)odified, (R)enamed, (T)ype")]
    diff_filter: Option<String>,
    #[arg(long)]
    stat: bool,
    #[arg(long)]
    shortstat: bool,
    #[arg(long)]
    numstat: bool,
    #[arg(long)]
    summary: bool,
    #[arg(long)]
    name_only: bool,
    #[arg(long)]
    name_status: bool,
    #[arg(long)]
    raw: bool,
    #[arg(long, help = "Report differences through the exit status only")]
    quiet: bool,
    #[arg(short = 'R', help = "Swap the two sides")]
    reverse: bool,
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "7")]
    abbrev: Option<usize>,
    #[arg(long, help = "Always colour the output")]
    color: bool,
}

impl DiffArgs {
    fn to_options(&self) -> Result<DiffOptions> {
        let whitespace = if self.ignore_all_space {
            WhitespaceMode::IgnoreAll
        } else if self.ignore_space_change {
            WhitespaceMode::IgnoreChange
        } else if self.ignore_space_at_eol {
            WhitespaceMode::IgnoreAtEol
        } else {
            WhitespaceMode::Exact
        };
        let defaults = LineDiffOptions::default();

        let filter = match &self.diff_filter {
            Some(letters) => DiffFilter::try_parse(letters).ok_or_else(|| {
                RepositoryError::Usage(format!("invalid --diff-filter value '{letters}'"))
            })?,
            None => DiffFilter::all(),
        };

        let summaries = [self.stat, self.shortstat, self.numstat, self.summary];
        if summaries.into_iter().filter(|set| *set).count() > 1 {
            Err(RepositoryError::Usage(
                "--stat, --shortstat, --numstat and --summary are mutually exclusive".to_string(),
            ))?;
        }

        let format = [
            (self.quiet, OutputFormat::Quiet),
            (self.raw, OutputFormat::Raw),
            (self.name_status, OutputFormat::NameStatus),
            (self.name_only, OutputFormat::NameOnly),
            (self.summary, OutputFormat::Summary),
            (self.numstat, OutputFormat::NumStat),
            (self.shortstat, OutputFormat::ShortStat),
            (self.stat, OutputFormat::Stat),
        ]
        .into_iter()
        .find_map(|(set, format)| set.then_some(format))
        .unwrap_or(OutputFormat::Patch);

        Ok(DiffOptions {
            line: LineDiffOptions {
                context: self.unified.unwrap_or(defaults.context),
                inter_hunk_context: self.inter_hunk_context.unwrap_or(defaults.inter_hunk_context),
                whitespace,
            },
            text: self.text,
            renames: self.find_renames,
            filter,
            format,
            reverse: self.reverse,
            abbrev: self.abbrev.unwrap_or(SHORT_OID_LENGTH),
        })
    }
}

fn open_repository(writer: Box<dyn Write>) -> Result<Repository> {
    let pwd = std::env::current_dir()?;
    Repository::discover(&pwd, writer)
}

fn stdout() -> Box<dyn Write> {
    Box::new(std::io::stdout())
}

/// Run the command; `Ok(false)` is a failure that is not an error (exit status 1)
async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Init { path, bare } => {
            let path = match path {
                Some(path) => PathBuf::from(path),
                None => std::env::current_dir()?,
            };
            let mut repository = Repository::new(&path, bare, stdout())?;
            repository.init().await?;
        }
        Commands::Add { paths, force } => {
            open_repository(stdout())?.add(&paths, force).await?;
        }
        Commands::Rm {
            paths,
            cached,
            recursive,
            force,
            quiet,
        } => {
            let opts = RmOptions {
                cached,
                recursive,
                force,
                quiet,
            };
            open_repository(stdout())?.rm(&paths, &opts).await?;
        }
        Commands::Mv { args, force } => {
            open_repository(stdout())?.mv(&args, force).await?;
        }
        Commands::Commit { message } => {
            return open_repository(stdout())?.commit(message.as_deref()).await;
        }
        Commands::Status {
            short,
            porcelain,
            long: _,
            branch,
        } => {
            let format = match (porcelain, short) {
                (true, _) => StatusFormat::Porcelain,
                (false, true) => StatusFormat::Short,
                (false, false) => StatusFormat::Long,
            };
            open_repository(stdout())?
                .status_command(format, branch)
                .await?;
        }
        Commands::Diff {
            diff,
            cached,
            no_index,
            args,
            paths,
        } => {
            if diff.color {
                colored::control::set_override(true);
            }
            let options = diff.to_options()?;

            if no_index {
                let files = args.into_iter().chain(paths).collect::<Vec<_>>();
                let mut out = std::io::stdout();
                return diff_no_index(&mut out, &files, &options);
            }

            open_repository(stdout())?
                .diff(&args, &paths, cached, &options)
                .await?;
        }
        Commands::Log {
            oneline,
            abbrev_commit,
            format,
            decorate,
            no_decorate,
            patch,
            max_count,
            revisions,
            paths,
        } => {
            let paging = std::io::stdout().is_terminal() && std::env::var_os("NO_PAGER").is_none();
            let decorate = match (no_decorate, decorate) {
                (true, _) => CommitDecoration::None,
                (false, Some(decorate)) => decorate,
                (false, None) if std::io::stdout().is_terminal() => CommitDecoration::Short,
                (false, None) => CommitDecoration::None,
            };
            let opts = LogOptions {
                oneline,
                abbrev_commit,
                format: format.unwrap_or_default(),
                decorate,
                patch,
                max_count,
            };

            if paging {
                let pager = Pager::new();
                let repository = open_repository(Box::new(PagerWriter::new(pager.clone())))?;
                repository.log(&revisions, &paths, &opts)?;
                drop(repository);
                minus::page_all(pager)?;
            } else {
                open_repository(stdout())?.log(&revisions, &paths, &opts)?;
            }
        }
        Commands::Branch {
            names,
            delete,
            force_delete,
            verbose,
            force,
            list,
            all,
            remotes,
        } => {
            let mut repository = open_repository(stdout())?;
            let listing = match (all, remotes) {
                (true, _) => BranchListing::All,
                (false, true) => BranchListing::Remote,
                (false, false) => BranchListing::Local,
            };
            if delete || force_delete {
                if names.is_empty() {
                    Err(RepositoryError::Usage("branch name required".to_string()))?;
                }
                match remotes {
                    true => repository.delete_remote_branches(&names)?,
                    false => repository.delete_branches(&names, force_delete || force)?,
                }
            } else {
                match names.as_slice() {
                    [] => repository.list_branches(verbose, listing)?,
                    _ if list || all || remotes => repository.list_branches(verbose, listing)?,
                    [name] => repository.branch(name, None, force)?,
                    [name, start] => repository.branch(name, Some(start), force)?,
                    _ => Err(RepositoryError::Usage(
                        "too many arguments for a branch operation".to_string(),
                    ))?,
                }
            }
        }
        Commands::Checkout {
            target,
            new_branch,
            reset_branch,
            force,
            paths,
        } => {
            let opts = CheckoutOptions {
                reset_branch: reset_branch.is_some(),
                new_branch: new_branch.or(reset_branch),
                force,
            };
            if target.is_none() && paths.is_empty() && opts.new_branch.is_none() {
                Err(RepositoryError::Usage(
                    "you must specify a branch, commit or paths to check out".to_string(),
                ))?;
            }
            open_repository(stdout())?
                .checkout(target.as_deref(), &paths, &opts)
                .await?;
        }
        Commands::Merge {
            target,
            message,
            continue_merge,
            abort,
        } => {
            let mut repository = open_repository(stdout())?;
            match (continue_merge, abort, target) {
                (true, _, _) => repository.merge_continue().await?,
                (_, true, _) => repository.merge_abort().await?,
                (_, _, Some(target)) => repository.merge(&target, message.as_deref()).await?,
                (false, false, None) => {
                    Err(RepositoryError::Usage("nothing to merge".to_string()))?
                }
            }
        }
        Commands::MergeBase {
            commits,
            all,
            is_ancestor,
        } => {
            return open_repository(stdout())?.merge_base(&commits, all, is_ancestor);
        }
        Commands::Rebase {
            upstream,
            branch,
            onto,
            continue_rebase,
            skip,
            abort,
            quit,
        } => {
            let mut repository = open_repository(stdout())?;
            if continue_rebase {
                repository.rebase_continue().await?;
            } else if skip {
                repository.rebase_skip().await?;
            } else if abort {
                repository.rebase_abort().await?;
            } else if quit {
                repository.rebase_quit()?;
            } else {
                let upstream = upstream.ok_or_else(|| {
                    RepositoryError::Usage("no upstream to rebase onto".to_string())
                })?;
                repository
                    .rebase(&upstream, branch.as_deref(), onto.as_deref())
                    .await?;
            }
        }
        Commands::Remote { action, verbose } => {
            let mut repository = open_repository(stdout())?;
            match action {
                None => repository.remote_list(verbose)?,
                Some(RemoteCommand::Add { name, url }) => repository.remote_add(&name, &url)?,
                Some(RemoteCommand::Remove { name }) => repository.remote_remove(&name)?,
                Some(RemoteCommand::Rename { old, new }) => repository.remote_rename(&old, &new)?,
                Some(RemoteCommand::SetUrl { push, name, url }) => {
                    repository.remote_set_url(&name, &url, push)?
                }
                Some(RemoteCommand::Show {
                    names,
                    verbose: show_verbose,
                }) => match names.is_empty() {
                    true => repository.remote_list(verbose || show_verbose)?,
                    false => repository.remote_show(&names)?,
                },
            }
        }
        Commands::Stash { action, message } => {
            let mut repository = open_repository(stdout())?;
            match action {
                None => repository.stash_push(message.as_deref()).await?,
                Some(StashCommand::Push { message: pushed }) => {
                    repository
                        .stash_push(pushed.or(message).as_deref())
                        .await?
                }
                Some(StashCommand::List) => repository.stash_list()?,
                Some(StashCommand::Show { stash, patch }) => {
                    repository
                        .stash_show(parse_stash_index(stash.as_deref())?, patch)
                        .await?
                }
                Some(StashCommand::Apply { stash }) => {
                    // conflicts are reported, not failed, as with merge
                    repository
                        .stash_apply(parse_stash_index(stash.as_deref())?)
                        .await?;
                }
                Some(StashCommand::Pop { stash }) => {
                    repository
                        .stash_pop(parse_stash_index(stash.as_deref())?)
                        .await?;
                }
                Some(StashCommand::Drop { stash }) => {
                    repository.stash_drop(parse_stash_index(stash.as_deref())?)?
                }
                Some(StashCommand::Clear) => repository.stash_clear()?,
            }
        }
        Commands::Reset {
            soft,
            mixed,
            hard,
            args,
            paths,
        } => {
            let mode = match (soft, mixed, hard) {
                (true, _, _) => Some(ResetMode::Soft),
                (_, true, _) => Some(ResetMode::Mixed),
                (_, _, true) => Some(ResetMode::Hard),
                _ => None,
            };
            open_repository(stdout())?.reset(&args, &paths, mode).await?;
        }
        Commands::Tag {
            names,
            message,
            delete,
            force,
            list,
            lines,
        } => {
            let mut repository = open_repository(stdout())?;
            if delete {
                if names.is_empty() {
                    Err(RepositoryError::Usage("tag name required".to_string()))?;
                }
                repository.delete_tags(&names)?;
            } else {
                match names.as_slice() {
                    [] => repository.list_tags(lines)?,
                    _ if list || lines.is_some() => repository.list_tags(lines)?,
                    [name] => repository.tag(name, None, message.as_deref(), force)?,
                    [name, target] => {
                        repository.tag(name, Some(target), message.as_deref(), force)?
                    }
                    _ => Err(RepositoryError::Usage(
                        "too many arguments for a tag operation".to_string(),
                    ))?,
                }
            }
        }
        Commands::RevList {
            max_count,
            revisions,
            paths,
        } => {
            let mut repository = open_repository(stdout())?;
            let paths = repository.pathspecs(&paths)?;
            repository.rev_list(&revisions, &paths, max_count)?;
        }
        Commands::RevParse {
            revisions,
            is_bare_repository,
            git_dir,
            show_toplevel,
            abbrev_ref,
            short,
        } => {
            let opts = RevParseOptions {
                is_bare_repository,
                git_dir,
                show_toplevel,
                abbrev_ref,
                short,
            };
            open_repository(stdout())?.rev_parse(&revisions, &opts)?;
        }
        Commands::CatFile {
            pretty: _,
            object_type,
            size,
            exists,
            object,
        } => {
            let mode = if object_type {
                CatFileMode::Type
            } else if size {
                CatFileMode::Size
            } else if exists {
                CatFileMode::Exists
            } else {
                CatFileMode::Pretty
            };
            open_repository(stdout())?.cat_file(&object, mode)?;
        }
        Commands::HashObject { write, file } => {
            match open_repository(stdout()) {
                Ok(mut repository) => repository.hash_object(&file, write)?,
                // hashing alone needs no repository
                Err(_) if !write => {
                    let mut repository = Repository::new(Path::new("."), false, stdout())?;
                    repository.hash_object(&file, false)?;
                }
                Err(err) => return Err(err),
            }
        }
        Commands::LsTree {
            recursive,
            tree_ish,
        } => {
            open_repository(stdout())?.ls_tree(&tree_ish, recursive)?;
        }
        Commands::LsFiles { stage } => {
            open_repository(stdout())?.ls_files(stage).await?;
        }
        Commands::WriteTree => {
            open_repository(stdout())?.write_tree().await?;
        }
        Commands::UpdateRef {
            delete,
            name,
            new_value,
            old_value,
        } => {
            open_repository(stdout())?.update_ref(
                &name,
                new_value.as_deref(),
                old_value.as_deref(),
                delete,
            )?;
        }
        Commands::Config {
            key,
            value,
            list,
            unset,
        } => {
            return open_repository(stdout())?.config_command(
                key.as_deref(),
                value.as_deref(),
                list,
                unset,
            );
        }
    }

    Ok(true)
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = match err.use_stderr() {
                true => EXIT_USAGE,
                false => EXIT_SUCCESS,
            };
            std::process::exit(code);
        }
    };

    telemetry::init();
    if cli.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let code = match run(cli).await {
        Ok(true) => EXIT_SUCCESS,
        Ok(false) => EXIT_FAILURE,
        Err(err) => {
            let (message, code) = report(&err);
            eprintln!("{message}");
            code
        }
    };
    let _ = std::io::stdout().flush();

    std::process::exit(code);
}
