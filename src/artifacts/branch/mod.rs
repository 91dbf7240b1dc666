//! Branch, tag and revision names
//!
//! - `branch_name`: validated ref names (`BranchName`, `TagName`, `SymRefName`)
//! - `revision`: revision expressions (`HEAD~2`, `main^2`, `stash@{1}`, `a..b`, `^rev`)

pub mod branch_name;
pub mod revision;

pub const INVALID_BRANCH_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|^\/|\/$|\.lock$|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";
pub const PARENT_REGEX: &str = r"^(.+)\^(\d*)$";
pub const ANCESTOR_REGEX: &str = r"^(.+)\~(\d*)$";
pub const STASH_REGEX: &str = r"^stash@\{(\d+)\}$";
pub const REF_ALIASES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "@" => "HEAD",
};
