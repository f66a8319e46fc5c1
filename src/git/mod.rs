//! Git integration layer.
//!
//! Two backends sit behind this module:
//! - `git2_backend`: everything that only touches the local repository
//!   (init, index, config, commit, tag), done in-process with `git2`.
//! - `cli`: clone and push, delegated to the system `git` so that SSH agents,
//!   known-hosts pinning and credential-bearing URLs behave exactly as they do
//!   for any other step of the workflow.
//!
//! Every function takes the repository path explicitly; nothing here relies
//! on the process working directory.

mod cli;
mod git2_backend;

pub use cli::{Remote, clone_branch, is_missing_remote_branch, push};
pub use git2_backend::{
    commit, init_orphan, remove_tracked, reset_origin, set_identity, slash_path, stage_all,
    tag_head,
};
