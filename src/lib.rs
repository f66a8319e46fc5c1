//! Crate entry point for **gh-pages-publish**.
//!
//! This library provides the implementation behind the `gh-pages-publish`
//! CLI: it takes a built static site directory and publishes it as a commit
//! on a branch of a git repository (by default `gh-pages`), from inside a
//! CI job.
//!
//! A run goes through the same steps every time:
//! fork gate → credentials → working tree → marker files → commit → push.
//!
//! The `pub use` re-exports make the commands and building blocks
//! accessible directly from the crate root.

mod actions;
mod auth;
mod config;
mod context;
mod deploy;
mod error;
mod fork;
mod git;
mod paths;
mod process;
mod publish;
mod site;
mod stage;
#[cfg(test)]
mod testutil;

pub use actions::error as annotate_error;
pub use auth::{Credential, RemoteTarget, set_tokens};
pub use config::{InputArgs, Inputs, JekyllMode, PublishConfig, cmd_inputs};
pub use context::CiContext;
pub use deploy::{Outcome, cmd_deploy, deploy, deploy_with_remote};
pub use error::PublishError;
pub use paths::{Paths, paths};
pub use stage::{TreeKind, WorkingTree, set_repo};
