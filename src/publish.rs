use anyhow::Result;
use git2::Oid;
use tracing::{debug, info};

use crate::auth::RemoteTarget;
use crate::config::PublishConfig;
use crate::context::CiContext;
use crate::error::PublishError;
use crate::git;
use crate::stage::{TreeKind, WorkingTree};

/// Author and committer of the deployment commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    /// Both overrides or neither; with neither, the workflow actor's noreply
    /// address is used.
    pub fn resolve(
        name: Option<&str>,
        email: Option<&str>,
        actor: &str,
    ) -> Result<Self, PublishError> {
        match (name, email) {
            (Some(name), Some(email)) => Ok(Self {
                name: name.to_string(),
                email: email.to_string(),
            }),
            (Some(_), None) => Err(PublishError::MissingUserEmail),
            (None, Some(_)) => Err(PublishError::MissingUserName),
            (None, None) => Ok(Self {
                name: actor.to_string(),
                email: format!("{}@users.noreply.github.com", actor),
            }),
        }
    }
}

/// Subject of the deployment commit.
///
/// `full_msg` is used verbatim. Otherwise the source commit is appended to
/// `msg` (or to `deploy:`), qualified with the source repository when the
/// site goes to another repository.
pub fn commit_message(
    msg: &str,
    full_msg: &str,
    external_repository: Option<&str>,
    base_repo: &str,
    sha: &str,
) -> String {
    if !full_msg.is_empty() {
        return full_msg.to_string();
    }
    let source = match external_repository {
        Some(_) => format!("{}@{}", base_repo, sha),
        None => sha.to_string(),
    };
    if msg.is_empty() {
        format!("deploy: {}", source)
    } else {
        format!("{} {}", msg, source)
    }
}

/// Point `origin` at the publish remote, stage everything and set the
/// commit identity.
pub fn setup_git(tree: &WorkingTree, remote: &RemoteTarget, identity: &CommitIdentity) -> Result<()> {
    git::reset_origin(&tree.root, &remote.url)?;
    git::stage_all(&tree.root)?;
    git::set_identity(&tree.root, &identity.name, &identity.email)?;
    info!("commit as {} <{}>", identity.name, identity.email);
    Ok(())
}

/// Commit the staged tree.
///
/// # Returns
/// `None` when there was nothing to commit; that is not a failure.
pub fn commit_changes(tree: &WorkingTree, message: &str, allow_empty: bool) -> Result<Option<Oid>> {
    match git::commit(&tree.root, message, allow_empty) {
        Ok(oid) => {
            info!("committed {}", oid);
            Ok(Some(oid))
        }
        Err(e) if e.downcast_ref::<PublishError>() == Some(&PublishError::NothingToCommit) => {
            info!("skip commit");
            debug!("skip commit: {:#}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Push the publish branch, then the deployment tag if one is configured.
pub fn push_changes(tree: &WorkingTree, cfg: &PublishConfig, remote: &RemoteTarget) -> Result<()> {
    let r = remote.remote();
    if tree.kind == TreeKind::FreshOrphan && !cfg.force_orphan {
        info!("creating {} on {}", cfg.publish_branch, remote);
    }
    git::push(&tree.root, &r, &cfg.publish_branch, cfg.force_orphan)?;

    if let Some(tag) = &cfg.tag_name {
        let message = if cfg.tag_message.is_empty() {
            format!("Deployment {}", tag)
        } else {
            cfg.tag_message.clone()
        };
        git::tag_head(&tree.root, tag, &message)?;
        git::push(&tree.root, &r, &format!("refs/tags/{}", tag), false)?;
    }
    Ok(())
}

/// The commit message for this run.
pub fn message_for(cfg: &PublishConfig, ctx: &CiContext) -> String {
    commit_message(
        &cfg.commit_message,
        &cfg.full_commit_message,
        cfg.external_repository.as_deref(),
        &ctx.base_repo(),
        &ctx.sha,
    )
}
