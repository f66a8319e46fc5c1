//! Remote authentication.
//!
//! Picks one credential out of the configured three and turns it into a
//! push URL for the publish repository:
//!
//! | credential            | URL                                             |
//! |-----------------------|-------------------------------------------------|
//! | deploy key            | `git@<host>:<owner>/<repo>.git`                 |
//! | platform token        | `https://x-access-token:<token>@<host>/<owner>/<repo>.git` |
//! | personal access token | same as platform token                          |
//!
//! The deploy-key path also prepares `~/.ssh` and an `ssh-agent`.

mod ssh;

use anyhow::Result;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use crate::config::{Credentials, PublishConfig};
use crate::context::CiContext;
use crate::error::PublishError;
use crate::git::Remote;
use crate::paths::Paths;

/// The credential that drives authentication, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    DeployKey(&'a str),
    PlatformToken(&'a str),
    PersonalAccessToken(&'a str),
}

impl<'a> Credential<'a> {
    /// Deploy key wins over the platform token, which wins over a personal
    /// access token.
    pub fn select(c: &'a Credentials) -> Result<Self, PublishError> {
        if !c.deploy_key.is_empty() {
            Ok(Self::DeployKey(&c.deploy_key))
        } else if !c.github_token.is_empty() {
            Ok(Self::PlatformToken(&c.github_token))
        } else if !c.personal_access_token.is_empty() {
            Ok(Self::PersonalAccessToken(&c.personal_access_token))
        } else {
            Err(PublishError::NoCredential)
        }
    }
}

/// Where to push, resolved once per run.
#[derive(Clone)]
pub struct RemoteTarget {
    pub publish_repo: String,
    pub url: String,
    /// Credential embedded in `url`, if any.
    pub secret: Option<String>,
    /// Environment the `git` CLI needs to authenticate.
    pub env: Vec<(String, String)>,
}

impl RemoteTarget {
    /// A target that needs no credentials (local paths, `file://` URLs).
    pub fn plain(publish_repo: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            publish_repo: publish_repo.into(),
            url: url.into(),
            secret: None,
            env: Vec::new(),
        }
    }

    pub fn remote(&self) -> Remote<'_> {
        Remote {
            url: &self.url,
            secret: self.secret.as_deref(),
            env: &self.env,
        }
    }

    /// The URL with any embedded password replaced by `***`.
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut u) if u.password().is_some() => {
                let _ = u.set_password(Some("***"));
                u.to_string()
            }
            _ => self.url.clone(),
        }
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.publish_repo, self.redacted_url())
    }
}

impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("publish_repo", &self.publish_repo)
            .field("url", &self.redacted_url())
            .field("env", &self.env)
            .finish()
    }
}

/// `owner/repo` to publish to: the external repository if given, else the
/// repository the workflow runs in.
pub fn publish_repo(external_repository: Option<&str>, ctx: &CiContext) -> String {
    match external_repository {
        Some(ext) => ext.to_string(),
        None => ctx.base_repo(),
    }
}

pub fn ssh_url(host: &str, repo: &str) -> String {
    format!("git@{}:{}.git", host, repo)
}

pub fn token_url(token: &str, host: &str, repo: &str) -> String {
    format!("https://x-access-token:{}@{}/{}.git", token, host, repo)
}

/// Restrictions on the platform token.
///
/// # Errors
/// - [`PublishError::TokenWithExternalRepository`]: the token is scoped to
///   the triggering repository and cannot push anywhere else.
/// - [`PublishError::SelfPush`]: a `push` event on the publish branch itself
///   would overwrite the source with the build output.
pub fn check_platform_token(
    publish_branch: &str,
    external_repository: Option<&str>,
    ctx: &CiContext,
) -> Result<(), PublishError> {
    debug!(git_ref = %ctx.git_ref, event_name = %ctx.event_name);
    if external_repository.is_some() {
        return Err(PublishError::TokenWithExternalRepository);
    }
    if ctx.event_name == "push" && ctx.git_ref == format!("refs/heads/{}", publish_branch) {
        return Err(PublishError::SelfPush(publish_branch.to_string()));
    }
    Ok(())
}

/// Resolve the push target for this run, doing any local credential setup.
///
/// # Errors
/// - [`PublishError::NoCredential`] when no credential is configured.
/// - The platform-token restrictions of [`check_platform_token`].
/// - [`PublishError::UnsupportedPlatform`] for a deploy key on Windows.
/// - I/O and process failures while preparing SSH.
pub fn set_tokens(cfg: &PublishConfig, ctx: &CiContext, paths: &Paths) -> Result<RemoteTarget> {
    set_tokens_with(cfg, ctx, paths, ssh::start_agent)
}

/// [`set_tokens`] with the step that loads the deploy key into an agent
/// (`socket`, `key`) supplied by the caller.
pub fn set_tokens_with<A>(
    cfg: &PublishConfig,
    ctx: &CiContext,
    paths: &Paths,
    start_agent: A,
) -> Result<RemoteTarget>
where
    A: FnOnce(&Path, &Path) -> Result<Vec<(String, String)>>,
{
    let repo = publish_repo(cfg.external_repository.as_deref(), ctx);
    let host = ctx.server_host()?;

    match Credential::select(&cfg.credentials)? {
        Credential::DeployKey(key) => {
            info!("setup SSH deploy key");
            ssh::ensure_supported()?;
            let ssh_host = host.split(':').next().unwrap_or(&host);
            let files = ssh::write_files(&paths.ssh, ssh_host, key)?;
            debug!(
                known_hosts = %files.known_hosts.display(),
                config = %files.config.display(),
                "ssh files written"
            );
            let env = start_agent(&paths.agent_socket, &files.key)?;
            Ok(RemoteTarget {
                env,
                ..RemoteTarget::plain(repo.clone(), ssh_url(ssh_host, &repo))
            })
        }
        Credential::PlatformToken(token) => {
            info!("setup GitHub token");
            check_platform_token(
                &cfg.publish_branch,
                cfg.external_repository.as_deref(),
                ctx,
            )?;
            Ok(https_target(token, &host, repo))
        }
        Credential::PersonalAccessToken(token) => {
            info!("setup Personal access token");
            Ok(https_target(token, &host, repo))
        }
    }
}

fn https_target(token: &str, host: &str, repo: String) -> RemoteTarget {
    RemoteTarget {
        secret: Some(token.to_string()),
        ..RemoteTarget::plain(repo.clone(), token_url(token, host, &repo))
    }
}
