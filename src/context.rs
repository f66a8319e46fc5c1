use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Facts about the triggering workflow run.
///
/// Populated from the variables the Actions runner sets for every step
/// (`GITHUB_EVENT_NAME`, `GITHUB_REF`, `GITHUB_REPOSITORY`, ...) plus the
/// `repository.fork` flag from the event payload at `GITHUB_EVENT_PATH`.
#[derive(Debug, Clone)]
pub struct CiContext {
    pub event_name: String,
    pub git_ref: String,
    pub owner: String,
    pub repo: String,
    pub actor: String,
    pub sha: String,
    pub server_url: String,
    pub workspace: PathBuf,
    pub is_fork: bool,
    pub debug: bool,
}

#[derive(Debug, Default, Deserialize)]
struct EventPayload {
    #[serde(default)]
    repository: Option<PayloadRepository>,
}

#[derive(Debug, Deserialize)]
struct PayloadRepository {
    #[serde(default)]
    fork: bool,
}

impl CiContext {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build the context from an arbitrary variable lookup.
    ///
    /// Missing variables become empty strings; only an unreadable or
    /// malformed event payload is an error.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| get(k).unwrap_or_default();

        let repository = var("GITHUB_REPOSITORY");
        let (owner, repo) = repository
            .split_once('/')
            .map(|(o, r)| (o.to_string(), r.to_string()))
            .unwrap_or_default();

        let is_fork = match get("GITHUB_EVENT_PATH").filter(|p| !p.is_empty()) {
            Some(p) => read_fork_flag(Path::new(&p))?,
            None => false,
        };

        let server_url = get("GITHUB_SERVER_URL")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        Ok(Self {
            event_name: var("GITHUB_EVENT_NAME"),
            git_ref: var("GITHUB_REF"),
            owner,
            repo,
            actor: var("GITHUB_ACTOR"),
            sha: var("GITHUB_SHA"),
            server_url,
            workspace: get("GITHUB_WORKSPACE")
                .filter(|w| !w.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            is_fork,
            debug: var("RUNNER_DEBUG") == "1",
        })
    }

    /// `owner/repo` of the repository the workflow runs in.
    pub fn base_repo(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Host (with port, if any) of the forge, e.g. `github.com`.
    pub fn server_host(&self) -> Result<String> {
        let url = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server url: {}", self.server_url))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("server url has no host: {}", self.server_url))?;
        Ok(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }
}

#[cfg(test)]
impl CiContext {
    /// A `me/src` push-style context for tests.
    pub(crate) fn fixture(event_name: &str, git_ref: &str) -> Self {
        Self {
            event_name: event_name.into(),
            git_ref: git_ref.into(),
            owner: "me".into(),
            repo: "src".into(),
            actor: "octocat".into(),
            sha: "abc123".into(),
            server_url: DEFAULT_SERVER_URL.into(),
            workspace: PathBuf::from("."),
            is_fork: false,
            debug: false,
        }
    }
}

/// Read `repository.fork` from an event payload file.
///
/// A payload file that does not exist counts as "not a fork", the same as
/// an event without a repository object.
pub fn read_fork_flag(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let txt = fs::read_to_string(path)
        .with_context(|| format!("failed to read event payload: {}", path.display()))?;
    let payload: EventPayload = serde_json::from_str(&txt)
        .with_context(|| format!("failed to parse event payload: {}", path.display()))?;
    Ok(payload.repository.map(|r| r.fork).unwrap_or(false))
}
