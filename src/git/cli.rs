use anyhow::Result;
use std::path::Path;

use crate::process::{CommandError, Exec};

/// Remote to talk to, with whatever it needs to authenticate.
pub struct Remote<'a> {
    pub url: &'a str,
    /// Credential embedded in `url`, hidden from logs.
    pub secret: Option<&'a str>,
    /// Extra environment for the `git` process (e.g. `SSH_AUTH_SOCK`).
    pub env: &'a [(String, String)],
}

fn git(remote: &Remote) -> Exec {
    Exec::new("git")
        .envs(&[("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())])
        .envs(remote.env)
        .secret(remote.secret)
}

/// `git clone --depth=1 --single-branch --branch <branch> <url> <dest>`
pub fn clone_branch(remote: &Remote, branch: &str, dest: &Path) -> Result<()> {
    git(remote)
        .args(["clone", "--depth=1", "--single-branch", "--branch", branch])
        .arg(remote.url)
        .arg(dest)
        .run()?;
    Ok(())
}

/// `git push origin [--force] <refspec>`, run inside `root`.
pub fn push(root: &Path, remote: &Remote, refspec: &str, force: bool) -> Result<()> {
    let mut cmd = git(remote).current_dir(root).args(["push", "origin"]);
    if force {
        cmd = cmd.arg("--force");
    }
    cmd.arg(refspec).run()?;
    Ok(())
}

/// Whether a clone failed because the requested branch does not exist on
/// the remote (as opposed to transport or authentication trouble).
pub fn is_missing_remote_branch(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CommandError>().is_some_and(|e| {
        e.stderr.contains("not found in upstream")
            || e.stderr.contains("Could not find remote branch")
    })
}
