use anyhow::{Result, anyhow};
use std::time::{SystemTime, UNIX_EPOCH};
use std::{env, path::PathBuf};

/// Where `ssh-agent` listens when a deploy key is used.
pub const AGENT_SOCKET: &str = "/tmp/ssh-auth.sock";

/// Filesystem locations used by one publish run.
#[derive(Clone, Debug)]
pub struct Paths {
    pub ssh: PathBuf,
    pub work: PathBuf,
    pub agent_socket: PathBuf,
}

impl Paths {
    /// Lay out the run directories under `home`.
    ///
    /// `stamp` makes the work directory unique per run (unix millis in
    /// production, anything in tests).
    pub fn under(home: PathBuf, stamp: u128) -> Self {
        Self {
            ssh: home.join(".ssh"),
            work: home.join(format!("actions_github_pages_{}", stamp)),
            agent_socket: PathBuf::from(AGENT_SOCKET),
        }
    }
}

pub fn home_dir() -> Result<PathBuf> {
    if cfg!(windows) {
        let profile = env::var_os("USERPROFILE").unwrap_or_else(|| "C:\\".into());
        return Ok(PathBuf::from(profile));
    }
    env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set"))
}

pub fn paths() -> Result<Paths> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    Ok(Paths::under(home_dir()?, stamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_dir_is_unique_per_stamp() {
        let a = Paths::under(PathBuf::from("/home/runner"), 1);
        let b = Paths::under(PathBuf::from("/home/runner"), 2);
        assert_ne!(a.work, b.work);
        assert_eq!(a.ssh, PathBuf::from("/home/runner/.ssh"));
        assert_eq!(
            a.work,
            PathBuf::from("/home/runner/actions_github_pages_1")
        );
        assert_eq!(a.agent_socket, PathBuf::from(AGENT_SOCKET));
    }
}
