use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::actions;
use crate::error::PublishError;
use crate::process::{CommandError, Exec};

pub const KEY_FILE: &str = "github";

/// Pinned ed25519 host key of github.com.
const HOST_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

#[derive(Debug)]
pub struct SshFiles {
    pub known_hosts: PathBuf,
    pub key: PathBuf,
    pub config: PathBuf,
}

pub fn ensure_supported() -> Result<(), PublishError> {
    if cfg!(windows) {
        return Err(PublishError::UnsupportedPlatform("Windows"));
    }
    Ok(())
}

/// Write known-hosts, private key and client config into `ssh_dir`.
///
/// The directory is made `0700` and every file `0600`, also when they
/// already existed from an earlier step.
pub fn write_files(ssh_dir: &Path, host: &str, key: &str) -> Result<SshFiles> {
    fs::create_dir_all(ssh_dir).with_context(|| format!("create {}", ssh_dir.display()))?;
    set_mode(ssh_dir, 0o700)?;

    let files = SshFiles {
        known_hosts: ssh_dir.join("known_hosts"),
        key: ssh_dir.join(KEY_FILE),
        config: ssh_dir.join("config"),
    };

    write_private(&files.known_hosts, &format!("{} {}\n\n", host, HOST_KEY))?;
    write_private(&files.key, &format!("{}\n", key.trim_end()))?;
    let client_config = format!(
        "Host {host}\n  HostName {host}\n  IdentityFile {key}\n  User git\n\n",
        host = host,
        key = files.key.display()
    );
    write_private(&files.config, &client_config)?;
    Ok(files)
}

fn write_private(path: &Path, contents: &str) -> Result<()> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut f = opts
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    f.write_all(contents.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    f.sync_all()?;
    set_mode(path, 0o600)?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod {:o} {}", mode, path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Start `ssh-agent` on `socket` (unless a live one already listens there)
/// and load `key` into it.
///
/// # Returns
/// The environment later `git` invocations need to reach the agent. The
/// variable is also exported for subsequent workflow steps.
pub fn start_agent(socket: &Path, key: &Path) -> Result<Vec<(String, String)>> {
    let env = vec![("SSH_AUTH_SOCK".to_string(), socket.display().to_string())];
    if reuse_agent(socket, &env)? {
        info!("reusing ssh-agent at {}", socket.display());
    } else {
        Exec::new("ssh-agent").arg("-a").arg(socket).run()?;
    }
    actions::export_variable("SSH_AUTH_SOCK", &socket.display().to_string())?;
    Exec::new("ssh-add").arg(key).envs(&env).run()?;
    Ok(env)
}

/// Whether an agent answers on `socket`. A socket file nobody listens on
/// (left over from an earlier job on the same runner) is removed so that
/// `ssh-agent -a` can bind it again.
fn reuse_agent(socket: &Path, env: &[(String, String)]) -> Result<bool> {
    if fs::symlink_metadata(socket).is_err() {
        return Ok(false);
    }
    if agent_alive(env) {
        return Ok(true);
    }
    warn!("removing stale ssh-agent socket {}", socket.display());
    fs::remove_file(socket).with_context(|| format!("remove {}", socket.display()))?;
    Ok(false)
}

/// `ssh-add -l` exits 0 (keys loaded) or 1 (no keys) when it reached an
/// agent, 2 when it could not connect.
fn agent_alive(env: &[(String, String)]) -> bool {
    match Exec::new("ssh-add").arg("-l").envs(env).run() {
        Ok(_) => true,
        Err(e) => e
            .downcast_ref::<CommandError>()
            .is_some_and(|c| c.code == Some(1)),
    }
}
