//! Blocking wrapper around [`std::process::Command`] for the external tools
//! the publisher drives (`git`, `ssh-agent`, `ssh-add`).
//!
//! Every invocation is logged as `[command] ...` before it runs. Values
//! registered with [`Exec::secret`] are replaced by `***` in that log line
//! and in any error message built from the tool's output.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info};

/// A tool exited unsuccessfully.
#[derive(Debug, Error)]
#[error("{command} failed ({status}): {stderr}")]
pub struct CommandError {
    pub command: String,
    pub status: String,
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stderr: String,
}

pub struct Exec {
    cmd: Command,
    shown: Vec<String>,
    secrets: Vec<String>,
}

impl Exec {
    pub fn new(program: &str) -> Self {
        let mut cmd = Command::new(program);
        cmd.stdin(Stdio::null());
        Self {
            cmd,
            shown: vec![program.to_string()],
            secrets: Vec::new(),
        }
    }

    pub fn arg(mut self, a: impl AsRef<OsStr>) -> Self {
        self.shown.push(a.as_ref().to_string_lossy().into_owned());
        self.cmd.arg(a);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for a in args {
            self = self.arg(a);
        }
        self
    }

    /// Hide `value` wherever this command is displayed.
    pub fn secret(mut self, value: Option<&str>) -> Self {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.secrets.push(v.to_string());
        }
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cmd.current_dir(dir);
        self
    }

    pub fn envs(mut self, vars: &[(String, String)]) -> Self {
        for (k, v) in vars {
            self.cmd.env(k, v);
        }
        self
    }

    fn redact(&self, s: &str) -> String {
        self.secrets
            .iter()
            .fold(s.to_string(), |acc, secret| acc.replace(secret.as_str(), "***"))
    }

    /// Run to completion and return stdout.
    ///
    /// # Errors
    /// - The program cannot be spawned (not installed, bad cwd).
    /// - The program exits non-zero; the error is a [`CommandError`]
    ///   carrying the (redacted) stderr.
    pub fn run(mut self) -> Result<String> {
        let shown = self.redact(&self.shown.join(" "));
        info!("[command]{}", shown);

        let output = self
            .cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to spawn {}", shown))?;

        let stdout = self.redact(&String::from_utf8_lossy(&output.stdout));
        let stderr = self.redact(&String::from_utf8_lossy(&output.stderr));
        if !stdout.trim().is_empty() {
            debug!("{}", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            debug!("{}", stderr.trim_end());
        }

        if !output.status.success() {
            return Err(CommandError {
                command: shown,
                status: output.status.to_string(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }
        Ok(stdout)
    }
}
