//! GitHub Actions workflow commands.
//!
//! The runner parses these from stdout (`::group::`, `::warning::`, ...) or
//! from the files it points at through `GITHUB_OUTPUT` / `GITHUB_ENV`.
//! Everything else the program prints goes through `tracing`.

use anyhow::{Context, Result};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

const DELIMITER: &str = "ghadelimiter_gh_pages_publish";

/// A collapsible log group, closed when dropped.
///
/// ```ignore
/// let _g = actions::group("Setup tokens");
/// // ... everything logged here is folded under the group
/// ```
pub struct Group(());

pub fn group(name: &str) -> Group {
    println!("::group::{}", name);
    Group(())
}

impl Drop for Group {
    fn drop(&mut self) {
        println!("::endgroup::");
    }
}

pub fn warning(msg: &str) {
    println!("::warning::{}", escape_data(msg));
}

pub fn error(msg: &str) {
    println!("::error::{}", escape_data(msg));
}

/// Set a step output.
///
/// Appends to `$GITHUB_OUTPUT` when the runner provides it, otherwise falls
/// back to the legacy `::set-output` command.
pub fn set_output(name: &str, value: &str) -> Result<()> {
    match env::var_os("GITHUB_OUTPUT").filter(|p| !p.is_empty()) {
        Some(file) => append_key_value(Path::new(&file), name, value),
        None => {
            println!("::set-output name={}::{}", name, escape_data(value));
            Ok(())
        }
    }
}

/// Make an environment variable visible to later workflow steps.
///
/// This does not touch the current process environment; callers pass
/// variables to child processes explicitly.
pub fn export_variable(name: &str, value: &str) -> Result<()> {
    match env::var_os("GITHUB_ENV").filter(|p| !p.is_empty()) {
        Some(file) => append_key_value(Path::new(&file), name, value),
        None => {
            tracing::debug!(%name, "GITHUB_ENV not set, variable not exported");
            Ok(())
        }
    }
}

fn append_key_value(file: &Path, name: &str, value: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .with_context(|| format!("open {}", file.display()))?;
    if value.contains('\n') {
        writeln!(f, "{}<<{}\n{}\n{}", name, DELIMITER, value, DELIMITER)?;
    } else {
        writeln!(f, "{}={}", name, value)?;
    }
    Ok(())
}

fn escape_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
