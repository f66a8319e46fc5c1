//! Marker files for the Pages host: `.nojekyll` and `CNAME`.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::info;

use crate::config::JekyllMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Created,
    AlreadyExists,
    Skipped,
}

/// Create `name` under `root` only if it does not exist yet.
fn create_exclusive(root: &Path, name: &str, contents: &str) -> Result<Marker> {
    let path = root.join(name);
    let mut f = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(Marker::AlreadyExists),
        Err(e) => return Err(e).with_context(|| format!("create {}", path.display())),
    };
    f.write_all(contents.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    f.sync_all()?;
    Ok(Marker::Created)
}

/// Write an empty `.nojekyll` unless the site opted into Jekyll.
pub fn add_nojekyll(root: &Path, jekyll: JekyllMode) -> Result<Marker> {
    if !jekyll.writes_nojekyll() {
        return Ok(Marker::Skipped);
    }
    create_exclusive(root, ".nojekyll", "")
}

/// Write `CNAME` with `content` plus a newline. A `CNAME` shipped with the
/// site wins.
pub fn add_cname(root: &Path, content: &str) -> Result<Marker> {
    if content.is_empty() {
        return Ok(Marker::Skipped);
    }
    let m = create_exclusive(root, "CNAME", &format!("{}\n", content))?;
    if m == Marker::AlreadyExists {
        info!("CNAME already exists, skip adding CNAME");
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn nojekyll_follows_mode() {
        let td = tempdir().unwrap();
        assert_eq!(
            add_nojekyll(td.path(), JekyllMode::EnableJekyll).unwrap(),
            Marker::Skipped
        );
        assert!(!td.path().join(".nojekyll").exists());

        assert_eq!(
            add_nojekyll(td.path(), JekyllMode::Unset).unwrap(),
            Marker::Created
        );
        assert_eq!(fs::read_to_string(td.path().join(".nojekyll")).unwrap(), "");
        assert_eq!(
            add_nojekyll(td.path(), JekyllMode::Unset).unwrap(),
            Marker::AlreadyExists
        );
    }

    #[test]
    fn cname_is_written_once() {
        let td = tempdir().unwrap();
        assert_eq!(add_cname(td.path(), "").unwrap(), Marker::Skipped);
        assert!(!td.path().join("CNAME").exists());

        assert_eq!(add_cname(td.path(), "example.com").unwrap(), Marker::Created);
        assert_eq!(
            add_cname(td.path(), "other.example.org").unwrap(),
            Marker::AlreadyExists
        );
        assert_eq!(
            fs::read_to_string(td.path().join("CNAME")).unwrap(),
            "example.com\n"
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let td = tempdir().unwrap();
        assert!(add_cname(&td.path().join("nope"), "example.com").is_err());
    }
}
