//! Prepare the local working tree that becomes the next commit on the
//! publish branch.
//!
//! The branch is either cloned (shallow, single branch) or started fresh as
//! an orphan. The built site is then laid over it and excluded assets are
//! removed.

mod assets;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::actions;
use crate::auth::RemoteTarget;
use crate::config::PublishConfig;
use crate::context::CiContext;
use crate::git;

pub use assets::{copy_assets, delete_excluded};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    /// Existing branch history was cloned.
    Cloned,
    /// A new repository with the branch unborn.
    FreshOrphan,
}

/// A repository checked out (or initialized) for publishing.
#[derive(Debug, Clone)]
pub struct WorkingTree {
    /// Repository root; git operations run here.
    pub root: PathBuf,
    /// Where the site is copied to. Equal to `root` unless a destination
    /// subdirectory was requested on a cloned branch.
    pub dest: PathBuf,
    pub kind: TreeKind,
}

/// Absolute publish source: kept as-is when absolute, otherwise taken
/// relative to the workflow workspace.
pub fn publish_source(cfg: &PublishConfig, ctx: &CiContext) -> PathBuf {
    if cfg.publish_dir.is_absolute() {
        cfg.publish_dir.clone()
    } else {
        ctx.workspace.join(&cfg.publish_dir)
    }
}

/// Produce the working tree for this run under `work_dir`.
///
/// # Errors
/// - Filesystem failures while creating directories or copying assets.
/// - git2 failures initializing the orphan branch or cleaning the clone.
/// - A failing asset deletion.
///
/// A failed clone is not an error: it is treated as the first deployment
/// and falls back to a fresh orphan branch.
pub fn set_repo(
    cfg: &PublishConfig,
    ctx: &CiContext,
    remote: &RemoteTarget,
    work_dir: &Path,
) -> Result<WorkingTree> {
    let publish_dir = publish_source(cfg, ctx);
    let dest = if cfg.dest_dir.as_os_str().is_empty() {
        work_dir.to_path_buf()
    } else {
        work_dir.join(&cfg.dest_dir)
    };

    info!("Force orphan: {}", cfg.force_orphan);
    let tree = if cfg.force_orphan {
        fresh_orphan(&dest, &cfg.publish_branch)?
    } else {
        match git::clone_branch(&remote.remote(), &cfg.publish_branch, work_dir) {
            Ok(()) => cloned(work_dir, dest, cfg.keep_files)?,
            Err(err) => {
                if git::is_missing_remote_branch(&err) {
                    info!(
                        "first deployment, create new branch {}",
                        cfg.publish_branch
                    );
                } else {
                    warn!("clone failed: {:#}", err);
                    actions::warning(&format!(
                        "failed to clone {}, publishing a new {} branch instead",
                        remote, cfg.publish_branch
                    ));
                }
                fresh_orphan(&dest, &cfg.publish_branch)?
            }
        }
    };

    copy_assets(&publish_dir, &tree.dest)?;
    delete_excluded(&tree.dest, &cfg.exclude_assets)?;
    Ok(tree)
}

fn fresh_orphan(dest: &Path, branch: &str) -> Result<WorkingTree> {
    fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
    git::init_orphan(dest, branch)?;
    Ok(WorkingTree {
        root: dest.to_path_buf(),
        dest: dest.to_path_buf(),
        kind: TreeKind::FreshOrphan,
    })
}

fn cloned(root: &Path, dest: PathBuf, keep_files: bool) -> Result<WorkingTree> {
    fs::create_dir_all(&dest).with_context(|| format!("create {}", dest.display()))?;
    if keep_files {
        info!("Keeping existing files");
    } else {
        info!("clean up {}", dest.display());
        let rel = dest.strip_prefix(root).unwrap_or(Path::new(""));
        let n = git::remove_tracked(root, rel)?;
        info!("removed {} tracked files", n);
    }
    Ok(WorkingTree {
        root: root.to_path_buf(),
        dest,
        kind: TreeKind::Cloned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Inputs;
    use crate::testutil::BareRemote;
    use git2::{ErrorCode, Repository};
    use tempfile::tempdir;

    struct Fixture {
        _td: tempfile::TempDir,
        root: PathBuf,
        remote: BareRemote,
        target: RemoteTarget,
        site: PathBuf,
        work: PathBuf,
    }

    fn fixture() -> Fixture {
        let td = tempdir().unwrap();
        let root = td.path().to_path_buf();
        let remote = BareRemote::init(&root);
        let target = RemoteTarget::plain("me/src", remote.url.clone());
        let site = root.join("public");
        fs::create_dir_all(&site).unwrap();
        fs::write(site.join("index.html"), "new").unwrap();
        Fixture {
            work: root.join("work"),
            _td: td,
            root,
            remote,
            target,
            site,
        }
    }

    fn cfg(f: &Fixture, mut i: Inputs) -> PublishConfig {
        i.publish_dir = Some(f.site.display().to_string());
        PublishConfig::resolve(&i).unwrap()
    }

    fn ctx() -> CiContext {
        CiContext::fixture("push", "refs/heads/main")
    }

    fn tracked(root: &Path) -> Vec<String> {
        let repo = Repository::open(root).unwrap();
        let index = repo.index().unwrap();
        let mut v: Vec<String> = index
            .iter()
            .map(|e| String::from_utf8(e.path).unwrap())
            .collect();
        v.sort();
        v
    }

    #[test]
    fn missing_branch_falls_back_to_orphan() {
        let f = fixture();
        let c = cfg(&f, Inputs::default());
        let tree = set_repo(&c, &ctx(), &f.target, &f.work).unwrap();

        assert_eq!(tree.kind, TreeKind::FreshOrphan);
        assert_eq!(tree.root, f.work);
        let repo = Repository::open(&tree.root).unwrap();
        assert_eq!(repo.head().err().unwrap().code(), ErrorCode::UnbornBranch);
        assert_eq!(fs::read_to_string(f.work.join("index.html")).unwrap(), "new");
    }

    #[test]
    fn unreachable_remote_also_falls_back() {
        let f = fixture();
        let c = cfg(&f, Inputs::default());
        let nowhere = RemoteTarget::plain(
            "me/src",
            format!("file://{}", f.root.join("no-such.git").display()),
        );
        let tree = set_repo(&c, &ctx(), &nowhere, &f.work).unwrap();
        assert_eq!(tree.kind, TreeKind::FreshOrphan);
    }

    #[test]
    fn clone_replaces_tracked_files_by_default() {
        let f = fixture();
        f.remote.seed(
            &f.root.join("seed"),
            "gh-pages",
            &[("index.html", "old"), ("stale.html", "s")],
        );
        let c = cfg(&f, Inputs::default());
        let tree = set_repo(&c, &ctx(), &f.target, &f.work).unwrap();

        assert_eq!(tree.kind, TreeKind::Cloned);
        assert!(!f.work.join("stale.html").exists());
        assert_eq!(fs::read_to_string(f.work.join("index.html")).unwrap(), "new");
        assert!(tracked(&f.work).is_empty());
    }

    #[test]
    fn keep_files_preserves_existing_content() {
        let f = fixture();
        f.remote.seed(
            &f.root.join("seed"),
            "gh-pages",
            &[("index.html", "old"), ("stale.html", "s")],
        );
        let c = cfg(
            &f,
            Inputs {
                keep_files: Some(true),
                ..Default::default()
            },
        );
        set_repo(&c, &ctx(), &f.target, &f.work).unwrap();

        assert!(f.work.join("stale.html").exists());
        assert_eq!(fs::read_to_string(f.work.join("index.html")).unwrap(), "new");
        assert_eq!(tracked(&f.work), vec!["index.html", "stale.html"]);
    }

    #[test]
    fn dest_dir_cleans_only_its_subtree() {
        let f = fixture();
        f.remote.seed(
            &f.root.join("seed"),
            "gh-pages",
            &[("index.html", "root"), ("docs/old.html", "o")],
        );
        let c = cfg(
            &f,
            Inputs {
                dest_dir: Some("docs".into()),
                ..Default::default()
            },
        );
        let tree = set_repo(&c, &ctx(), &f.target, &f.work).unwrap();

        assert_eq!(tree.root, f.work);
        assert_eq!(tree.dest, f.work.join("docs"));
        assert_eq!(fs::read_to_string(f.work.join("index.html")).unwrap(), "root");
        assert!(!f.work.join("docs/old.html").exists());
        assert_eq!(fs::read_to_string(f.work.join("docs/index.html")).unwrap(), "new");
    }

    #[test]
    fn force_orphan_ignores_existing_branch() {
        let f = fixture();
        f.remote
            .seed(&f.root.join("seed"), "gh-pages", &[("stale.html", "s")]);
        let c = cfg(
            &f,
            Inputs {
                force_orphan: Some(true),
                ..Default::default()
            },
        );
        let tree = set_repo(&c, &ctx(), &f.target, &f.work).unwrap();

        assert_eq!(tree.kind, TreeKind::FreshOrphan);
        assert!(!f.work.join("stale.html").exists());
        assert!(f.work.join("index.html").exists());
    }

    #[test]
    fn excluded_assets_are_removed_after_copy() {
        let f = fixture();
        fs::create_dir_all(f.site.join(".github/workflows")).unwrap();
        fs::write(f.site.join(".github/workflows/ci.yml"), "on: push").unwrap();
        let c = cfg(&f, Inputs::default());
        set_repo(&c, &ctx(), &f.target, &f.work).unwrap();

        assert!(!f.work.join(".github").exists());
        assert!(f.work.join("index.html").exists());
        assert!(f.work.join(".git").is_dir());
    }

    #[test]
    fn relative_publish_dir_uses_workspace() {
        let mut c = PublishConfig::resolve(&Inputs::default()).unwrap();
        c.publish_dir = PathBuf::from("out");
        let mut x = ctx();
        x.workspace = PathBuf::from("/home/runner/work/src");
        assert_eq!(publish_source(&c, &x), PathBuf::from("/home/runner/work/src/out"));
    }
}
