use anyhow::{Context, Result};
use git2::{
    Commit, ConfigLevel, ErrorCode, IndexAddOption, ObjectType, Oid, Repository,
};
use std::fs;
use std::path::{Component, Path};
use tracing::info;

use crate::error::PublishError;

fn open(root: &Path) -> Result<Repository> {
    Repository::open(root).with_context(|| format!("open repository {}", root.display()))
}

/// Initialize a repository at `dir` with HEAD on the unborn `branch`.
///
/// The branch has no commits and nothing is tracked; the first commit made
/// on it will have no parent.
pub fn init_orphan(dir: &Path, branch: &str) -> Result<()> {
    let repo = Repository::init(dir).with_context(|| format!("git init {}", dir.display()))?;
    repo.set_head(&format!("refs/heads/{}", branch))
        .with_context(|| format!("git checkout --orphan {}", branch))?;
    Ok(())
}

/// Delete every tracked file under `subdir` (relative to `root`) from both
/// the working tree and the index.
///
/// Untracked files are left alone. Directories emptied by the removal are
/// pruned, up to `subdir` itself.
///
/// # Returns
/// The number of index entries removed.
pub fn remove_tracked(root: &Path, subdir: &Path) -> Result<usize> {
    let repo = open(root)?;
    let mut index = repo.index()?;
    let prefix = slash_path(subdir);

    let tracked: Vec<String> = index
        .iter()
        .filter_map(|e| String::from_utf8(e.path).ok())
        .filter(|p| under_prefix(p, &prefix))
        .collect();

    let stop = root.join(subdir);
    for rel in &tracked {
        let abs = root.join(rel);
        let res = if abs.is_dir() {
            fs::remove_dir_all(&abs)
        } else {
            fs::remove_file(&abs)
        };
        match res {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("remove {}", abs.display())),
        }
        index.remove_path(Path::new(rel))?;
        prune_empty_parents(&abs, &stop);
    }
    index.write()?;
    Ok(tracked.len())
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn prune_empty_parents(removed: &Path, stop: &Path) {
    let mut dir = removed.parent();
    while let Some(d) = dir {
        if d == stop || !d.starts_with(stop) || fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

/// Relative path with `/` separators, the form git uses in the index.
pub fn slash_path(p: &Path) -> String {
    p.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Equivalent of `git add --all`: new, modified and deleted files.
pub fn stage_all(root: &Path) -> Result<()> {
    let repo = open(root)?;
    let mut index = repo.index()?;
    index
        .add_all(["*"], IndexAddOption::DEFAULT, None)
        .context("git add --all")?;
    index.update_all(["*"], None).context("git add --all")?;
    index.write()?;
    Ok(())
}

/// Point `origin` at `url`, replacing any existing `origin`.
pub fn reset_origin(root: &Path, url: &str) -> Result<()> {
    let repo = open(root)?;
    if repo.find_remote("origin").is_ok() {
        repo.remote_delete("origin").context("git remote rm origin")?;
    } else {
        info!("no origin remote to remove");
    }
    repo.remote("origin", url).context("git remote add origin")?;
    Ok(())
}

/// Write `user.name` / `user.email` into the repository's own config.
pub fn set_identity(root: &Path, name: &str, email: &str) -> Result<()> {
    let repo = open(root)?;
    let mut cfg = repo.config()?.open_level(ConfigLevel::Local)?;
    cfg.set_str("user.name", name).context("git config user.name")?;
    cfg.set_str("user.email", email).context("git config user.email")?;
    Ok(())
}

fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Commit the index on the current branch.
///
/// # Errors
/// - [`PublishError::NothingToCommit`] when `allow_empty` is false and the
///   index matches the parent tree (or is empty on an unborn branch).
/// - Any git2 failure (missing identity, corrupt objects).
pub fn commit(root: &Path, message: &str, allow_empty: bool) -> Result<Oid> {
    let repo = open(root)?;
    let mut index = repo.index()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let parent = head_commit(&repo)?;

    if !allow_empty {
        let unchanged = match &parent {
            Some(p) => p.tree_id() == tree_id,
            None => index.is_empty(),
        };
        if unchanged {
            return Err(PublishError::NothingToCommit.into());
        }
    }

    let sig = repo.signature().context("commit identity")?;
    let parents: Vec<&Commit> = parent.iter().collect();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .context("git commit")?;
    Ok(oid)
}

/// Create an annotated tag `name` on HEAD.
pub fn tag_head(root: &Path, name: &str, message: &str) -> Result<Oid> {
    let repo = open(root)?;
    let target = repo
        .head()
        .and_then(|h| h.peel(ObjectType::Commit))
        .context("tag needs a commit on HEAD")?;
    let sig = repo.signature().context("tag identity")?;
    let oid = repo
        .tag(name, &target, &sig, message, false)
        .with_context(|| format!("git tag -a {}", name))?;
    Ok(oid)
}
