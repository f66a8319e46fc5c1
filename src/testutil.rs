//! Local bare remotes for exercising clone/commit/push end to end.

use git2::{Repository, TreeWalkMode, TreeWalkResult};
use std::fs;
use std::path::{Path, PathBuf};

use crate::git::{self, Remote};

pub struct BareRemote {
    pub path: PathBuf,
    pub url: String,
}

impl BareRemote {
    pub fn init(dir: &Path) -> Self {
        let path = dir.join("remote.git");
        Repository::init_bare(&path).unwrap();
        let url = format!("file://{}", path.display());
        Self { path, url }
    }

    pub fn remote(&self) -> Remote<'_> {
        Remote {
            url: &self.url,
            secret: None,
            env: &[],
        }
    }

    /// Push a one-commit `branch` holding `files`.
    pub fn seed(&self, scratch: &Path, branch: &str, files: &[(&str, &str)]) {
        git::init_orphan(scratch, branch).unwrap();
        git::set_identity(scratch, "seed", "seed@example.com").unwrap();
        for (rel, body) in files {
            let p = scratch.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, body).unwrap();
        }
        git::stage_all(scratch).unwrap();
        git::commit(scratch, "seed", false).unwrap();
        git::reset_origin(scratch, &self.url).unwrap();
        git::push(scratch, &self.remote(), branch, false).unwrap();
    }

    pub fn repo(&self) -> Repository {
        Repository::open_bare(&self.path).unwrap()
    }

    /// Paths of every blob on `branch`, sorted.
    pub fn files(&self, branch: &str) -> Vec<String> {
        let repo = self.repo();
        let tree = repo
            .revparse_single(&format!("refs/heads/{}", branch))
            .unwrap()
            .peel_to_tree()
            .unwrap();
        let mut out = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                out.push(format!("{}{}", dir, entry.name().unwrap_or_default()));
            }
            TreeWalkResult::Ok
        })
        .unwrap();
        out.sort();
        out
    }

    pub fn read(&self, branch: &str, rel: &str) -> String {
        let repo = self.repo();
        let obj = repo
            .revparse_single(&format!("refs/heads/{}:{}", branch, rel))
            .unwrap();
        let blob = obj.peel_to_blob().unwrap();
        String::from_utf8_lossy(blob.content()).into_owned()
    }
}
