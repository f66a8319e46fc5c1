use anyhow::Result;
use git2::Oid;
use std::path::Path;
use tracing::{debug, info};

use crate::actions;
use crate::auth::{self, RemoteTarget};
use crate::config::{InputArgs, PublishConfig};
use crate::context::CiContext;
use crate::fork;
use crate::paths::{self, Paths};
use crate::publish::{self, CommitIdentity};
use crate::site;
use crate::stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fork without credentials; nothing was touched.
    Skipped,
    /// Branch pushed. Holds the new commit, or `None` if nothing changed.
    Published(Option<Oid>),
}

/// Entry point of the `deploy` subcommand.
pub fn cmd_deploy(args: &InputArgs) -> Result<()> {
    info!("Starting deploy action");
    let cfg = PublishConfig::resolve(&args.load()?)?;
    {
        let _g = actions::group("Dump inputs");
        cfg.show();
    }

    let ctx = CiContext::from_env()?;
    if ctx.debug {
        let _g = actions::group("dump context");
        debug!("{:#?}", ctx);
    }

    let paths = paths::paths()?;
    match deploy(&cfg, &ctx, &paths)? {
        Outcome::Skipped => info!("Skipped deploy action"),
        Outcome::Published(_) => info!("Finished deploy action"),
    }
    Ok(())
}

/// Run one publish: fork gate, credentials, then [`deploy_with_remote`].
pub fn deploy(cfg: &PublishConfig, ctx: &CiContext, paths: &Paths) -> Result<Outcome> {
    if fork::should_skip(ctx, &cfg.credentials) {
        actions::warning(
            "This action is running on a fork and no PAT or deploy key was provided. \
             Skipping deployment.",
        );
        actions::set_output("skip", "true")?;
        return Ok(Outcome::Skipped);
    }

    let remote = {
        let _g = actions::group("Setup tokens");
        let remote = auth::set_tokens(cfg, ctx, paths)?;
        debug!("remote: {}", remote);
        remote
    };

    deploy_with_remote(cfg, ctx, &remote, &paths.work)
}

/// Stage, commit and push against an already resolved remote.
pub fn deploy_with_remote(
    cfg: &PublishConfig,
    ctx: &CiContext,
    remote: &RemoteTarget,
    work_dir: &Path,
) -> Result<Outcome> {
    let tree = {
        let _g = actions::group("Prepare publishing");
        let tree = stage::set_repo(cfg, ctx, remote, work_dir)?;
        site::add_nojekyll(&tree.root, cfg.jekyll)?;
        site::add_cname(&tree.root, &cfg.cname)?;
        tree
    };

    {
        let _g = actions::group("Setup git config");
        let identity = CommitIdentity::resolve(
            cfg.user_name.as_deref(),
            cfg.user_email.as_deref(),
            &ctx.actor,
        )?;
        publish::setup_git(&tree, remote, &identity)?;
    }

    let commit = {
        let _g = actions::group("Commit changes");
        let message = publish::message_for(cfg, ctx);
        publish::commit_changes(&tree, &message, cfg.allow_empty_commit)?
    };

    {
        let _g = actions::group("Push changes");
        publish::push_changes(&tree, cfg, remote)?;
    }

    Ok(Outcome::Published(commit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Inputs;
    use crate::error::PublishError;
    use crate::testutil::BareRemote;
    use serial_test::serial;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    struct Site {
        td: TempDir,
        remote: BareRemote,
        target: RemoteTarget,
        public: PathBuf,
        runs: u32,
    }

    impl Site {
        fn new() -> Self {
            let td = tempdir().unwrap();
            let remote = BareRemote::init(td.path());
            let target = RemoteTarget::plain("me/src", remote.url.clone());
            let public = td.path().join("public");
            fs::create_dir_all(&public).unwrap();
            Self {
                td,
                remote,
                target,
                public,
                runs: 0,
            }
        }

        fn write(&self, rel: &str, body: &str) {
            let p = self.public.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, body).unwrap();
        }

        fn cfg(&self, mut i: Inputs) -> PublishConfig {
            i.publish_dir = Some(self.public.display().to_string());
            PublishConfig::resolve(&i).unwrap()
        }

        fn run(&mut self, i: Inputs) -> Result<Outcome> {
            self.runs += 1;
            let work = self.td.path().join(format!("work{}", self.runs));
            let ctx = CiContext::fixture("push", "refs/heads/main");
            deploy_with_remote(&self.cfg(i), &ctx, &self.target, &work)
        }

        fn head(&self, branch: &str) -> (Oid, String, usize, String) {
            let repo = self.remote.repo();
            let c = repo
                .find_reference(&format!("refs/heads/{}", branch))
                .unwrap()
                .peel_to_commit()
                .unwrap();
            let author = c.author().email().unwrap_or_default().to_string();
            (
                c.id(),
                c.message().unwrap_or_default().trim_end().to_string(),
                c.parent_count(),
                author,
            )
        }
    }

    fn published(o: Outcome) -> Oid {
        match o {
            Outcome::Published(Some(oid)) => oid,
            other => panic!("expected a new commit, got {:?}", other),
        }
    }

    #[test]
    fn first_deploy_creates_orphan_branch() {
        let mut s = Site::new();
        s.write("index.html", "v1");
        let oid = published(s.run(Inputs::default()).unwrap());

        let (head, msg, parents, email) = s.head("gh-pages");
        assert_eq!(head, oid);
        assert_eq!(msg, "deploy: abc123");
        assert_eq!(parents, 0);
        assert_eq!(email, "octocat@users.noreply.github.com");
        assert_eq!(s.remote.files("gh-pages"), vec![".nojekyll", "index.html"]);
    }

    #[test]
    fn redeploy_builds_on_history_and_drops_stale_files() {
        let mut s = Site::new();
        s.write("index.html", "v1");
        s.write("old.html", "gone soon");
        let first = published(s.run(Inputs::default()).unwrap());

        fs::remove_file(s.public.join("old.html")).unwrap();
        s.write("index.html", "v2");
        published(s.run(Inputs::default()).unwrap());

        let repo = s.remote.repo();
        let (head, _, parents, _) = s.head("gh-pages");
        assert_eq!(parents, 1);
        assert_eq!(repo.find_commit(head).unwrap().parent_id(0).unwrap(), first);
        assert_eq!(s.remote.files("gh-pages"), vec![".nojekyll", "index.html"]);
        assert_eq!(s.remote.read("gh-pages", "index.html"), "v2");
    }

    #[test]
    fn unchanged_site_skips_commit_but_succeeds() {
        let mut s = Site::new();
        s.write("index.html", "same");
        let first = published(s.run(Inputs::default()).unwrap());

        assert_eq!(s.run(Inputs::default()).unwrap(), Outcome::Published(None));
        assert_eq!(s.head("gh-pages").0, first);
    }

    #[test]
    fn allow_empty_commit_always_commits() {
        let mut s = Site::new();
        s.write("index.html", "same");
        s.run(Inputs::default()).unwrap();
        let empty = Inputs {
            allow_empty_commit: Some(true),
            ..Default::default()
        };
        published(s.run(empty).unwrap());
        assert_eq!(s.head("gh-pages").2, 1);
    }

    #[test]
    fn force_orphan_rewrites_history() {
        let mut s = Site::new();
        s.write("index.html", "v1");
        s.run(Inputs::default()).unwrap();
        s.write("index.html", "v2");
        s.run(Inputs::default()).unwrap();

        let orphan = Inputs {
            force_orphan: Some(true),
            ..Default::default()
        };
        let oid = published(s.run(orphan).unwrap());
        let (head, _, parents, _) = s.head("gh-pages");
        assert_eq!(head, oid);
        assert_eq!(parents, 0);
    }

    #[test]
    fn keep_files_and_dest_dir_accumulate() {
        let mut s = Site::new();
        s.write("index.html", "root");
        s.run(Inputs::default()).unwrap();

        fs::remove_file(s.public.join("index.html")).unwrap();
        s.write("guide.html", "docs");
        let into_docs = Inputs {
            dest_dir: Some("docs".into()),
            keep_files: Some(true),
            ..Default::default()
        };
        s.run(into_docs).unwrap();

        assert_eq!(
            s.remote.files("gh-pages"),
            vec![".nojekyll", "docs/guide.html", "index.html"]
        );
    }

    #[test]
    fn markers_cname_and_tag() {
        let mut s = Site::new();
        s.write("index.html", "v1");
        let i = Inputs {
            cname: Some("docs.example.com".into()),
            enable_jekyll: Some(true),
            tag_name: Some("v1.2.3".into()),
            commit_message: Some("release:".into()),
            ..Default::default()
        };
        let oid = published(s.run(i).unwrap());

        assert_eq!(s.remote.files("gh-pages"), vec!["CNAME", "index.html"]);
        assert_eq!(s.remote.read("gh-pages", "CNAME"), "docs.example.com\n");
        assert_eq!(s.head("gh-pages").1, "release: abc123");

        let repo = s.remote.repo();
        let tag = repo
            .find_reference("refs/tags/v1.2.3")
            .unwrap()
            .peel_to_tag()
            .unwrap();
        assert_eq!(tag.target_id(), oid);
        assert_eq!(tag.message().map(str::trim_end), Some("Deployment v1.2.3"));
    }

    #[test]
    fn shipped_cname_is_not_overwritten() {
        let mut s = Site::new();
        s.write("CNAME", "mine.example.com\n");
        let i = Inputs {
            cname: Some("other.example.com".into()),
            ..Default::default()
        };
        s.run(i).unwrap();
        assert_eq!(s.remote.read("gh-pages", "CNAME"), "mine.example.com\n");
    }

    #[test]
    fn custom_identity_and_external_message() {
        let mut s = Site::new();
        s.write("index.html", "v1");
        let i = Inputs {
            user_name: Some("bot".into()),
            user_email: Some("bot@example.com".into()),
            external_repository: Some("org/site".into()),
            ..Default::default()
        };
        s.run(i).unwrap();
        let (_, msg, _, email) = s.head("gh-pages");
        assert_eq!(msg, "deploy: me/src@abc123");
        assert_eq!(email, "bot@example.com");
    }

    #[test]
    fn half_identity_fails_before_commit() {
        let mut s = Site::new();
        s.write("index.html", "v1");
        let i = Inputs {
            user_name: Some("bot".into()),
            ..Default::default()
        };
        let err = s.run(i).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PublishError>(),
            Some(&PublishError::MissingUserEmail)
        );
        assert!(s.remote.repo().find_reference("refs/heads/gh-pages").is_err());
    }

    #[test]
    #[serial]
    fn fork_without_credentials_is_skipped_with_output() {
        let td = tempdir().unwrap();
        let out = td.path().join("output");
        unsafe { std::env::set_var("GITHUB_OUTPUT", &out) };

        let cfg = PublishConfig::resolve(&Inputs::default()).unwrap();
        let mut ctx = CiContext::fixture("pull_request", "refs/pull/1/merge");
        ctx.is_fork = true;
        let paths = Paths::under(td.path().to_path_buf(), 1);
        let res = deploy(&cfg, &ctx, &paths);

        unsafe { std::env::remove_var("GITHUB_OUTPUT") };
        assert_eq!(res.unwrap(), Outcome::Skipped);
        assert_eq!(fs::read_to_string(&out).unwrap(), "skip=true\n");
        assert!(!paths.work.exists());
    }

    #[test]
    fn missing_credential_fails_outside_forks() {
        let td = tempdir().unwrap();
        let cfg = PublishConfig::resolve(&Inputs::default()).unwrap();
        let ctx = CiContext::fixture("push", "refs/heads/main");
        let err = deploy(&cfg, &ctx, &Paths::under(td.path().to_path_buf(), 1)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PublishError>(),
            Some(&PublishError::NoCredential)
        );
    }
}
