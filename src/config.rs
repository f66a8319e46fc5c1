use anyhow::{Context, Result};
use clap::{ArgAction, Args};
use colored::Colorize;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PublishError;

pub const DEFAULT_PUBLISH_BRANCH: &str = "gh-pages";
pub const DEFAULT_PUBLISH_DIR: &str = "public";
pub const DEFAULT_EXCLUDE_ASSETS: &str = ".github";

/// Raw publish inputs, exactly as the user supplied them.
///
/// Each field can come from three places, highest priority first:
/// 1. a command-line flag (`--publish-branch main`)
/// 2. the runner's input variable (`INPUT_PUBLISH_BRANCH`)
/// 3. a TOML file passed with `--config`
///
/// Anything still unset falls back to the defaults applied in
/// [`PublishConfig::resolve`]. Empty strings count as unset, because the
/// runner exports every declared input even when the workflow leaves it out.
///
/// Example TOML:
/// ```toml
/// personal_access_token = "ghp_..."
/// external_repository = "octo/octo.github.io"
/// publish_branch = "main"
/// publish_dir = "./site"
/// cname = "docs.example.com"
/// keep_files = true
/// ```
#[derive(Debug, Default, Clone, Args, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Inputs {
    /// SSH private key with push access to the publish repository
    #[arg(long, env = "INPUT_DEPLOY_KEY", hide_env_values = true)]
    pub deploy_key: Option<String>,

    /// Token issued by the platform for this workflow run
    #[arg(long, env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Personal access token with push access to the publish repository
    #[arg(long, env = "INPUT_PERSONAL_ACCESS_TOKEN", hide_env_values = true)]
    pub personal_access_token: Option<String>,

    /// Branch to publish to [default: gh-pages]
    #[arg(long, env = "INPUT_PUBLISH_BRANCH")]
    pub publish_branch: Option<String>,

    /// Directory holding the built site [default: public]
    #[arg(long, env = "INPUT_PUBLISH_DIR")]
    pub publish_dir: Option<String>,

    /// Subdirectory of the publish branch to publish into
    #[arg(long, env = "INPUT_DEST_DIR")]
    pub dest_dir: Option<String>,

    /// Publish to another repository (owner/name)
    #[arg(long, env = "INPUT_EXTERNAL_REPOSITORY")]
    pub external_repository: Option<String>,

    /// Create a commit even when nothing changed
    #[arg(long, env = "INPUT_ALLOW_EMPTY_COMMIT", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    pub allow_empty_commit: Option<bool>,

    /// Keep files already on the publish branch
    #[arg(long, env = "INPUT_KEEP_FILES", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    pub keep_files: Option<bool>,

    /// Replace the publish branch with a single commit without history
    #[arg(long, env = "INPUT_FORCE_ORPHAN", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    pub force_orphan: Option<bool>,

    /// Commit author name (requires --user-email)
    #[arg(long, env = "INPUT_USER_NAME")]
    pub user_name: Option<String>,

    /// Commit author email (requires --user-name)
    #[arg(long, env = "INPUT_USER_EMAIL")]
    pub user_email: Option<String>,

    /// Commit message prefix; the source commit is appended
    #[arg(long, env = "INPUT_COMMIT_MESSAGE")]
    pub commit_message: Option<String>,

    /// Commit message used verbatim
    #[arg(long, env = "INPUT_FULL_COMMIT_MESSAGE")]
    pub full_commit_message: Option<String>,

    /// Create and push an annotated tag
    #[arg(long, env = "INPUT_TAG_NAME")]
    pub tag_name: Option<String>,

    /// Message of the annotated tag
    #[arg(long, env = "INPUT_TAG_MESSAGE")]
    pub tag_message: Option<String>,

    /// Let the site be built by Jekyll (no .nojekyll)
    #[arg(long, env = "INPUT_ENABLE_JEKYLL", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    pub enable_jekyll: Option<bool>,

    /// Do not add .nojekyll
    #[arg(long, env = "INPUT_DISABLE_NOJEKYLL", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    pub disable_nojekyll: Option<bool>,

    /// Custom domain written to CNAME
    #[arg(long, env = "INPUT_CNAME")]
    pub cname: Option<String>,

    /// Comma-separated globs removed from the published tree [default: .github]
    #[arg(long, env = "INPUT_EXCLUDE_ASSETS")]
    pub exclude_assets: Option<String>,
}

/// Inputs plus the optional `--config` file they are layered over.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// TOML file with default inputs
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub inputs: Inputs,
}

impl InputArgs {
    /// Merge flags/env over the `--config` file, if any.
    pub fn load(&self) -> Result<Inputs> {
        let file = match &self.config {
            Some(p) => load_config(p)?,
            None => Inputs::default(),
        };
        Ok(self.inputs.clone().or(file))
    }
}

/// Boolean inputs are true only for the literal `true` (any case).
///
/// Anything else, including typos and the empty string, is false.
fn parse_flag(s: &str) -> Result<bool, String> {
    Ok(s.trim().eq_ignore_ascii_case("true"))
}

/// Load and parse an inputs file.
///
/// # Errors
/// - Returns an error if the file cannot be read.
/// - Returns an error if the TOML is malformed or has unknown keys.
pub fn load_config(path: &Path) -> Result<Inputs> {
    let txt = fs::read_to_string(path)
        .with_context(|| format!("config not found: {}", path.display()))?;
    let inputs: Inputs = toml::from_str(&txt)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(inputs)
}

impl Inputs {
    /// Field-wise fallback: keep `self` where set, take `other` elsewhere.
    pub fn or(self, other: Inputs) -> Inputs {
        Inputs {
            deploy_key: self.deploy_key.or(other.deploy_key),
            github_token: self.github_token.or(other.github_token),
            personal_access_token: self.personal_access_token.or(other.personal_access_token),
            publish_branch: self.publish_branch.or(other.publish_branch),
            publish_dir: self.publish_dir.or(other.publish_dir),
            dest_dir: self.dest_dir.or(other.dest_dir),
            external_repository: self.external_repository.or(other.external_repository),
            allow_empty_commit: self.allow_empty_commit.or(other.allow_empty_commit),
            keep_files: self.keep_files.or(other.keep_files),
            force_orphan: self.force_orphan.or(other.force_orphan),
            user_name: self.user_name.or(other.user_name),
            user_email: self.user_email.or(other.user_email),
            commit_message: self.commit_message.or(other.commit_message),
            full_commit_message: self.full_commit_message.or(other.full_commit_message),
            tag_name: self.tag_name.or(other.tag_name),
            tag_message: self.tag_message.or(other.tag_message),
            enable_jekyll: self.enable_jekyll.or(other.enable_jekyll),
            disable_nojekyll: self.disable_nojekyll.or(other.disable_nojekyll),
            cname: self.cname.or(other.cname),
            exclude_assets: self.exclude_assets.or(other.exclude_assets),
        }
    }
}

/// The three credential inputs. At most one of them drives authentication
/// (see [`crate::auth::Credential::select`]).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub deploy_key: String,
    pub github_token: String,
    pub personal_access_token: String,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.deploy_key.is_empty()
            && self.github_token.is_empty()
            && self.personal_access_token.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Credentials")
            .field("deploy_key", &shown(&self.deploy_key))
            .field("github_token", &shown(&self.github_token))
            .field("personal_access_token", &shown(&self.personal_access_token))
            .finish()
    }
}

/// Whether Jekyll should build the published site.
///
/// `enable_jekyll` and `disable_nojekyll` are two spellings of the same
/// switch; setting both is rejected once, here, instead of being carried
/// around as two booleans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JekyllMode {
    #[default]
    Unset,
    EnableJekyll,
    DisableNojekyll,
}

impl JekyllMode {
    pub fn from_flags(enable_jekyll: bool, disable_nojekyll: bool) -> Result<Self, PublishError> {
        match (enable_jekyll, disable_nojekyll) {
            (true, true) => Err(PublishError::ConflictingJekyllFlags),
            (true, false) => Ok(Self::EnableJekyll),
            (false, true) => Ok(Self::DisableNojekyll),
            (false, false) => Ok(Self::Unset),
        }
    }

    /// `.nojekyll` is written unless the user opted into Jekyll.
    pub fn writes_nojekyll(self) -> bool {
        self == Self::Unset
    }
}

/// Validated, immutable configuration of one publish run.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub credentials: Credentials,
    pub publish_branch: String,
    pub publish_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub external_repository: Option<String>,
    pub allow_empty_commit: bool,
    pub keep_files: bool,
    pub force_orphan: bool,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub commit_message: String,
    pub full_commit_message: String,
    pub tag_name: Option<String>,
    pub tag_message: String,
    pub jekyll: JekyllMode,
    pub cname: String,
    pub exclude_assets: Vec<String>,
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

impl PublishConfig {
    /// Apply defaults and check the input invariants.
    ///
    /// # Errors
    /// - [`PublishError::ConflictingJekyllFlags`] if both Jekyll flags are set.
    /// - [`PublishError::DestDirNotRelative`] if `dest_dir` is absolute.
    /// - [`PublishError::EmptyPublishBranch`] if the branch resolves to blank.
    pub fn resolve(i: &Inputs) -> Result<Self, PublishError> {
        let jekyll = JekyllMode::from_flags(
            i.enable_jekyll.unwrap_or(false),
            i.disable_nojekyll.unwrap_or(false),
        )?;

        let dest_dir = PathBuf::from(non_empty(&i.dest_dir).unwrap_or_default());
        if dest_dir.is_absolute() || dest_dir.has_root() {
            return Err(PublishError::DestDirNotRelative(dest_dir));
        }

        let publish_branch = non_empty(&i.publish_branch)
            .unwrap_or_else(|| DEFAULT_PUBLISH_BRANCH.to_string());
        if publish_branch.trim().is_empty() {
            return Err(PublishError::EmptyPublishBranch);
        }

        let exclude_assets = match &i.exclude_assets {
            Some(s) => split_patterns(s),
            None => split_patterns(DEFAULT_EXCLUDE_ASSETS),
        };

        Ok(Self {
            credentials: Credentials {
                deploy_key: non_empty(&i.deploy_key).unwrap_or_default(),
                github_token: non_empty(&i.github_token).unwrap_or_default(),
                personal_access_token: non_empty(&i.personal_access_token).unwrap_or_default(),
            },
            publish_branch,
            publish_dir: PathBuf::from(
                non_empty(&i.publish_dir).unwrap_or_else(|| DEFAULT_PUBLISH_DIR.to_string()),
            ),
            dest_dir,
            external_repository: non_empty(&i.external_repository),
            allow_empty_commit: i.allow_empty_commit.unwrap_or(false),
            keep_files: i.keep_files.unwrap_or(false),
            force_orphan: i.force_orphan.unwrap_or(false),
            user_name: non_empty(&i.user_name),
            user_email: non_empty(&i.user_email),
            commit_message: non_empty(&i.commit_message).unwrap_or_default(),
            full_commit_message: non_empty(&i.full_commit_message).unwrap_or_default(),
            tag_name: non_empty(&i.tag_name),
            tag_message: non_empty(&i.tag_message).unwrap_or_default(),
            jekyll,
            cname: non_empty(&i.cname).unwrap_or_default(),
            exclude_assets,
        })
    }

    /// Human-readable name of the credential that will be used.
    pub fn auth_method(&self) -> &'static str {
        let c = &self.credentials;
        if !c.deploy_key.is_empty() {
            "Deploy key"
        } else if !c.github_token.is_empty() {
            "GitHub token"
        } else if !c.personal_access_token.is_empty() {
            "Personal access token"
        } else {
            "No credential"
        }
    }

    /// Log every input, secrets reduced to the credential kind.
    pub fn show(&self) {
        for (key, value) in self.summary() {
            tracing::info!("{}: {}", key, value);
        }
    }

    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            (self.auth_method(), "true".to_string()),
            ("Publish branch", self.publish_branch.clone()),
            ("Publish directory", self.publish_dir.display().to_string()),
            ("Destination directory", self.dest_dir.display().to_string()),
            ("External repository", opt(&self.external_repository)),
            ("Allow empty commit", self.allow_empty_commit.to_string()),
            ("Keep files", self.keep_files.to_string()),
            ("Force orphan", self.force_orphan.to_string()),
            ("User name", opt(&self.user_name)),
            ("User email", opt(&self.user_email)),
            ("Commit message", self.commit_message.clone()),
            ("Full commit message", self.full_commit_message.clone()),
            ("Tag name", opt(&self.tag_name)),
            ("Tag message", self.tag_message.clone()),
            (
                "Enable Jekyll (Disable nojekyll)",
                (!self.jekyll.writes_nojekyll()).to_string(),
            ),
            ("CNAME", self.cname.clone()),
            ("Exclude assets", self.exclude_assets.join(",")),
        ]
    }
}

/// CLI command: print the resolved inputs without publishing anything.
///
/// Secrets are never printed; only the kind of credential that would be
/// used shows up.
///
/// Example output:
/// ```text
/// GitHub token: true
/// Publish branch: gh-pages
/// Publish directory: public
/// Destination directory:
/// ...
/// ```
///
/// # Errors
/// Returns an error if the `--config` file cannot be loaded or the inputs
/// violate an invariant (both Jekyll flags, absolute `dest_dir`).
pub fn cmd_inputs(args: &InputArgs) -> Result<()> {
    let cfg = PublishConfig::resolve(&args.load()?)?;
    for (key, value) in cfg.summary() {
        println!("{}: {}", key.bold(), value);
    }
    Ok(())
}

/// Split a comma-separated pattern list, dropping blank entries.
pub fn split_patterns(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
