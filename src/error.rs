use std::path::PathBuf;
use thiserror::Error;

/// Expected failure shapes of a publish run.
///
/// Everything else (I/O, git2, process spawn) travels as a plain
/// [`anyhow::Error`] with context attached. Variants are wrapped into
/// `anyhow::Error` at the call site, so callers that care can
/// `downcast_ref::<PublishError>()`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("use either of enable_jekyll or disable_nojekyll")]
    ConflictingJekyllFlags,

    #[error("dest_dir must be a relative path: {}", .0.display())]
    DestDirNotRelative(PathBuf),

    #[error("publish_branch must not be empty")]
    EmptyPublishBranch,

    #[error("no deploy key or tokens specified")]
    NoCredential,

    #[error(
        "the generated GITHUB_TOKEN (github_token) does not support pushing to external repositories; \
         use the deploy_key or personal_access_token input instead"
    )]
    TokenWithExternalRepository,

    #[error(
        "you are trying to deploy from {0} to {0}; \
         this operation is not permitted because you obviously did not intend to do this"
    )]
    SelfPush(String),

    #[error("deploy_key is not supported on {0}; use github_token or personal_access_token instead")]
    UnsupportedPlatform(&'static str),

    #[error("user_email is required if user_name is specified")]
    MissingUserEmail,

    #[error("user_name is required if user_email is specified")]
    MissingUserName,

    #[error("nothing to commit")]
    NothingToCommit,
}
