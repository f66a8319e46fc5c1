use crate::config::Credentials;
use crate::context::CiContext;

/// Events for which a fork without secrets is skipped instead of failing.
const GATED_EVENTS: [&str; 2] = ["pull_request", "push"];

/// A fork has no access to the upstream secrets, so a run there with no
/// credential at all cannot push anywhere.
pub fn skip_on_fork(is_fork: bool, credentials: &Credentials) -> bool {
    is_fork && credentials.is_empty()
}

/// Whether this run should end early with `skip=true`.
pub fn should_skip(ctx: &CiContext, credentials: &Credentials) -> bool {
    GATED_EVENTS.contains(&ctx.event_name.as_str()) && skip_on_fork(ctx.is_fork, credentials)
}
