//! Build and publish decision.

use super::context::{CiContext, Decision};
use crate::event::RuntimeContext;

/// Decides whether downstream steps build and publish.
///
/// Nothing is built on the run's own pushes, on closed or merged pull
/// requests, on the creation of a release branch or pull request, or on the
/// push that lands a release pull request. Only the default branch and
/// release tags publish.
pub fn make_decision(runtime: &RuntimeContext, ci: &CiContext) -> Decision {
    let skip = ci.status.is_pushed
        || runtime.is_closed
        || runtime.is_merged
        || (runtime.is_branch && (runtime.is_release || runtime.is_opened))
        || runtime.is_after_merged_release_pr;
    let build = !skip;
    let publish = build && (runtime.on_default_branch || (runtime.is_release && runtime.is_tag));

    Decision { build, publish }
}
