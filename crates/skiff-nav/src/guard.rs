//! Async guard seam evaluated during the Guarding phase.

use crate::route::RouteNode;
use async_trait::async_trait;

/// Verdict returned by a guard for one route node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Continue the transition.
    Allow,
    /// Abort the transition and restart resolution at `target`.
    Redirect {
        /// Route name or pathname to resolve next.
        target: String,
        /// Whether the original target should be remembered for a later
        /// post-login navigation.
        remember: bool,
        /// Optional user-facing notice; redirects are otherwise silent.
        message: Option<String>,
    },
    /// Abort the transition, leaving the previously committed view mounted.
    Reject {
        /// Guard-provided reason.
        reason: String,
    },
}

impl GuardOutcome {
    /// Redirect to a sign-in style target, remembering where the user was
    /// headed.
    #[must_use]
    pub fn redirect_remembering(target: impl Into<String>) -> Self {
        Self::Redirect {
            target: target.into(),
            remember: true,
            message: None,
        }
    }
}

/// Async predicate attached to a route node.
///
/// Guards run root-to-leaf, each ancestor once per transition; a transition
/// suspended in a guard blocks later navigations rather than interleaving
/// with them.
#[async_trait]
pub trait RouteGuard: Send + Sync {
    /// Evaluate the guard for `node`.
    async fn check(&self, node: &RouteNode) -> GuardOutcome;
}
