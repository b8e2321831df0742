//! Authentication guard for the protected console subtree.

use crate::routes::LOGIN_ROUTE;
use async_trait::async_trait;
use skiff_nav::{GuardOutcome, RouteGuard, RouteNode};
use skiff_session::Session;
use std::sync::Arc;

/// Redirects unauthenticated access to protected routes towards the sign-in
/// page, remembering the original target for a post-login navigation.
pub struct AuthGuard {
    session: Arc<Session>,
}

impl AuthGuard {
    /// Guard backed by the given session.
    #[must_use]
    pub const fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl RouteGuard for AuthGuard {
    async fn check(&self, node: &RouteNode) -> GuardOutcome {
        if !node.needs_auth || self.session.is_authenticated() {
            return GuardOutcome::Allow;
        }
        tracing::debug!(route = %node.name, "unauthenticated access, redirecting to sign-in");
        GuardOutcome::redirect_remembering(LOGIN_ROUTE)
    }
}
