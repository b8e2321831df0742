//! Error types for route resolution and navigation.

use thiserror::Error;

/// Result alias for navigation operations.
pub type NavResult<T> = Result<T, NavError>;

/// Primary error type for navigation operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavError {
    /// A route name referenced during table construction does not exist.
    #[error("unknown route")]
    UnknownRoute {
        /// Name that failed to resolve.
        name: String,
    },
    /// Two routes in the configuration share a pathname.
    #[error("duplicate route pathname")]
    DuplicatePathname {
        /// The conflicting pathname.
        pathname: String,
    },
    /// A guard rejected the transition without redirecting.
    ///
    /// Not a true failure: the previously committed view stays mounted and
    /// the engine returns to idle.
    #[error("navigation guard rejected the transition")]
    GuardRejected {
        /// Guard-provided reason.
        reason: String,
    },
    /// Guard redirects chained past the allowed budget.
    #[error("redirect limit exceeded")]
    RedirectLoop {
        /// Target of the redirect that exceeded the budget.
        target: String,
    },
    /// A navigation was issued while a transition (possibly suspended in a
    /// guard) was already in flight.
    #[error("navigation transition already in flight")]
    TransitionInProgress,
}
