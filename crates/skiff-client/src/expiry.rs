//! Session-expiry notification with duplicate suppression.

use skiff_events::{DomainEvent, Emitter, Handle};
use std::sync::{Arc, Mutex};

/// Event published when the session credential is first seen as expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryEvent {
    /// The backend reported the session-expired sentinel code.
    Expired,
}

/// Discriminator for [`ExpiryEvent`] subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpiryEventKind {
    /// Subscription channel for [`ExpiryEvent::Expired`].
    Expired,
}

impl DomainEvent for ExpiryEvent {
    type Kind = ExpiryEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            Self::Expired => ExpiryEventKind::Expired,
        }
    }
}

/// Dedups concurrent session-expired responses into one notification.
///
/// Several in-flight calls can all observe code 900 when a token lapses; the
/// session owner must react exactly once. The notifier trips on the first
/// report and swallows the rest until [`ExpiryNotifier::rearm`] is called
/// after a fresh login.
#[derive(Clone, Default)]
pub struct ExpiryNotifier {
    tripped: Arc<Mutex<bool>>,
    emitter: Emitter<ExpiryEvent>,
}

impl ExpiryNotifier {
    /// Construct an armed notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an expired-session response.
    ///
    /// Only the first report after arming reaches subscribers.
    pub fn notify(&self) {
        let mut tripped = self
            .tripped
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *tripped {
            tracing::debug!("duplicate session-expiry report suppressed");
            return;
        }
        *tripped = true;
        drop(tripped);
        self.emitter.emit(&ExpiryEvent::Expired);
    }

    /// Re-arm the notifier after the session owner obtained a fresh token.
    pub fn rearm(&self) {
        let mut tripped = self
            .tripped
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *tripped = false;
    }

    /// Whether an expiry has been reported since the last arming.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        *self
            .tripped
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Subscribe to the single expiry notification.
    pub fn on_expired<F>(&self, handler: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.emitter.subscribe(ExpiryEventKind::Expired, move |_| {
            handler();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn concurrent_reports_collapse_into_one_notification() {
        let notifier = ExpiryNotifier::new();
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = Arc::clone(&seen);
            notifier.on_expired(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }

        for _ in 0..4 {
            notifier.notify();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(notifier.is_tripped());
    }

    #[test]
    fn rearming_allows_the_next_expiry_through() {
        let notifier = ExpiryNotifier::new();
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = Arc::clone(&seen);
            notifier.on_expired(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }

        notifier.notify();
        notifier.rearm();
        notifier.notify();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
