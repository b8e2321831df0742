//! Per-instance subscription registry with snapshot dispatch.

use crate::error::{EventError, EventResult};
use crate::DomainEvent;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type HandlerFn<E> = dyn Fn(&E) -> EventResult + Send + Sync;
type ErrorHandlerFn = dyn Fn(&EventError) + Send + Sync;

/// Identifier for one subscription, returned by subscribe calls.
///
/// Dropping a handle does not unsubscribe; removal is explicit through
/// [`Emitter::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(u64);

struct Entry<E: DomainEvent> {
    id: u64,
    handler: Arc<HandlerFn<E>>,
}

struct Registry<E: DomainEvent> {
    next_id: u64,
    handlers: HashMap<E::Kind, Vec<Entry<E>>>,
    error_handlers: Vec<(u64, Arc<ErrorHandlerFn>)>,
}

impl<E: DomainEvent> Registry<E> {
    fn new() -> Self {
        Self {
            next_id: 1,
            handlers: HashMap::new(),
            error_handlers: Vec::new(),
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }
}

/// Typed publish/subscribe component composed into stateful domain objects.
///
/// Clones share one registry, so a domain object can hand out a cloned
/// emitter for subscription while keeping emission to itself.
pub struct Emitter<E: DomainEvent> {
    inner: Arc<Mutex<Registry<E>>>,
}

impl<E: DomainEvent> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: DomainEvent> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DomainEvent> Emitter<E> {
    /// Construct an emitter with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry::new())),
        }
    }

    /// Register a handler for one event kind, appended in subscription order.
    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> Handle
    where
        F: Fn(&E) -> EventResult + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.allocate();
        registry.handlers.entry(kind).or_default().push(Entry {
            id,
            handler: Arc::new(handler),
        });
        Handle(id)
    }

    /// Register a handler on the reserved error channel.
    ///
    /// Error handlers receive failures raised by regular handlers during
    /// dispatch. A failure inside an error handler itself is only logged.
    pub fn on_error<F>(&self, handler: F) -> Handle
    where
        F: Fn(&EventError) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.allocate();
        registry.error_handlers.push((id, Arc::new(handler)));
        Handle(id)
    }

    /// Remove one subscription, regular or error-channel.
    pub fn unsubscribe(&self, handle: Handle) {
        let mut registry = self.lock();
        for entries in registry.handlers.values_mut() {
            entries.retain(|entry| entry.id != handle.0);
        }
        registry.error_handlers.retain(|(id, _)| *id != handle.0);
    }

    /// Dispatch an event synchronously to the handlers subscribed for its
    /// kind at emit start.
    ///
    /// The handler list is snapshotted before the first invocation, so
    /// handlers adding or removing subscriptions mid-dispatch affect the next
    /// emit only. Handler failures are forwarded to the error channel and
    /// never rethrown to the emitter.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Arc<HandlerFn<E>>> = {
            let registry = self.lock();
            registry
                .handlers
                .get(&event.kind())
                .map(|entries| entries.iter().map(|entry| Arc::clone(&entry.handler)).collect())
                .unwrap_or_default()
        };
        for handler in snapshot {
            if let Err(error) = handler(event) {
                self.report(&error);
            }
        }
    }

    /// Forward a failure to the reserved error channel.
    pub fn report(&self, error: &EventError) {
        let snapshot: Vec<Arc<ErrorHandlerFn>> = {
            let registry = self.lock();
            registry
                .error_handlers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        if snapshot.is_empty() {
            tracing::warn!(kind = error.kind(), "unhandled event handler failure");
            return;
        }
        for handler in snapshot {
            handler(error);
        }
    }

    /// Number of live subscriptions for one kind.
    #[must_use]
    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.lock().handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Drop every subscription, regular and error-channel.
    ///
    /// Called when the owning instance is destroyed so retained handles
    /// cannot keep callbacks alive.
    pub fn release_all(&self) {
        let mut registry = self.lock();
        registry.handlers.clear();
        registry.error_handlers.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Registry<E>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
