//! Live instantiation of a route node on the active path.

use crate::route::RouteNode;
use chrono::{DateTime, Utc};
use skiff_events::{DomainEvent, Emitter, Handle};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Lifecycle of a view instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewLifecycle {
    /// On the active path.
    Mounted,
    /// Off the active path but retained with its in-memory state.
    KeptAlive,
    /// Evicted; subscriptions released.
    Destroyed,
}

/// Events published by a view instance across its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// The instance joined the active path.
    Shown,
    /// The instance left the active path but stays alive.
    Hidden,
    /// The instance was destroyed.
    Destroyed,
}

/// Discriminator for [`ViewEvent`] subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewEventKind {
    /// Channel for [`ViewEvent::Shown`].
    Shown,
    /// Channel for [`ViewEvent::Hidden`].
    Hidden,
    /// Channel for [`ViewEvent::Destroyed`].
    Destroyed,
}

impl DomainEvent for ViewEvent {
    type Kind = ViewEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            Self::Shown => ViewEventKind::Shown,
            Self::Hidden => ViewEventKind::Hidden,
            Self::Destroyed => ViewEventKind::Destroyed,
        }
    }
}

/// Live view instance owned by the navigation history.
///
/// Identity follows the route name; the `id` distinguishes a re-created
/// instance from a kept-alive one of the same route.
pub struct ViewInstance {
    /// Instance identity, fresh per creation.
    pub id: Uuid,
    /// Route name this instance realizes.
    pub name: String,
    /// Route title.
    pub title: String,
    /// Route pathname.
    pub pathname: String,
    lifecycle: Mutex<ViewLifecycle>,
    last_visited: Mutex<DateTime<Utc>>,
    emitter: Emitter<ViewEvent>,
}

impl ViewInstance {
    /// Instantiate a route node.
    #[must_use]
    pub fn new(node: &RouteNode) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: node.name.clone(),
            title: node.title.clone(),
            pathname: node.pathname.clone(),
            lifecycle: Mutex::new(ViewLifecycle::Mounted),
            last_visited: Mutex::new(Utc::now()),
            emitter: Emitter::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> ViewLifecycle {
        *self.lock_lifecycle()
    }

    /// When this instance was last on the active path.
    #[must_use]
    pub fn last_visited(&self) -> DateTime<Utc> {
        *self
            .last_visited
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Subscribe to this instance joining the active path.
    pub fn on_shown<F>(&self, handler: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(ViewEventKind::Shown, handler)
    }

    /// Subscribe to this instance leaving the active path.
    pub fn on_hidden<F>(&self, handler: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(ViewEventKind::Hidden, handler)
    }

    /// Subscribe to this instance being destroyed.
    pub fn on_destroyed<F>(&self, handler: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(ViewEventKind::Destroyed, handler)
    }

    pub(crate) fn mark_mounted(&self) {
        let became_visible = {
            let mut lifecycle = self.lock_lifecycle();
            let changed = *lifecycle != ViewLifecycle::Mounted;
            *lifecycle = ViewLifecycle::Mounted;
            changed
        };
        let mut last_visited = self
            .last_visited
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *last_visited = Utc::now();
        drop(last_visited);
        if became_visible {
            self.emitter.emit(&ViewEvent::Shown);
        }
    }

    pub(crate) fn mark_kept_alive(&self) {
        let became_hidden = {
            let mut lifecycle = self.lock_lifecycle();
            let changed = *lifecycle == ViewLifecycle::Mounted;
            *lifecycle = ViewLifecycle::KeptAlive;
            changed
        };
        if became_hidden {
            self.emitter.emit(&ViewEvent::Hidden);
        }
    }

    pub(crate) fn destroy(&self) {
        {
            let mut lifecycle = self.lock_lifecycle();
            if *lifecycle == ViewLifecycle::Destroyed {
                return;
            }
            *lifecycle = ViewLifecycle::Destroyed;
        }
        self.emitter.emit(&ViewEvent::Destroyed);
        self.emitter.release_all();
    }

    fn subscribe<F>(&self, kind: ViewEventKind, handler: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.emitter.subscribe(kind, move |_| {
            handler();
            Ok(())
        })
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, ViewLifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
