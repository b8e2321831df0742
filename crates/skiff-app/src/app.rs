//! The application: construction, wiring and startup.

use crate::auth::AuthGuard;
use crate::routes::{HOME_ROUTE, LOGIN_ROUTE, console_table};
use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use skiff_client::{Credentials, ExpiryNotifier, HttpTransport, RequestError, RequestResult, Transport};
use skiff_events::{DomainEvent, Emitter, Handle};
use skiff_nav::{NavError, NavMode, NavigateOptions, NavigationHistory};
use skiff_session::{Session, SessionProfile};
use skiff_storage::{StorageBackend, TypedStorage};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Storage key for the persisted profile.
const USER_KEY: &str = "user";

/// Storage key for cached job identifiers.
const JOBS_KEY: &str = "jobs";

/// User-facing notices raised by the application wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipEvent {
    /// Short text to surface to the user.
    Notice(String),
}

/// Discriminator for [`TipEvent`] subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TipEventKind {
    /// Channel for [`TipEvent::Notice`].
    Notice,
}

impl DomainEvent for TipEvent {
    type Kind = TipEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            Self::Notice(_) => TipEventKind::Notice,
        }
    }
}

/// Declared storage snapshot: the anonymous profile and an empty job cache.
#[must_use]
pub fn storage_defaults() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert(
        USER_KEY.to_string(),
        serde_json::to_value(SessionProfile::anonymous()).unwrap_or(Value::Null),
    );
    defaults.insert(JOBS_KEY.to_string(), json!([]));
    defaults
}

/// Startup validation run by [`Application::boot`] before the first view
/// commits.
type ReadyCheck = dyn Fn() -> Pin<Box<dyn Future<Output = RequestResult<()>> + Send>> + Send + Sync;

/// Composition root of the console.
///
/// Owns the session, the navigation engine, the persisted snapshot and the
/// tip channel, and wires their reactions together: login persists the
/// profile and navigates onwards, logout clears the stored user, and expiry
/// clears it, tips and routes to the sign-in view.
pub struct Application {
    session: Arc<Session>,
    history: Arc<NavigationHistory>,
    storage: Arc<TypedStorage>,
    tips: Emitter<TipEvent>,
    before_ready: Mutex<Option<Arc<ReadyCheck>>>,
}

impl Application {
    /// Assemble the application over an explicit transport and backend.
    ///
    /// The persisted profile is restored before the session is constructed,
    /// so a stored token is live on the shared credential cell immediately.
    ///
    /// # Errors
    ///
    /// Fails when the console route table cannot be built.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Arc<Self>> {
        let storage = Arc::new(TypedStorage::load(backend, storage_defaults()));
        let restored: SessionProfile = storage.get(USER_KEY).unwrap_or_default();
        let session = Session::new(transport, credentials, ExpiryNotifier::new(), restored);
        let table = console_table().context("building the console route table")?;
        let history = Arc::new(NavigationHistory::new(table).with_guard(
            "root.home_layout",
            Arc::new(AuthGuard::new(Arc::clone(&session))),
        ));
        let app = Arc::new(Self {
            session,
            history,
            storage,
            tips: Emitter::new(),
            before_ready: Mutex::new(None),
        });
        app.wire();
        Ok(app)
    }

    /// Assemble the application over an HTTP transport.
    ///
    /// # Errors
    ///
    /// See [`Application::new`].
    pub fn over_http(base_url: &str, backend: Arc<dyn StorageBackend>) -> Result<Arc<Self>> {
        let credentials = Credentials::new();
        let transport = Arc::new(HttpTransport::new(base_url, credentials.clone()));
        Self::new(transport, credentials, backend)
    }

    /// Async startup: install logging, run the startup validation and land
    /// on the first view without recording history.
    ///
    /// The validation defaults to checking any restored credential against
    /// the backend; [`Application::set_before_ready`] swaps in a custom one.
    /// A validation failure tips its message and routes to the sign-in view.
    ///
    /// # Errors
    ///
    /// Fails when logging cannot be installed or the initial navigation
    /// fails.
    pub async fn boot(&self) -> Result<()> {
        skiff_telemetry::init_logging(&skiff_telemetry::LoggingConfig::default())?;
        let options = NavigateOptions {
            ignore_history: true,
        };
        if !self.session.is_authenticated() {
            self.history
                .navigate(LOGIN_ROUTE, NavMode::Push, options)
                .await?;
            return Ok(());
        }
        let outcome = match self.ready_check() {
            Some(check) => check().await,
            None => self.session.validate().await,
        };
        match outcome {
            Ok(()) => {
                self.history
                    .navigate(HOME_ROUTE, NavMode::Push, options)
                    .await?;
            }
            // The expiry wiring already tipped and scheduled the sign-in
            // view.
            Err(RequestError::SessionExpired) => {}
            Err(error) => {
                self.tip(error.user_message());
                self.history
                    .navigate(LOGIN_ROUTE, NavMode::Push, options)
                    .await?;
            }
        }
        Ok(())
    }

    /// Replace the startup validation run by [`Application::boot`].
    pub fn set_before_ready<F, Fut>(&self, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestResult<()>> + Send + 'static,
    {
        let check: Arc<ReadyCheck> = Arc::new(move || {
            Box::pin(check()) as Pin<Box<dyn Future<Output = RequestResult<()>> + Send>>
        });
        *self
            .before_ready
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(check);
    }

    fn ready_check(&self) -> Option<Arc<ReadyCheck>> {
        self.before_ready
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The owned session.
    #[must_use]
    pub const fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The owned navigation engine.
    #[must_use]
    pub const fn history(&self) -> &Arc<NavigationHistory> {
        &self.history
    }

    /// The owned persisted snapshot.
    #[must_use]
    pub const fn storage(&self) -> &Arc<TypedStorage> {
        &self.storage
    }

    /// Raise a user-facing notice.
    pub fn tip(&self, message: impl Into<String>) {
        self.tips.emit(&TipEvent::Notice(message.into()));
    }

    /// Subscribe to user-facing notices.
    pub fn on_tip<F>(&self, handler: F) -> Handle
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.tips.subscribe(TipEventKind::Notice, move |event| {
            let TipEvent::Notice(message) = event;
            handler(message);
            Ok(())
        })
    }

    /// Job identifiers remembered across sessions.
    #[must_use]
    pub fn cached_jobs(&self) -> Vec<String> {
        self.storage.get(JOBS_KEY).unwrap_or_default()
    }

    /// Remember a job identifier, persisting the cache.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot cannot be persisted.
    pub fn remember_job(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        let mut jobs = self.cached_jobs();
        if !jobs.contains(&id) {
            jobs.push(id);
        }
        self.storage.set(JOBS_KEY, &jobs)?;
        Ok(())
    }

    fn wire(self: &Arc<Self>) {
        {
            let app = Arc::downgrade(self);
            self.session.on_logged_in(move |profile| {
                if let Some(app) = app.upgrade() {
                    app.handle_logged_in(profile);
                }
            });
        }
        {
            let app = Arc::downgrade(self);
            self.session.on_logged_out(move || {
                if let Some(app) = app.upgrade() {
                    app.handle_logged_out();
                }
            });
        }
        {
            let app = Arc::downgrade(self);
            self.session.on_expired(move || {
                if let Some(app) = app.upgrade() {
                    app.handle_expired();
                }
            });
        }
        {
            let app = Arc::downgrade(self);
            self.history.on_guard_notice(move |message| {
                if let Some(app) = app.upgrade() {
                    app.tip(message);
                }
            });
        }
    }

    fn handle_logged_in(&self, profile: &SessionProfile) {
        if let Err(error) = self.storage.set(USER_KEY, profile) {
            tracing::warn!(%error, "failed to persist the signed-in profile");
        }
        let history = Arc::clone(&self.history);
        let target = history
            .take_pending_target()
            .unwrap_or_else(|| HOME_ROUTE.to_string());
        tokio::spawn(async move {
            navigate_soon(&history, &target, NavigateOptions::default()).await;
        });
    }

    fn handle_logged_out(&self) {
        if let Err(error) = self.storage.clear(USER_KEY) {
            tracing::warn!(%error, "failed to clear the stored profile");
        }
    }

    fn handle_expired(&self) {
        if let Err(error) = self.storage.clear(USER_KEY) {
            tracing::warn!(%error, "failed to clear the stored profile");
        }
        self.tip("session expired, sign in again");
        let history = Arc::clone(&self.history);
        tokio::spawn(async move {
            navigate_soon(
                &history,
                LOGIN_ROUTE,
                NavigateOptions {
                    ignore_history: true,
                },
            )
            .await;
        });
    }
}

/// Navigation issued from event wiring: a transition already in flight wins.
async fn navigate_soon(history: &NavigationHistory, target: &str, options: NavigateOptions) {
    match history.navigate(target, NavMode::Push, options).await {
        Ok(_) => {}
        Err(NavError::TransitionInProgress) => {
            tracing::debug!(target, "navigation skipped, transition in flight");
        }
        Err(error) => {
            tracing::warn!(%error, target, "reactive navigation failed");
        }
    }
}
