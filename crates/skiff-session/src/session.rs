//! The session owner.

use crate::types::{AccountPayload, ProfilePayload, SessionProfile, UserSettings};
use serde::Serialize;
use serde_json::Value;
use skiff_client::{
    CallSpec, Credentials, ExpiryNotifier, RequestError, RequestOperation, RequestResult, Transport,
};
use skiff_events::{DomainEvent, Emitter, Handle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Events published by [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login or registration succeeded.
    LoggedIn(SessionProfile),
    /// The user signed out.
    LoggedOut,
    /// The credential lapsed; emitted exactly once per expiry.
    Expired,
    /// The profile snapshot changed for any reason.
    StateChanged(SessionProfile),
}

/// Discriminator for [`SessionEvent`] subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    /// Channel for [`SessionEvent::LoggedIn`].
    LoggedIn,
    /// Channel for [`SessionEvent::LoggedOut`].
    LoggedOut,
    /// Channel for [`SessionEvent::Expired`].
    Expired,
    /// Channel for [`SessionEvent::StateChanged`].
    StateChanged,
}

impl DomainEvent for SessionEvent {
    type Kind = SessionEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            Self::LoggedIn(_) => SessionEventKind::LoggedIn,
            Self::LoggedOut => SessionEventKind::LoggedOut,
            Self::Expired => SessionEventKind::Expired,
            Self::StateChanged(_) => SessionEventKind::StateChanged,
        }
    }
}

#[derive(Debug, Serialize)]
struct AccountArgs {
    email: String,
    password: String,
}

/// Owns the signed-in profile and the account-related remote calls.
///
/// Hydrated from the persisted profile at construction; a restored token is
/// published through the shared [`Credentials`] cell immediately so every
/// transport sees it. Expiry handling runs through the client crate's
/// notifier, so N concurrent expired responses collapse into one
/// [`SessionEvent::Expired`].
pub struct Session {
    credentials: Credentials,
    expiry: ExpiryNotifier,
    profile: Mutex<SessionProfile>,
    login_op: RequestOperation<AccountArgs, AccountPayload>,
    register_op: RequestOperation<AccountArgs, AccountPayload>,
    validate_op: RequestOperation<(), ()>,
    profile_op: RequestOperation<(), ProfilePayload>,
    settings_op: RequestOperation<UserSettings, ()>,
    emitter: Emitter<SessionEvent>,
}

impl Session {
    /// Construct a session over `transport`, hydrated from `restored`.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        expiry: ExpiryNotifier,
        restored: SessionProfile,
    ) -> Arc<Self> {
        if restored.is_authenticated() {
            credentials.set_token(restored.token.clone());
        }
        let login_op = RequestOperation::new(
            Arc::clone(&transport),
            expiry.clone(),
            |args: &AccountArgs| CallSpec::post("/api/user/login", body(args)),
        );
        let register_op = RequestOperation::new(
            Arc::clone(&transport),
            expiry.clone(),
            |args: &AccountArgs| CallSpec::post("/api/user/register", body(args)),
        );
        let validate_op = RequestOperation::with_mapper(
            Arc::clone(&transport),
            expiry.clone(),
            |(): &()| CallSpec::post("/api/admin/user/validate", Value::Null),
            |_| Ok(()),
        );
        let profile_op =
            RequestOperation::new(Arc::clone(&transport), expiry.clone(), |(): &()| {
                CallSpec::post("/api/user/profile", Value::Null)
            });
        let settings_op = RequestOperation::with_mapper(
            transport,
            expiry.clone(),
            |settings: &UserSettings| CallSpec::post("/api/user/update_settings", body(settings)),
            |_| Ok(()),
        );

        let session = Arc::new(Self {
            credentials,
            expiry,
            profile: Mutex::new(restored),
            login_op,
            register_op,
            validate_op,
            profile_op,
            settings_op,
            emitter: Emitter::new(),
        });
        let weak = Arc::downgrade(&session);
        session.expiry.on_expired(move || {
            if let Some(session) = weak.upgrade() {
                session.handle_expired();
            }
        });
        session
    }

    /// Sign in with email and password.
    ///
    /// Empty fields fail client-side before any call is dispatched.
    ///
    /// # Errors
    ///
    /// [`RequestError::Validation`] on empty fields, otherwise the normalized
    /// call failure.
    pub async fn login(&self, email: &str, password: &str) -> RequestResult<SessionProfile> {
        check_account_fields(email, password)?;
        let payload = self
            .login_op
            .run(AccountArgs {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        Ok(self.adopt(payload))
    }

    /// Create an account and sign in with it.
    ///
    /// # Errors
    ///
    /// [`RequestError::Validation`] on empty fields, otherwise the normalized
    /// call failure.
    pub async fn register(&self, email: &str, password: &str) -> RequestResult<SessionProfile> {
        check_account_fields(email, password)?;
        let payload = self
            .register_op
            .run(AccountArgs {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        Ok(self.adopt(payload))
    }

    /// Check the restored credential against the backend.
    ///
    /// # Errors
    ///
    /// [`RequestError::Validation`] when no credential is held;
    /// [`RequestError::SessionExpired`] when the backend rejects it, with the
    /// expiry side effects applied through the notifier.
    pub async fn validate(&self) -> RequestResult<()> {
        if !self.is_authenticated() {
            return Err(RequestError::Validation {
                field: "token",
                reason: "required",
            });
        }
        self.validate_op.run(()).await
    }

    /// Fetch the profile details, refreshing the display name.
    ///
    /// # Errors
    ///
    /// [`RequestError::Validation`] when no credential is held, otherwise the
    /// normalized call failure.
    pub async fn fetch_profile(&self) -> RequestResult<ProfilePayload> {
        if !self.is_authenticated() {
            return Err(RequestError::Validation {
                field: "token",
                reason: "required",
            });
        }
        let payload = self.profile_op.run(()).await?;
        let snapshot = {
            let mut profile = self.lock_profile();
            profile.nickname.clone_from(&payload.nickname);
            profile.clone()
        };
        self.emitter.emit(&SessionEvent::StateChanged(snapshot));
        Ok(payload)
    }

    /// Persist updated user settings.
    ///
    /// # Errors
    ///
    /// The normalized call failure.
    pub async fn update_settings(&self, settings: UserSettings) -> RequestResult<()> {
        self.settings_op.run(settings).await
    }

    /// Sign out locally: drop the credential and reset the profile.
    pub fn logout(&self) {
        tracing::info!("signing out");
        self.credentials.clear();
        let snapshot = {
            let mut profile = self.lock_profile();
            *profile = SessionProfile::anonymous();
            profile.clone()
        };
        self.emitter.emit(&SessionEvent::LoggedOut);
        self.emitter.emit(&SessionEvent::StateChanged(snapshot));
    }

    /// Snapshot of the current profile.
    ///
    /// # Panics
    ///
    /// Never panics; a poisoned lock is recovered.
    #[must_use]
    pub fn profile(&self) -> SessionProfile {
        self.lock_profile().clone()
    }

    /// Whether a credential is currently held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock_profile().is_authenticated()
    }

    /// The shared credential cell transports read at dispatch time.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        self.credentials.clone()
    }

    /// Subscribe to successful logins.
    pub fn on_logged_in<F>(&self, handler: F) -> Handle
    where
        F: Fn(&SessionProfile) + Send + Sync + 'static,
    {
        self.emitter
            .subscribe(SessionEventKind::LoggedIn, move |event| {
                if let SessionEvent::LoggedIn(profile) = event {
                    handler(profile);
                }
                Ok(())
            })
    }

    /// Subscribe to sign-outs.
    pub fn on_logged_out<F>(&self, handler: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.emitter
            .subscribe(SessionEventKind::LoggedOut, move |_| {
                handler();
                Ok(())
            })
    }

    /// Subscribe to the single per-expiry notification.
    pub fn on_expired<F>(&self, handler: F) -> Handle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.emitter.subscribe(SessionEventKind::Expired, move |_| {
            handler();
            Ok(())
        })
    }

    /// Subscribe to profile snapshot changes.
    pub fn on_state_changed<F>(&self, handler: F) -> Handle
    where
        F: Fn(&SessionProfile) + Send + Sync + 'static,
    {
        self.emitter
            .subscribe(SessionEventKind::StateChanged, move |event| {
                if let SessionEvent::StateChanged(profile) = event {
                    handler(profile);
                }
                Ok(())
            })
    }

    /// Adopt a fresh account payload: publish the token, re-arm expiry and
    /// broadcast the new state.
    fn adopt(&self, payload: AccountPayload) -> SessionProfile {
        self.credentials.set_token(payload.token.clone());
        self.expiry.rearm();
        let snapshot = {
            let mut profile = self.lock_profile();
            *profile = SessionProfile {
                id: payload.id,
                nickname: payload.nickname,
                avatar: payload.avatar,
                token: payload.token,
            };
            profile.clone()
        };
        tracing::info!(nickname = %snapshot.nickname, "signed in");
        self.emitter.emit(&SessionEvent::LoggedIn(snapshot.clone()));
        self.emitter
            .emit(&SessionEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    fn handle_expired(&self) {
        tracing::info!("session credential expired");
        self.credentials.clear();
        let snapshot = {
            let mut profile = self.lock_profile();
            profile.token.clear();
            profile.clone()
        };
        self.emitter.emit(&SessionEvent::Expired);
        self.emitter.emit(&SessionEvent::StateChanged(snapshot));
    }

    fn lock_profile(&self) -> MutexGuard<'_, SessionProfile> {
        self.profile.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_account_fields(email: &str, password: &str) -> RequestResult<()> {
    if email.trim().is_empty() {
        return Err(RequestError::Validation {
            field: "email",
            reason: "required",
        });
    }
    if password.trim().is_empty() {
        return Err(RequestError::Validation {
            field: "password",
            reason: "required",
        });
    }
    Ok(())
}

fn body<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
