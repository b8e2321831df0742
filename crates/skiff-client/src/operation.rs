//! One-at-a-time wrapper around a remote-call definition.

use crate::envelope::{CODE_OK, CODE_SESSION_EXPIRED};
use crate::error::{RequestError, RequestResult};
use crate::expiry::ExpiryNotifier;
use crate::transport::{CallSpec, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use skiff_events::{DomainEvent, Emitter, Handle};
use std::sync::{Arc, Mutex, MutexGuard};

/// Lifecycle phase of a request operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestStatus {
    /// No call has been issued yet.
    #[default]
    Idle,
    /// A call is in flight.
    Pending,
    /// The latest call succeeded.
    Success,
    /// The latest call failed.
    Failed,
}

/// Snapshot of an operation's normalized state.
#[derive(Debug, Clone)]
pub struct RequestState<T> {
    /// Current lifecycle phase.
    pub status: RequestStatus,
    /// Payload of the latest successful call.
    pub data: Option<T>,
    /// Error of the latest failed call.
    pub error: Option<RequestError>,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            status: RequestStatus::Idle,
            data: None,
            error: None,
        }
    }
}

/// Events published across one call's lifecycle.
#[derive(Debug, Clone)]
pub enum RequestEvent<T: Clone + Send + 'static> {
    /// Pending flag flipped.
    LoadingChanged(bool),
    /// The call completed with view-shaped data.
    Succeeded(T),
    /// The call failed; session expiry is excluded and reported through the
    /// expiry notifier instead.
    Failed(RequestError),
}

/// Discriminator for [`RequestEvent`] subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestEventKind {
    /// Channel for [`RequestEvent::LoadingChanged`].
    Loading,
    /// Channel for [`RequestEvent::Succeeded`].
    Success,
    /// Channel for [`RequestEvent::Failed`].
    Failed,
}

impl<T: Clone + Send + 'static> DomainEvent for RequestEvent<T> {
    type Kind = RequestEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            Self::LoadingChanged(_) => RequestEventKind::Loading,
            Self::Succeeded(_) => RequestEventKind::Success,
            Self::Failed(_) => RequestEventKind::Failed,
        }
    }
}

type DefineFn<A> = dyn Fn(&A) -> CallSpec + Send + Sync;
type MapFn<T> = dyn Fn(Value) -> RequestResult<T> + Send + Sync;

/// Wraps one remote-call definition with a one-at-a-time lifecycle.
///
/// A `run` issued while another is pending fails fast with
/// [`RequestError::Busy`] without launching a duplicate call or touching the
/// in-flight outcome. Outcomes for the same instance therefore never
/// interleave; staleness across *different* filter generations is handled one
/// level up, by the list store.
pub struct RequestOperation<A, T: Clone + Send + 'static> {
    transport: Arc<dyn Transport>,
    expiry: ExpiryNotifier,
    define: Arc<DefineFn<A>>,
    map: Arc<MapFn<T>>,
    state: Arc<Mutex<RequestState<T>>>,
    emitter: Emitter<RequestEvent<T>>,
}

impl<A, T> RequestOperation<A, T>
where
    A: Send + Sync,
    T: Clone + Send + 'static,
{
    /// Construct an operation with an explicit payload mapper.
    ///
    /// The mapper is the post-processing hook reshaping the raw `data`
    /// payload into view-shaped data; a mapper failure resolves the call as
    /// [`RequestError::Parse`], it never escapes.
    pub fn with_mapper<D, M>(
        transport: Arc<dyn Transport>,
        expiry: ExpiryNotifier,
        define: D,
        map: M,
    ) -> Self
    where
        D: Fn(&A) -> CallSpec + Send + Sync + 'static,
        M: Fn(Value) -> RequestResult<T> + Send + Sync + 'static,
    {
        Self {
            transport,
            expiry,
            define: Arc::new(define),
            map: Arc::new(map),
            state: Arc::new(Mutex::new(RequestState::default())),
            emitter: Emitter::new(),
        }
    }

    /// Issue the call, waiting for its normalized outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Busy`] while another call is pending, and the
    /// normalized transport/protocol/parse failure otherwise.
    pub async fn run(&self, args: A) -> RequestResult<T> {
        {
            let mut state = self.lock_state();
            if state.status == RequestStatus::Pending {
                return Err(RequestError::Busy);
            }
            state.status = RequestStatus::Pending;
            state.error = None;
        }
        self.emitter.emit(&RequestEvent::LoadingChanged(true));

        let call = (self.define)(&args);
        tracing::debug!(path = %call.path, "dispatching remote call");
        let outcome = match self.transport.dispatch(call).await {
            Ok(envelope) => match envelope.code {
                CODE_OK => (self.map)(envelope.data.unwrap_or(Value::Null)),
                CODE_SESSION_EXPIRED => {
                    self.expiry.notify();
                    Err(RequestError::SessionExpired)
                }
                code => Err(RequestError::Protocol {
                    code,
                    msg: envelope.msg,
                }),
            },
            Err(error) => Err(error),
        };

        {
            let mut state = self.lock_state();
            match &outcome {
                Ok(data) => {
                    state.status = RequestStatus::Success;
                    state.data = Some(data.clone());
                    state.error = None;
                }
                Err(error) => {
                    state.status = RequestStatus::Failed;
                    state.error = Some(error.clone());
                }
            }
        }
        self.emitter.emit(&RequestEvent::LoadingChanged(false));
        match &outcome {
            Ok(data) => self.emitter.emit(&RequestEvent::Succeeded(data.clone())),
            // The expired sentinel must not surface as a generic failure.
            Err(RequestError::SessionExpired) => {}
            Err(error) => self.emitter.emit(&RequestEvent::Failed(error.clone())),
        }
        outcome
    }

    /// Snapshot of the current state.
    ///
    /// # Panics
    ///
    /// Never panics; a poisoned lock is recovered.
    #[must_use]
    pub fn state(&self) -> RequestState<T> {
        self.lock_state().clone()
    }

    /// Whether a call is currently in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.lock_state().status == RequestStatus::Pending
    }

    /// Subscribe to success outcomes.
    pub fn on_success<F>(&self, handler: F) -> Handle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.emitter
            .subscribe(RequestEventKind::Success, move |event| {
                if let RequestEvent::Succeeded(data) = event {
                    handler(data);
                }
                Ok(())
            })
    }

    /// Subscribe to broadcast failures (session expiry excluded).
    pub fn on_failed<F>(&self, handler: F) -> Handle
    where
        F: Fn(&RequestError) + Send + Sync + 'static,
    {
        self.emitter
            .subscribe(RequestEventKind::Failed, move |event| {
                if let RequestEvent::Failed(error) = event {
                    handler(error);
                }
                Ok(())
            })
    }

    /// Subscribe to pending-flag changes.
    pub fn on_loading<F>(&self, handler: F) -> Handle
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.emitter
            .subscribe(RequestEventKind::Loading, move |event| {
                if let RequestEvent::LoadingChanged(loading) = event {
                    handler(*loading);
                }
                Ok(())
            })
    }

    /// Event channel of this operation.
    #[must_use]
    pub fn emitter(&self) -> &Emitter<RequestEvent<T>> {
        &self.emitter
    }

    /// Fresh operation sharing this one's definition, transport and
    /// subscribers, with an idle lifecycle of its own.
    ///
    /// Used by callers that supersede an in-flight call (the list store's
    /// filter generations): the old instance keeps its one-at-a-time
    /// invariant and resolves on its own, while new calls start here.
    #[must_use]
    pub fn renew(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            expiry: self.expiry.clone(),
            define: Arc::clone(&self.define),
            map: Arc::clone(&self.map),
            state: Arc::new(Mutex::new(RequestState::default())),
            emitter: self.emitter.clone(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RequestState<T>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<A, T> RequestOperation<A, T>
where
    A: Send + Sync,
    T: Clone + Send + DeserializeOwned + 'static,
{
    /// Construct an operation whose payload deserializes directly into `T`.
    pub fn new<D>(transport: Arc<dyn Transport>, expiry: ExpiryNotifier, define: D) -> Self
    where
        D: Fn(&A) -> CallSpec + Send + Sync + 'static,
    {
        Self::with_mapper(transport, expiry, define, |value| {
            serde_json::from_value(value).map_err(|err| RequestError::parse(err.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct StubTransport {
        reply: Envelope<Value>,
        calls: AtomicUsize,
    }

    impl StubTransport {
        fn new(reply: Envelope<Value>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn dispatch(&self, _call: CallSpec) -> RequestResult<Envelope<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    /// Blocks each dispatch until released, to hold an operation pending.
    struct GatedTransport {
        release: Notify,
        reply: Envelope<Value>,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn dispatch(&self, _call: CallSpec) -> RequestResult<Envelope<Value>> {
            self.release.notified().await;
            Ok(self.reply.clone())
        }
    }

    fn profile_operation(
        transport: Arc<dyn Transport>,
        expiry: ExpiryNotifier,
    ) -> RequestOperation<(), String> {
        RequestOperation::new(transport, expiry, |(): &()| {
            CallSpec::get("/api/user/profile")
        })
    }

    #[tokio::test]
    async fn success_unwraps_the_envelope_payload() {
        let transport = StubTransport::new(Envelope::ok(json!("alice")));
        let operation = profile_operation(transport, ExpiryNotifier::new());

        let data = operation.run(()).await.expect("success");
        assert_eq!(data, "alice");
        let state = operation.state();
        assert_eq!(state.status, RequestStatus::Success);
        assert_eq!(state.data.as_deref(), Some("alice"));
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn nonzero_code_becomes_protocol_failure_and_broadcasts() {
        let transport = StubTransport::new(Envelope::err(1001, "quota exceeded"));
        let operation = profile_operation(transport, ExpiryNotifier::new());
        let failures = Arc::new(Mutex::new(Vec::new()));
        {
            let failures = Arc::clone(&failures);
            operation.on_failed(move |error| {
                failures.lock().unwrap().push(error.clone());
            });
        }

        let error = operation.run(()).await.expect_err("failure");
        assert_eq!(
            error,
            RequestError::Protocol {
                code: 1001,
                msg: "quota exceeded".to_string()
            }
        );
        assert_eq!(error.user_message(), "quota exceeded");
        assert_eq!(failures.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_run_while_pending_fails_fast_with_busy() {
        let transport = Arc::new(GatedTransport {
            release: Notify::new(),
            reply: Envelope::ok(json!("alice")),
        });
        let operation = Arc::new(profile_operation(
            transport.clone(),
            ExpiryNotifier::new(),
        ));

        let first = {
            let operation = Arc::clone(&operation);
            tokio::spawn(async move { operation.run(()).await })
        };
        // Wait until the first call reaches the transport.
        while !operation.is_pending() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert_eq!(operation.run(()).await, Err(RequestError::Busy));

        transport.release.notify_one();
        let outcome = first.await.expect("task");
        assert_eq!(outcome, Ok("alice".to_string()));
        // The Busy rejection never disturbed the first call's outcome.
        assert_eq!(operation.state().status, RequestStatus::Success);
    }

    #[tokio::test]
    async fn expired_sentinel_reports_once_and_skips_generic_broadcast() {
        let transport = StubTransport::new(Envelope::err(CODE_SESSION_EXPIRED, "expired"));
        let expiry = ExpiryNotifier::new();
        let expiries = Arc::new(AtomicUsize::new(0));
        {
            let expiries = Arc::clone(&expiries);
            expiry.on_expired(move || {
                expiries.fetch_add(1, Ordering::SeqCst);
            });
        }
        let operation = profile_operation(transport, expiry.clone());
        let failures = Arc::new(AtomicUsize::new(0));
        {
            let failures = Arc::clone(&failures);
            operation.on_failed(move |_| {
                failures.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(operation.run(()).await, Err(RequestError::SessionExpired));
        assert_eq!(operation.run(()).await, Err(RequestError::SessionExpired));
        assert_eq!(expiries.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mapper_failure_resolves_as_parse_error() {
        let transport = StubTransport::new(Envelope::ok(json!({ "unexpected": true })));
        let operation: RequestOperation<(), String> = RequestOperation::with_mapper(
            transport,
            ExpiryNotifier::new(),
            |(): &()| CallSpec::get("/api/user/profile"),
            |_| Err(RequestError::parse("shape mismatch")),
        );

        let error = operation.run(()).await.expect_err("parse failure");
        assert!(matches!(error, RequestError::Parse { .. }));
        assert_eq!(operation.state().status, RequestStatus::Failed);
    }

    #[tokio::test]
    async fn loading_events_bracket_the_call() {
        let transport = StubTransport::new(Envelope::ok(json!("alice")));
        let operation = profile_operation(transport, ExpiryNotifier::new());
        let flips = Arc::new(Mutex::new(Vec::new()));
        {
            let flips = Arc::clone(&flips);
            operation.on_loading(move |loading| {
                flips.lock().unwrap().push(loading);
            });
        }

        operation.run(()).await.expect("success");
        assert_eq!(*flips.lock().unwrap(), vec![true, false]);
    }
}
