//! Transport seam between operations and the wire.

use crate::credentials::Credentials;
use crate::envelope::Envelope;
use crate::error::{RequestError, RequestResult};
use async_trait::async_trait;
use serde_json::Value;

/// HTTP-ish verb for a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read-style call without a body.
    Get,
    /// Write-style call carrying a JSON body.
    Post,
}

/// One remote-call definition: verb, path and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec {
    /// Verb used for the call.
    pub method: Method,
    /// Path relative to the transport's base URL.
    pub path: String,
    /// JSON body; `Null` for body-less calls.
    pub body: Value,
}

impl CallSpec {
    /// Build a POST call with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body,
        }
    }

    /// Build a body-less GET call.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: Value::Null,
        }
    }
}

/// Remote-call collaborator injected into every operation.
///
/// Implementations resolve to the raw envelope; envelope-code handling lives
/// in [`crate::operation::RequestOperation`], not in transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one round trip and return the parsed envelope.
    async fn dispatch(&self, call: CallSpec) -> RequestResult<Envelope<Value>>;
}

/// Reqwest-backed transport for the console backend.
pub struct HttpTransport {
    base_url: String,
    credentials: Credentials,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Construct a transport rooted at `base_url`.
    ///
    /// The credential cell is shared, not captured: every dispatch reads the
    /// token current at that moment.
    #[must_use]
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, call: CallSpec) -> RequestResult<Envelope<Value>> {
        let url = format!("{}{}", self.base_url, call.path);
        let mut request = match call.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url).json(&call.body),
        };
        if let Some(token) = self.credentials.token() {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RequestError::transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::transport(format!(
                "http status {status} for {url}"
            )));
        }
        response
            .json::<Envelope<Value>>()
            .await
            .map_err(|err| RequestError::parse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry::ExpiryNotifier;
    use crate::operation::RequestOperation;
    use std::sync::{Arc, Mutex};

    #[test]
    fn call_spec_constructors_fill_defaults() {
        let get = CallSpec::get("/api/user/profile");
        assert_eq!(get.method, Method::Get);
        assert_eq!(get.body, Value::Null);

        let post = CallSpec::post("/api/task/list", serde_json::json!({ "page": 1 }));
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.path, "/api/task/list");
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let transport = HttpTransport::new("http://backend.local/", Credentials::new());
        assert_eq!(transport.base_url, "http://backend.local");
    }

    /// Reads the shared credential cell per dispatch, as the HTTP transport
    /// does for the Authorization header.
    struct RecordingTransport {
        credentials: Credentials,
        sent: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn dispatch(&self, _call: CallSpec) -> RequestResult<Envelope<Value>> {
            self.sent.lock().unwrap().push(self.credentials.token());
            Ok(Envelope::ok(serde_json::json!("ok")))
        }
    }

    #[tokio::test]
    async fn token_current_at_dispatch_is_the_one_sent() {
        let credentials = Credentials::new();
        let transport = Arc::new(RecordingTransport {
            credentials: credentials.clone(),
            sent: Mutex::new(Vec::new()),
        });
        let operation: RequestOperation<(), String> = RequestOperation::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            ExpiryNotifier::new(),
            |(): &()| CallSpec::get("/api/user/profile"),
        );

        // Set after construction: nothing may capture the token early.
        credentials.set_token("tok-1");
        operation.run(()).await.expect("first call");
        credentials.set_token("tok-2");
        operation.run(()).await.expect("second call");

        assert_eq!(
            *transport.sent.lock().unwrap(),
            vec![Some("tok-1".to_string()), Some("tok-2".to_string())]
        );
    }
}
