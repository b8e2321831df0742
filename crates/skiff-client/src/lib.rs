#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Remote-call plumbing for the Skiff console core.
//!
//! Layout: `envelope.rs` (response envelope + sentinel codes), `transport.rs`
//! (transport seam and the reqwest adapter), `credentials.rs` (process-wide
//! token cell read at dispatch time), `expiry.rs` (session-expiry dedup),
//! `operation.rs` (`RequestOperation` lifecycle wrapper).

pub mod credentials;
pub mod envelope;
pub mod error;
pub mod expiry;
pub mod operation;
pub mod transport;

pub use credentials::Credentials;
pub use envelope::{CODE_OK, CODE_SESSION_EXPIRED, Envelope};
pub use error::{RequestError, RequestResult};
pub use expiry::ExpiryNotifier;
pub use operation::{RequestEvent, RequestEventKind, RequestOperation, RequestState, RequestStatus};
pub use transport::{CallSpec, HttpTransport, Method, Transport};
