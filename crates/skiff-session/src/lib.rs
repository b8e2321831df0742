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

//! Session ownership for the Skiff console core.
//!
//! A [`Session`] owns the signed-in profile and every account-related remote
//! call. It is the sole consumer of the client crate's expiry notifier: when
//! a credential lapses it drops authentication state and emits
//! [`SessionEvent::Expired`] exactly once, and a fresh login re-arms the
//! notifier and publishes the new token through the shared credential cell.

pub mod session;
pub mod types;

pub use session::{Session, SessionEvent, SessionEventKind};
pub use types::{
    AccountPayload, PathSettings, ProfilePayload, SessionProfile, SiteSettings, TrackerTokens,
    UserSettings,
};
