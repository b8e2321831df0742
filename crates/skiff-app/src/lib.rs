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

//! Composition root for the Skiff admin console.
//!
//! Declares the console route tree, the authentication guard and the
//! [`Application`] wiring that connects the session, the navigation engine,
//! persisted storage and the user-facing tip channel.

pub mod app;
pub mod auth;
pub mod routes;

pub use app::{Application, TipEvent, TipEventKind};
pub use auth::AuthGuard;
pub use routes::{HOME_ROUTE, LOGIN_ROUTE, console_routes, console_table};
