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

//! Hierarchical navigation engine for the Skiff console core.
//!
//! A declarative nested route configuration is flattened once into an
//! immutable [`RouteTable`]; [`NavigationHistory`] then drives transitions
//! through `Resolving → Guarding → Committing`, keeping sibling view
//! instances alive across route changes and enforcing async guards that may
//! redirect (remembering the original target) or reject.
//!
//! Layout: `route.rs` (config and table), `guard.rs` (guard seam), `view.rs`
//! (live view instances), `history.rs` (the transition engine).

mod error;
mod guard;
mod history;
mod route;
mod view;

pub use error::{NavError, NavResult};
pub use guard::{GuardOutcome, RouteGuard};
pub use history::{
    HistoryEntry, NavEvent, NavEventKind, NavMode, NavPhase, NavigateOptions, NavigationHistory,
    ViewChange,
};
pub use route::{RouteNode, RouteSpec, RouteTable};
pub use view::{ViewEvent, ViewEventKind, ViewInstance, ViewLifecycle};
