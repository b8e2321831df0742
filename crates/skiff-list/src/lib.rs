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

//! Paginated-list state machine for the Skiff console core.
//!
//! The backend reports pagination either as an absolute offset
//! (`{page, page_size, total}`) or as an opaque cursor
//! (`{next_marker, no_more?}`). [`ListStore`] reconciles both shapes behind
//! one accumulated list with `init`/`search`/`reset`/`load_more` semantics.
//!
//! Layout: `params.rs` (fetch parameters), `payload.rs` (wire shapes and
//! normalization), `store.rs` (the state machine).

mod params;
mod payload;
mod store;

pub use params::{DEFAULT_PAGE_SIZE, FetchParams};
pub use payload::PagePayload;
pub use store::{ListEvent, ListEventKind, ListState, ListStore};
