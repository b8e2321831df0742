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

//! Typed persisted snapshot for the Skiff console core.
//!
//! A [`TypedStorage`] holds one JSON object keyed by top-level name, loads it
//! through a pluggable [`StorageBackend`] and overlays it onto declared
//! defaults. Loading is total: absent or unparseable text falls back to the
//! defaults wholesale.

pub mod backend;
pub mod error;
pub mod store;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use store::TypedStorage;
