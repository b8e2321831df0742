//! Typed publish/subscribe component for Skiff domain objects.
//!
//! Every stateful type in the console core holds an [`Emitter`] and delegates
//! typed subscribe/emit to it instead of inheriting an event base. Emission is
//! synchronous and ordered by subscription order; dispatch works from a
//! snapshot taken at emit start, so handlers may unsubscribe themselves or
//! re-enter `emit` safely. Handler failures are routed to a reserved error
//! channel and never returned to the emitter.

mod emitter;
mod error;

pub use emitter::{Emitter, Handle};
pub use error::{EventError, EventResult};

use std::fmt::Debug;
use std::hash::Hash;

/// Contract implemented by each domain's event enum.
///
/// `Kind` is the cheap discriminator used to address subscriptions, in the
/// manner of a `kind()` string on a wire event, while the event value itself
/// carries the payload.
pub trait DomainEvent: Clone + Send + 'static {
    /// Discriminator addressing one subscription channel.
    type Kind: Copy + Eq + Hash + Debug + Send;

    /// The discriminator for this event value.
    fn kind(&self) -> Self::Kind;
}
