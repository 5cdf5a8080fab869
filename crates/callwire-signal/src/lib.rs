//! Signal channel for callwire
//!
//! Call negotiation in callwire does not use a dedicated signaling server. It
//! rides on the same persisted, append-only message log that carries ordinary
//! chat. This crate defines that log's interface as seen by the call core:
//!
//! - [`SignalRecord`] / [`RecordKind`]: the typed entries on a channel
//! - [`SignalChannel`]: append, subscribe, and query-latest-of-kind
//! - [`note`]: recognition of call events carried as free-text notes
//! - [`ChatSummary`] / [`snippet_for`]: the contact-list view used to spot
//!   incoming calls
//! - [`InMemorySignalChannel`]: a complete in-process implementation
//!
//! The transport gives no ordering or freshness guarantees beyond per-channel
//! timestamps; compensating for that is the consumer's job.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod error;
mod memory;
pub mod note;
mod record;
mod summary;

pub use self::channel::{DEFAULT_LOOKBACK, SignalChannel, SignalSubscription, SubscriptionId};
pub use self::error::SignalChannelError;
pub use self::memory::{InMemorySignalChannel, now_millis};
pub use self::record::{OutgoingRecord, RecordKind, SignalRecord};
pub use self::summary::{ChatSummary, PeerIdentity, SNIPPET_MAX_CHARS, snippet_for};
