//! Durable storage for both sides of the shadow setup.
//!
//! - [`RecordStore`] is the upstream's own system of record. It assigns
//!   identifiers and knows nothing about mirroring.
//! - [`ShadowStore`] is the local mirror: the same two entity kinds keyed by
//!   upstream identifiers, a raw read-query escape hatch, and the pending
//!   write ledger.
//!
//! Both sit on a single SQLite connection guarded by a mutex, so there is
//! exactly one writer per file at a time.

mod codec;
mod error;
mod record;
mod record_store;
mod schema;
mod shadow;

pub use error::StorageError;
pub use record::{EntityKind, MirrorState, PendingWrite};
pub use record_store::RecordStore;
pub use shadow::{QueryRow, ShadowStore};
