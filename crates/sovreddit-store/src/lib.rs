//! Session-scoped domain state for the sovreddit client.
//!
//! Holds confirmed entities, optimistic overlays with their compensations,
//! the list of writes awaiting confirmation, and the registry that keeps at
//! most one write per (user, entity) pair in flight.

pub mod error;
pub mod inflight;
pub mod pending;
pub mod state;

pub use error::{StoreError, StoreResult};
pub use inflight::{InFlightGuard, InFlightRegistry};
pub use pending::PendingWrite;
pub use state::{Compensation, DomainStore, PROVISIONAL_PREFIX};
