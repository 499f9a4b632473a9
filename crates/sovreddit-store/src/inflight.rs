use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use sovreddit_types::InFlightKey;

use crate::error::{StoreError, StoreResult};

/// Keys of writes that are submitted but not yet settled.
///
/// Cloning yields another handle onto the same registry.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    keys: Arc<Mutex<HashSet<InFlightKey>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, failing if a write for it is still outstanding
    pub fn try_acquire(&self, key: InFlightKey) -> StoreResult<InFlightGuard> {
        let mut keys = self.lock();
        if !keys.insert(key.clone()) {
            return Err(StoreError::KeyInFlight(key));
        }
        debug!("Acquired in-flight key {}", key);

        Ok(InFlightGuard {
            registry: self.clone(),
            key,
        })
    }

    pub fn is_in_flight(&self, key: &InFlightKey) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn release(&self, key: &InFlightKey) {
        if self.lock().remove(key) {
            debug!("Released in-flight key {}", key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<InFlightKey>> {
        // The set stays consistent even if a holder panicked
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Holds an in-flight key; dropping it releases the key
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    key: InFlightKey,
}

impl InFlightGuard {
    pub fn key(&self) -> &InFlightKey {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sovreddit_types::{CommandKind, Identity};

    fn vote_key(post: &str) -> InFlightKey {
        InFlightKey {
            author: Identity::from_public_key(&[1u8; 32]),
            kind: CommandKind::CastVote,
            target: post.to_string(),
        }
    }

    #[test]
    fn test_second_acquire_is_refused() {
        let registry = InFlightRegistry::new();
        let _guard = registry.try_acquire(vote_key("p1")).unwrap();

        let err = registry.try_acquire(vote_key("p1")).unwrap_err();
        assert_eq!(err, StoreError::KeyInFlight(vote_key("p1")));
    }

    #[test]
    fn test_distinct_targets_do_not_conflict() {
        let registry = InFlightRegistry::new();
        let _a = registry.try_acquire(vote_key("p1")).unwrap();
        let _b = registry.try_acquire(vote_key("p2")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_drop_releases_key() {
        let registry = InFlightRegistry::new();
        let guard = registry.try_acquire(vote_key("p1")).unwrap();
        assert!(registry.is_in_flight(guard.key()));

        drop(guard);
        assert!(registry.is_empty());
        assert!(registry.try_acquire(vote_key("p1")).is_ok());
    }
}
