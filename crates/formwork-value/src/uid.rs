//! Instance identifiers
//!
//! A [`Uid`] is a short random alphanumeric id that stays with one control
//! instance for its whole lifetime, unlike the positional [`StructuralKey`]
//! which moves with the path. Uids are issued from a [`UidPool`] scoped to one
//! form instance; the pool regenerates on collision so live uids stay unique
//! within the scope.
//!
//! [`StructuralKey`]: crate::key::StructuralKey

use parking_lot::Mutex;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

const UID_LEN: usize = 9;

/// Short random instance identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Generate a fresh random uid
    ///
    /// Use [`UidPool::issue`] instead when the uid must be unique within a
    /// form scope; this constructor is for value-scoped `_uid` metadata where
    /// statistical uniqueness is enough.
    #[must_use]
    pub fn random() -> Self {
        let id: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(UID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Wrap an existing id (round-tripped from metadata)
    #[inline]
    #[must_use]
    pub fn from_existing(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Uid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collision-checked uid issuing scope
///
/// One pool per form instance. [`issue`](Self::issue) never returns an id
/// already held by a live control in the same scope; [`release`](Self::release)
/// must be called when the control is cleaned up.
#[derive(Debug, Default)]
pub struct UidPool {
    live: Mutex<HashSet<String>>,
}

impl UidPool {
    /// Create an empty pool
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a uid unique among live controls in this scope
    #[must_use]
    pub fn issue(&self) -> Uid {
        let mut live = self.live.lock();
        loop {
            let candidate = Uid::random();
            if live.insert(candidate.0.clone()) {
                return candidate;
            }
        }
    }

    /// Reserve a specific id (used when adopting a persisted uid)
    ///
    /// Returns `false` when the id is already live, in which case the caller
    /// should fall back to [`issue`](Self::issue).
    pub fn reserve(&self, uid: &Uid) -> bool {
        self.live.lock().insert(uid.0.clone())
    }

    /// Release a uid when its control is cleaned up
    pub fn release(&self, uid: &Uid) {
        self.live.lock().remove(&uid.0);
    }

    /// Number of live uids
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    /// True when no uids are live
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_random_length() {
        let uid = Uid::random();
        assert_eq!(uid.as_str().len(), UID_LEN);
        assert!(uid.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn pool_issue_and_release() {
        let pool = UidPool::new();
        let uid = pool.issue();
        assert_eq!(pool.len(), 1);
        pool.release(&uid);
        assert!(pool.is_empty());
    }

    #[test]
    fn pool_reserve_detects_collision() {
        let pool = UidPool::new();
        let uid = pool.issue();
        assert!(!pool.reserve(&uid));
        let other = Uid::random();
        assert!(pool.reserve(&other));
    }

    #[test]
    fn pool_issued_uids_are_distinct() {
        let pool = UidPool::new();
        let first = pool.issue();
        let second = pool.issue();
        assert_ne!(first, second);
    }
}
