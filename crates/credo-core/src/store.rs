//! # Atomic In-Memory Document Store
//!
//! Thread-safe, cloneable key-value store used as the authoritative
//! runtime state for exchanges, offers and nonce counters.
//!
//! ## Concurrency model
//!
//! Every invariant-protecting mutation is a single store call executed
//! under one write lock: [`Store::insert_new`] for unique-key inserts,
//! [`Store::try_update`] for read-validate-update sequences, and
//! [`Store::update_where`] for filtered conditional updates. Callers never
//! compose a read followed by a write across two store calls, so there are
//! no TOCTOU races and no cross-entity in-process locks.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// The key already maps to a record; the insert was not applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("duplicate key: a record already exists for this key")]
pub struct DuplicateKey;

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not
/// `tokio::sync`) because the lock is never held across `.await` points.
/// `parking_lot::RwLock` is non-poisonable, so a panicking writer does not
/// permanently corrupt the store.
#[derive(Debug)]
pub struct Store<K, T>
where
    K: Eq + Hash + Clone + Send + Sync,
    T: Clone + Send + Sync,
{
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T>
where
    K: Eq + Hash + Clone + Send + Sync,
    T: Clone + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, T> Store<K, T>
where
    K: Eq + Hash + Clone + Send + Sync,
    T: Clone + Send + Sync,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: T) -> Option<T> {
        self.data.write().insert(key, value)
    }

    /// Insert a record only if the key is not already present.
    ///
    /// The existence check and the insert run under one write lock, so two
    /// concurrent `insert_new` calls for the same key cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateKey`] if a record already exists for the key.
    pub fn insert_new(&self, key: K, value: T) -> Result<(), DuplicateKey> {
        let mut guard = self.data.write();
        if guard.contains_key(&key) {
            return Err(DuplicateKey);
        }
        guard.insert(key, value);
        Ok(())
    }

    /// Retrieve a record by key.
    pub fn get(&self, key: &K) -> Option<T> {
        self.data.read().get(key).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Update a record in place. Returns the updated record, or `None` if
    /// not found.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(key) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure receives a `&mut T` and may inspect the current state,
    /// validate preconditions, mutate the record, and return `Ok(R)` or
    /// `Err(E)`. The entire operation runs under a single write lock,
    /// eliminating TOCTOU races between read and update.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(key).map(f)
    }

    /// Conditionally update a record: mutate only if `filter` holds.
    ///
    /// Filter evaluation and mutation run under one write lock. Returns
    /// the updated record if the filter matched, `None` if the record is
    /// absent or the filter rejected it. This is the in-memory equivalent
    /// of a conditional SQL `UPDATE ... WHERE`.
    pub fn update_where(
        &self,
        key: &K,
        filter: impl FnOnce(&T) -> bool,
        f: impl FnOnce(&mut T),
    ) -> Option<T> {
        let mut guard = self.data.write();
        match guard.get_mut(key) {
            Some(entry) if filter(entry) => {
                f(entry);
                Some(entry.clone())
            }
            _ => None,
        }
    }

    /// Remove a record by key.
    pub fn remove(&self, key: &K) -> Option<T> {
        self.data.write().remove(key)
    }

    /// Check if a record exists.
    pub fn contains(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl<K, T> Default for Store<K, T>
where
    K: Eq + Hash + Clone + Send + Sync,
    T: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
