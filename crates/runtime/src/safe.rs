//! Journaled mutable state (§4.6). A [`Safe<T>`] is any datum a contract
//! owns that must be able to roll back to its last-committed value if the
//! enclosing call reverts: primitives, strings, addresses, ordered
//! collections, mappings all go through the same `get`/`set` pair.
//!
//! `SafeVec<T>` and `SafeMap<K, V>` are type aliases over `Safe<Vec<T>>` /
//! `Safe<HashMap<K, V>>`; their `insert`/`erase`/`assign` helpers register
//! the entire pre-image the first time the collection is touched in a
//! frame, exactly like a primitive `Safe<T>::set`.

use crate::logger::CallLogger;
use crate::RuntimeError;
use std::collections::HashMap;
use std::hash::Hash as StdHash;
use std::sync::{Arc, Mutex};

pub struct Safe<T: Clone + Send + 'static> {
    inner: Arc<Mutex<T>>,
}

impl<T: Clone + Send + 'static> Clone for Safe<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Safe<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    pub fn get(&self) -> T {
        self.inner.lock().expect("safe variable mutex poisoned").clone()
    }

    /// A stable identity for this variable's storage, used by the active
    /// frame to decide whether it has already captured this variable's
    /// pre-call value ("register on first mutation").
    fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Set a new value, registering an undo entry with the active frame the
    /// first time this variable is touched within it.
    pub fn set(&self, new_value: T, logger: &mut CallLogger) -> Result<(), RuntimeError> {
        logger.check_writable()?;
        let identity = self.identity();
        if logger.register_if_new(identity) {
            let old = self.get();
            let inner = self.inner.clone();
            let undo: Box<dyn FnOnce() + Send> = Box::new(move || {
                *inner.lock().expect("safe variable mutex poisoned") = old;
            });
            logger.push_undo(undo);
        }
        *self.inner.lock().expect("safe variable mutex poisoned") = new_value;
        Ok(())
    }
}

pub type SafeVec<T> = Safe<Vec<T>>;

impl<T: Clone + Send + 'static> Safe<Vec<T>> {
    pub fn push(&self, item: T, logger: &mut CallLogger) -> Result<(), RuntimeError> {
        let mut v = self.get();
        v.push(item);
        self.set(v, logger)
    }

    pub fn erase(&self, index: usize, logger: &mut CallLogger) -> Result<(), RuntimeError> {
        let mut v = self.get();
        if index < v.len() {
            v.remove(index);
        }
        self.set(v, logger)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("safe variable mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type SafeMap<K, V> = Safe<HashMap<K, V>>;

impl<K: StdHash + Eq + Clone + Send + 'static, V: Clone + Send + 'static> Safe<HashMap<K, V>> {
    pub fn insert(&self, key: K, value: V, logger: &mut CallLogger) -> Result<(), RuntimeError> {
        let mut m = self.get();
        m.insert(key, value);
        self.set(m, logger)
    }

    pub fn erase(&self, key: &K, logger: &mut CallLogger) -> Result<(), RuntimeError> {
        let mut m = self.get();
        m.remove(key);
        self.set(m, logger)
    }

    pub fn get_key(&self, key: &K) -> Option<V> {
        self.inner.lock().expect("safe variable mutex poisoned").get(key).cloned()
    }
}
