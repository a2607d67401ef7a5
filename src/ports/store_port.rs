//! Opaque persistent key-value and key-list store.

use crate::domain::error::SwingtraderError;

/// Values are stored as text; lists keep insertion order and may hold duplicates.
pub trait PersistentStore {
    fn get(&self, key: &str) -> Result<Option<String>, SwingtraderError>;

    fn set(&self, key: &str, value: &str) -> Result<(), SwingtraderError>;

    /// Removes the scalar value and the list stored under `key`.
    fn delete(&self, key: &str) -> Result<(), SwingtraderError>;

    fn list(&self, key: &str) -> Result<Vec<String>, SwingtraderError>;

    fn append(&self, key: &str, value: &str) -> Result<(), SwingtraderError>;

    /// Removes every list entry equal to `value`; returns how many were removed.
    fn remove_value(&self, key: &str, value: &str) -> Result<usize, SwingtraderError>;
}
