//! In-process store for dry runs and tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::domain::error::SwingtraderError;
use crate::ports::store_port::PersistentStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
    lists: RefCell<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SwingtraderError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SwingtraderError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SwingtraderError> {
        self.values.borrow_mut().remove(key);
        self.lists.borrow_mut().remove(key);
        Ok(())
    }

    fn list(&self, key: &str) -> Result<Vec<String>, SwingtraderError> {
        Ok(self.lists.borrow().get(key).cloned().unwrap_or_default())
    }

    fn append(&self, key: &str, value: &str) -> Result<(), SwingtraderError> {
        self.lists
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    fn remove_value(&self, key: &str, value: &str) -> Result<usize, SwingtraderError> {
        let mut lists = self.lists.borrow_mut();
        let Some(items) = lists.get_mut(key) else {
            return Ok(0);
        };
        let before = items.len();
        items.retain(|v| v != value);
        Ok(before - items.len())
    }
}
