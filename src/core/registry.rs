//! Store registry
//!
//! Application-owned map of stores by name. The HTTP binding serves every
//! registered store, and hooks reach sibling stores through it.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{StoreError, StoreResult};
use super::pipeline::Store;

/// Stores by name
#[derive(Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, Arc<Store>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under its descriptor name
    pub fn register(&mut self, store: Store) -> StoreResult<Arc<Store>> {
        let name = store.name().to_string();
        if self.stores.contains_key(&name) {
            return Err(StoreError::internal(format!(
                "store '{}' is already registered",
                name
            )));
        }
        let store = Arc::new(store);
        self.stores.insert(name, Arc::clone(&store));
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Store>> {
        self.stores.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Store>> {
        self.stores.values()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResourceDescriptor;
    use crate::driver::MemoryDriver;

    fn store(name: &str) -> Store {
        Store::new(ResourceDescriptor::new(name), Arc::new(MemoryDriver::new("id")))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = StoreRegistry::new();
        registry.register(store("people")).unwrap();
        registry.register(store("pets")).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("people").is_some());
        assert!(registry.get("cars").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["people", "pets"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = StoreRegistry::new();
        registry.register(store("people")).unwrap();
        let err = registry.register(store("people")).unwrap_err();
        assert!(!err.is_http());
    }
}
