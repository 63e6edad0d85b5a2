//! Persistence seam for the last known endpoint set.
//!
//! The connection manager saves the endpoint set every time `start` supplies
//! one, and `resume` loads it back after a process restart.  Losing the stored
//! set is not an error: the manager simply stays idle until pairing supplies a
//! new one.

use std::sync::Mutex;

use keyrelay_core::EndpointSet;
use thiserror::Error;

/// A store operation failed.  Always logged, never fatal.
#[derive(Debug, Error)]
#[error("endpoint store failure: {message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Wraps any displayable error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Where the last known endpoint set lives between runs.
#[cfg_attr(test, mockall::automock)]
pub trait EndpointStore: Send + Sync {
    /// Returns the stored set, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<EndpointSet>, StoreError>;

    /// Replaces the stored set.
    fn save(&self, endpoints: &EndpointSet) -> Result<(), StoreError>;
}

/// An endpoint store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryEndpointStore {
    inner: Mutex<Option<EndpointSet>>,
}

impl MemoryEndpointStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `endpoints`.
    pub fn with(endpoints: EndpointSet) -> Self {
        Self {
            inner: Mutex::new(Some(endpoints)),
        }
    }
}

impl EndpointStore for MemoryEndpointStore {
    fn load(&self) -> Result<Option<EndpointSet>, StoreError> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| StoreError::new("memory store lock poisoned"))
    }

    fn save(&self, endpoints: &EndpointSet) -> Result<(), StoreError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::new("memory store lock poisoned"))?;
        *guard = Some(endpoints.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_starts_empty() {
        let store = MemoryEndpointStore::new();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_memory_store_save_replaces_previous_set() {
        // Arrange
        let store = MemoryEndpointStore::with(EndpointSet::new(["10.0.0.1"], 1000));

        // Act
        store
            .save(&EndpointSet::new(["10.0.0.5", "10.0.0.9"], 38745))
            .unwrap();

        // Assert
        assert_eq!(
            store.load().unwrap(),
            Some(EndpointSet::new(["10.0.0.5", "10.0.0.9"], 38745))
        );
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::new("disk full");
        assert_eq!(err.to_string(), "endpoint store failure: disk full");
    }
}
