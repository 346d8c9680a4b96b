//! In-memory settings store.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{SettingsStore, StoredSettings};

#[derive(Default)]
pub struct MemorySettingsStore {
    settings: RwLock<StoredSettings>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<StoredSettings, DomainError> {
        self.settings
            .read()
            .map(|s| s.clone())
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "Settings lock poisoned"))
    }

    async fn save(&self, settings: &StoredSettings) -> Result<(), DomainError> {
        let mut stored = self
            .settings
            .write()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "Settings lock poisoned"))?;
        *stored = settings.clone();
        Ok(())
    }
}
