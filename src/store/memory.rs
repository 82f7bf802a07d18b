//! In-memory [`ConfigStore`] / [`ReportArchive`] implementation for tests.
//!
//! Collections live behind `std::sync::RwLock`; every save replaces the whole
//! collection, like the SQLite backend.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{IntelConfig, Report};

use super::{ConfigStore, ReportArchive};

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    configs: RwLock<Vec<IntelConfig>>,
    active: RwLock<Option<String>>,
    reports: RwLock<Vec<Report>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the given configuration sets.
    pub fn with_configs(configs: Vec<IntelConfig>) -> Self {
        Self {
            configs: RwLock::new(configs),
            ..Self::default()
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn load(&self) -> Result<Vec<IntelConfig>> {
        Ok(self.configs.read().map_err(poisoned)?.clone())
    }

    async fn save(&self, configs: &[IntelConfig]) -> Result<()> {
        *self.configs.write().map_err(poisoned)? = configs.to_vec();
        Ok(())
    }

    async fn active_id(&self) -> Result<Option<String>> {
        Ok(self.active.read().map_err(poisoned)?.clone())
    }

    async fn set_active_id(&self, id: &str) -> Result<()> {
        *self.active.write().map_err(poisoned)? = Some(id.to_string());
        Ok(())
    }
}

#[async_trait]
impl ReportArchive for InMemoryStore {
    async fn load(&self) -> Result<Vec<Report>> {
        Ok(self.reports.read().map_err(poisoned)?.clone())
    }

    async fn save(&self, reports: &[Report]) -> Result<()> {
        *self.reports.write().map_err(poisoned)? = reports.to_vec();
        Ok(())
    }
}
