//! Persistence abstraction for Intel Hub.
//!
//! Two collections are persisted: the configuration sets and the report
//! archive. Both are loaded whole and saved whole after every change
//! (last writer wins). The [`ConfigStore`] and [`ReportArchive`] traits are
//! injected into [`Hub`](crate::hub::Hub) so the operations layer never
//! touches global state.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`sqlite::SqliteStore`] | `kv` table, one JSON blob per key |
//! | [`memory::InMemoryStore`] | tests |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IntelConfig, Report};

/// Key under which the configuration sets are stored.
pub const CONFIGS_KEY: &str = "intelligence_hub_configs";
/// Key under which the report archive is stored.
pub const REPORTS_KEY: &str = "intelligence_hub_reports";
/// Key under which the selected configuration id is stored.
pub const ACTIVE_CONFIG_KEY: &str = "active_config_id";

/// Load/save contract for configuration sets.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// All stored configuration sets, in saved order. Empty when nothing
    /// has been saved yet.
    async fn load(&self) -> Result<Vec<IntelConfig>>;

    /// Replace the stored configuration sets.
    async fn save(&self, configs: &[IntelConfig]) -> Result<()>;

    /// The id of the selected configuration, if one was ever stored.
    async fn active_id(&self) -> Result<Option<String>>;

    async fn set_active_id(&self, id: &str) -> Result<()>;
}

/// Load/save contract for the report archive (newest first).
#[async_trait]
pub trait ReportArchive: Send + Sync {
    async fn load(&self) -> Result<Vec<Report>>;

    async fn save(&self, reports: &[Report]) -> Result<()>;
}
