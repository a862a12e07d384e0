use crate::db;
use crate::grading::{ComponentWeights, WeightsError};
use crate::listing::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WEIGHTS_KEY: &str = "grading.weights";
const PAGE_SIZE_KEY: &str = "listing.defaultPageSize";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Weights(#[from] WeightsError),
    #[error("defaultPageSize must be between 1 and 500, got {0}")]
    PageSize(i64),
}

/// Workspace-level settings, stored as JSON rows in `settings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub weights: ComponentWeights,
    pub default_page_size: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            weights: ComponentWeights::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub weights: Option<ComponentWeights>,
    pub default_page_size: Option<i64>,
}

impl WorkspaceConfig {
    /// Missing or unreadable rows fall back to the defaults.
    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = db::settings_get_json(conn, WEIGHTS_KEY)? {
            if let Ok(w) = serde_json::from_value::<ComponentWeights>(v) {
                if w.validate().is_ok() {
                    cfg.weights = w;
                }
            }
        }
        if let Some(v) = db::settings_get_json(conn, PAGE_SIZE_KEY)? {
            if let Some(n) = v.as_u64() {
                if (1..=MAX_PAGE_SIZE as u64).contains(&n) {
                    cfg.default_page_size = n as usize;
                }
            }
        }
        Ok(cfg)
    }

    pub fn apply(&self, patch: ConfigPatch) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        if let Some(w) = patch.weights {
            w.validate()?;
            next.weights = w;
        }
        if let Some(n) = patch.default_page_size {
            if n < 1 || n > MAX_PAGE_SIZE as i64 {
                return Err(ConfigError::PageSize(n));
            }
            next.default_page_size = n as usize;
        }
        Ok(next)
    }

    pub fn save(&self, conn: &Connection) -> anyhow::Result<()> {
        db::settings_set_json(conn, WEIGHTS_KEY, &serde_json::to_value(self.weights)?)?;
        db::settings_set_json(
            conn,
            PAGE_SIZE_KEY,
            &serde_json::json!(self.default_page_size),
        )?;
        Ok(())
    }
}
