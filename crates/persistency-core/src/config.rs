use crate::error::{PersistencyError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// LayerMode
// ---------------------------------------------------------------------------

/// Whether a run may seed a layer from nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerMode {
    /// Create the layer when it is absent.
    #[default]
    Seed,
    /// Refuse to run unless the layer already exists.
    Strict,
}

impl std::str::FromStr for LayerMode {
    type Err = PersistencyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "seed" => Ok(Self::Seed),
            "strict" => Ok(Self::Strict),
            other => Err(PersistencyError::InvalidParameter {
                name: "mode".to_string(),
                reason: format!("unknown mode '{other}', expected seed or strict"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// FreshnessThresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessThresholds {
    #[serde(default = "default_max_days")]
    pub max_days: i64,
    #[serde(default = "default_max_commits")]
    pub max_commits: u64,
}

fn default_max_days() -> i64 {
    7
}

fn default_max_commits() -> u64 {
    200
}

impl Default for FreshnessThresholds {
    fn default() -> Self {
        Self {
            max_days: default_max_days(),
            max_commits: default_max_commits(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

/// Optional `persistency.yaml` at the project root. Every field may be
/// omitted; flags override it and it overrides the stored metadata record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<LayerMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth_branch: Option<String>,
    #[serde(default)]
    pub freshness: FreshnessThresholds,
}

impl ProjectConfig {
    /// Load the project config; an absent file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::project_config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path).map_err(|e| PersistencyError::at(&path, e))?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&data).map_err(|source| PersistencyError::Config { path, source })
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.default_dir {
            paths::validate_layer_dir(dir)?;
        }
        if self.freshness.max_days < 0 {
            return Err(PersistencyError::InvalidParameter {
                name: "freshness.max_days".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
