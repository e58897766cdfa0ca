//! The persisted record of the last run.
//!
//! The record lives at `<layer>/.persistency-meta.json`, is fully replaced on
//! every run and seeds the defaults of the next one. Reads never fail: a
//! missing or malformed file is reported as "no previous record".

use crate::config::FreshnessThresholds;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    pub days_since_update: u64,
    pub commits_since_truth: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub project_name: String,
    pub project_path: String,
    pub agent: String,
    pub command: String,
    pub persistency_dir: String,
    pub truth_branch: String,
    #[serde(default)]
    pub truth_commit: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub freshness: Freshness,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installed_assets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legacy_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intake_notes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Metadata {
    /// Read the record at `path`. Absent or unparsable files yield `None`.
    pub fn read(path: &Path) -> Option<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable metadata record ignored");
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed metadata record ignored");
                None
            }
        }
    }

    /// Replace the record at `path` with `self`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut data = serde_json::to_string_pretty(self)?;
        data.push('\n');
        crate::io::atomic_write(path, data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Freshness
// ---------------------------------------------------------------------------

/// Days since the previous record (zero without one) plus the caller-supplied
/// commit distance from the truth branch.
pub fn compute_freshness(
    previous: Option<&Metadata>,
    commits_since_truth: u64,
    now: DateTime<Utc>,
) -> Freshness {
    let days_since_update = previous
        .map(|m| (now - m.updated_at).num_days().max(0) as u64)
        .unwrap_or(0);
    Freshness {
        days_since_update,
        commits_since_truth,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FreshnessAlarm {
    Stale { days: u64, max_days: i64 },
    Drift { commits: u64, max_commits: u64 },
}

impl fmt::Display for FreshnessAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale { days, max_days } => {
                write!(f, "last refreshed {days} days ago (threshold {max_days})")
            }
            Self::Drift {
                commits,
                max_commits,
            } => write!(
                f,
                "{commits} commits since the truth branch (threshold {max_commits})"
            ),
        }
    }
}

/// Compare raw freshness numbers against thresholds. Only values strictly
/// above a threshold raise an alarm.
pub fn evaluate_freshness(
    freshness: &Freshness,
    thresholds: &FreshnessThresholds,
) -> Vec<FreshnessAlarm> {
    let mut alarms = Vec::new();
    if freshness.days_since_update as i64 > thresholds.max_days {
        alarms.push(FreshnessAlarm::Stale {
            days: freshness.days_since_update,
            max_days: thresholds.max_days,
        });
    }
    if freshness.commits_since_truth > thresholds.max_commits {
        alarms.push(FreshnessAlarm::Drift {
            commits: freshness.commits_since_truth,
            max_commits: thresholds.max_commits,
        });
    }
    alarms
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn sample(updated_at: DateTime<Utc>) -> Metadata {
        Metadata {
            project_name: "demo".to_string(),
            project_path: "/work/demo".to_string(),
            agent: "claude".to_string(),
            command: "claude".to_string(),
            persistency_dir: "ai".to_string(),
            truth_branch: "main".to_string(),
            truth_commit: Some("abc123".to_string()),
            updated_at,
            freshness: Freshness::default(),
            installed_assets: Vec::new(),
            legacy_sources: vec!["ai/ai-meta/legacy/20260101T000000Z".to_string()],
            intake_notes: Vec::new(),
        }
    }

    #[test]
    fn freshness_ten_days_and_42_commits() {
        let now = Utc::now();
        let prev = sample(now - Duration::days(10));
        let f = compute_freshness(Some(&prev), 42, now);
        assert_eq!(
            f,
            Freshness {
                days_since_update: 10,
                commits_since_truth: 42
            }
        );
    }

    #[test]
    fn freshness_without_previous_is_zero_days() {
        let f = compute_freshness(None, 7, Utc::now());
        assert_eq!(f.days_since_update, 0);
        assert_eq!(f.commits_since_truth, 7);
    }

    #[test]
    fn freshness_clamps_future_timestamps() {
        let now = Utc::now();
        let prev = sample(now + Duration::days(3));
        assert_eq!(compute_freshness(Some(&prev), 0, now).days_since_update, 0);
    }

    #[test]
    fn write_then_read_uses_camel_case_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".persistency-meta.json");
        let meta = sample(Utc::now());
        meta.write(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"persistencyDir\": \"ai\""));
        assert!(raw.contains("\"legacySources\""));
        assert!(!raw.contains("installedAssets"));
        assert_eq!(Metadata::read(&path), Some(meta));
    }

    #[test]
    fn read_tolerates_missing_and_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".persistency-meta.json");
        assert!(Metadata::read(&path).is_none());
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Metadata::read(&path).is_none());
    }

    #[test]
    fn alarms_only_above_thresholds() {
        let thresholds = FreshnessThresholds::default();
        let at_limit = Freshness {
            days_since_update: 7,
            commits_since_truth: 200,
        };
        assert!(evaluate_freshness(&at_limit, &thresholds).is_empty());

        let over = Freshness {
            days_since_update: 8,
            commits_since_truth: 201,
        };
        let alarms = evaluate_freshness(&over, &thresholds);
        assert_eq!(alarms.len(), 2);
        assert!(alarms[0].to_string().contains("8 days"));
    }
}
