use crate::error::DriverError;
use crate::output::print_json;
use anyhow::Context;
use persistency_core::{
    config::ProjectConfig,
    defaults::{DefaultsProvider, FsDefaults},
    metadata::{compute_freshness, evaluate_freshness, Freshness, FreshnessAlarm, Metadata},
    paths,
    vcs::{GitCli, Vcs},
};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StatusReport<'a> {
    record: &'a Metadata,
    /// Freshness measured now, not as of the last run.
    current: Freshness,
    alarms: Vec<FreshnessAlarm>,
}

/// First twelve characters of a recorded commit; the record is hand-editable.
fn short_hash(commit: &str) -> String {
    commit.chars().take(12).collect()
}

pub fn run(root: &Path, fail_on_stale: bool, json: bool) -> anyhow::Result<()> {
    let config = ProjectConfig::load(root).context("failed to load persistency.yaml")?;
    config.validate()?;
    let fallback = config
        .default_dir
        .clone()
        .unwrap_or_else(|| paths::DEFAULT_LAYER_DIR.to_string());
    let defaults = FsDefaults::new(root, fallback.clone());
    let loaded = defaults.load();
    let Some(meta) = loaded.metadata else {
        let dir = loaded.layer_dir.unwrap_or(fallback);
        return Err(DriverError::NoRecord(paths::layer_path(root, &dir)).into());
    };

    let vcs = GitCli::new(root);
    let commits = if vcs.is_repository() {
        vcs.commit_distance(&meta.truth_branch, "HEAD")
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "live commit distance unavailable");
                meta.freshness.commits_since_truth
            })
    } else {
        meta.freshness.commits_since_truth
    };
    let current = compute_freshness(Some(&meta), commits, chrono::Utc::now());
    let alarms = evaluate_freshness(&current, &config.freshness);

    if json {
        print_json(&StatusReport {
            record: &meta,
            current,
            alarms: alarms.clone(),
        })?;
    } else {
        println!("Project:       {}", meta.project_name);
        println!("Layer:         {}", meta.persistency_dir);
        println!("Agent:         {} ({})", meta.agent, meta.command);
        println!(
            "Truth branch:  {}{}",
            meta.truth_branch,
            meta.truth_commit
                .as_deref()
                .map(|c| format!(" @ {}", short_hash(c)))
                .unwrap_or_default()
        );
        println!("Updated:       {}", meta.updated_at.to_rfc3339());
        println!(
            "Freshness:     {} days, {} commits",
            current.days_since_update, current.commits_since_truth
        );
        if alarms.is_empty() {
            println!("Status:        fresh");
        } else {
            for alarm in &alarms {
                println!("  stale:   {alarm}");
            }
        }
    }

    if fail_on_stale && !alarms.is_empty() {
        let summary = alarms
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(DriverError::Stale(summary).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_truncates_on_char_boundaries() {
        assert_eq!(short_hash("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash("ééééééééééééé"), "éééééééééééé");
    }
}
