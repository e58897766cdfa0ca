use crate::output::{print_json, progress};
use crate::preflight;
use anyhow::Context;
use clap::{Args, ValueEnum};
use persistency_core::{
    config::{LayerMode, ProjectConfig},
    defaults::{DefaultsProvider, FsDefaults},
    engine::{self, IndexPolicy, RunParams, RunReport},
    paths,
    vcs::GitCli,
};
use std::path::{Path, PathBuf};

/// Version of the persistency binary embedded at compile time.
pub const PERSISTENCY_BINARY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Create the layer if it does not exist
    Seed,
    /// Require an existing layer to migrate from
    Strict,
}

impl From<ModeArg> for LayerMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Seed => LayerMode::Seed,
            ModeArg::Strict => LayerMode::Strict,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Layer directory relative to the project root
    #[arg(long)]
    pub dir: Option<String>,

    /// Agent identifier (e.g. claude, codex, gemini)
    #[arg(long, env = "PERSISTENCY_AGENT")]
    pub agent: Option<String>,

    /// Command the generated scripts use to launch the agent
    #[arg(long, env = "PERSISTENCY_COMMAND")]
    pub command: Option<String>,

    /// Branch treated as the production reference for freshness
    #[arg(long)]
    pub truth_branch: Option<String>,

    /// Project name used in generated documents
    #[arg(long)]
    pub project_name: Option<String>,

    /// Overwrite existing foundation documents
    #[arg(long)]
    pub force: bool,

    /// Copy the existing layer to a timestamped sibling before writing
    #[arg(long)]
    pub backup: bool,

    /// Previous layer to stage under ai-meta/legacy/<timestamp>/
    #[arg(long = "import", value_name = "PATH")]
    pub import_previous: Option<PathBuf>,

    /// Extra file or directory to copy into the layer (repeatable)
    #[arg(long = "asset", value_name = "PATH")]
    pub assets: Vec<PathBuf>,

    /// Supplemental note for the migration brief (repeatable)
    #[arg(long = "note", value_name = "TEXT")]
    pub notes: Vec<String>,

    /// seed creates a missing layer; strict refuses to start from nothing
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Regenerate index.md files instead of leaving them to agents
    #[arg(long)]
    pub recreate_indexes: bool,

    /// Verify the agent binary and credentials before writing anything
    #[arg(long)]
    pub check_agent: bool,
}

/// Merge flags over the project config file. Metadata defaults are applied
/// by the engine.
fn build_params(root: &Path, args: RunArgs, config: &ProjectConfig) -> RunParams {
    let mut params = RunParams::new(root);
    params.layer_dir = args.dir;
    if let Some(dir) = &config.default_dir {
        params.fallback_dir = dir.clone();
    }
    params.project_name = args.project_name;
    params.agent = args.agent.or_else(|| config.agent.clone());
    params.command = args.command.or_else(|| config.command.clone());
    params.truth_branch = args.truth_branch.or_else(|| config.truth_branch.clone());
    params.mode = args
        .mode
        .map(LayerMode::from)
        .or(config.mode)
        .unwrap_or_default();
    params.index_policy = if args.recreate_indexes {
        IndexPolicy::Recreate
    } else {
        IndexPolicy::CreateOnce
    };
    params.force = args.force;
    params.backup = args.backup;
    params.import_previous = args.import_previous;
    params.assets = args.assets;
    params.notes = args.notes;
    params
}

pub fn run(root: &Path, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let config = ProjectConfig::load(root).context("failed to load persistency.yaml")?;
    config.validate()?;
    let check_agent = args.check_agent;
    let params = build_params(root, args, &config);
    let defaults = FsDefaults::new(root, params.fallback_dir.clone());

    if check_agent {
        let previous = defaults.load().metadata;
        let agent = params
            .agent
            .clone()
            .or_else(|| previous.as_ref().map(|m| m.agent.clone()))
            .ok_or_else(|| persistency_core::PersistencyError::MissingParameter("agent".into()))?;
        let command = params
            .command
            .clone()
            .or_else(|| {
                previous
                    .filter(|m| m.agent == agent)
                    .map(|m| m.command)
            })
            .unwrap_or_else(|| agent.clone());
        let located = preflight::check(&agent, &command)?;
        if !json {
            println!("Agent '{agent}' found at {}", located.display());
        }
    }

    if !json {
        println!("Reconciling persistency layer in: {}", root.display());
    }

    let vcs = GitCli::new(root);
    let report = engine::run(&params, &vcs, &defaults, chrono::Utc::now())
        .with_context(|| format!("persistency run failed in {}", root.display()))?;

    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("  layer:   {} ({:?})", report.layer_dir, report.resolved_from);
    if let Some(backup) = &report.backup {
        progress("backup", backup);
    }
    for asset in &report.installed_assets {
        progress("asset", asset);
    }
    for write in &report.writes {
        progress(&write.status.to_string(), &write.path);
    }
    for warning in &report.warnings {
        progress("warning", &warning.to_string());
    }

    let layout = &report.layout;
    if !layout.missing_canonical.is_empty() && report.layer_existed {
        println!("\nRecreated missing domains: {}", layout.missing_canonical.join(", "));
    }
    if !layout.unreferenced_extras.is_empty() {
        println!(
            "Unreferenced directories: {}",
            layout.unreferenced_extras.join(", ")
        );
    }
    if !report.legacy_sources.is_empty() {
        println!("Legacy sources to reconcile: {}", report.legacy_sources.join(", "));
    }

    println!(
        "\nPersistency layer ready (persistency v{PERSISTENCY_BINARY_VERSION}, truth branch {}).",
        report.metadata.truth_branch
    );
    println!(
        "Next: ./{} to hand {} to {}",
        paths::UPSERT_SCRIPT_FILE,
        paths::UPSERT_PROMPT_FILE,
        report.metadata.agent
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    fn args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["persistency"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args
    }

    #[test]
    fn flags_override_config_file() {
        let config = ProjectConfig {
            mode: Some(LayerMode::Strict),
            agent: Some("codex".into()),
            truth_branch: Some("release".into()),
            default_dir: Some("kb".into()),
            ..Default::default()
        };
        let p = build_params(
            Path::new("/p"),
            args(&["--agent", "claude", "--mode", "seed", "--note", "a", "--note", "b"]),
            &config,
        );
        assert_eq!(p.agent.as_deref(), Some("claude"));
        assert_eq!(p.mode, LayerMode::Seed);
        assert_eq!(p.truth_branch.as_deref(), Some("release"));
        assert_eq!(p.fallback_dir, "kb");
        assert_eq!(p.notes, vec!["a", "b"]);
    }

    #[test]
    fn config_mode_applies_without_flag() {
        let config = ProjectConfig {
            mode: Some(LayerMode::Strict),
            ..Default::default()
        };
        let p = build_params(Path::new("/p"), args(&["--recreate-indexes"]), &config);
        assert_eq!(p.mode, LayerMode::Strict);
        assert_eq!(p.index_policy, IndexPolicy::Recreate);
        assert_eq!(p.fallback_dir, paths::DEFAULT_LAYER_DIR);
    }
}
