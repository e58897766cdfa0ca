//! One reconciliation run, stage by stage:
//!
//! `RESOLVE_PATH → LOAD_METADATA → BACKUP? → ENSURE_LAYOUT → STAGE_LEGACY? →
//! COPY_ASSETS → WRITE_FOUNDATIONS → WRITE_RUN_ARTIFACTS → WRITE_METADATA`
//!
//! A fatal error in any stage aborts the rest and is wrapped with the stage
//! name. The metadata record is written last so its `updatedAt` never claims
//! a run that did not finish.

use crate::brief::{self, BriefContext};
use crate::config::LayerMode;
use crate::defaults::{Defaults, DefaultsProvider};
use crate::error::{PersistencyError, Result};
use crate::layout::{self, LayoutAnalysis};
use crate::metadata::{self, Metadata};
use crate::reconcile::{self, Discipline, Warning, WarningKind, WriteOutcome};
use crate::resolver::{self, ResolvedFrom};
use crate::template::{render, Vars};
use crate::templates;
use crate::vcs::Vcs;
use crate::{io, paths};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// How `index.md` files are treated on reruns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Created once, then owned by agents.
    #[default]
    CreateOnce,
    /// Regenerated every run together with the foundations.
    Recreate,
}

/// Fully resolved inputs from the driver. `None` fields fall back to the
/// stored metadata record, then to built-in defaults.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub project_root: PathBuf,
    pub layer_dir: Option<String>,
    /// Layer directory used when neither argument, pointer nor metadata name one.
    pub fallback_dir: String,
    pub project_name: Option<String>,
    pub agent: Option<String>,
    pub command: Option<String>,
    pub truth_branch: Option<String>,
    pub mode: LayerMode,
    pub index_policy: IndexPolicy,
    pub force: bool,
    pub backup: bool,
    pub import_previous: Option<PathBuf>,
    pub assets: Vec<PathBuf>,
    pub notes: Vec<String>,
}

impl RunParams {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            layer_dir: None,
            fallback_dir: paths::DEFAULT_LAYER_DIR.to_string(),
            project_name: None,
            agent: None,
            command: None,
            truth_branch: None,
            mode: LayerMode::default(),
            index_policy: IndexPolicy::default(),
            force: false,
            backup: false,
            import_previous: None,
            assets: Vec::new(),
            notes: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ResolvePath,
    LoadMetadata,
    Backup,
    EnsureLayout,
    StageLegacy,
    CopyAssets,
    WriteFoundations,
    WriteRunArtifacts,
    WriteMetadata,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResolvePath => "resolve_path",
            Self::LoadMetadata => "load_metadata",
            Self::Backup => "backup",
            Self::EnsureLayout => "ensure_layout",
            Self::StageLegacy => "stage_legacy",
            Self::CopyAssets => "copy_assets",
            Self::WriteFoundations => "write_foundations",
            Self::WriteRunArtifacts => "write_run_artifacts",
            Self::WriteMetadata => "write_metadata",
        }
    }

    fn wrap(self, source: PersistencyError) -> PersistencyError {
        PersistencyError::Stage {
            stage: self.as_str(),
            source: Box::new(source),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub layer_dir: String,
    pub resolved_from: ResolvedFrom,
    pub layer_existed: bool,
    /// Layout as found before this run touched the layer.
    pub layout: LayoutAnalysis,
    pub backup: Option<String>,
    pub writes: Vec<WriteOutcome>,
    pub warnings: Vec<Warning>,
    pub legacy_sources: Vec<String>,
    pub unresolved_sources: Vec<String>,
    pub installed_assets: Vec<String>,
    pub stages: Vec<Stage>,
    pub metadata: Metadata,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

struct Identity {
    project_name: String,
    agent: String,
    command: String,
}

fn resolve_identity(params: &RunParams, previous: Option<&Metadata>) -> Result<Identity> {
    let non_empty = |s: &String| !s.trim().is_empty();
    let agent = params
        .agent
        .clone()
        .filter(non_empty)
        .or_else(|| previous.map(|m| m.agent.clone()).filter(non_empty))
        .ok_or_else(|| PersistencyError::MissingParameter("agent".to_string()))?;

    // A recorded command only applies to the agent it was recorded for.
    let command = params
        .command
        .clone()
        .filter(non_empty)
        .or_else(|| {
            previous
                .filter(|m| m.agent == agent)
                .map(|m| m.command.clone())
                .filter(non_empty)
        })
        .unwrap_or_else(|| agent.clone());

    let project_name = params
        .project_name
        .clone()
        .filter(non_empty)
        .or_else(|| previous.map(|m| m.project_name.clone()).filter(non_empty))
        .or_else(|| {
            params
                .project_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "project".to_string());

    Ok(Identity {
        project_name,
        agent,
        command,
    })
}

pub fn run(
    params: &RunParams,
    vcs: &dyn Vcs,
    defaults: &dyn DefaultsProvider,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let root = params.project_root.as_path();
    if !vcs.is_repository() {
        return Err(PersistencyError::NotARepository(root.to_path_buf()));
    }

    let mut stages = Vec::new();
    let mut warnings = Vec::new();

    // RESOLVE_PATH: every precondition is checked before the first write.
    let stored = defaults.load();
    let resolution =
        resolver::resolve_layer_dir(params.layer_dir.as_deref(), &stored, &params.fallback_dir)?;
    let layer_dir = resolution.layer_dir.clone();
    let layer = paths::layer_path(root, &layer_dir);
    let layer_existed = layer.is_dir();
    if params.mode == LayerMode::Strict && !layer_existed {
        return Err(PersistencyError::LayerNotFound(layer));
    }
    let previous = stored.metadata.as_ref();
    let identity = resolve_identity(params, previous)?;
    defaults
        .save(&Defaults {
            layer_dir: Some(layer_dir.clone()),
            metadata: None,
        })
        .map_err(|e| Stage::ResolvePath.wrap(e))?;
    tracing::info!(stage = %Stage::ResolvePath, layer_dir = %layer_dir, from = ?resolution.from);
    stages.push(Stage::ResolvePath);

    // LOAD_METADATA
    let truth_branch = crate::vcs::resolve_truth_branch(
        vcs,
        &[
            params.truth_branch.as_deref(),
            previous.map(|m| m.truth_branch.as_str()),
        ],
    )
    .unwrap_or_else(|| {
        warnings.push(Warning::new(
            WarningKind::VcsUnavailable,
            "truth_branch",
            "could not determine a truth branch; assuming main",
        ));
        "main".to_string()
    });
    let truth_commit = match vcs.commit_hash(&truth_branch) {
        Ok(hash) => Some(hash),
        Err(e) => {
            warnings.push(Warning::new(
                WarningKind::VcsUnavailable,
                truth_branch.clone(),
                format!("truth commit unavailable: {e}"),
            ));
            None
        }
    };
    let distance = if truth_commit.is_some() {
        match vcs.commit_distance(&truth_branch, "HEAD") {
            Ok(n) => n,
            Err(e) => {
                warnings.push(Warning::new(
                    WarningKind::VcsUnavailable,
                    truth_branch.clone(),
                    format!("commit distance unavailable: {e}"),
                ));
                0
            }
        }
    } else {
        0
    };
    let freshness = metadata::compute_freshness(previous, distance, now);
    let layout = layout::analyze(&layer).map_err(|e| Stage::LoadMetadata.wrap(e))?;
    tracing::info!(stage = %Stage::LoadMetadata, truth_branch = %truth_branch, days = freshness.days_since_update, commits = freshness.commits_since_truth);
    stages.push(Stage::LoadMetadata);

    let mut legacy_sources = Vec::new();
    if layer_existed && !layout.is_clean() {
        legacy_sources.push(layer_dir.clone());
    }

    // BACKUP
    let mut backup = None;
    if params.backup {
        if let Some(path) =
            reconcile::backup_layer(&layer, now).map_err(|e| Stage::Backup.wrap(e))?
        {
            let rel = paths::display_rel(root, &path);
            legacy_sources.push(rel.clone());
            backup = Some(rel);
        }
        tracing::info!(stage = %Stage::Backup, backup = ?backup);
        stages.push(Stage::Backup);
    }

    // ENSURE_LAYOUT
    io::ensure_dir(&layer).map_err(|e| Stage::EnsureLayout.wrap(e))?;
    for domain in paths::CANONICAL_DOMAINS {
        io::ensure_dir(&layer.join(domain)).map_err(|e| Stage::EnsureLayout.wrap(e))?;
    }
    tracing::info!(stage = %Stage::EnsureLayout, layer = %layer.display());
    stages.push(Stage::EnsureLayout);

    // STAGE_LEGACY
    let mut unresolved_sources = Vec::new();
    if let Some(source) = &params.import_previous {
        let source = root.join(source);
        match reconcile::stage_legacy(root, &layer, &source, now) {
            Ok(staged) => legacy_sources.push(staged),
            Err(w) => {
                unresolved_sources.push(w.subject.clone());
                warnings.push(w);
            }
        }
        tracing::info!(stage = %Stage::StageLegacy, source = %source.display());
        stages.push(Stage::StageLegacy);
    }
    for staged in reconcile::staged_imports(root, &layer).map_err(|e| Stage::StageLegacy.wrap(e))? {
        if !legacy_sources.contains(&staged) {
            legacy_sources.push(staged);
        }
    }

    // COPY_ASSETS
    let (installed_assets, asset_warnings) = reconcile::install_assets(root, &layer, &params.assets);
    warnings.extend(asset_warnings);
    tracing::info!(stage = %Stage::CopyAssets, installed = installed_assets.len());
    stages.push(Stage::CopyAssets);

    // WRITE_FOUNDATIONS
    let mut writes = Vec::new();
    let base_vars = Vars::new()
        .set("project", identity.project_name.as_str())
        .set("layer_dir", layer_dir.as_str())
        .set("agent", identity.agent.as_str());
    let foundation = Discipline::Conditional {
        force: params.force,
    };
    let index = match params.index_policy {
        IndexPolicy::CreateOnce => Discipline::CreateOnce,
        IndexPolicy::Recreate => Discipline::Unconditional,
    };
    let write_foundations = || -> Result<Vec<WriteOutcome>> {
        let mut out = Vec::new();
        for domain in paths::CANONICAL_DOMAINS {
            let vars = base_vars.clone().set("domain", domain);
            out.push(reconcile::write_artifact(
                root,
                &paths::domain_doc(&layer_dir, domain, paths::FOUNDATION_DOC),
                &render(templates::foundation_skeleton(domain), &vars)?,
                foundation,
            )?);
            out.push(reconcile::write_artifact(
                root,
                &paths::domain_doc(&layer_dir, domain, paths::INDEX_DOC),
                &render(templates::INDEX_SKELETON, &vars)?,
                index,
            )?);
        }
        out.push(reconcile::write_artifact(
            root,
            &paths::layer_rel(&layer_dir, paths::BOOTSTRAP_DOC),
            &render(templates::BOOTSTRAP_SKELETON, &base_vars)?,
            foundation,
        )?);
        Ok(out)
    };
    writes.extend(write_foundations().map_err(|e| Stage::WriteFoundations.wrap(e))?);
    tracing::info!(stage = %Stage::WriteFoundations, force = params.force);
    stages.push(Stage::WriteFoundations);

    // WRITE_RUN_ARTIFACTS
    let project_path = root.display().to_string();
    let notes = brief::note_lines(&params.notes);
    let write_run_artifacts = || -> Result<Vec<WriteOutcome>> {
        let composed = brief::compose(&BriefContext {
            project_name: &identity.project_name,
            project_path: &project_path,
            layer_dir: &layer_dir,
            agent: &identity.agent,
            truth_branch: &truth_branch,
            layout: &layout,
            legacy_sources: &legacy_sources,
            unresolved_sources: &unresolved_sources,
            notes: &notes,
        })?;
        let script_vars = Vars::new()
            .set("agent", identity.agent.as_str())
            .set("command", identity.command.as_str())
            .set("bootstrap_path", paths::layer_rel(&layer_dir, paths::BOOTSTRAP_DOC))
            .set("prompt_path", paths::UPSERT_PROMPT_FILE);

        let mut out = vec![
            reconcile::write_artifact(
                root,
                &brief::brief_path(&layer_dir),
                &composed.brief,
                Discipline::Unconditional,
            )?,
            reconcile::write_artifact(
                root,
                paths::UPSERT_PROMPT_FILE,
                &composed.prompt,
                Discipline::Unconditional,
            )?,
        ];
        for (file, skeleton) in [
            (paths::START_SCRIPT_FILE, templates::START_SCRIPT),
            (paths::UPSERT_SCRIPT_FILE, templates::UPSERT_SCRIPT),
        ] {
            out.push(reconcile::write_artifact(
                root,
                file,
                &render(skeleton, &script_vars)?,
                Discipline::Unconditional,
            )?);
            io::make_executable(&root.join(file))?;
        }
        Ok(out)
    };
    writes.extend(write_run_artifacts().map_err(|e| Stage::WriteRunArtifacts.wrap(e))?);
    tracing::info!(stage = %Stage::WriteRunArtifacts);
    stages.push(Stage::WriteRunArtifacts);

    // WRITE_METADATA
    let record = Metadata {
        project_name: identity.project_name,
        project_path,
        agent: identity.agent,
        command: identity.command,
        persistency_dir: layer_dir.clone(),
        truth_branch,
        truth_commit,
        updated_at: now,
        freshness,
        installed_assets: installed_assets.clone(),
        legacy_sources: legacy_sources.clone(),
        intake_notes: notes,
    };
    defaults
        .save(&Defaults {
            layer_dir: Some(layer_dir.clone()),
            metadata: Some(record.clone()),
        })
        .map_err(|e| Stage::WriteMetadata.wrap(e))?;
    tracing::info!(stage = %Stage::WriteMetadata, layer_dir = %layer_dir);
    stages.push(Stage::WriteMetadata);

    Ok(RunReport {
        layer_dir,
        resolved_from: resolution.from,
        layer_existed,
        layout,
        backup,
        writes,
        warnings,
        legacy_sources,
        unresolved_sources,
        installed_assets,
        stages,
        metadata: record,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
