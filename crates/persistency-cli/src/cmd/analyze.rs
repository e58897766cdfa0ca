use crate::output::{print_json, print_table};
use anyhow::Context;
use persistency_core::{
    config::ProjectConfig,
    defaults::{DefaultsProvider, FsDefaults},
    layout, paths, resolver,
};
use std::path::Path;

/// Read-only view of the layer layout. Never writes the pointer or metadata.
pub fn run(root: &Path, dir: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = ProjectConfig::load(root).context("failed to load persistency.yaml")?;
    config
        .validate()
        .context("invalid persistency.yaml")?;
    let fallback = config
        .default_dir
        .clone()
        .unwrap_or_else(|| paths::DEFAULT_LAYER_DIR.to_string());
    let defaults = FsDefaults::new(root, fallback.clone()).load();
    let resolution = resolver::resolve_layer_dir(dir, &defaults, &fallback)?;
    let layer = paths::layer_path(root, &resolution.layer_dir);
    let analysis = layout::analyze(&layer)
        .with_context(|| format!("failed to analyze {}", layer.display()))?;

    if json {
        return print_json(&analysis);
    }

    if !analysis.exists {
        println!(
            "No persistency layer at {} ({:?}). Run 'persistency init' to seed it.",
            resolution.layer_dir, resolution.from
        );
        return Ok(());
    }

    let mut rows = Vec::new();
    for name in &analysis.canonical {
        rows.push(vec![name.clone(), "canonical".to_string()]);
    }
    for name in &analysis.missing_canonical {
        rows.push(vec![name.clone(), "missing".to_string()]);
    }
    for name in &analysis.referenced_extras {
        rows.push(vec![name.clone(), "referenced".to_string()]);
    }
    for name in &analysis.unreferenced_extras {
        rows.push(vec![name.clone(), "unreferenced".to_string()]);
    }
    println!("Layer: {}\n", resolution.layer_dir);
    print_table(&["DIRECTORY", "STATUS"], rows);
    if !analysis.bootstrap_found {
        println!("\n{} not found; extras cannot be referenced.", paths::BOOTSTRAP_DOC);
    }
    Ok(())
}
