//! Migration brief and upsert prompt composition.
//!
//! Both documents are pure functions of [`BriefContext`]: no clock, no disk.

use crate::error::Result;
use crate::layout::LayoutAnalysis;
use crate::paths;
use crate::template::{bullets, render, Vars};
use crate::templates::{BRIEF_SKELETON, PROMPT_SKELETON};

pub const NO_NOTES: &str = "(no supplemental notes provided)";
const NONE: &str = "(none)";

pub struct BriefContext<'a> {
    pub project_name: &'a str,
    pub project_path: &'a str,
    pub layer_dir: &'a str,
    pub agent: &'a str,
    pub truth_branch: &'a str,
    pub layout: &'a LayoutAnalysis,
    pub legacy_sources: &'a [String],
    pub unresolved_sources: &'a [String],
    pub notes: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedBrief {
    pub brief: String,
    pub prompt: String,
}

/// Split operator notes into one entry per non-blank line.
pub fn note_lines(notes: &[String]) -> Vec<String> {
    notes
        .iter()
        .flat_map(|n| n.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn code(items: &[String]) -> Vec<String> {
    items.iter().map(|i| format!("`{i}`")).collect()
}

pub fn brief_path(layer_dir: &str) -> String {
    paths::layer_rel(layer_dir, paths::MIGRATION_BRIEF_DOC)
}

pub fn compose(ctx: &BriefContext<'_>) -> Result<ComposedBrief> {
    let notes = note_lines(ctx.notes);
    let legacy = bullets(&code(ctx.legacy_sources), NONE);

    let brief_vars = Vars::new()
        .set("project", ctx.project_name)
        .set("project_path", ctx.project_path)
        .set("layer_dir", ctx.layer_dir)
        .set("agent", ctx.agent)
        .set("truth_branch", ctx.truth_branch)
        .set("canonical", bullets(&code(&ctx.layout.canonical), NONE))
        .set("missing", bullets(&code(&ctx.layout.missing_canonical), NONE))
        .set("referenced", bullets(&code(&ctx.layout.referenced_extras), NONE))
        .set("unreferenced", bullets(&code(&ctx.layout.unreferenced_extras), NONE))
        .set("legacy", legacy.clone())
        .set("unresolved", bullets(&code(ctx.unresolved_sources), NONE))
        .set("notes", bullets(&notes, NO_NOTES));
    let brief = render(BRIEF_SKELETON, &brief_vars)?;

    let canonical_paths: Vec<String> = paths::CANONICAL_DOMAINS
        .iter()
        .map(|d| paths::layer_rel(ctx.layer_dir, &format!("{d}/")))
        .collect();
    let extra_paths: Vec<String> = ctx
        .layout
        .extras
        .iter()
        .map(|d| paths::layer_rel(ctx.layer_dir, &format!("{d}/")))
        .collect();

    let prompt_vars = Vars::new()
        .set("agent", ctx.agent)
        .set("project", ctx.project_name)
        .set("brief_path", brief_path(ctx.layer_dir))
        .set("canonical_paths", bullets(&canonical_paths, NONE))
        .set("extra_paths", bullets(&extra_paths, NONE))
        .set("legacy", legacy);
    let prompt = render(PROMPT_SKELETON, &prompt_vars)?;

    Ok(ComposedBrief { brief, prompt })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> LayoutAnalysis {
        LayoutAnalysis {
            exists: true,
            directories: vec![
                "ai-meta".into(),
                "functional".into(),
                "runbooks".into(),
                "scratch".into(),
            ],
            canonical: vec!["functional".into(), "ai-meta".into()],
            missing_canonical: vec!["technical".into()],
            extras: vec!["runbooks".into(), "scratch".into()],
            referenced_extras: vec!["runbooks".into()],
            unreferenced_extras: vec!["scratch".into()],
            bootstrap_found: true,
        }
    }

    fn ctx<'a>(
        layout: &'a LayoutAnalysis,
        legacy: &'a [String],
        notes: &'a [String],
    ) -> BriefContext<'a> {
        BriefContext {
            project_name: "demo",
            project_path: "/work/demo",
            layer_dir: "custom-ai",
            agent: "claude",
            truth_branch: "main",
            layout,
            legacy_sources: legacy,
            unresolved_sources: &[],
            notes,
        }
    }

    #[test]
    fn brief_lists_findings_and_placeholder_notes() {
        let layout = layout();
        let out = compose(&ctx(&layout, &[], &[])).unwrap();
        assert!(out.brief.contains("# Migration brief: demo"));
        assert!(out.brief.contains("- `technical`"));
        assert!(out.brief.contains("- `scratch`"));
        assert!(out.brief.contains(&format!("- {NO_NOTES}")));
        assert!(!out.brief.contains("{{"));
    }

    #[test]
    fn each_note_line_is_its_own_bullet() {
        let layout = layout();
        let notes = vec!["first note".to_string(), "second\n\n third ".to_string()];
        let out = compose(&ctx(&layout, &[], &notes)).unwrap();
        assert!(out.brief.contains("- first note\n- second\n- third"));
        assert!(!out.brief.contains(NO_NOTES));
    }

    #[test]
    fn prompt_echoes_brief_and_directory_paths() {
        let layout = layout();
        let legacy = vec!["custom-ai/ai-meta/legacy/20260101T000000Z".to_string()];
        let out = compose(&ctx(&layout, &legacy, &[])).unwrap();
        assert!(out.prompt.contains("custom-ai/ai-meta/migration-brief.md"));
        for dir in ["functional", "technical", "ai-meta", "runbooks", "scratch"] {
            assert!(
                out.prompt.contains(&format!("custom-ai/{dir}/")),
                "prompt should mention {dir}"
            );
        }
        assert!(out.prompt.contains("legacy/20260101T000000Z"));
    }

    #[test]
    fn composition_is_deterministic() {
        let layout = layout();
        let notes = vec!["n".to_string()];
        let a = compose(&ctx(&layout, &[], &notes)).unwrap();
        let b = compose(&ctx(&layout, &[], &notes)).unwrap();
        assert_eq!(a, b);
    }
}
