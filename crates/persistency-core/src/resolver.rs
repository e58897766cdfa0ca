use crate::defaults::Defaults;
use crate::error::Result;
use crate::paths;
use serde::Serialize;

/// Where the layer directory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedFrom {
    Explicit,
    Pointer,
    Metadata,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub layer_dir: String,
    pub from: ResolvedFrom,
}

/// Pick the layer directory: explicit argument, then pointer file, then the
/// stored metadata record, then `fallback`. Never touches disk.
pub fn resolve_layer_dir(
    explicit: Option<&str>,
    defaults: &Defaults,
    fallback: &str,
) -> Result<Resolution> {
    let non_empty = |s: &&str| !s.trim().is_empty();
    let (dir, from) = if let Some(dir) = explicit.filter(non_empty) {
        (dir, ResolvedFrom::Explicit)
    } else if let Some(dir) = defaults.layer_dir.as_deref().filter(non_empty) {
        (dir, ResolvedFrom::Pointer)
    } else if let Some(dir) = defaults
        .metadata
        .as_ref()
        .map(|m| m.persistency_dir.as_str())
        .filter(non_empty)
    {
        (dir, ResolvedFrom::Metadata)
    } else {
        (fallback, ResolvedFrom::Default)
    };
    let layer_dir = dir.trim().trim_end_matches('/').to_string();
    paths::validate_layer_dir(&layer_dir)?;
    Ok(Resolution { layer_dir, from })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Freshness, Metadata};
    use chrono::Utc;

    fn meta_in(dir: &str) -> Metadata {
        Metadata {
            project_name: "p".into(),
            project_path: "/p".into(),
            agent: "claude".into(),
            command: "claude".into(),
            persistency_dir: dir.into(),
            truth_branch: "main".into(),
            truth_commit: None,
            updated_at: Utc::now(),
            freshness: Freshness::default(),
            installed_assets: vec![],
            legacy_sources: vec![],
            intake_notes: vec![],
        }
    }

    #[test]
    fn explicit_wins_over_everything() {
        let defaults = Defaults {
            layer_dir: Some("pointed".into()),
            metadata: Some(meta_in("recorded")),
        };
        let r = resolve_layer_dir(Some("custom-ai"), &defaults, "ai").unwrap();
        assert_eq!(r.layer_dir, "custom-ai");
        assert_eq!(r.from, ResolvedFrom::Explicit);
    }

    #[test]
    fn pointer_then_metadata_then_default() {
        let both = Defaults {
            layer_dir: Some("pointed".into()),
            metadata: Some(meta_in("recorded")),
        };
        assert_eq!(resolve_layer_dir(None, &both, "ai").unwrap().from, ResolvedFrom::Pointer);

        let meta_only = Defaults {
            layer_dir: None,
            metadata: Some(meta_in("recorded")),
        };
        let r = resolve_layer_dir(None, &meta_only, "ai").unwrap();
        assert_eq!((r.layer_dir.as_str(), r.from), ("recorded", ResolvedFrom::Metadata));

        let r = resolve_layer_dir(Some("  "), &Defaults::default(), "ai").unwrap();
        assert_eq!((r.layer_dir.as_str(), r.from), ("ai", ResolvedFrom::Default));
    }

    #[test]
    fn rejects_escaping_explicit_dir() {
        assert!(resolve_layer_dir(Some("../x"), &Defaults::default(), "ai").is_err());
    }
}
