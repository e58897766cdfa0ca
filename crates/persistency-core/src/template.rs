use crate::error::{PersistencyError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{\s*([a-z][a-z0-9_]*)\s*\}\}").unwrap())
}

/// Key/value substitutions for a document skeleton.
#[derive(Debug, Clone, Default)]
pub struct Vars(BTreeMap<&'static str, String>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Replace every `{{key}}` in `skeleton` with its value. Values are inserted
/// verbatim and never re-scanned; a placeholder without a value is an error.
pub fn render(skeleton: &str, vars: &Vars) -> Result<String> {
    let mut out = String::with_capacity(skeleton.len());
    let mut last = 0;
    for caps in placeholder_re().captures_iter(skeleton) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let key = &caps[1];
        let value = vars
            .get(key)
            .ok_or_else(|| PersistencyError::TemplateKey(key.to_string()))?;
        out.push_str(&skeleton[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&skeleton[last..]);
    Ok(out)
}

/// Render `items` as markdown bullets, or a single `placeholder` bullet when empty.
pub fn bullets<S: AsRef<str>>(items: &[S], placeholder: &str) -> String {
    if items.is_empty() {
        return format!("- {placeholder}");
    }
    items
        .iter()
        .map(|i| format!("- {}", i.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_occurrences() {
        let vars = Vars::new().set("project", "demo").set("agent", "codex");
        let out = render("# {{project}}\n{{ agent }} works on {{project}}.", &vars).unwrap();
        assert_eq!(out, "# demo\ncodex works on demo.");
    }

    #[test]
    fn values_are_not_rescanned() {
        let vars = Vars::new().set("a", "{{b}}");
        assert_eq!(render("x {{a}} y", &vars).unwrap(), "x {{b}} y");
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = render("{{nope}}", &Vars::new()).unwrap_err();
        assert!(matches!(err, PersistencyError::TemplateKey(k) if k == "nope"));
    }

    #[test]
    fn shell_syntax_is_left_alone() {
        let out = render("echo \"$(cat \"$P\")\" ${HOME}", &Vars::new()).unwrap();
        assert_eq!(out, "echo \"$(cat \"$P\")\" ${HOME}");
    }

    #[test]
    fn bullets_with_placeholder() {
        assert_eq!(bullets::<String>(&[], "(none)"), "- (none)");
        assert_eq!(bullets(&["a", "b"], "(none)"), "- a\n- b");
    }
}
