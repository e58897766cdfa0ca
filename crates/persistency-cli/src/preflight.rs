//! Opt-in check that the chosen agent can actually be launched by the
//! generated scripts: binary on PATH, and some form of credentials.

use crate::error::DriverError;
use std::path::{Path, PathBuf};

struct AgentProfile {
    id: &'static str,
    env: &'static [&'static str],
    /// Credential files relative to the home directory.
    credentials: &'static [&'static str],
}

const PROFILES: &[AgentProfile] = &[
    AgentProfile {
        id: "claude",
        env: &["ANTHROPIC_API_KEY", "CLAUDE_CODE_OAUTH_TOKEN"],
        credentials: &[".claude/.credentials.json"],
    },
    AgentProfile {
        id: "codex",
        env: &["OPENAI_API_KEY"],
        credentials: &[".codex/auth.json"],
    },
    AgentProfile {
        id: "gemini",
        env: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        credentials: &[".gemini/oauth_creds.json"],
    },
];

/// The executable a command string launches: its first word.
pub fn binary_of<'a>(command: &'a str, agent: &'a str) -> &'a str {
    command.split_whitespace().next().unwrap_or(agent)
}

/// Locate the agent binary and confirm credentials for known agents.
pub fn check(agent: &str, command: &str) -> Result<PathBuf, DriverError> {
    let binary = binary_of(command, agent);
    let located =
        which::which(binary).map_err(|_| DriverError::AgentMissing(binary.to_string()))?;
    tracing::debug!(binary = %located.display(), "agent binary located");

    let home = home::home_dir();
    check_credentials(
        agent,
        |name| std::env::var(name).ok(),
        home.as_deref(),
    )?;
    Ok(located)
}

fn check_credentials(
    agent: &str,
    env: impl Fn(&str) -> Option<String>,
    home: Option<&Path>,
) -> Result<(), DriverError> {
    let Some(profile) = PROFILES.iter().find(|p| p.id == agent) else {
        return Ok(());
    };
    let from_env = profile
        .env
        .iter()
        .any(|&name| env(name).is_some_and(|v| !v.trim().is_empty()));
    let from_file = home.is_some_and(|h| profile.credentials.iter().any(|f| h.join(f).is_file()));
    if from_env || from_file {
        return Ok(());
    }
    Err(DriverError::AuthMissing {
        agent: agent.to_string(),
        hint: format!(
            "set {} or sign in with '{}' first",
            profile.env.join(" or "),
            profile.id
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn binary_is_first_word_of_command() {
        assert_eq!(binary_of("claude --model opus", "claude"), "claude");
        assert_eq!(binary_of("  ", "codex"), "codex");
    }

    #[test]
    fn missing_binary_is_reported() {
        let err = check("custom", "definitely-not-an-agent-binary-7f3a").unwrap_err();
        assert!(matches!(err, DriverError::AgentMissing(b) if b == "definitely-not-an-agent-binary-7f3a"));
    }

    #[test]
    fn unknown_agents_skip_credential_check() {
        check_credentials("my-agent", |_| None, None).unwrap();
    }

    #[test]
    fn env_var_satisfies_credentials() {
        let env = |name: &str| (name == "OPENAI_API_KEY").then(|| "sk-test".to_string());
        check_credentials("codex", env, None).unwrap();
    }

    #[test]
    fn credential_file_satisfies_credentials() {
        let home = TempDir::new().unwrap();
        std::fs::create_dir_all(home.path().join(".gemini")).unwrap();
        std::fs::write(home.path().join(".gemini/oauth_creds.json"), "{}").unwrap();
        check_credentials("gemini", |_| None, Some(home.path())).unwrap();
    }

    #[test]
    fn blank_env_and_no_file_is_auth_missing() {
        let home = TempDir::new().unwrap();
        let err = check_credentials("claude", |_| Some(" ".to_string()), Some(home.path()))
            .unwrap_err();
        assert!(matches!(err, DriverError::AuthMissing { .. }));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
