use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use guardchat_core::config::{resolve_config_path, ConfigOverrides};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

struct FieldSources<'a> {
    file_doc: Option<&'a Value>,
    file_path: Option<&'a Path>,
}

impl FieldSources<'_> {
    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }

    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        format!("- {key_path} = {value} (source: {})", self.source(key_path, env_keys))
    }
}

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let config = match load_config(config_path, ConfigOverrides::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("config", &error),
    };

    let file_path: Option<PathBuf> = resolve_config_path(config_path);
    let file_doc = load_config_file_doc(file_path.as_deref());
    let sources = FieldSources { file_doc: file_doc.as_ref(), file_path: file_path.as_deref() };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(sources.line(
        "agent.endpoint",
        &config.agent.endpoint,
        &["GUARDCHAT_AGENT_ENDPOINT"],
    ));
    lines.push(sources.line(
        "agent.api_key",
        &redact_secret(config.agent.api_key.expose_secret()),
        &["GUARDCHAT_AGENT_API_KEY"],
    ));
    lines.push(sources.line(
        "agent.api_version",
        &config.agent.api_version,
        &["GUARDCHAT_AGENT_API_VERSION"],
    ));
    lines.push(sources.line(
        "agent.timeout_secs",
        &config.agent.timeout_secs.to_string(),
        &["GUARDCHAT_AGENT_TIMEOUT_SECS"],
    ));

    lines.push(sources.line(
        "moderation.endpoint",
        config.moderation.endpoint.as_deref().unwrap_or("<unset: moderation disabled>"),
        &["GUARDCHAT_MODERATION_ENDPOINT"],
    ));
    let moderation_key = config
        .moderation
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(sources.line(
        "moderation.api_key",
        &moderation_key,
        &["GUARDCHAT_MODERATION_API_KEY"],
    ));
    lines.push(sources.line(
        "moderation.api_version",
        &config.moderation.api_version,
        &["GUARDCHAT_MODERATION_API_VERSION"],
    ));
    lines.push(sources.line(
        "moderation.timeout_secs",
        &config.moderation.timeout_secs.to_string(),
        &["GUARDCHAT_MODERATION_TIMEOUT_SECS"],
    ));

    lines.push(sources.line(
        "session.poll_interval_ms",
        &config.session.poll_interval_ms.to_string(),
        &["GUARDCHAT_SESSION_POLL_INTERVAL_MS"],
    ));
    lines.push(sources.line(
        "session.run_deadline_secs",
        &config
            .session
            .run_deadline_secs
            .map(|secs| secs.to_string())
            .unwrap_or_else(|| "<unset: poll until the run finishes>".to_string()),
        &["GUARDCHAT_SESSION_RUN_DEADLINE_SECS"],
    ));
    lines.push(sources.line(
        "session.customer_id",
        config.session.customer_id.as_deref().unwrap_or("<unset>"),
        &["GUARDCHAT_SESSION_CUSTOMER_ID"],
    ));
    lines.push(sources.line(
        "session.show_safety_analysis",
        &config.session.show_safety_analysis.to_string(),
        &["GUARDCHAT_SESSION_SHOW_SAFETY_ANALYSIS"],
    ));

    let agent_ids =
        config.agents.iter().map(|agent| agent.id.0.as_str()).collect::<Vec<_>>().join(", ");
    lines.push(sources.line("agents", &format!("[{agent_ids}]"), &["GUARDCHAT_AGENTS"]));

    lines.push(sources.line(
        "logging.level",
        &config.logging.level,
        &["GUARDCHAT_LOGGING_LEVEL", "GUARDCHAT_LOG_LEVEL"],
    ));
    lines.push(sources.line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["GUARDCHAT_LOGGING_FORMAT", "GUARDCHAT_LOG_FORMAT"],
    ));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let visible = trimmed.chars().count().saturating_sub(4).min(4);
    if visible == 0 {
        return "<redacted>".to_string();
    }
    let suffix = trimmed.chars().skip(trimmed.chars().count() - visible).collect::<String>();
    format!("<redacted>…{suffix}")
}

#[cfg(test)]
mod tests {
    use super::redact_secret;

    #[test]
    fn secrets_never_show_more_than_a_short_suffix() {
        assert_eq!(redact_secret(""), "<empty>");
        assert_eq!(redact_secret("abcd"), "<redacted>");
        assert_eq!(redact_secret("abcdef"), "<redacted>…ef");
        assert_eq!(redact_secret("0123456789abcdef"), "<redacted>…cdef");
    }
}
