use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::agent::AgentProfile;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub agent: AgentServiceConfig,
    pub moderation: ModerationConfig,
    pub session: SessionConfig,
    pub agents: Vec<AgentProfile>,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AgentServiceConfig {
    pub endpoint: String,
    pub api_key: SecretString,
    pub api_version: String,
    pub timeout_secs: u64,
}

/// Content-safety backend settings. No endpoint means moderation is disabled.
#[derive(Clone, Debug)]
pub struct ModerationConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub api_version: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub poll_interval_ms: u64,
    /// Unset keeps run polling unbounded.
    pub run_deadline_secs: Option<u64>,
    pub customer_id: Option<String>,
    /// Show the per-category analysis after each input check and delivered reply.
    pub show_safety_analysis: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub agent_endpoint: Option<String>,
    pub agent_api_key: Option<String>,
    pub moderation_endpoint: Option<String>,
    pub moderation_api_key: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub run_deadline_secs: Option<u64>,
    pub customer_id: Option<String>,
    pub show_safety_analysis: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CONFIG_FILE: &str = "guardchat.toml";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentServiceConfig {
                endpoint: String::new(),
                api_key: String::new().into(),
                api_version: "v1".to_string(),
                timeout_secs: 30,
            },
            moderation: ModerationConfig {
                endpoint: None,
                api_key: None,
                api_version: "2024-09-01".to_string(),
                timeout_secs: 10,
            },
            session: SessionConfig {
                poll_interval_ms: 1_000,
                run_deadline_secs: None,
                customer_id: None,
                show_safety_analysis: false,
            },
            agents: Vec::new(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl ModerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.endpoint.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false)
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Agent used when the caller does not name one.
    pub fn default_agent(&self) -> Option<&AgentProfile> {
        self.agents.first()
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(agent) = patch.agent {
            if let Some(endpoint) = agent.endpoint {
                self.agent.endpoint = endpoint;
            }
            if let Some(agent_api_key_value) = agent.api_key {
                self.agent.api_key = secret_value(agent_api_key_value);
            }
            if let Some(api_version) = agent.api_version {
                self.agent.api_version = api_version;
            }
            if let Some(timeout_secs) = agent.timeout_secs {
                self.agent.timeout_secs = timeout_secs;
            }
        }

        if let Some(moderation) = patch.moderation {
            if let Some(endpoint) = moderation.endpoint {
                self.moderation.endpoint = Some(endpoint);
            }
            if let Some(moderation_api_key_value) = moderation.api_key {
                self.moderation.api_key = Some(secret_value(moderation_api_key_value));
            }
            if let Some(api_version) = moderation.api_version {
                self.moderation.api_version = api_version;
            }
            if let Some(timeout_secs) = moderation.timeout_secs {
                self.moderation.timeout_secs = timeout_secs;
            }
        }

        if let Some(session) = patch.session {
            if let Some(poll_interval_ms) = session.poll_interval_ms {
                self.session.poll_interval_ms = poll_interval_ms;
            }
            if let Some(run_deadline_secs) = session.run_deadline_secs {
                self.session.run_deadline_secs = Some(run_deadline_secs);
            }
            if let Some(customer_id) = session.customer_id {
                self.session.customer_id = Some(customer_id);
            }
            if let Some(show_safety_analysis) = session.show_safety_analysis {
                self.session.show_safety_analysis = show_safety_analysis;
            }
        }

        if let Some(agents) = patch.agents {
            self.agents = agents;
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GUARDCHAT_AGENT_ENDPOINT") {
            self.agent.endpoint = value;
        }
        if let Some(value) = read_env("GUARDCHAT_AGENT_API_KEY") {
            self.agent.api_key = secret_value(value);
        }
        if let Some(value) = read_env("GUARDCHAT_AGENT_API_VERSION") {
            self.agent.api_version = value;
        }
        if let Some(value) = read_env("GUARDCHAT_AGENT_TIMEOUT_SECS") {
            self.agent.timeout_secs = parse_u64("GUARDCHAT_AGENT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GUARDCHAT_MODERATION_ENDPOINT") {
            self.moderation.endpoint = Some(value);
        }
        if let Some(value) = read_env("GUARDCHAT_MODERATION_API_KEY") {
            self.moderation.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("GUARDCHAT_MODERATION_API_VERSION") {
            self.moderation.api_version = value;
        }
        if let Some(value) = read_env("GUARDCHAT_MODERATION_TIMEOUT_SECS") {
            self.moderation.timeout_secs =
                parse_u64("GUARDCHAT_MODERATION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GUARDCHAT_SESSION_POLL_INTERVAL_MS") {
            self.session.poll_interval_ms =
                parse_u64("GUARDCHAT_SESSION_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("GUARDCHAT_SESSION_RUN_DEADLINE_SECS") {
            self.session.run_deadline_secs =
                Some(parse_u64("GUARDCHAT_SESSION_RUN_DEADLINE_SECS", &value)?);
        }
        if let Some(value) = read_env("GUARDCHAT_SESSION_CUSTOMER_ID") {
            self.session.customer_id = Some(value);
        }
        if let Some(value) = read_env("GUARDCHAT_SESSION_SHOW_SAFETY_ANALYSIS") {
            self.session.show_safety_analysis =
                parse_bool("GUARDCHAT_SESSION_SHOW_SAFETY_ANALYSIS", &value)?;
        }

        if let Some(value) = read_env("GUARDCHAT_AGENTS") {
            self.agents = serde_json::from_str::<Vec<AgentProfile>>(&value).map_err(|_| {
                ConfigError::InvalidEnvOverride { key: "GUARDCHAT_AGENTS".to_string(), value }
            })?;
        }

        let log_level =
            read_env("GUARDCHAT_LOGGING_LEVEL").or_else(|| read_env("GUARDCHAT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GUARDCHAT_LOGGING_FORMAT").or_else(|| read_env("GUARDCHAT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(agent_endpoint) = overrides.agent_endpoint {
            self.agent.endpoint = agent_endpoint;
        }
        if let Some(agent_api_key) = overrides.agent_api_key {
            self.agent.api_key = secret_value(agent_api_key);
        }
        if let Some(moderation_endpoint) = overrides.moderation_endpoint {
            self.moderation.endpoint = Some(moderation_endpoint);
        }
        if let Some(moderation_api_key) = overrides.moderation_api_key {
            self.moderation.api_key = Some(secret_value(moderation_api_key));
        }
        if let Some(poll_interval_ms) = overrides.poll_interval_ms {
            self.session.poll_interval_ms = poll_interval_ms;
        }
        if let Some(run_deadline_secs) = overrides.run_deadline_secs {
            self.session.run_deadline_secs = Some(run_deadline_secs);
        }
        if let Some(customer_id) = overrides.customer_id {
            self.session.customer_id = Some(customer_id);
        }
        if let Some(show_safety_analysis) = overrides.show_safety_analysis {
            self.session.show_safety_analysis = show_safety_analysis;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_agent_service(&self.agent)?;
        validate_moderation(&self.moderation)?;
        validate_session(&self.session)?;
        validate_agents(&self.agents)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config/guardchat.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_agent_service(agent: &AgentServiceConfig) -> Result<(), ConfigError> {
    let endpoint = agent.endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::Validation(
            "agent.endpoint is required. Use the project endpoint shown on the AI Foundry project overview page".to_string(),
        ));
    }
    if !is_http_url(endpoint) {
        return Err(ConfigError::Validation(
            "agent.endpoint must start with http:// or https://".to_string(),
        ));
    }

    if agent.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "agent.api_key is required to authenticate against the agent service".to_string(),
        ));
    }

    if agent.api_version.trim().is_empty() {
        return Err(ConfigError::Validation("agent.api_version must not be empty".to_string()));
    }

    if agent.timeout_secs == 0 || agent.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "agent.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_moderation(moderation: &ModerationConfig) -> Result<(), ConfigError> {
    if moderation.timeout_secs == 0 || moderation.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "moderation.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let Some(endpoint) = moderation.endpoint.as_deref().map(str::trim) else {
        return Ok(());
    };
    if endpoint.is_empty() {
        return Ok(());
    }

    if !is_http_url(endpoint) {
        return Err(ConfigError::Validation(
            "moderation.endpoint must start with http:// or https://".to_string(),
        ));
    }

    let missing_key = moderation
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "moderation.api_key is required when moderation.endpoint is set (remove the endpoint to disable moderation)".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "session.poll_interval_ms must be greater than zero".to_string(),
        ));
    }

    if session.run_deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "session.run_deadline_secs must be greater than zero when set".to_string(),
        ));
    }

    if let Some(customer_id) = &session.customer_id {
        if customer_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "session.customer_id must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_agents(agents: &[AgentProfile]) -> Result<(), ConfigError> {
    let mut seen = std::collections::BTreeSet::new();
    for agent in agents {
        if agent.id.0.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "agents entry `{}` has an empty id",
                agent.name
            )));
        }
        if !seen.insert(agent.id.0.as_str()) {
            return Err(ConfigError::Validation(format!(
                "agents entry id `{}` is listed more than once",
                agent.id
            )));
        }
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    agent: Option<AgentServicePatch>,
    moderation: Option<ModerationPatch>,
    session: Option<SessionPatch>,
    agents: Option<Vec<AgentProfile>>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentServicePatch {
    endpoint: Option<String>,
    api_key: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ModerationPatch {
    endpoint: Option<String>,
    api_key: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    poll_interval_ms: Option<u64>,
    run_deadline_secs: Option<u64>,
    customer_id: Option<String>,
    show_safety_analysis: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::domain::agent::AgentKind;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_VARS: &[&str] = &[
        "GUARDCHAT_AGENT_ENDPOINT",
        "GUARDCHAT_AGENT_API_KEY",
        "GUARDCHAT_MODERATION_ENDPOINT",
        "GUARDCHAT_MODERATION_API_KEY",
        "GUARDCHAT_SESSION_POLL_INTERVAL_MS",
        "GUARDCHAT_SESSION_RUN_DEADLINE_SECS",
        "GUARDCHAT_SESSION_SHOW_SAFETY_ANALYSIS",
        "GUARDCHAT_AGENTS",
        "GUARDCHAT_LOG_LEVEL",
        "GUARDCHAT_LOG_FORMAT",
        "TEST_GUARDCHAT_AGENT_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn with_agent_env<T>(body: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
        clear_vars(ALL_VARS);
        env::set_var("GUARDCHAT_AGENT_ENDPOINT", "https://agents.example.test/api/projects/demo");
        env::set_var("GUARDCHAT_AGENT_API_KEY", "agent-key");
        let result = body();
        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn file_load_supports_env_interpolation_and_agent_list() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);
        env::set_var("TEST_GUARDCHAT_AGENT_KEY", "key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("guardchat.toml");
            fs::write(
                &path,
                r#"
[agent]
endpoint = "https://agents.example.test/api/projects/demo"
api_key = "${TEST_GUARDCHAT_AGENT_KEY}"

[[agents]]
id = "asst_basic"
name = "Mobilito"
kind = "basic"

[[agents]]
id = "asst_tools"
name = "Joker"
kind = "tool_augmented"
created_at = "2025-08-01 10:00:00"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.agent.api_key.expose_secret() == "key-from-env",
                "api key should be interpolated from environment",
            )?;
            ensure(config.agents.len() == 2, "both agents should be loaded")?;
            ensure(config.agents[1].kind == AgentKind::ToolAugmented, "kind should parse")?;
            ensure(
                config.default_agent().map(|agent| agent.name.as_str()) == Some("Mobilito"),
                "first agent is the default",
            )?;
            ensure(!config.moderation.is_enabled(), "moderation is disabled without endpoint")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        with_agent_env(|| {
            env::set_var("GUARDCHAT_LOG_LEVEL", "warn");
            env::set_var("GUARDCHAT_LOG_FORMAT", "pretty");

            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        with_agent_env(|| {
            env::set_var("GUARDCHAT_SESSION_POLL_INTERVAL_MS", "250");

            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("guardchat.toml");
            fs::write(
                &path,
                r#"
[agent]
endpoint = "https://from-file.example.test"
api_key = "file-key"

[session]
poll_interval_ms = 5000
customer_id = "from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    customer_id: Some("88129215".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.agent.endpoint == "https://agents.example.test/api/projects/demo",
                "env endpoint should win over file",
            )?;
            ensure(config.session.poll_interval_ms == 250, "env poll interval should win")?;
            ensure(
                config.session.customer_id.as_deref() == Some("88129215"),
                "override customer id should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.session.run_deadline_secs.is_none(), "deadline stays unset")?;
            Ok(())
        })
    }

    #[test]
    fn safety_analysis_flag_is_off_by_default_and_layered() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        with_agent_env(|| {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(!config.session.show_safety_analysis, "analysis is hidden by default")?;

            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("guardchat.toml");
            fs::write(&path, "[session]\nshow_safety_analysis = true\n")
                .map_err(|err| err.to_string())?;
            let from_file = AppConfig::load(LoadOptions {
                config_path: Some(path.clone()),
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(from_file.session.show_safety_analysis, "file should enable analysis")?;

            env::set_var("GUARDCHAT_SESSION_SHOW_SAFETY_ANALYSIS", "off");
            let from_env =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;
            ensure(!from_env.session.show_safety_analysis, "env should win over file")?;

            env::set_var("GUARDCHAT_SESSION_SHOW_SAFETY_ANALYSIS", "sometimes");
            let invalid = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(invalid, Err(ConfigError::InvalidEnvOverride { .. })),
                "unparseable flag should be rejected",
            )?;
            Ok(())
        })
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected validation failure but config load succeeded".to_string()),
            Err(ConfigError::Validation(message)) => {
                ensure(message.contains("agent.endpoint"), "error should name agent.endpoint")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn moderation_endpoint_requires_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        with_agent_env(|| {
            env::set_var("GUARDCHAT_MODERATION_ENDPOINT", "https://safety.example.test");

            match AppConfig::load(LoadOptions::default()) {
                Ok(_) => Err("moderation endpoint without key should fail".to_string()),
                Err(ConfigError::Validation(message)) => {
                    ensure(message.contains("moderation.api_key"), "error should name the key")
                }
                Err(other) => Err(format!("unexpected error: {other}")),
            }
        })
    }

    #[test]
    fn moderation_enabled_with_endpoint_and_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        with_agent_env(|| {
            env::set_var("GUARDCHAT_MODERATION_ENDPOINT", "https://safety.example.test");
            env::set_var("GUARDCHAT_MODERATION_API_KEY", "safety-key");

            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.moderation.is_enabled(), "moderation should be enabled")
        })
    }

    #[test]
    fn agents_env_override_must_be_json() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        with_agent_env(|| {
            env::set_var("GUARDCHAT_AGENTS", "not-json");
            match AppConfig::load(LoadOptions::default()) {
                Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                    ensure(key == "GUARDCHAT_AGENTS", "error should name GUARDCHAT_AGENTS")
                }
                Ok(_) => Err("invalid agents json should fail".to_string()),
                Err(other) => Err(format!("unexpected error: {other}")),
            }
        })
    }

    #[test]
    fn zero_run_deadline_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        with_agent_env(|| {
            env::set_var("GUARDCHAT_SESSION_RUN_DEADLINE_SECS", "0");
            let outcome = AppConfig::load(LoadOptions::default());
            env::remove_var("GUARDCHAT_SESSION_RUN_DEADLINE_SECS");
            match outcome {
                Err(ConfigError::Validation(message)) => ensure(
                    message.contains("run_deadline_secs"),
                    "error should name run_deadline_secs",
                ),
                Ok(_) => Err("zero deadline should fail".to_string()),
                Err(other) => Err(format!("unexpected error: {other}")),
            }
        })
    }

    #[test]
    fn require_file_reports_missing_path() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("/definitely/not/here/guardchat.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }
}
