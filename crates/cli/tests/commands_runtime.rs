use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use guardchat_cli::commands::chat::ChatOptions;
use guardchat_cli::commands::{agents, chat, config, doctor};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AGENTS_JSON: &str =
    r#"[{"id":"asst_1","name":"Mobilito"},{"id":"asst_2","name":"Router","kind":"tools"}]"#;

fn service_env(endpoint: &str) -> Vec<(&'static str, String)> {
    vec![
        ("GUARDCHAT_AGENT_ENDPOINT", endpoint.to_string()),
        ("GUARDCHAT_AGENT_API_KEY", "agent-key-0123456789".to_string()),
    ]
}

#[test]
fn agents_lists_configured_agents_and_marks_the_default() {
    let mut vars = service_env("https://agents.test");
    vars.push(("GUARDCHAT_AGENTS", AGENTS_JSON.to_string()));

    with_env(&vars, || {
        let result = agents::run(None, false);
        assert_eq!(result.exit_code, 0);

        let lines = result.output.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "2 agent(s) configured:");
        assert_eq!(lines[1], "- Mobilito [basic] asst_1 (default)");
        assert_eq!(lines[2], "- Router [tool_augmented] asst_2");
    });
}

#[test]
fn agents_json_output_is_machine_readable() {
    let mut vars = service_env("https://agents.test");
    vars.push(("GUARDCHAT_AGENTS", AGENTS_JSON.to_string()));

    with_env(&vars, || {
        let result = agents::run(None, true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload[0]["id"], "asst_1");
        assert_eq!(payload[0]["default"], true);
        assert_eq!(payload[1]["kind"], "tool_augmented");
        assert_eq!(payload[1]["default"], false);
    });
}

#[test]
fn agents_hints_at_configuration_when_none_are_listed() {
    with_env(&service_env("https://agents.test"), || {
        let result = agents::run(None, false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("GUARDCHAT_AGENTS"));
    });
}

#[test]
fn agents_returns_config_failure_without_agent_service() {
    with_env(&[], || {
        let result = agents::run(None, false);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "agents");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_attributes_sources_and_redacts_secrets() {
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(
        dir.path(),
        r#"
[agent]
endpoint = "https://file.agents.test"
api_key = "file-key-should-be-overridden"

[session]
poll_interval_ms = 250
"#,
    );
    let vars = [("GUARDCHAT_AGENT_API_KEY", "env-secret-abcd".to_string())];

    with_env(&vars, || {
        let result = config::run(Some(config_path.as_path()));
        assert_eq!(result.exit_code, 0);

        let output = &result.output;
        assert!(output.contains("- agent.endpoint = https://file.agents.test (source: file ("));
        assert!(output.contains(
            "- agent.api_key = <redacted>…abcd (source: env (GUARDCHAT_AGENT_API_KEY))"
        ));
        assert!(!output.contains("env-secret"));
        assert!(!output.contains("file-key"));
        assert!(output.contains("- session.poll_interval_ms = 250 (source: file ("));
        assert!(output.contains("- agent.api_version = v1 (source: default)"));
        assert!(output.contains("- moderation.endpoint = <unset: moderation disabled>"));
        assert!(output.contains("- session.show_safety_analysis = false (source: default)"));
    });
}

#[test]
fn config_reports_log_level_alias_as_its_source() {
    let mut vars = service_env("https://agents.test");
    vars.push(("GUARDCHAT_LOG_LEVEL", "debug".to_string()));

    with_env(&vars, || {
        let result = config::run(None);
        assert_eq!(result.exit_code, 0);
        assert!(result
            .output
            .contains("- logging.level = debug (source: env (GUARDCHAT_LOG_LEVEL))"));
    });
}

#[test]
fn explicit_config_path_must_exist() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("absent.toml");

    with_env(&service_env("https://agents.test"), || {
        let result = config::run(Some(missing.as_path()));
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_fails_and_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[], || {
        let result = doctor::run(None, true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_passes_with_moderation_disabled_and_no_agents() {
    with_env(&service_env("https://agents.test"), || {
        let result = doctor::run(None, true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"][1]["name"], "moderation_mode");
        assert!(payload["checks"][1]["details"]
            .as_str()
            .unwrap_or_default()
            .contains("moderation disabled"));
        assert_eq!(payload["checks"][2]["name"], "agent_service");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_looks_up_the_default_agent() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assistants/asst_1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "asst_1", "name": "Mobilito"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        server
    });

    let mut vars = service_env(&server.uri());
    vars.push(("GUARDCHAT_AGENTS", AGENTS_JSON.to_string()));

    with_env(&vars, || {
        let result = doctor::run(None, false);
        assert_eq!(result.exit_code, 0, "unexpected report: {}", result.output);

        let lines = result.output.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "doctor: all readiness checks passed");
        assert!(lines[3]
            .starts_with("- [ok] agent_service: agent `asst_1` reachable as `Mobilito`"));
    });
}

#[test]
fn doctor_reports_unreachable_agent() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assistants/asst_1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such assistant"))
            .mount(&server)
            .await;
        server
    });

    let mut vars = service_env(&server.uri());
    vars.push(("GUARDCHAT_AGENTS", AGENTS_JSON.to_string()));

    with_env(&vars, || {
        let result = doctor::run(None, true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["checks"][2]["status"], "fail");
        let details = payload["checks"][2]["details"].as_str().unwrap_or_default();
        assert!(details.contains("failed to look up agent `asst_1`"));
        assert!(details.contains("404"));
    });
}

#[test]
fn chat_returns_config_failure_without_agent_service() {
    with_env(&[], || {
        let result = chat::run(ChatOptions::default());
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn chat_requires_an_agent_to_talk_to() {
    with_env(&service_env("https://agents.test"), || {
        let result = chat::run(ChatOptions::default());
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "agent_selection");
    });
}

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("guardchat.toml");
    fs::write(&path, contents).expect("write config");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, String)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "GUARDCHAT_AGENT_ENDPOINT",
        "GUARDCHAT_AGENT_API_KEY",
        "GUARDCHAT_AGENT_API_VERSION",
        "GUARDCHAT_AGENT_TIMEOUT_SECS",
        "GUARDCHAT_MODERATION_ENDPOINT",
        "GUARDCHAT_MODERATION_API_KEY",
        "GUARDCHAT_MODERATION_API_VERSION",
        "GUARDCHAT_MODERATION_TIMEOUT_SECS",
        "GUARDCHAT_SESSION_POLL_INTERVAL_MS",
        "GUARDCHAT_SESSION_RUN_DEADLINE_SECS",
        "GUARDCHAT_SESSION_CUSTOMER_ID",
        "GUARDCHAT_SESSION_SHOW_SAFETY_ANALYSIS",
        "GUARDCHAT_AGENTS",
        "GUARDCHAT_LOGGING_LEVEL",
        "GUARDCHAT_LOGGING_FORMAT",
        "GUARDCHAT_LOG_LEVEL",
        "GUARDCHAT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
