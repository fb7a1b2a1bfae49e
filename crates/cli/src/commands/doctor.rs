use std::path::Path;

use anyhow::Context;
use guardchat_agent::{AgentSessionClient, FoundryAgentsClient};
use guardchat_core::config::{AppConfig, ConfigOverrides};
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(config_path: Option<&Path>, json_output: bool) -> CommandResult {
    let report = build_report(config_path);
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(config_path: Option<&Path>) -> DoctorReport {
    let mut checks = Vec::new();

    match load_config(config_path, ConfigOverrides::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_moderation_mode(&config));
            checks.push(check_agent_service(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["moderation_mode", "agent_service"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_moderation_mode(config: &AppConfig) -> DoctorCheck {
    let details = match config.moderation.endpoint.as_deref() {
        Some(endpoint) if config.moderation.is_enabled() => {
            format!("content-safety screening enabled via `{endpoint}`")
        }
        _ => "moderation disabled; every message is treated as safe".to_string(),
    };
    DoctorCheck { name: "moderation_mode", status: CheckStatus::Pass, details }
}

fn check_agent_service(config: &AppConfig) -> DoctorCheck {
    let Some(agent) = config.default_agent() else {
        return DoctorCheck {
            name: "agent_service",
            status: CheckStatus::Skipped,
            details: "no agents configured to look up".to_string(),
        };
    };

    let lookup = || -> anyhow::Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to initialize async runtime")?;
        let client = FoundryAgentsClient::new(&config.agent)
            .context("failed to build agent service client")?;
        let info = runtime
            .block_on(client.get_agent(&agent.id))
            .with_context(|| format!("failed to look up agent `{}`", agent.id))?;
        Ok(info.name)
    };

    match lookup() {
        Ok(name) => DoctorCheck {
            name: "agent_service",
            status: CheckStatus::Pass,
            details: format!(
                "agent `{}` reachable as `{name}` at `{}`",
                agent.id, config.agent.endpoint
            ),
        },
        Err(error) => DoctorCheck {
            name: "agent_service",
            status: CheckStatus::Fail,
            details: format!("{error:#}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
