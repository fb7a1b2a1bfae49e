use std::path::Path;

use guardchat_core::config::ConfigOverrides;
use guardchat_core::AgentProfile;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct AgentEntry<'a> {
    id: &'a str,
    name: &'a str,
    kind: &'static str,
    created_at: Option<&'a str>,
    default: bool,
}

pub fn run(config_path: Option<&Path>, json_output: bool) -> CommandResult {
    let config = match load_config(config_path, ConfigOverrides::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("agents", &error),
    };

    let entries = config
        .agents
        .iter()
        .enumerate()
        .map(|(index, agent)| entry(agent, index == 0))
        .collect::<Vec<_>>();

    let output = if json_output {
        serde_json::to_string_pretty(&entries).unwrap_or_else(|error| {
            format!("{{\"error\":\"agent listing serialization failed: {error}\"}}")
        })
    } else {
        render_human(&entries)
    };

    CommandResult { exit_code: 0, output }
}

fn entry(agent: &AgentProfile, default: bool) -> AgentEntry<'_> {
    AgentEntry {
        id: &agent.id.0,
        name: &agent.name,
        kind: agent.kind.as_str(),
        created_at: agent.created_at.as_deref(),
        default,
    }
}

fn render_human(entries: &[AgentEntry<'_>]) -> String {
    if entries.is_empty() {
        return "no agents configured; add [[agents]] entries or set GUARDCHAT_AGENTS".to_string();
    }

    let mut lines = vec![format!("{} agent(s) configured:", entries.len())];
    for entry in entries {
        let marker = if entry.default { " (default)" } else { "" };
        let created = entry.created_at.map(|at| format!(", created {at}")).unwrap_or_default();
        lines.push(format!("- {} [{}] {}{created}{marker}", entry.name, entry.kind, entry.id));
    }
    lines.join("\n")
}
