use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Severity at or above which a category makes text unsafe.
pub const MEDIUM_SEVERITY_THRESHOLD: u8 = 2;

pub const REASON_DISABLED: &str = "moderation disabled";
pub const REASON_UNAVAILABLE: &str = "moderation unavailable";
pub const REASON_SAFE: &str = "content is safe";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySeverity {
    pub category: String,
    pub severity: u8,
}

impl CategorySeverity {
    pub fn new(category: impl Into<String>, severity: u8) -> Self {
        Self { category: category.into(), severity }
    }
}

/// How a verdict was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictMode {
    Evaluated,
    /// No backend configured: explicit bypass.
    Disabled,
    /// Backend failed; verdict is fail-open.
    Unavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBand {
    Low,
    Medium,
    High,
}

impl SeverityBand {
    pub fn for_severity(severity: u8) -> Self {
        match severity {
            0..=1 => Self::Low,
            2..=3 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub is_safe: bool,
    pub reason: String,
    pub category_severities: BTreeMap<String, u8>,
    pub mode: VerdictMode,
}

impl ModerationVerdict {
    pub fn disabled() -> Self {
        Self {
            is_safe: true,
            reason: REASON_DISABLED.to_string(),
            category_severities: BTreeMap::new(),
            mode: VerdictMode::Disabled,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            is_safe: true,
            reason: REASON_UNAVAILABLE.to_string(),
            category_severities: BTreeMap::new(),
            mode: VerdictMode::Unavailable,
        }
    }

    pub fn from_categories(categories: &[CategorySeverity]) -> Self {
        let mut category_severities = BTreeMap::new();
        for entry in categories {
            let slot = category_severities.entry(entry.category.clone()).or_insert(0);
            *slot = (*slot).max(entry.severity);
        }

        let flagged = category_severities
            .iter()
            .filter(|(_, severity)| **severity >= MEDIUM_SEVERITY_THRESHOLD)
            .map(|(category, severity)| format!("{category} (severity: {severity})"))
            .collect::<Vec<_>>();

        let (is_safe, reason) = if flagged.is_empty() {
            (true, REASON_SAFE.to_string())
        } else {
            (false, format!("flagged for: {}", flagged.join(", ")))
        };

        Self { is_safe, reason, category_severities, mode: VerdictMode::Evaluated }
    }

    pub fn max_severity(&self) -> u8 {
        self.category_severities.values().copied().max().unwrap_or(0)
    }

    /// True when the verdict was not produced by a working backend call.
    pub fn is_degraded(&self) -> bool {
        self.mode == VerdictMode::Unavailable
    }

    pub fn flagged_categories(&self) -> Vec<&str> {
        self.category_severities
            .iter()
            .filter(|(_, severity)| **severity >= MEDIUM_SEVERITY_THRESHOLD)
            .map(|(category, _)| category.as_str())
            .collect()
    }

    /// One line per category, e.g. `[medium] Hate: severity 3`.
    pub fn breakdown_lines(&self) -> Vec<String> {
        self.category_severities
            .iter()
            .map(|(category, severity)| {
                format!(
                    "[{}] {category}: severity {severity}",
                    SeverityBand::for_severity(*severity).as_str()
                )
            })
            .collect()
    }
}
