use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use guardchat_core::config::ModerationConfig;
use guardchat_core::{
    CategorySeverity, ModerationVerdict, ServiceError, TelemetryContext, TelemetryRecord,
    TelemetryScope, TelemetrySink,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SERVICE: &str = "moderation";

/// Text classifier returning one severity per harm category.
#[async_trait]
pub trait ModerationBackend: Send + Sync {
    async fn analyze_text(&self, text: &str) -> Result<Vec<CategorySeverity>, ServiceError>;
}

/// Which side of the exchange a piece of text came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModerationStage {
    Input,
    Output,
}

impl ModerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// Classifies text as safe or unsafe. Never fails: a backend error yields the
/// fail-open verdict, and no backend yields the explicit bypass verdict.
#[derive(Clone)]
pub struct ModerationGate {
    backend: Option<Arc<dyn ModerationBackend>>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ModerationGate {
    pub fn disabled(telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self { backend: None, telemetry }
    }

    pub fn with_backend(
        backend: Arc<dyn ModerationBackend>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self { backend: Some(backend), telemetry }
    }

    pub fn from_config(
        config: &ModerationConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, ServiceError> {
        if !config.is_enabled() {
            return Ok(Self::disabled(telemetry));
        }
        let client = ContentSafetyClient::from_config(config)?;
        Ok(Self::with_backend(Arc::new(client), telemetry))
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn evaluate(
        &self,
        text: &str,
        stage: ModerationStage,
        context: &TelemetryContext,
    ) -> ModerationVerdict {
        let Some(backend) = &self.backend else {
            let verdict = ModerationVerdict::disabled();
            self.record(&verdict, stage, context, None);
            return verdict;
        };

        match backend.analyze_text(text).await {
            Ok(categories) => {
                let verdict = ModerationVerdict::from_categories(&categories);
                debug!(
                    event_name = "moderation.evaluated",
                    stage = stage.as_str(),
                    is_safe = verdict.is_safe,
                    max_severity = verdict.max_severity(),
                    "text moderated"
                );
                self.record(&verdict, stage, context, None);
                verdict
            }
            Err(error) => {
                warn!(
                    event_name = "moderation.unavailable",
                    stage = stage.as_str(),
                    service = error.service(),
                    error = %error,
                    "moderation backend failed; letting text through"
                );
                let verdict = ModerationVerdict::unavailable();
                self.record(&verdict, stage, context, Some(&error));
                verdict
            }
        }
    }

    fn record(
        &self,
        verdict: &ModerationVerdict,
        stage: ModerationStage,
        context: &TelemetryContext,
        error: Option<&ServiceError>,
    ) {
        let mut record = TelemetryRecord::new(
            TelemetryScope::Moderation,
            format!("moderation.{}", stage.as_str()),
            context,
        )
        .with_attribute("moderation.enabled", self.is_enabled())
        .with_attribute("moderation.is_flagged", !verdict.is_safe)
        .with_attribute("moderation.degraded", verdict.is_degraded())
        .with_attribute("moderation.max_severity", verdict.max_severity())
        .with_attribute("moderation.reason", &verdict.reason);

        for (category, severity) in &verdict.category_severities {
            record = record.with_attribute(
                format!("moderation.{}_severity", category.to_ascii_lowercase()),
                severity,
            );
        }
        if let Some(error) = error {
            record = record.with_attribute("moderation.error", error);
        }

        self.telemetry.emit(record);
    }
}

/// HTTP client for the content-safety `text:analyze` operation.
#[derive(Clone)]
pub struct ContentSafetyClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    api_version: String,
}

impl ContentSafetyClient {
    pub fn new(
        endpoint: &str,
        api_key: SecretString,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(timeout).build().map_err(transport)?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            api_key,
            api_version: api_version.into(),
        })
    }

    pub fn from_config(config: &ModerationConfig) -> Result<Self, ServiceError> {
        let endpoint = config.endpoint.as_deref().unwrap_or_default();
        let api_key = config.api_key.clone().unwrap_or_else(|| String::new().into());
        Self::new(
            endpoint,
            api_key,
            config.api_version.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

fn transport(error: reqwest::Error) -> ServiceError {
    ServiceError::Transport { service: SERVICE, message: error.to_string() }
}

#[derive(Debug, Serialize)]
struct AnalyzeTextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeTextResponse {
    #[serde(default)]
    categories_analysis: Vec<CategoryAnalysis>,
}

#[derive(Debug, Deserialize)]
struct CategoryAnalysis {
    category: String,
    #[serde(default)]
    severity: Option<u8>,
}

#[async_trait]
impl ModerationBackend for ContentSafetyClient {
    async fn analyze_text(&self, text: &str) -> Result<Vec<CategorySeverity>, ServiceError> {
        let response = self
            .client
            .post(format!("{}/contentsafety/text:analyze", self.endpoint))
            .query(&[("api-version", self.api_version.as_str())])
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose_secret())
            .json(&AnalyzeTextRequest { text })
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { service: SERVICE, status: status.as_u16(), body });
        }

        let analysis: AnalyzeTextResponse = response.json().await.map_err(|error| {
            ServiceError::Decode { service: SERVICE, message: error.to_string() }
        })?;

        Ok(analysis
            .categories_analysis
            .into_iter()
            .map(|entry| CategorySeverity::new(entry.category, entry.severity.unwrap_or(0)))
            .collect())
    }
}
