//! Run tracing for chats and workflow nodes.
//!
//! Runs are reported to a [`RunTracer`]. The LangSmith tracer posts them in
//! the background; a missing API key selects [`NoopTracer`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use teller_core::config::TracingSettings;
use teller_core::{AppError, AppResult};
use uuid::Uuid;

/// Kind of traced run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Chain,
    Llm,
    Tool,
}

/// One finished run.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: Uuid,
    pub name: String,
    pub run_type: RunType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<Uuid>,
    pub inputs: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A run that has started but not finished.
#[derive(Debug)]
pub struct RunSpan {
    run: Run,
}

impl RunSpan {
    pub fn begin(name: impl Into<String>, run_type: RunType, inputs: Value) -> Self {
        let now = Utc::now();
        Self {
            run: Run {
                id: Uuid::new_v4(),
                name: name.into(),
                run_type,
                parent_run_id: None,
                inputs,
                outputs: None,
                error: None,
                start_time: now,
                end_time: now,
            },
        }
    }

    pub fn with_parent(mut self, parent: Uuid) -> Self {
        self.run.parent_run_id = Some(parent);
        self
    }

    pub fn id(&self) -> Uuid {
        self.run.id
    }

    pub fn succeed(mut self, outputs: Value) -> Run {
        self.run.outputs = Some(outputs);
        self.run.end_time = Utc::now();
        self.run
    }

    pub fn fail(mut self, error: impl Into<String>) -> Run {
        self.run.error = Some(error.into());
        self.run.end_time = Utc::now();
        self.run
    }
}

/// Destination for finished runs.
///
/// `record` must not block and must never fail the caller.
pub trait RunTracer: Send + Sync {
    fn record(&self, run: Run);

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Tracer that drops every run.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl RunTracer for NoopTracer {
    fn record(&self, _run: Run) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Serialize)]
struct RunPayload<'a> {
    #[serde(flatten)]
    run: &'a Run,
    session_name: &'a str,
}

/// Posts runs to the LangSmith `runs` endpoint.
pub struct LangSmithTracer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    project: String,
}

impl LangSmithTracer {
    pub fn new(endpoint: &str, api_key: &str, project: &str) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Agent(format!("Failed to create tracing client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            project: project.to_string(),
        })
    }

    fn payload(&self, run: &Run) -> AppResult<Value> {
        Ok(serde_json::to_value(RunPayload {
            run,
            session_name: &self.project,
        })?)
    }
}

impl RunTracer for LangSmithTracer {
    fn record(&self, run: Run) {
        let payload = match self.payload(&run) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("Failed to serialize run {}: {}", run.name, e);
                return;
            }
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime available, dropping run {}", run.name);
            return;
        };

        let request = self
            .client
            .post(format!("{}/runs", self.endpoint))
            .header("x-api-key", &self.api_key)
            .json(&payload);
        let name = run.name;

        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::trace!("Traced run {}", name);
                }
                Ok(response) => {
                    tracing::debug!("Tracing run {} rejected: {}", name, response.status());
                }
                Err(e) => tracing::debug!("Tracing run {} failed: {}", name, e),
            }
        });
    }
}

/// Tracer selected by the `tracing` settings.
pub fn from_settings(settings: &TracingSettings) -> AppResult<Arc<dyn RunTracer>> {
    match settings.api_key.as_deref() {
        Some(key) => {
            tracing::info!("Run tracing enabled for project {}", settings.project);
            Ok(Arc::new(LangSmithTracer::new(&settings.endpoint, key, &settings.project)?))
        }
        None => {
            tracing::debug!("Run tracing disabled: LANGCHAIN_API_KEY not set");
            Ok(Arc::new(NoopTracer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_span_records_outcome() {
        let parent = RunSpan::begin("chat", RunType::Chain, json!({"query": "hi"}));
        let parent_id = parent.id();

        let child = RunSpan::begin("use_model", RunType::Tool, json!({})).with_parent(parent_id);
        let run = child.fail("boom");
        assert_eq!(run.parent_run_id, Some(parent_id));
        assert_eq!(run.error.as_deref(), Some("boom"));
        assert!(run.end_time >= run.start_time);

        let run = parent.succeed(json!({"response": "hello"}));
        assert_eq!(run.outputs, Some(json!({"response": "hello"})));
    }

    #[test]
    fn test_payload_shape() {
        let tracer = LangSmithTracer::new("https://smith.example.test/", "key", "bank_service_agent").unwrap();
        assert_eq!(tracer.endpoint, "https://smith.example.test");

        let run = RunSpan::begin("chat", RunType::Chain, json!({"query": "hi"})).succeed(json!({}));
        let payload = tracer.payload(&run).unwrap();

        assert_eq!(payload["name"], "chat");
        assert_eq!(payload["run_type"], "chain");
        assert_eq!(payload["session_name"], "bank_service_agent");
        assert!(payload.get("error").is_none());
        assert!(payload["start_time"].is_string());
    }

    #[test]
    fn test_record_without_runtime_is_silent() {
        let tracer = LangSmithTracer::new("http://127.0.0.1:9", "key", "p").unwrap();
        tracer.record(RunSpan::begin("chat", RunType::Chain, json!({})).succeed(json!({})));
    }

    #[test]
    fn test_from_settings_without_key_is_noop() {
        let tracer = from_settings(&TracingSettings::default()).unwrap();
        assert!(!tracer.is_enabled());

        let settings = TracingSettings {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(from_settings(&settings).unwrap().is_enabled());
    }
}
