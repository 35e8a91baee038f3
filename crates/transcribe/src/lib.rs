//! Client for the remote pipeline execution service.
//!
//! A run is submitted once and then polled until the service reports it as
//! completed. Nothing here retries; a failed request ends the run.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use sttp_types::PipelineOutput;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

const RUN_PATH: &str = "assets/pipeline/execution/run";

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("[ERROR]: invalid pipeline url {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("[ERROR]: pipeline request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("[ERROR]: pipeline service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("[ERROR]: unexpected pipeline response: {0}")]
    Body(#[from] serde_json::Error),
    #[error("[ERROR]: submit response carried no poll url")]
    NoPollUrl,
    #[error("[ERROR]: pipeline {pipeline_id} failed: {reason}")]
    Failed { pipeline_id: String, reason: String },
    #[error("[ERROR]: pipeline {pipeline_id} did not complete within {waited:?}")]
    Timeout { pipeline_id: String, waited: Duration },
}

/// One value bound to a named pipeline input slot.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineInput {
    pub label: String,
    pub value: String,
}

impl PipelineInput {
    /// Only http(s) links are readable by the service; a local path is not
    /// uploaded from here.
    pub fn is_remote(&self) -> bool {
        Url::parse(&self.value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
    }
}

#[derive(Debug, Serialize)]
struct RunPayload<'a> {
    data: &'a [PipelineInput],
}

#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

pub struct PipelineClient {
    http: reqwest::Client,
    backend: Url,
    api_key: String,
}

impl PipelineClient {
    pub fn new(backend_url: &str, api_key: &str) -> Result<Self, InvokeError> {
        // trailing slash so `join` appends instead of replacing the last segment
        let base = format!("{}/", backend_url.trim_end_matches('/'));
        let backend = Url::parse(&base).map_err(|source| InvokeError::Url { url: base.clone(), source })?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("sttp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            backend,
            api_key: api_key.to_string(),
        })
    }

    /// Submit `inputs` to pipeline `pipeline_id` and wait for the result.
    #[instrument(skip(self, inputs), fields(inputs = inputs.len()))]
    pub async fn run(
        &self,
        pipeline_id: &str,
        inputs: &[PipelineInput],
        poll: PollOptions,
    ) -> Result<PipelineOutput, InvokeError> {
        for input in inputs.iter().filter(|i| !i.is_remote()) {
            warn!(label = %input.label, value = %input.value, "input is not a URL; the service cannot read local files");
        }
        let run_url = self.join(&format!("{RUN_PATH}/{pipeline_id}"))?;
        let resp = self
            .http
            .post(run_url)
            .header("x-api-key", &self.api_key)
            .json(&RunPayload { data: inputs })
            .send()
            .await?;
        let submitted = read_json(resp).await?;

        if let Some(output) = completed_output(&submitted, pipeline_id)? {
            return Ok(output);
        }
        let poll_url = submitted
            .get("url")
            .and_then(Value::as_str)
            .ok_or(InvokeError::NoPollUrl)
            .and_then(|u| self.join(u))?;
        info!(%poll_url, "pipeline submitted, waiting for completion");

        let started = Instant::now();
        loop {
            let resp = self.http.get(poll_url.clone()).header("x-api-key", &self.api_key).send().await?;
            let body = read_json(resp).await?;
            if let Some(output) = completed_output(&body, pipeline_id)? {
                info!(entries = output.data.len(), elapsed = ?started.elapsed(), "pipeline completed");
                return Ok(output);
            }
            if started.elapsed() >= poll.timeout {
                return Err(InvokeError::Timeout {
                    pipeline_id: pipeline_id.to_string(),
                    waited: started.elapsed(),
                });
            }
            debug!(progress = ?body.get("progress"), "pipeline still running");
            sleep(poll.interval).await;
        }
    }

    fn join(&self, path: &str) -> Result<Url, InvokeError> {
        self.backend.join(path).map_err(|source| InvokeError::Url {
            url: path.to_string(),
            source,
        })
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value, InvokeError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(InvokeError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// `Some` once the body reports completion; `Err` if it reports a failure.
fn completed_output(body: &Value, pipeline_id: &str) -> Result<Option<PipelineOutput>, InvokeError> {
    if let Some(reason) = failure_reason(body) {
        return Err(InvokeError::Failed {
            pipeline_id: pipeline_id.to_string(),
            reason,
        });
    }
    if body.get("completed").and_then(Value::as_bool) != Some(true) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(body.clone())?))
}

fn failure_reason(body: &Value) -> Option<String> {
    let text = |key: &str| body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
    let status = text("status").map(str::to_ascii_uppercase);
    let failed = matches!(status.as_deref(), Some("FAILED") | Some("ERROR"));
    match (text("error"), text("supplierError")) {
        (Some(e), _) | (None, Some(e)) => Some(e.to_string()),
        (None, None) if failed => Some(format!("status {}", status.unwrap_or_default())),
        _ => None,
    }
}
