//! Pipeline orchestrator: invoke, extract, fetch, decode, write.

mod extract;
mod output;

pub use extract::{extract_response, ExtractError};
pub use output::{render, write_artifact, write_json_dump, OutputPaths, HEX_FILE, JSON_FILE, TEXT_FILE};

use anyhow::{Context, Result};
use std::time::Instant;
use sttp_decoder::decode_bytes;
use sttp_fetcher::fetch_bytes;
use sttp_transcribe::{PipelineClient, PipelineInput, PollOptions};
use sttp_types::{Artifact, FetchOutcome, ResponseRef, RunSummary};
use sttp_utils::Config;
use tracing::{error, info, warn};

/// Turn the extracted reference into the artifact to write.
///
/// Fetch failures come back as [`Artifact::Failed`], never as errors.
pub async fn resolve_artifact(response: Option<ResponseRef>) -> Artifact {
    match response {
        None => Artifact::Empty,
        Some(ResponseRef::Text(text)) => Artifact::Literal(text),
        Some(ResponseRef::Url(url)) => match fetch_bytes(&url).await {
            FetchOutcome::Fetched(body) => {
                let decoded = decode_bytes(&body.bytes);
                Artifact::Fetched {
                    bytes: body.bytes,
                    decoded,
                }
            }
            FetchOutcome::Failed(failure) => Artifact::Failed(failure),
        },
    }
}

/// One full run against the configured pipeline.
pub async fn run_one(cfg: &Config) -> Result<RunSummary> {
    let start = Instant::now();
    let client = PipelineClient::new(&cfg.backend_url, &cfg.api_key)?;

    info!(input = %cfg.input_path, pipeline = %cfg.pipeline_id, "running pipeline with file");
    let inputs = [PipelineInput {
        label: cfg.input_name.clone(),
        value: cfg.input_path.clone(),
    }];
    let poll = PollOptions {
        interval: cfg.poll_interval,
        timeout: cfg.poll_timeout,
    };
    let output = client
        .run(&cfg.pipeline_id, &inputs, poll)
        .await
        .context("pipeline run failed")?;

    let paths = OutputPaths::in_dir(&cfg.output_dir);
    write_json_dump(&paths, &output).await?;

    let response = extract_response(&output).context("result extraction failed")?;
    let response_url = match &response {
        Some(ResponseRef::Url(url)) => {
            info!(%url, "extracted response URL");
            Some(url.clone())
        }
        _ => None,
    };

    let artifact = resolve_artifact(response).await;
    let encoding = match &artifact {
        Artifact::Empty => None,
        Artifact::Literal(_) => Some("UTF-8"),
        Artifact::Fetched { decoded, .. } => {
            if decoded.had_errors {
                warn!(encoding = decoded.encoding, "invalid byte sequences were replaced");
            }
            Some(decoded.encoding)
        }
        Artifact::Failed(failure) => {
            error!(%failure, "writing failure message instead of content");
            None
        }
    };
    write_artifact(&paths, &artifact).await?;

    Ok(RunSummary {
        pipeline_id: cfg.pipeline_id.clone(),
        input_path: cfg.input_path.clone(),
        artifact: artifact.kind().to_string(),
        response_url,
        encoding: encoding.map(str::to_string),
        json_path: paths.json.display().to_string(),
        hex_path: paths.hex.display().to_string(),
        text_path: paths.text.display().to_string(),
        processing_time: start.elapsed().as_secs_f64(),
    })
}
