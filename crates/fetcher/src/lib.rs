//! Fetcher: downloads a pipeline response URL into memory.
//!
//! Failures never escape as errors. A non-200 status or a broken transfer
//! comes back as [`FetchOutcome::Failed`] so the caller can write it out.

use anyhow::{anyhow, bail, Context, Result};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use sttp_types::{FetchFailure, FetchOutcome, FetchedBody};
use tracing::{error, info, instrument};
use url::Url;

/// Upper bound on the buffer reserved from a Content-Length header; the
/// header is untrusted, the buffer still grows past this as bytes arrive.
const MAX_PREALLOC: u64 = 1 << 20;

/// Generic desktop browser UA; some artifact hosts reject library agents.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// GET `url` and collect the whole body.
#[instrument]
pub async fn fetch_bytes(url: &str) -> FetchOutcome {
    match try_fetch(url).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %format!("{e:#}"), "download failed");
            FetchOutcome::Failed(FetchFailure::Transport(format!("{e:#}")))
        }
    }
}

async fn try_fetch(url: &str) -> Result<FetchOutcome> {
    let parsed = Url::parse(url).map_err(|e| anyhow!("invalid url {url:?}: {e}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        bail!("unsupported scheme: {}", parsed.scheme());
    }

    let client = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .build()?;

    let resp = client.get(parsed.as_str()).send().await.context("request failed")?;
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        error!(status = status.as_u16(), "failed to download file");
        return Ok(FetchOutcome::Failed(FetchFailure::Status(status.as_u16())));
    }

    let final_url = resp.url().to_string();
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let mut hasher = Sha256::new();
    let reserve = resp.content_length().unwrap_or(0).min(MAX_PREALLOC) as usize;
    let mut bytes = Vec::with_capacity(reserve);
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await.transpose().context("stream error")? {
        hasher.update(&chunk);
        bytes.extend_from_slice(&chunk);
    }
    let sha256 = hex::encode(hasher.finalize());

    info!(len = bytes.len(), content_type = ?content_type, %sha256, "downloaded response");
    Ok(FetchOutcome::Fetched(FetchedBody {
        final_url,
        bytes,
        content_type,
        sha256,
    }))
}
