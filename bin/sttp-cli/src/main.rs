use anyhow::Result;
use clap::Parser;
use sttp_pipeline::run_one;
use sttp_utils::{init_tracing, load_dotenv, Config};
use std::path::PathBuf;

/// Settings come from the environment (TEAM_API_KEY, AIXPLAIN_PIPELINE_ID,
/// INPUT_AUDIO_PATH, plus optional BACKEND_URL and STTP_* overrides).
#[derive(Parser, Debug)]
#[command(name = "sttp", about = "Run a remote speech/text pipeline and save its decoded result", version)]
struct Args {
    /// Dotenv file to load instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();

    if let Some(path) = load_dotenv(args.env_file.as_deref())? {
        tracing::debug!(path = %path.display(), "loaded env file");
    }
    let cfg = Config::from_env()?;
    tracing::info!("environment variables loaded");

    let summary = run_one(&cfg).await?;
    tracing::info!(
        artifact = %summary.artifact,
        text = %summary.text_path,
        elapsed = summary.processing_time,
        "run complete"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
