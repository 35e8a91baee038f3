use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use sttp_decoder::hex_dump;
use sttp_types::{Artifact, PipelineOutput};
use tokio::fs;
use tracing::info;

pub const JSON_FILE: &str = "pipeline_output.json";
pub const HEX_FILE: &str = "pipeline_output_hex.txt";
pub const TEXT_FILE: &str = "pipeline_output_text.txt";

/// Fixed artifact locations inside the output directory.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub json: PathBuf,
    pub hex: PathBuf,
    pub text: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            json: dir.join(JSON_FILE),
            hex: dir.join(HEX_FILE),
            text: dir.join(TEXT_FILE),
        }
    }
}

/// Dump `{"data": [...]}` with four-space indent, non-ASCII kept as is.
pub async fn write_json_dump(paths: &OutputPaths, output: &PipelineOutput) -> Result<()> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    output.serialize(&mut ser)?;
    fs::create_dir_all(&paths.dir)
        .await
        .with_context(|| format!("creating {}", paths.dir.display()))?;
    fs::write(&paths.json, buf)
        .await
        .with_context(|| format!("writing {}", paths.json.display()))?;
    info!(path = %paths.json.display(), "JSON output written");
    Ok(())
}

/// Hex and text file contents for an artifact.
pub fn render(artifact: &Artifact) -> (String, String) {
    match artifact {
        Artifact::Empty => (String::new(), String::new()),
        Artifact::Literal(text) => (hex_dump(text.as_bytes()), text.clone()),
        Artifact::Fetched { bytes, decoded } => (hex_dump(bytes), decoded.text.clone()),
        Artifact::Failed(failure) => (String::new(), failure.to_string()),
    }
}

/// Overwrite the hex and text files.
pub async fn write_artifact(paths: &OutputPaths, artifact: &Artifact) -> Result<()> {
    let (hex, text) = render(artifact);
    fs::create_dir_all(&paths.dir)
        .await
        .with_context(|| format!("creating {}", paths.dir.display()))?;
    fs::write(&paths.hex, hex)
        .await
        .with_context(|| format!("writing {}", paths.hex.display()))?;
    fs::write(&paths.text, text)
        .await
        .with_context(|| format!("writing {}", paths.text.display()))?;
    info!(hex = %paths.hex.display(), text = %paths.text.display(), kind = artifact.kind(), "output files written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sttp_types::{Decoded, FetchFailure};

    #[test]
    fn render_each_variant() {
        assert_eq!(render(&Artifact::Empty), (String::new(), String::new()));
        assert_eq!(
            render(&Artifact::Literal("hello".into())),
            ("68 65 6c 6c 6f".to_string(), "hello".to_string())
        );
        let fetched = Artifact::Fetched {
            bytes: b"caf\xc3\xa9".to_vec(),
            decoded: Decoded {
                text: "café".into(),
                encoding: "UTF-8",
                had_errors: false,
                repaired: false,
            },
        };
        assert_eq!(render(&fetched), ("63 61 66 c3 a9".to_string(), "café".to_string()));
        let (hex, text) = render(&Artifact::Failed(FetchFailure::Status(404)));
        assert!(hex.is_empty());
        assert!(text.contains("404"));
    }

    #[tokio::test]
    async fn creates_dir_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = OutputPaths::in_dir(&tmp.path().join("nested").join("out"));

        write_artifact(&paths, &Artifact::Literal("first, longer text".into())).await.unwrap();
        write_artifact(&paths, &Artifact::Literal("hi".into())).await.unwrap();
        assert_eq!(fs::read_to_string(&paths.text).await.unwrap(), "hi");
        assert_eq!(fs::read_to_string(&paths.hex).await.unwrap(), "68 69");
    }

    #[tokio::test]
    async fn json_dump_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = OutputPaths::in_dir(tmp.path());
        let output: PipelineOutput = serde_json::from_value(json!({"data": [{"response": "é"}]})).unwrap();
        write_json_dump(&paths, &output).await.unwrap();
        let written = fs::read_to_string(&paths.json).await.unwrap();
        assert!(written.contains("\n    \"data\""));
        assert!(written.contains("\"é\""));
        let back: PipelineOutput = serde_json::from_str(&written).unwrap();
        assert_eq!(back, output);
    }
}
