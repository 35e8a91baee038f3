use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub const API_KEY_VAR: &str = "TEAM_API_KEY";
pub const PIPELINE_ID_VAR: &str = "AIXPLAIN_PIPELINE_ID";
pub const INPUT_PATH_VAR: &str = "INPUT_AUDIO_PATH";

const BACKEND_URL_VAR: &str = "BACKEND_URL";
const OUTPUT_DIR_VAR: &str = "STTP_OUTPUT_DIR";
const POLL_INTERVAL_VAR: &str = "STTP_POLL_INTERVAL_MS";
const POLL_TIMEOUT_VAR: &str = "STTP_POLL_TIMEOUT_SECS";
const INPUT_NAME_VAR: &str = "STTP_INPUT_NAME";

const DEFAULT_BACKEND_URL: &str = "https://platform-api.aixplain.com";
const DEFAULT_OUTPUT_DIR: &str = "output_texts";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 20_000;
const DEFAULT_INPUT_NAME: &str = "Input 1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("[ERROR]: Missing {} in environment or .env", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("[ERROR]: {var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("[ERROR]: failed to load env file {path}: {reason}")]
    EnvFile { path: PathBuf, reason: String },
}

/// Settings for one run, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub pipeline_id: String,
    pub input_path: String,
    /// Label of the pipeline input slot the path is bound to.
    pub input_name: String,
    pub backend_url: String,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Config {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve using an arbitrary variable source. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(API_KEY_VAR);
        let pipeline_id = get(PIPELINE_ID_VAR);
        let input_path = get(INPUT_PATH_VAR);

        let (api_key, pipeline_id, input_path) = match (api_key, pipeline_id, input_path) {
            (Some(k), Some(p), Some(i)) => (k, p, i),
            (k, p, i) => {
                let missing = [(API_KEY_VAR, k.is_none()), (PIPELINE_ID_VAR, p.is_none()), (INPUT_PATH_VAR, i.is_none())]
                    .into_iter()
                    .filter_map(|(name, absent)| absent.then_some(name))
                    .collect();
                return Err(ConfigError::Missing(missing));
            }
        };

        let number = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(var) {
                None => Ok(default),
                Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber { var, value }),
            }
        };

        Ok(Self {
            api_key,
            pipeline_id,
            input_path,
            input_name: get(INPUT_NAME_VAR).unwrap_or_else(|| DEFAULT_INPUT_NAME.to_string()),
            backend_url: get(BACKEND_URL_VAR)
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            output_dir: get(OUTPUT_DIR_VAR).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            poll_interval: Duration::from_millis(number(POLL_INTERVAL_VAR, DEFAULT_POLL_INTERVAL_MS)?),
            poll_timeout: Duration::from_secs(number(POLL_TIMEOUT_VAR, DEFAULT_POLL_TIMEOUT_SECS)?),
        })
    }
}

/// Load a dotenv file into the process environment. Variables already set win.
///
/// With no explicit path, `.env` in the working directory is used if present;
/// an explicit path that cannot be read is an error.
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    match path {
        Some(p) => dotenvy::from_path(p).map(|_| Some(p.to_path_buf())).map_err(|e| ConfigError::EnvFile {
            path: p.to_path_buf(),
            reason: e.to_string(),
        }),
        None => match dotenvy::dotenv() {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(ConfigError::EnvFile {
                path: PathBuf::from(".env"),
                reason: e.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        (API_KEY_VAR, "key"),
        (PIPELINE_ID_VAR, "pipe-123"),
        (INPUT_PATH_VAR, "audio/sample.wav"),
    ];

    #[test]
    fn defaults_applied() {
        let cfg = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.api_key, "key");
        assert_eq!(cfg.pipeline_id, "pipe-123");
        assert_eq!(cfg.input_path, "audio/sample.wav");
        assert_eq!(cfg.input_name, "Input 1");
        assert_eq!(cfg.backend_url, "https://platform-api.aixplain.com");
        assert_eq!(cfg.output_dir, PathBuf::from("output_texts"));
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.poll_timeout, Duration::from_secs(20_000));
    }

    #[test]
    fn every_missing_combination_is_reported() {
        for mask in 0u8..7 {
            let present: Vec<(&str, &str)> = REQUIRED
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1u8 << *i) != 0)
                .map(|(_, kv)| *kv)
                .collect();
            let err = Config::from_lookup(lookup(&present)).unwrap_err();
            let names = match err {
                ConfigError::Missing(names) => names,
                other => panic!("unexpected error: {other}"),
            };
            let expected: Vec<&str> = REQUIRED
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1u8 << *i) == 0)
                .map(|(_, (k, _))| *k)
                .collect();
            assert_eq!(names, expected);
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[0] = (API_KEY_VAR, "   ");
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec![API_KEY_VAR]));
        assert!(err.to_string().starts_with("[ERROR]: Missing TEAM_API_KEY"));
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((BACKEND_URL_VAR, "http://127.0.0.1:9000/"));
        pairs.push((OUTPUT_DIR_VAR, "/tmp/out"));
        pairs.push((POLL_INTERVAL_VAR, "5"));
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.backend_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.poll_interval, Duration::from_millis(5));

        pairs.push((POLL_TIMEOUT_VAR, "soon"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { var: POLL_TIMEOUT_VAR, .. }));
    }

    #[test]
    fn explicit_env_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.env");
        assert!(matches!(load_dotenv(Some(&missing)), Err(ConfigError::EnvFile { .. })));
    }
}
