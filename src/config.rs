//! Runtime configuration
//!
//! Settings come from process environment variables (lower-case keys, the
//! CLI exports its flags into them) and fall back to built-in defaults.
//! [`Settings::validate`] turns bad values into a [`ConfigError`] before the
//! interactive loop starts.

use std::path::PathBuf;
use std::time::Duration;

use crate::agent::DEFAULT_MAX_ITERATIONS;
use crate::generation::DEFAULT_MAX_ATTEMPTS;
use crate::index::DEFAULT_TOP_K;
use crate::ollama::DEFAULT_OLLAMA_URL;
use crate::persistence::DEFAULT_OUTPUT_DIR;

pub const DOCUMENT_PATH_KEY: &str = "document_path";
pub const LLM_MODEL_KEY: &str = "llm_model";
pub const EMBED_MODEL_KEY: &str = "embed_model";
pub const CODE_AGENT_MODEL_KEY: &str = "code_agent_model";
pub const OLLAMA_URL_KEY: &str = "ollama_url";
pub const OUTPUT_DIR_KEY: &str = "output_dir";
pub const MAX_ATTEMPTS_KEY: &str = "max_attempts";
pub const REQUEST_TIMEOUT_KEY: &str = "request_timeout_secs";
pub const AGENT_MAX_ITERATIONS_KEY: &str = "agent_max_iterations";
pub const RETRIEVAL_TOP_K_KEY: &str = "retrieval_top_k";
pub const OTLP_ENDPOINT_KEY: &str = "otlp_endpoint";
pub const METRICS_PATH_KEY: &str = "metrics_path";
pub const UNLOAD_AFTER_ROUND_KEY: &str = "unload_after_round";
pub const PROMPT_DIR_KEY: &str = "prompt_dir";

pub const DEFAULT_DOCUMENT_PATH: &str = "./data";
pub const DEFAULT_LLM_MODEL: &str = "dolphin-mistral:latest";
pub const DEFAULT_EMBED_MODEL: &str = "local:BAAI/bge-m3";
pub const DEFAULT_CODE_AGENT_MODEL: &str = "red-team-expert:latest";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 360;

/// Error type for configuration problems
#[derive(Debug)]
pub enum ConfigError {
    /// A model name is empty
    EmptyModelName(&'static str),
    /// The document path does not exist or is not a directory
    DocumentPath(PathBuf),
    /// A numeric or boolean setting could not be parsed
    InvalidValue { key: &'static str, value: String },
    /// A numeric setting is out of range
    OutOfRange { key: &'static str, message: &'static str },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EmptyModelName(key) => write!(f, "No model name given for {}", key),
            ConfigError::DocumentPath(path) => {
                write!(f, "Document path {} is not an existing directory", path.display())
            }
            ConfigError::InvalidValue { key, value } => write!(f, "Invalid value for {}: {:?}", key, value),
            ConfigError::OutOfRange { key, message } => write!(f, "{} {}", key, message),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything the binary needs to build a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub document_path: PathBuf,
    pub llm_model: String,
    pub embed_model: String,
    pub code_agent_model: String,
    pub ollama_url: String,
    pub output_dir: PathBuf,
    pub max_attempts: usize,
    pub request_timeout: Duration,
    pub agent_max_iterations: usize,
    pub retrieval_top_k: usize,
    pub otlp_endpoint: Option<String>,
    pub metrics_path: Option<PathBuf>,
    pub unload_after_round: bool,
    pub prompt_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            code_agent_model: DEFAULT_CODE_AGENT_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            agent_max_iterations: DEFAULT_MAX_ITERATIONS,
            retrieval_top_k: DEFAULT_TOP_K,
            otlp_endpoint: None,
            metrics_path: None,
            unload_after_round: false,
            prompt_dir: None,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        Ok(Self {
            document_path: get(DOCUMENT_PATH_KEY).map(PathBuf::from).unwrap_or(defaults.document_path),
            llm_model: get(LLM_MODEL_KEY).unwrap_or(defaults.llm_model),
            embed_model: get(EMBED_MODEL_KEY).unwrap_or(defaults.embed_model),
            code_agent_model: get(CODE_AGENT_MODEL_KEY).unwrap_or(defaults.code_agent_model),
            ollama_url: get(OLLAMA_URL_KEY).unwrap_or(defaults.ollama_url),
            output_dir: get(OUTPUT_DIR_KEY).map(PathBuf::from).unwrap_or(defaults.output_dir),
            max_attempts: parse_or(get(MAX_ATTEMPTS_KEY), MAX_ATTEMPTS_KEY, defaults.max_attempts)?,
            request_timeout: Duration::from_secs(parse_or(
                get(REQUEST_TIMEOUT_KEY),
                REQUEST_TIMEOUT_KEY,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            agent_max_iterations: parse_or(
                get(AGENT_MAX_ITERATIONS_KEY),
                AGENT_MAX_ITERATIONS_KEY,
                defaults.agent_max_iterations,
            )?,
            retrieval_top_k: parse_or(get(RETRIEVAL_TOP_K_KEY), RETRIEVAL_TOP_K_KEY, defaults.retrieval_top_k)?,
            otlp_endpoint: get(OTLP_ENDPOINT_KEY),
            metrics_path: get(METRICS_PATH_KEY).map(PathBuf::from),
            unload_after_round: match get(UNLOAD_AFTER_ROUND_KEY) {
                Some(value) => parse_bool(UNLOAD_AFTER_ROUND_KEY, &value)?,
                None => defaults.unload_after_round,
            },
            prompt_dir: get(PROMPT_DIR_KEY).map(PathBuf::from),
        })
    }

    /// Check the settings that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, name) in [
            (LLM_MODEL_KEY, &self.llm_model),
            (EMBED_MODEL_KEY, &self.embed_model),
            (CODE_AGENT_MODEL_KEY, &self.code_agent_model),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyModelName(key));
            }
        }
        if !self.document_path.is_dir() {
            return Err(ConfigError::DocumentPath(self.document_path.clone()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                key: MAX_ATTEMPTS_KEY,
                message: "must be at least 1",
            });
        }
        if self.agent_max_iterations == 0 {
            return Err(ConfigError::OutOfRange {
                key: AGENT_MAX_ITERATIONS_KEY,
                message: "must be at least 1",
            });
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::OutOfRange {
                key: RETRIEVAL_TOP_K_KEY,
                message: "must be at least 1",
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: REQUEST_TIMEOUT_KEY,
                message: "must be at least 1 second",
            });
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = from_pairs(&[]).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.document_path, PathBuf::from("./data"));
        assert_eq!(settings.llm_model, "dolphin-mistral:latest");
        assert_eq!(settings.embed_model, "local:BAAI/bge-m3");
        assert_eq!(settings.code_agent_model, "red-team-expert:latest");
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.request_timeout, Duration::from_secs(360));
    }

    #[test]
    fn test_environment_overrides() {
        let settings = from_pairs(&[
            (LLM_MODEL_KEY, "llama3"),
            (MAX_ATTEMPTS_KEY, "3"),
            (UNLOAD_AFTER_ROUND_KEY, "true"),
            (OTLP_ENDPOINT_KEY, "http://localhost:4317"),
            (EMBED_MODEL_KEY, "   "),
        ])
        .unwrap();
        assert_eq!(settings.llm_model, "llama3");
        assert_eq!(settings.max_attempts, 3);
        assert!(settings.unload_after_round);
        assert_eq!(settings.otlp_endpoint.as_deref(), Some("http://localhost:4317"));
        assert_eq!(settings.embed_model, DEFAULT_EMBED_MODEL);
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(matches!(
            from_pairs(&[(MAX_ATTEMPTS_KEY, "five")]),
            Err(ConfigError::InvalidValue { key: MAX_ATTEMPTS_KEY, .. })
        ));
        assert!(matches!(
            from_pairs(&[(UNLOAD_AFTER_ROUND_KEY, "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings {
            document_path: dir.path().to_path_buf(),
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());

        settings.max_attempts = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::OutOfRange { .. })));

        settings.max_attempts = 3;
        settings.code_agent_model = String::new();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::EmptyModelName(CODE_AGENT_MODEL_KEY))
        ));

        settings.code_agent_model = "m".to_string();
        settings.document_path = dir.path().join("missing");
        assert!(matches!(settings.validate(), Err(ConfigError::DocumentPath(_))));
    }
}
