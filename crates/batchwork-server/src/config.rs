//! Server configuration: TOML file plus `BATCHWORK_*` environment overrides.
//!
//! File lookup order: `--config <path>`, then `BATCHWORK_CONFIG`, then
//! `./batchwork.toml` when present, else built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use batchwork_core::domain::ErrorKind;
use batchwork_core::engine::FailurePolicy;
use batchwork_core::retry::{BackoffPolicy, RetryOn, RetryPolicy};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "batchwork.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("--config needs a path")]
    MissingConfigPath,
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub job: JobConfig,
    pub step: StepConfig,
    pub retry: RetryConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub processor: ProcessorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub name: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: "main_job".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepConfig {
    pub name: String,
    pub chunk_size: usize,
    pub throttle_limit: usize,
    pub pool_size: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            name: "retryStep".to_string(),
            chunk_size: 1,
            throttle_limit: 1,
            pool_size: 4,
            failure_policy: FailurePolicy::AbortOnFirstFailure,
        }
    }
}

/// `retry_on = "all"` or a list of error kind names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RetryOnSetting {
    Keyword(String),
    Kinds(Vec<String>),
}

impl Default for RetryOnSetting {
    fn default() -> Self {
        RetryOnSetting::Keyword("all".to_string())
    }
}

impl RetryOnSetting {
    pub fn to_retry_on(&self) -> Result<RetryOn, ConfigError> {
        match self {
            RetryOnSetting::Keyword(word) if word == "all" => Ok(RetryOn::All),
            RetryOnSetting::Keyword(word) => Ok(RetryOn::Kinds(vec![parse_kind(word)?])),
            RetryOnSetting::Kinds(names) => names
                .iter()
                .map(|name| parse_kind(name))
                .collect::<Result<Vec<_>, _>>()
                .map(RetryOn::Kinds),
        }
    }
}

fn parse_kind(name: &str) -> Result<ErrorKind, ConfigError> {
    name.parse().map_err(|e: String| invalid("retry.retry_on", e))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub limit: u32,
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
    pub retry_on: RetryOnSetting,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            limit: 3,
            initial_interval_ms: 2000,
            multiplier: 2.0,
            max_interval_ms: 30_000,
            retry_on: RetryOnSetting::default(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy, ConfigError> {
        Ok(RetryPolicy::new(
            self.limit,
            BackoffPolicy::new(
                Duration::from_millis(self.initial_interval_ms),
                self.multiplier,
                Duration::from_millis(self.max_interval_ms),
            ),
            self.retry_on.to_retry_on()?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub path: PathBuf,

    /// Records read per run; 0 reads the whole file.
    pub max_item_count: usize,
    pub delimiter: char,
    pub has_headers: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("resources/tasks.csv"),
            max_item_count: 1,
            delimiter: ',',
            has_headers: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub reset_on_startup: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output.txt"),
            reset_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    pub result: String,

    /// Fail the first N attempts of every task (retry demo).
    pub simulated_failures: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            result: "Processed".to_string(),
            simulated_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let set = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = set("BATCHWORK_HOST") {
            self.server.host = v;
        }
        if let Some(v) = set("BATCHWORK_PORT") {
            self.server.port = v
                .trim()
                .parse()
                .map_err(|e| invalid("BATCHWORK_PORT", format!("{v:?}: {e}")))?;
        }
        if let Some(v) = set("BATCHWORK_INPUT") {
            self.input.path = PathBuf::from(v);
        }
        if let Some(v) = set("BATCHWORK_OUTPUT") {
            self.output.path = PathBuf::from(v);
        }
        if let Some(v) = set("BATCHWORK_LOG") {
            self.logging.filter = v;
        }
        Ok(())
    }

    /// Reject values the step builder would not catch with a clear message.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.delimiter.is_ascii() {
            return Err(invalid("input.delimiter", "must be a single ASCII character"));
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err(invalid("retry.multiplier", "must be a finite number >= 1.0"));
        }
        if self.retry.max_interval_ms < self.retry.initial_interval_ms {
            return Err(invalid(
                "retry.max_interval_ms",
                "must not be below retry.initial_interval_ms",
            ));
        }
        self.retry.retry_on.to_retry_on()?;
        Ok(())
    }
}

/// Resolve the config file, read it, then apply environment overrides.
///
/// `args` are the process arguments without the program name. `env` looks up
/// environment variables.
pub fn load(
    args: &[String],
    env: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let explicit = match args.iter().position(|a| a == "--config") {
        Some(i) => Some(
            args.get(i + 1)
                .map(PathBuf::from)
                .ok_or(ConfigError::MissingConfigPath)?,
        ),
        None => env("BATCHWORK_CONFIG").map(PathBuf::from),
    };

    let path = explicit.or_else(|| {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    });

    let mut cfg = match path {
        Some(path) => {
            let s = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            AppConfig::from_toml_str(&s, &path)?
        }
        None => AppConfig::default(),
    };

    cfg.apply_env(&env)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn args_for(file: &tempfile::NamedTempFile) -> Vec<String> {
        vec!["--config".to_string(), file.path().display().to_string()]
    }

    #[test]
    fn defaults_match_the_reference_deployment() {
        let cfg = AppConfig::from_toml_str("", Path::new("empty.toml")).unwrap();

        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.job.name, "main_job");
        assert_eq!(cfg.step.name, "retryStep");
        assert_eq!(cfg.step.throttle_limit, 1);
        assert_eq!(cfg.input.max_item_count, 1);

        let policy = cfg.retry.policy().unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn file_values_override_defaults_per_key() {
        let file = config_file(
            r#"
            [step]
            chunk_size = 10
            failure_policy = "continue"

            [retry]
            retry_on = ["transient", "timeout"]

            [logging]
            format = "json"
            "#,
        );

        let cfg = load(&args_for(&file), env_of(&[])).unwrap();

        assert_eq!(cfg.step.chunk_size, 10);
        assert_eq!(cfg.step.throttle_limit, 1);
        assert_eq!(cfg.step.failure_policy, FailurePolicy::ContinueOnFailure);
        assert_eq!(
            cfg.retry.policy().unwrap().retry_on,
            RetryOn::Kinds(vec![ErrorKind::Transient, ErrorKind::Timeout])
        );
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn environment_wins_over_the_file() {
        let file = config_file("[server]\nport = 9000\n");
        let env = env_of(&[
            ("BATCHWORK_PORT", "9100"),
            ("BATCHWORK_OUTPUT", "/tmp/out.txt"),
            ("BATCHWORK_LOG", "batchwork_core=debug"),
            ("BATCHWORK_HOST", "  "),
        ]);

        let cfg = load(&args_for(&file), env).unwrap();

        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.output.path, PathBuf::from("/tmp/out.txt"));
        assert_eq!(cfg.logging.filter, "batchwork_core=debug");
    }

    #[test]
    fn config_path_can_come_from_the_environment() {
        let file = config_file("[job]\nname = \"nightly\"\n");
        let path = file.path().display().to_string();

        let cfg = load(&[], env_of(&[("BATCHWORK_CONFIG", path.as_str())])).unwrap();

        assert_eq!(cfg.job.name, "nightly");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = vec![
            "--config".to_string(),
            dir.path().join("nope.toml").display().to_string(),
        ];

        assert!(matches!(load(&args, env_of(&[])), Err(ConfigError::Read { .. })));
        assert!(matches!(
            load(&["--config".to_string()], env_of(&[])),
            Err(ConfigError::MissingConfigPath)
        ));
    }

    #[test]
    fn bad_values_are_rejected() {
        let file = config_file("[retry]\nretry_on = [\"transient\", \"cosmic_rays\"]\n");
        assert!(matches!(
            load(&args_for(&file), env_of(&[])),
            Err(ConfigError::Invalid { key, .. }) if key == "retry.retry_on"
        ));

        let file = config_file("");
        assert!(matches!(
            load(&args_for(&file), env_of(&[("BATCHWORK_PORT", "http")])),
            Err(ConfigError::Invalid { key, .. }) if key == "BATCHWORK_PORT"
        ));

        let file = config_file("[input]\ndelimiter = \"→\"\n");
        assert!(matches!(
            load(&args_for(&file), env_of(&[])),
            Err(ConfigError::Invalid { key, .. }) if key == "input.delimiter"
        ));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let file = config_file("[step]\nthrotle_limit = 2\n");
        assert!(matches!(
            load(&args_for(&file), env_of(&[])),
            Err(ConfigError::Parse { .. })
        ));
    }
}
