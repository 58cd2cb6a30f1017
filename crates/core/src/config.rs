use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::message::{Channel, MessageType};

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) if !url.trim().is_empty() => url.trim_end_matches('/'),
            (_, LlmProvider::Anthropic) => DEFAULT_ANTHROPIC_BASE_URL,
            (_, LlmProvider::Ollama) => DEFAULT_OLLAMA_BASE_URL,
        }
    }

    /// Checked when a generation is attempted rather than at load, so scoring
    /// and sequencing work without provider credentials.
    pub fn ensure_credentials(&self) -> Result<(), String> {
        match self.provider {
            LlmProvider::Anthropic => {
                let missing = self
                    .api_key
                    .as_ref()
                    .map(|value| value.expose_secret().trim().is_empty())
                    .unwrap_or(true);
                if missing {
                    return Err("llm.api_key is required for the anthropic provider (set OUTBOUND_LLM_API_KEY or ANTHROPIC_API_KEY)".to_string());
                }
                Ok(())
            }
            LlmProvider::Ollama => Ok(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub timeout_secs: u64,
    pub channels: Vec<Channel>,
    pub message_types: Vec<MessageType>,
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub per_page: u32,
    pub max_per_page: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Anthropic,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub queue_per_page: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Anthropic,
                api_key: None,
                base_url: None,
                model: "claude-sonnet-4-20250514".to_string(),
                timeout_secs: 60,
                max_retries: 2,
                max_tokens: 2000,
            },
            generation: GenerationConfig {
                timeout_secs: 120,
                channels: vec![Channel::Email, Channel::Linkedin],
                message_types: vec![MessageType::Initial],
            },
            queue: QueueConfig { per_page: 20, max_per_page: 100 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("outbound.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
        }

        if let Some(generation) = patch.generation {
            if let Some(timeout_secs) = generation.timeout_secs {
                self.generation.timeout_secs = timeout_secs;
            }
            if let Some(channels) = generation.channels {
                self.generation.channels = channels;
            }
            if let Some(message_types) = generation.message_types {
                self.generation.message_types = message_types;
            }
        }

        if let Some(queue) = patch.queue {
            if let Some(per_page) = queue.per_page {
                self.queue.per_page = per_page;
            }
            if let Some(max_per_page) = queue.max_per_page {
                self.queue.max_per_page = max_per_page;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("OUTBOUND_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("OUTBOUND_LLM_API_KEY").or_else(|| read_env("ANTHROPIC_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("OUTBOUND_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("OUTBOUND_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("OUTBOUND_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("OUTBOUND_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("OUTBOUND_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("OUTBOUND_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("OUTBOUND_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("OUTBOUND_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("OUTBOUND_GENERATION_TIMEOUT_SECS") {
            self.generation.timeout_secs = parse_u64("OUTBOUND_GENERATION_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("OUTBOUND_GENERATION_CHANNELS") {
            self.generation.channels =
                parse_list("OUTBOUND_GENERATION_CHANNELS", &value, Channel::parse)?;
        }
        if let Some(value) = read_env("OUTBOUND_GENERATION_MESSAGE_TYPES") {
            self.generation.message_types =
                parse_list("OUTBOUND_GENERATION_MESSAGE_TYPES", &value, MessageType::parse)?;
        }

        if let Some(value) = read_env("OUTBOUND_QUEUE_PER_PAGE") {
            self.queue.per_page = parse_u32("OUTBOUND_QUEUE_PER_PAGE", &value)?;
        }
        if let Some(value) = read_env("OUTBOUND_QUEUE_MAX_PER_PAGE") {
            self.queue.max_per_page = parse_u32("OUTBOUND_QUEUE_MAX_PER_PAGE", &value)?;
        }

        let log_level =
            read_env("OUTBOUND_LOGGING_LEVEL").or_else(|| read_env("OUTBOUND_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("OUTBOUND_LOGGING_FORMAT").or_else(|| read_env("OUTBOUND_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(per_page) = overrides.queue_per_page {
            self.queue.per_page = per_page;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_generation(&self.generation)?;
        validate_queue(&self.queue)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("outbound.toml"), PathBuf::from("config/outbound.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || !matches!(chars.peek(), Some('{')) {
            output.push(ch);
            continue;
        }

        chars.next();
        let mut key = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(next) => key.push(next),
                None => return Err(ConfigError::UnterminatedInterpolation),
            }
        }

        let value =
            env::var(&key).map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
        output.push_str(&value);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_generation(generation: &GenerationConfig) -> Result<(), ConfigError> {
    if generation.timeout_secs == 0 || generation.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "generation.timeout_secs must be in range 1..=600".to_string(),
        ));
    }
    if generation.channels.is_empty() {
        return Err(ConfigError::Validation(
            "generation.channels must name at least one channel".to_string(),
        ));
    }
    if generation.message_types.is_empty() {
        return Err(ConfigError::Validation(
            "generation.message_types must name at least one message type".to_string(),
        ));
    }

    Ok(())
}

fn validate_queue(queue: &QueueConfig) -> Result<(), ConfigError> {
    if queue.per_page == 0 || queue.max_per_page == 0 {
        return Err(ConfigError::Validation(
            "queue.per_page and queue.max_per_page must be greater than zero".to_string(),
        ));
    }
    if queue.per_page > queue.max_per_page {
        return Err(ConfigError::Validation(format!(
            "queue.per_page ({}) must not exceed queue.max_per_page ({})",
            queue.per_page, queue.max_per_page
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_list<T>(key: &str, value: &str, parse: fn(&str) -> Option<T>) -> Result<Vec<T>, ConfigError> {
    value
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .map(|item| {
            parse(item).ok_or_else(|| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    generation: Option<GenerationPatch>,
    queue: Option<QueuePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerationPatch {
    timeout_secs: Option<u64>,
    channels: Option<Vec<Channel>>,
    message_types: Option<Vec<MessageType>>,
}

#[derive(Debug, Default, Deserialize)]
struct QueuePatch {
    per_page: Option<u32>,
    max_per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};
    use crate::domain::message::{Channel, MessageType};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const OUTBOUND_VARS: &[&str] = &[
        "OUTBOUND_LLM_PROVIDER",
        "OUTBOUND_LLM_API_KEY",
        "ANTHROPIC_API_KEY",
        "OUTBOUND_LLM_MODEL",
        "OUTBOUND_GENERATION_CHANNELS",
        "OUTBOUND_QUEUE_PER_PAGE",
        "OUTBOUND_LOG_LEVEL",
        "OUTBOUND_LOG_FORMAT",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_without_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(OUTBOUND_VARS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.llm.provider == LlmProvider::Anthropic, "anthropic is the default provider")?;
        ensure(config.llm.api_key.is_none(), "no api key by default")?;
        ensure(config.llm.ensure_credentials().is_err(), "credentials check should fail")?;
        ensure(
            config.llm.effective_base_url() == "https://api.anthropic.com",
            "anthropic base url should be the public endpoint",
        )?;
        ensure(
            config.generation.channels == vec![Channel::Email, Channel::Linkedin],
            "default channels are email and linkedin",
        )?;
        ensure(config.queue.per_page == 20, "default page size is 20")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(OUTBOUND_VARS);
        env::set_var("TEST_OUTBOUND_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("outbound.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_OUTBOUND_KEY}"

[generation]
channels = ["email", "linkedin_inmail"]
message_types = ["initial", "follow_up_1"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(config.llm.ensure_credentials().is_ok(), "credentials should be ready")?;
            ensure(
                config.generation.channels == vec![Channel::Email, Channel::LinkedinInmail],
                "channels should come from the file",
            )?;
            ensure(
                config.generation.message_types
                    == vec![MessageType::Initial, MessageType::FollowUp1],
                "message types should come from the file",
            )
        })();

        clear_vars(&["TEST_OUTBOUND_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(OUTBOUND_VARS);
        env::set_var("OUTBOUND_LLM_MODEL", "model-from-env");
        env::set_var("OUTBOUND_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("outbound.toml");
            fs::write(
                &path,
                r#"
[llm]
model = "model-from-file"

[queue]
per_page = 10

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.model == "model-from-env", "env model should win over file")?;
            ensure(config.queue.per_page == 10, "file page size should win over default")?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "env log format alias should apply",
            )
        })();

        clear_vars(OUTBOUND_VARS);
        result
    }

    #[test]
    fn invalid_env_list_is_reported_with_its_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(OUTBOUND_VARS);
        env::set_var("OUTBOUND_GENERATION_CHANNELS", "email,fax");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid channel list to fail".to_string()),
            Err(error) => ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "OUTBOUND_GENERATION_CHANNELS"
                ),
                "error should name the offending variable",
            ),
        };

        clear_vars(OUTBOUND_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(OUTBOUND_VARS);
        env::set_var("OUTBOUND_QUEUE_PER_PAGE", "500");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("queue.per_page")
                ),
                "validation failure should mention queue.per_page",
            ),
        };

        clear_vars(OUTBOUND_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(OUTBOUND_VARS);
        env::set_var("ANTHROPIC_API_KEY", "sk-ant-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-ant-secret-value"), "debug output should not contain key")?;
            ensure(config.llm.api_key.is_some(), "fallback key variable should be honoured")
        })();

        clear_vars(OUTBOUND_VARS);
        result
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some("/nonexistent/outbound.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("file is required");
        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }
}
