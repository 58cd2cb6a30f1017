use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use outbound_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let field = |key: &'static str, env_keys: &'static [&'static str], value: String| Field {
        key,
        env_keys,
        value,
    };
    let join = |values: Vec<&str>| values.join(",");

    vec![
        field("llm.provider", &["OUTBOUND_LLM_PROVIDER"], config.llm.provider.as_str().to_string()),
        field(
            "llm.api_key",
            &["OUTBOUND_LLM_API_KEY", "ANTHROPIC_API_KEY"],
            config
                .llm
                .api_key
                .as_ref()
                .map(|key| redact_key(key.expose_secret()))
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        field(
            "llm.base_url",
            &["OUTBOUND_LLM_BASE_URL"],
            format!(
                "{} (effective: {})",
                config.llm.base_url.as_deref().unwrap_or("<unset>"),
                config.llm.effective_base_url()
            ),
        ),
        field("llm.model", &["OUTBOUND_LLM_MODEL"], config.llm.model.clone()),
        field("llm.timeout_secs", &["OUTBOUND_LLM_TIMEOUT_SECS"], config.llm.timeout_secs.to_string()),
        field("llm.max_retries", &["OUTBOUND_LLM_MAX_RETRIES"], config.llm.max_retries.to_string()),
        field("llm.max_tokens", &["OUTBOUND_LLM_MAX_TOKENS"], config.llm.max_tokens.to_string()),
        field(
            "generation.timeout_secs",
            &["OUTBOUND_GENERATION_TIMEOUT_SECS"],
            config.generation.timeout_secs.to_string(),
        ),
        field(
            "generation.channels",
            &["OUTBOUND_GENERATION_CHANNELS"],
            join(config.generation.channels.iter().map(|channel| channel.as_str()).collect()),
        ),
        field(
            "generation.message_types",
            &["OUTBOUND_GENERATION_MESSAGE_TYPES"],
            join(config.generation.message_types.iter().map(|kind| kind.as_str()).collect()),
        ),
        field("queue.per_page", &["OUTBOUND_QUEUE_PER_PAGE"], config.queue.per_page.to_string()),
        field(
            "queue.max_per_page",
            &["OUTBOUND_QUEUE_MAX_PER_PAGE"],
            config.queue.max_per_page.to_string(),
        ),
        field(
            "logging.level",
            &["OUTBOUND_LOGGING_LEVEL", "OUTBOUND_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["OUTBOUND_LOGGING_FORMAT", "OUTBOUND_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["outbound.toml", "config/outbound.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognisable provider prefix such as `sk-ant-` and nothing else.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.match_indices('-').nth(1) {
        Some((index, _)) if index < 8 => format!("{}-***", &trimmed[..index]),
        _ => "<redacted>".to_string(),
    }
}
