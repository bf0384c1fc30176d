use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fixquote_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let fields: Vec<(&str, String, &str)> = vec![
        ("database.url", config.database.url.clone(), "FIXQUOTE_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "FIXQUOTE_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "FIXQUOTE_DATABASE_TIMEOUT_SECS",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "FIXQUOTE_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "FIXQUOTE_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "FIXQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("voice.mock_mode", config.voice.mock_mode.to_string(), "FIXQUOTE_VOICE_MOCK_MODE"),
        ("voice.api_key", redact_secret(config.voice.api_key.as_ref()), "FIXQUOTE_VOICE_API_KEY"),
        ("voice.base_url", config.voice.base_url.clone(), "FIXQUOTE_VOICE_BASE_URL"),
        ("voice.from_number", unset_or(config.voice.from_number.as_deref()), "FIXQUOTE_VOICE_FROM_NUMBER"),
        ("voice.agent_id", unset_or(config.voice.agent_id.as_deref()), "FIXQUOTE_VOICE_AGENT_ID"),
        (
            "voice.callback_number",
            unset_or(config.voice.callback_number.as_deref()),
            "FIXQUOTE_VOICE_CALLBACK_NUMBER",
        ),
        ("llm.provider", format!("{:?}", config.llm.provider), "FIXQUOTE_LLM_PROVIDER"),
        ("llm.model", config.llm.model.clone(), "FIXQUOTE_LLM_MODEL"),
        ("llm.vision_model", config.llm.vision_model.clone(), "FIXQUOTE_LLM_VISION_MODEL"),
        ("llm.base_url", config.llm.effective_base_url(), "FIXQUOTE_LLM_BASE_URL"),
        ("llm.api_key", redact_secret(config.llm.api_key.as_ref()), "FIXQUOTE_LLM_API_KEY"),
        ("webhook.secret", redact_secret(config.webhook.secret.as_ref()), "FIXQUOTE_WEBHOOK_SECRET"),
        ("logging.level", config.logging.level.clone(), "FIXQUOTE_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "FIXQUOTE_LOGGING_FORMAT"),
    ];
    for (key, value, env_key) in fields {
        lines.push(render_line(key, &value, source(key, env_key)));
    }

    let roster = config
        .providers
        .iter()
        .map(|provider| format!("{} ({})", provider.name, provider.id.0))
        .collect::<Vec<_>>()
        .join(", ");
    let roster_source = field_source("providers", None, config_file_doc.as_ref(), config_file_path.as_deref());
    lines.push(render_line("providers", &roster, roster_source));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("fixquote.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/fixquote.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

fn unset_or(value: Option<&str>) -> String {
    value.map(str::to_string).unwrap_or_else(|| "<unset>".to_string())
}

/// Keeps a vendor prefix such as `key_` visible so operators can tell keys apart.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(|ch: char| ch == '-' || ch == '_') {
        Some((prefix, _)) if prefix.len() <= 8 => format!("{}***", &trimmed[..=prefix.len()]),
        _ => "<redacted>".to_string(),
    }
}
