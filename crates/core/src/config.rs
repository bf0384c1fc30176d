use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::provider::{default_roster, Provider};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub voice: VoiceConfig,
    pub llm: LlmConfig,
    pub webhook: WebhookConfig,
    pub providers: Vec<Provider>,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Outbound voice-call provider settings. In mock mode no credentials are needed and
/// dispatch fabricates completed quotes locally.
#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub from_number: Option<String>,
    pub agent_id: Option<String>,
    pub callback_number: Option<String>,
    pub mock_mode: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub vision_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        match self.provider {
            LlmProvider::Ollama => {
                self.base_url.as_ref().is_some_and(|value| !value.trim().is_empty())
            }
            LlmProvider::Groq | LlmProvider::OpenAi => self
                .api_key
                .as_ref()
                .is_some_and(|value| !value.expose_secret().trim().is_empty()),
        }
    }

    pub fn effective_base_url(&self) -> String {
        match &self.base_url {
            Some(base_url) if !base_url.trim().is_empty() => {
                base_url.trim_end_matches('/').to_string()
            }
            _ => self.provider.default_base_url().to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub secret: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub voice_mock_mode: Option<bool>,
    pub voice_api_key: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub webhook_secret: Option<String>,
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
            database: DatabaseConfig {
                url: "sqlite://fixquote.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            voice: VoiceConfig {
                api_key: None,
                base_url: "https://api.retellai.com".to_string(),
                from_number: None,
                agent_id: None,
                callback_number: None,
                mock_mode: true,
                timeout_secs: 20,
                max_retries: 1,
            },
            llm: LlmConfig {
                provider: LlmProvider::Groq,
                api_key: None,
                base_url: None,
                model: "llama-3.1-8b-instant".to_string(),
                vision_model: "llama-3.2-11b-vision-preview".to_string(),
                timeout_secs: 30,
                max_retries: 1,
            },
            webhook: WebhookConfig::default(),
            providers: default_roster(),
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
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected groq|openai|ollama)"
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("fixquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|provider| provider.id.0 == id)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(voice) = patch.voice {
            if let Some(api_key) = voice.api_key {
                self.voice.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = voice.base_url {
                self.voice.base_url = base_url;
            }
            if let Some(from_number) = voice.from_number {
                self.voice.from_number = Some(from_number);
            }
            if let Some(agent_id) = voice.agent_id {
                self.voice.agent_id = Some(agent_id);
            }
            if let Some(callback_number) = voice.callback_number {
                self.voice.callback_number = Some(callback_number);
            }
            if let Some(mock_mode) = voice.mock_mode {
                self.voice.mock_mode = mock_mode;
            }
            if let Some(timeout_secs) = voice.timeout_secs {
                self.voice.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = voice.max_retries {
                self.voice.max_retries = max_retries;
            }
        }

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
            if let Some(vision_model) = llm.vision_model {
                self.llm.vision_model = vision_model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(webhook) = patch.webhook {
            if let Some(secret) = webhook.secret {
                self.webhook.secret = Some(secret_value(secret));
            }
        }

        if let Some(providers) = patch.providers {
            self.providers = providers;
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
        if let Some(value) = read_env("FIXQUOTE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("FIXQUOTE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("FIXQUOTE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("FIXQUOTE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("FIXQUOTE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FIXQUOTE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FIXQUOTE_SERVER_PORT") {
            self.server.port = parse_u16("FIXQUOTE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("FIXQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("FIXQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("FIXQUOTE_VOICE_API_KEY") {
            self.voice.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FIXQUOTE_VOICE_BASE_URL") {
            self.voice.base_url = value;
        }
        if let Some(value) = read_env("FIXQUOTE_VOICE_FROM_NUMBER") {
            self.voice.from_number = Some(value);
        }
        if let Some(value) = read_env("FIXQUOTE_VOICE_AGENT_ID") {
            self.voice.agent_id = Some(value);
        }
        if let Some(value) = read_env("FIXQUOTE_VOICE_CALLBACK_NUMBER") {
            self.voice.callback_number = Some(value);
        }
        if let Some(value) = read_env("FIXQUOTE_VOICE_MOCK_MODE") {
            self.voice.mock_mode = parse_bool("FIXQUOTE_VOICE_MOCK_MODE", &value)?;
        }
        if let Some(value) = read_env("FIXQUOTE_VOICE_TIMEOUT_SECS") {
            self.voice.timeout_secs = parse_u64("FIXQUOTE_VOICE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FIXQUOTE_VOICE_MAX_RETRIES") {
            self.voice.max_retries = parse_u32("FIXQUOTE_VOICE_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("FIXQUOTE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("FIXQUOTE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FIXQUOTE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("FIXQUOTE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("FIXQUOTE_LLM_VISION_MODEL") {
            self.llm.vision_model = value;
        }
        if let Some(value) = read_env("FIXQUOTE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("FIXQUOTE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FIXQUOTE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("FIXQUOTE_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("FIXQUOTE_WEBHOOK_SECRET") {
            self.webhook.secret = Some(secret_value(value));
        }

        let log_level =
            read_env("FIXQUOTE_LOGGING_LEVEL").or_else(|| read_env("FIXQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FIXQUOTE_LOGGING_FORMAT").or_else(|| read_env("FIXQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(mock_mode) = overrides.voice_mock_mode {
            self.voice.mock_mode = mock_mode;
        }
        if let Some(api_key) = overrides.voice_api_key {
            self.voice.api_key = Some(secret_value(api_key));
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(secret) = overrides.webhook_secret {
            self.webhook.secret = Some(secret_value(secret));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_voice(&self.voice)?;
        validate_llm(&self.llm)?;
        validate_providers(&self.providers)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("fixquote.toml"), PathBuf::from("config/fixquote.toml")]
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
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_voice(voice: &VoiceConfig) -> Result<(), ConfigError> {
    if voice.timeout_secs == 0 || voice.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "voice.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if voice.max_retries > 1 {
        return Err(ConfigError::Validation(
            "voice.max_retries must be 0 or 1; call lookups retry at most once".to_string(),
        ));
    }
    if !voice.base_url.starts_with("http://") && !voice.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "voice.base_url must start with http:// or https://".to_string(),
        ));
    }

    if voice.mock_mode {
        return Ok(());
    }

    let missing_key =
        voice.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "voice.api_key is required unless voice.mock_mode is enabled".to_string(),
        ));
    }

    match voice.from_number.as_deref().map(str::trim) {
        None | Some("") => {
            return Err(ConfigError::Validation(
                "voice.from_number is required unless voice.mock_mode is enabled".to_string(),
            ));
        }
        Some(number) if !is_e164(number) => {
            return Err(ConfigError::Validation(format!(
                "voice.from_number `{number}` must be E.164 (for example +14155550100)"
            )));
        }
        Some(_) => {}
    }

    if voice.agent_id.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        return Err(ConfigError::Validation(
            "voice.agent_id is required unless voice.mock_mode is enabled".to_string(),
        ));
    }

    Ok(())
}

fn is_e164(number: &str) -> bool {
    let Some(digits) = number.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len()) && digits.chars().all(|ch| ch.is_ascii_digit())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.max_retries > 5 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 5".to_string()));
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

fn validate_providers(providers: &[Provider]) -> Result<(), ConfigError> {
    if providers.is_empty() {
        return Err(ConfigError::Validation(
            "providers roster must contain at least one handyman".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for provider in providers {
        if provider.id.0.trim().is_empty() {
            return Err(ConfigError::Validation("providers[].id must not be empty".to_string()));
        }
        if !seen.insert(provider.id.0.as_str()) {
            return Err(ConfigError::Validation(format!(
                "providers roster has duplicate id `{}`",
                provider.id.0
            )));
        }
        if provider.phone.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "provider `{}` is missing a phone number",
                provider.id.0
            )));
        }
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    voice: Option<VoicePatch>,
    llm: Option<LlmPatch>,
    webhook: Option<WebhookPatch>,
    providers: Option<Vec<Provider>>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VoicePatch {
    api_key: Option<String>,
    base_url: Option<String>,
    from_number: Option<String>,
    agent_id: Option<String>,
    callback_number: Option<String>,
    mock_mode: Option<bool>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    vision_model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPatch {
    secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
