use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const BOT_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Settings document format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Json,
    Toml,
}

impl SettingsFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => SettingsFormat::Toml,
            _ => SettingsFormat::Json,
        }
    }
}

/// The externally edited settings document, as written on disk.
///
/// Every key is optional at this level so that validation can report
/// exactly which one is missing instead of a generic decode error.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Settings {
    pub whitelisted_chat_ids: Option<Vec<i64>>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub openai_prompt: Option<String>,
    pub openai_system_prompt: Option<String>,
    pub openai_temperature: Option<f32>,
    pub openai_max_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub max_parallel_sends: Option<usize>,
    pub telegram_api_url: Option<String>,
}

impl Settings {
    pub fn parse(content: &str, format: SettingsFormat) -> Result<Self, ConfigError> {
        match format {
            SettingsFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::Malformed(e.to_string()))
            }
            SettingsFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::Malformed(e.to_string()))
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, SettingsFormat::from_path(path))
    }
}

/// The two credentials supplied out-of-band.
#[derive(Clone, Default)]
pub struct Secrets {
    pub bot_token: Option<String>,
    pub api_key: Option<String>,
}

impl Secrets {
    /// Look both secrets up through `lookup`. Values are trimmed and blank
    /// ones count as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            bot_token: read(BOT_TOKEN_VAR),
            api_key: read(API_KEY_VAR),
        }
    }

    /// Load `env_file` into the process environment if it exists, then read
    /// both secrets from the environment. Variables already set win.
    pub fn from_env(env_file: &Path) -> Result<Self, ConfigError> {
        load_env_file(env_file)?;
        Ok(Self::from_lookup(|name| std::env::var(name).ok()))
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("bot_token", &self.bot_token.as_deref().map(mask_token))
            .field("api_key", &self.api_key.as_deref().map(mask_token))
            .finish()
    }
}

fn load_env_file(path: &Path) -> Result<(), ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigError::Malformed(format!("{}: {}", path.display(), e))),
    }
}

/// Mask a secret for logging: first 7 + "***" + last 4 characters,
/// or just "***" when it is 11 characters or shorter.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 11 {
        return "***".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Validated, immutable configuration for one run.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub recipient_ids: BTreeSet<i64>,
    pub provider_base_url: String,
    pub model_id: String,
    pub prompt_text: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
    pub max_parallel_sends: usize,
    pub telegram_api_url: Option<String>,
    pub api_key: String,
    pub bot_token: String,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant creating inspiring messages.".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_max_tokens() -> u32 {
    150
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_parallel_sends() -> usize {
    1
}

fn valid_url(value: String, key: &'static str) -> Result<String, ConfigError> {
    let url = reqwest::Url::parse(&value).map_err(|e| ConfigError::InvalidValue {
        key,
        reason: format!("'{}' is not a valid url: {}", value, e),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(value),
        scheme => Err(ConfigError::InvalidValue {
            key,
            reason: format!("unsupported scheme '{}', expected http or https", scheme),
        }),
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    let value = value.ok_or(ConfigError::MissingField(key))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyField(key));
    }
    Ok(trimmed.to_string())
}

impl Config {
    /// Validate settings and secrets and assemble the run configuration.
    pub fn from_parts(settings: Settings, secrets: Secrets) -> Result<Self, ConfigError> {
        let bot_token = secrets
            .bot_token
            .ok_or(ConfigError::MissingSecret(BOT_TOKEN_VAR))?;
        let api_key = secrets
            .api_key
            .ok_or(ConfigError::MissingSecret(API_KEY_VAR))?;

        let chat_ids = settings
            .whitelisted_chat_ids
            .ok_or(ConfigError::MissingField("whitelisted_chat_ids"))?;
        let provider_base_url = valid_url(
            required(settings.openai_base_url, "openai_base_url")?,
            "openai_base_url",
        )?;
        let model_id = required(settings.openai_model, "openai_model")?;
        let prompt_text = required(settings.openai_prompt, "openai_prompt")?;

        if chat_ids.is_empty() {
            return Err(ConfigError::EmptyRecipients);
        }

        let system_prompt = settings
            .openai_system_prompt
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(default_system_prompt);

        let temperature = settings.openai_temperature.unwrap_or_else(default_temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "openai_temperature",
                reason: format!("{} is outside 0.0..=2.0", temperature),
            });
        }

        let timeout_secs = settings
            .request_timeout_secs
            .unwrap_or_else(default_request_timeout_secs);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        let telegram_api_url = settings
            .telegram_api_url
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| valid_url(s, "telegram_api_url"))
            .transpose()?;

        Ok(Self {
            recipient_ids: chat_ids.into_iter().collect(),
            provider_base_url,
            model_id,
            prompt_text,
            system_prompt,
            temperature,
            max_tokens: settings.openai_max_tokens.unwrap_or_else(default_max_tokens),
            request_timeout: Duration::from_secs(timeout_secs),
            max_parallel_sends: settings
                .max_parallel_sends
                .unwrap_or_else(default_max_parallel_sends)
                .max(1),
            telegram_api_url,
            api_key,
            bot_token,
        })
    }

    pub fn load(settings_path: &Path, env_file: &Path) -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env(env_file)?;
        let settings = Settings::load(settings_path)?;
        Self::from_parts(settings, secrets)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("recipient_ids", &self.recipient_ids)
            .field("provider_base_url", &self.provider_base_url)
            .field("model_id", &self.model_id)
            .field("prompt_text", &self.prompt_text)
            .field("system_prompt", &self.system_prompt)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("max_parallel_sends", &self.max_parallel_sends)
            .field("telegram_api_url", &self.telegram_api_url)
            .field("api_key", &mask_token(&self.api_key))
            .field("bot_token", &mask_token(&self.bot_token))
            .finish()
    }
}
