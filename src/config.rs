use lettre::message::Mailbox;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DigestError, Result};

pub const DEFAULT_AWS_REGION: &str = "us-east-1";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_MAX_RESULTS: u32 = 50;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Unvalidated settings as read from the config file and the environment.
///
/// Every field is optional so that all missing values can be reported in one
/// pass by [`Settings::resolve`].
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gmail_token_b64: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    /// Only set for temporary (STS) credentials.
    pub aws_session_token: Option<String>,
    pub source_email: Option<String>,
    pub destination_email: Option<String>,
    pub aws_region: Option<String>,
    pub gemini_model: Option<String>,
    #[serde(deserialize_with = "number_or_string")]
    pub max_results: Option<String>,
    #[serde(deserialize_with = "number_or_string")]
    pub http_timeout_secs: Option<String>,
}

/// Validated configuration, built once per run and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: SecretString,
    pub gmail_token_b64: SecretString,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: SecretString,
    pub aws_session_token: Option<SecretString>,
    pub source: Mailbox,
    pub destination: Mailbox,
    pub aws_region: String,
    pub gemini_model: String,
    pub max_results: u32,
    pub http_timeout: Duration,
}

/// Environment variable names, in the order missing ones are reported.
const REQUIRED: [&str; 6] = [
    "GEMINI_API_KEY",
    "GMAIL_TOKEN_B64",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "SOURCE_EMAIL",
    "DESTINATION_EMAIL",
];

pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("newsletter_digest"))
}

impl Settings {
    /// `<config dir>/newsletter_digest/config.toml`, if the platform has a config dir.
    pub fn default_file() -> Option<PathBuf> {
        config_dir().map(|d| d.join("config.toml"))
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path).map_err(|e| {
            DigestError::invalid("config", format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&s).map_err(|e| {
            DigestError::invalid("config", format!("cannot parse {}: {e}", path.display()))
        })
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gmail_token_b64: get("GMAIL_TOKEN_B64"),
            aws_access_key_id: get("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
            aws_session_token: get("AWS_SESSION_TOKEN"),
            source_email: get("SOURCE_EMAIL"),
            destination_email: get("DESTINATION_EMAIL"),
            aws_region: get("AWS_REGION"),
            gemini_model: get("GEMINI_MODEL"),
            max_results: get("DIGEST_MAX_RESULTS"),
            http_timeout_secs: get("DIGEST_HTTP_TIMEOUT_SECS"),
        }
    }

    /// Layers `other` on top of `self`; values present in `other` win.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            gemini_api_key: other.gemini_api_key.or(self.gemini_api_key),
            gmail_token_b64: other.gmail_token_b64.or(self.gmail_token_b64),
            aws_access_key_id: other.aws_access_key_id.or(self.aws_access_key_id),
            aws_secret_access_key: other.aws_secret_access_key.or(self.aws_secret_access_key),
            aws_session_token: other.aws_session_token.or(self.aws_session_token),
            source_email: other.source_email.or(self.source_email),
            destination_email: other.destination_email.or(self.destination_email),
            aws_region: other.aws_region.or(self.aws_region),
            gemini_model: other.gemini_model.or(self.gemini_model),
            max_results: other.max_results.or(self.max_results),
            http_timeout_secs: other.http_timeout_secs.or(self.http_timeout_secs),
        }
    }

    /// Checks every required value is present and every optional one parses.
    /// Performs no I/O.
    pub fn resolve(&self) -> Result<Config> {
        let values = [
            &self.gemini_api_key,
            &self.gmail_token_b64,
            &self.aws_access_key_id,
            &self.aws_secret_access_key,
            &self.source_email,
            &self.destination_email,
        ];
        let missing: Vec<String> = REQUIRED
            .iter()
            .zip(values)
            .filter(|(_, v)| v.as_deref().is_none_or(|s| s.trim().is_empty()))
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DigestError::MissingConfig(missing));
        }

        let required = |v: &Option<String>| v.clone().unwrap_or_default();

        let source = parse_mailbox("SOURCE_EMAIL", &required(&self.source_email))?;
        let destination = parse_mailbox("DESTINATION_EMAIL", &required(&self.destination_email))?;

        let max_results = match self.max_results.as_deref() {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(0) => return Err(DigestError::invalid("DIGEST_MAX_RESULTS", "must be at least 1")),
                Ok(n) => n,
                Err(e) => return Err(DigestError::invalid("DIGEST_MAX_RESULTS", e.to_string())),
            },
            None => DEFAULT_MAX_RESULTS,
        };

        let timeout_secs = match self.http_timeout_secs.as_deref() {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| DigestError::invalid("DIGEST_HTTP_TIMEOUT_SECS", e.to_string()))?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Config {
            gemini_api_key: SecretString::from(required(&self.gemini_api_key)),
            gmail_token_b64: SecretString::from(required(&self.gmail_token_b64)),
            aws_access_key_id: required(&self.aws_access_key_id),
            aws_secret_access_key: SecretString::from(required(&self.aws_secret_access_key)),
            aws_session_token: self.aws_session_token.clone().map(SecretString::from),
            source,
            destination,
            aws_region: self
                .aws_region
                .clone()
                .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            gemini_model: self
                .gemini_model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            max_results,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_mailbox(key: &str, raw: &str) -> Result<Mailbox> {
    raw.trim()
        .parse::<Mailbox>()
        .map_err(|e| DigestError::invalid(key, format!("'{raw}' is not a valid address: {e}")))
}

// TOML users write `max_results = 20`; the environment always yields text.
fn number_or_string<'de, D>(d: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    Ok(Option::<Raw>::deserialize(d)?.map(|r| match r {
        Raw::Int(n) => n.to_string(),
        Raw::Text(s) => s,
    }))
}
