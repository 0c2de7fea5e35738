//! Decodes the base64 `GMAIL_TOKEN_B64` value into mailbox credentials.
//!
//! The payload is the authorized-user JSON written by Google's client
//! libraries (`token`, `refresh_token`, `token_uri`, `client_id`,
//! `client_secret`, `scopes`, `expiry`). Only the fields needed to use and
//! refresh the access token are kept.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{DigestError, Result};

pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Access tokens this close to expiry are treated as already expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct AuthorizedUser {
    #[serde(default, alias = "access_token")]
    token: Option<String>,
    refresh_token: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    client_id: String,
    client_secret: String,
    #[serde(default)]
    expiry: Option<String>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

#[derive(Debug, Clone)]
pub struct MailboxCredentials {
    pub access_token: Option<SecretString>,
    pub refresh_token: SecretString,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub expiry: Option<DateTime<Utc>>,
}

impl MailboxCredentials {
    /// True when there is no usable access token at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        match self.expiry {
            None => true,
            Some(exp) => exp <= now + chrono::Duration::seconds(EXPIRY_SKEW_SECS),
        }
    }
}

/// Decode `token_b64` into credentials. Pure: no I/O, no clock.
pub fn load_credentials(token_b64: &str) -> Result<MailboxCredentials> {
    // `base64 token.json` wraps its output at 76 columns.
    let compact: String = token_b64.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(DigestError::MissingConfig(vec!["GMAIL_TOKEN_B64".to_string()]));
    }

    let bytes = general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DigestError::CredentialDecode(format!("invalid base64: {e}")))?;
    let json = String::from_utf8(bytes)
        .map_err(|e| DigestError::CredentialDecode(format!("token is not UTF-8: {e}")))?;
    let user: AuthorizedUser = serde_json::from_str(&json)
        .map_err(|e| DigestError::CredentialDecode(format!("invalid token JSON: {e}")))?;

    Ok(MailboxCredentials {
        access_token: user
            .token
            .filter(|t| !t.is_empty())
            .map(SecretString::from),
        refresh_token: SecretString::from(user.refresh_token),
        token_uri: user.token_uri,
        client_id: user.client_id,
        client_secret: SecretString::from(user.client_secret),
        expiry: user.expiry.as_deref().and_then(parse_expiry),
    })
}

// Python writes a naive UTC timestamp, usually with a trailing "Z".
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
