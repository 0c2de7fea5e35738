use chrono::{DateTime, Utc};
use log::{debug, info};
use secrecy::SecretString;

use crate::auth::credentials::MailboxCredentials;
use crate::auth::oauth::{self, Tokens};
use crate::error::{DigestError, Result};

/// Hands out a usable access token for one run.
pub struct TokenManager<F = fn(&MailboxCredentials) -> anyhow::Result<Tokens>> {
    creds: MailboxCredentials,
    refresh: F,
}

impl TokenManager {
    pub fn new(creds: MailboxCredentials) -> Self {
        Self {
            creds,
            refresh: oauth::refresh_access_token,
        }
    }
}

impl<F> TokenManager<F>
where
    F: Fn(&MailboxCredentials) -> anyhow::Result<Tokens>,
{
    pub fn with_refresher(creds: MailboxCredentials, refresh: F) -> Self {
        Self { creds, refresh }
    }

    /// Returns the stored access token while it is fresh, otherwise
    /// refreshes once. Nothing is persisted.
    pub fn access_token(&self, now: DateTime<Utc>) -> Result<SecretString> {
        // 1) stored & not expired
        if !self.creds.needs_refresh(now)
            && let Some(at) = &self.creds.access_token
        {
            debug!("Using stored Gmail access token (not expired)");
            return Ok(at.clone());
        }

        // 2) refresh
        info!("Stored Gmail access token expired or missing; refreshing");
        let t = (self.refresh)(&self.creds)
            .map_err(|e| DigestError::Authentication(format!("token refresh failed: {e:#}")))?;
        if let Some(secs) = t.expires_in {
            debug!("Refreshed access token valid for {secs}s");
        }
        Ok(t.access_token)
    }
}
