use anyhow::Result;
use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{AuthUrl, ClientId, ClientSecret, RefreshToken, TokenUrl};
use secrecy::{ExposeSecret, SecretString};

use crate::auth::credentials::MailboxCredentials;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Tokens returned by a refresh (in-memory only, never written back)
pub struct Tokens {
    pub access_token: SecretString,
    pub expires_in: Option<u64>,
}

/// Exchange the stored refresh token for a new access token using the oauth2 crate
pub fn refresh_access_token(creds: &MailboxCredentials) -> Result<Tokens> {
    let client_id = ClientId::new(creds.client_id.clone());
    let client_secret = ClientSecret::new(creds.client_secret.expose_secret().to_string());

    let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())?;
    let token_url = TokenUrl::new(creds.token_uri.clone())?;

    let oauth_client = BasicClient::new(client_id, Some(client_secret), auth_url, Some(token_url));

    let rt = RefreshToken::new(creds.refresh_token.expose_secret().to_string());
    let token = oauth_client
        .exchange_refresh_token(&rt)
        .request(http_client)?;

    Ok(Tokens {
        access_token: SecretString::from(token.access_token().secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    })
}
