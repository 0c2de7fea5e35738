use anyhow::{Context, Result, anyhow};
use aws_config::Region;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_ses::config::Credentials;
use aws_sdk_ses::error::DisplayErrorContext;
use aws_sdk_ses::primitives::Blob;
use aws_sdk_ses::types::RawMessage;
use chrono::Local;
use lettre::message::Mailbox;
use log::{error, info};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::config::Config;
use crate::domain::email::{SendResult, SummaryText};
use crate::mailer::Mailer;
use crate::mailer::compose::compose;

/// Sends the digest through SES `SendRawEmail`.
pub struct SesMailer {
    from: Mailbox,
    to: Mailbox,
    region: String,
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
    timeout: Duration,
}

impl SesMailer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            from: config.source.clone(),
            to: config.destination.clone(),
            region: config.aws_region.clone(),
            access_key_id: config.aws_access_key_id.clone(),
            secret_access_key: config.aws_secret_access_key.clone(),
            session_token: config.aws_session_token.clone(),
            timeout: config.http_timeout,
        }
    }

    // The SDK is async; a current-thread runtime keeps the run sequential.
    fn send_raw(&self, raw: Vec<u8>) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("cannot start runtime for SES call")?;

        runtime.block_on(async {
            let creds = Credentials::new(
                self.access_key_id.clone(),
                self.secret_access_key.expose_secret().to_string(),
                self.session_token
                    .as_ref()
                    .map(|t| t.expose_secret().to_string()),
                None,
                "newsletter_digest",
            );
            let sdk_config = aws_config::from_env()
                .region(Region::new(self.region.clone()))
                .credentials_provider(creds)
                .timeout_config(
                    TimeoutConfig::builder()
                        .operation_timeout(self.timeout)
                        .build(),
                )
                .load()
                .await;
            let client = aws_sdk_ses::Client::new(&sdk_config);

            let message = RawMessage::builder()
                .data(Blob::new(raw))
                .build()
                .context("invalid raw message")?;

            let output = client
                .send_raw_email()
                .source(self.from.to_string())
                .destinations(self.to.to_string())
                .raw_message(message)
                .send()
                .await
                .map_err(|e| anyhow!("SES SendRawEmail failed: {}", DisplayErrorContext(&e)))?;

            Ok::<_, anyhow::Error>(output.message_id().to_string())
        })
    }
}

impl Mailer for SesMailer {
    fn send(&self, summary: &SummaryText) -> SendResult {
        let msg = match compose(summary, &self.from, &self.to, Local::now().date_naive()) {
            Ok(m) => m,
            Err(e) => {
                error!("Error composing digest email: {e:#}");
                return SendResult::failed(format!("{e:#}"));
            }
        };

        match self.send_raw(msg.formatted()) {
            Ok(id) => {
                info!("Email sent! Message ID: {id}");
                SendResult::delivered(id)
            }
            Err(e) => {
                error!("Error sending email: {e:#}");
                SendResult::failed(format!("{e:#}"))
            }
        }
    }
}
