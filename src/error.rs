//! Error types for a digest run.

/// Everything that can stop a run, plus the one failure that does not.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Failed to decode Gmail credentials: {0}")]
    CredentialDecode(String),

    #[error("Mailbox authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to fetch unread emails: {0}")]
    Fetch(String),

    #[error("No emails to summarize")]
    EmptyInput,

    #[error("Failed to generate summary: {0}")]
    Summarization(String),

    #[error("Failed to send digest email: {0}")]
    SendFailure(String),

    #[error("Failed to mark emails as read: {0}")]
    Acknowledge(String),
}

impl DigestError {
    /// Acknowledge failures happen after delivery and never change the exit status.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DigestError::Acknowledge(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DigestError::MissingConfig(_) | DigestError::InvalidConfig { .. }
        )
    }

    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        DigestError::InvalidConfig {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;
