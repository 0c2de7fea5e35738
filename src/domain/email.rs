pub type EmailId = String;

pub const NO_SUBJECT: &str = "No Subject";
pub const UNKNOWN: &str = "Unknown";

/// Bodies are cut to this many characters when fetched.
pub const BODY_MAX_CHARS: usize = 1000;
/// And further cut to this many when placed in the prompt.
pub const PREVIEW_MAX_CHARS: usize = 500;

/// One fetched message, read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRecord {
    pub id: EmailId,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub body: String,
}

impl EmailRecord {
    /// Applies header placeholders and the body limit.
    pub fn new(
        id: impl Into<EmailId>,
        subject: Option<String>,
        sender: Option<String>,
        date: Option<String>,
        body: &str,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.unwrap_or_else(|| NO_SUBJECT.to_string()),
            sender: sender.unwrap_or_else(|| UNKNOWN.to_string()),
            date: date.unwrap_or_else(|| UNKNOWN.to_string()),
            body: truncate_chars(body, BODY_MAX_CHARS).to_string(),
        }
    }

    pub fn preview(&self) -> &str {
        truncate_chars(&self.body, PREVIEW_MAX_CHARS)
    }
}

/// Emails fetched in one run, in mailbox listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestBatch {
    records: Vec<EmailRecord>,
}

impl DigestBatch {
    pub fn new(records: Vec<EmailRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[EmailRecord] {
        &self.records
    }

    pub fn ids(&self) -> Vec<EmailId> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }
}

impl From<Vec<EmailRecord>> for DigestBatch {
    fn from(records: Vec<EmailRecord>) -> Self {
        Self::new(records)
    }
}

/// The digest text exactly as the summarizer returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryText(String);

impl SummaryText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Outcome of one send attempt. Sending never returns an error; a failed
/// attempt is `success == false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl SendResult {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }

    /// Proof of delivery. Only a successful send produces one.
    pub fn receipt(self) -> Option<DeliveryReceipt> {
        self.success.then_some(DeliveryReceipt {
            message_id: self.message_id,
        })
    }
}

/// Required to acknowledge a batch; cannot be built outside this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    message_id: Option<String>,
}

impl DeliveryReceipt {
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }
}

/// Cuts `s` to at most `max` characters without splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
