use crate::config::Config;
use crate::error::Result;
use crate::mail::MailboxClient;
use crate::mail::gmail::GmailClient;
use crate::mailer::Mailer;
use crate::mailer::ses::SesMailer;
use crate::summarize::Summarizer;
use crate::summarize::gemini::GeminiSummarizer;

use super::Backend;

/// Gmail + Gemini + SES.
pub struct LiveBackend;

impl Backend for LiveBackend {
    fn connect(&self, config: &Config) -> Result<Box<dyn MailboxClient>> {
        Ok(Box::new(GmailClient::connect(config)?))
    }

    fn summarizer(&self, config: &Config) -> Result<Box<dyn Summarizer>> {
        Ok(Box::new(GeminiSummarizer::from_config(config)?))
    }

    fn mailer(&self, config: &Config) -> Result<Box<dyn Mailer>> {
        Ok(Box::new(SesMailer::from_config(config)))
    }
}
