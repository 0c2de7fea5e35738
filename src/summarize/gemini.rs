use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::Config;
use crate::domain::email::{DigestBatch, SummaryText};
use crate::error::DigestError;
use crate::summarize::Summarizer;
use crate::summarize::prompt::build_prompt;

const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

pub struct GeminiSummarizer {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl GeminiSummarizer {
    pub fn new(api_key: SecretString, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            model: model.into(),
        })
    }

    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        Self::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.http_timeout,
        )
        .map_err(|e| DigestError::Summarization(format!("cannot build HTTP client: {e:#}")))
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{GEMINI_API}/{}:generateContent", self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        debug!("Requesting summary from {} ({} prompt chars)", self.model, prompt.len());
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .context("generateContent request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            bail!("Gemini API returned {status}: {}", text.trim());
        }

        let parsed: GenerateResponse = resp.json().context("malformed generateContent response")?;
        response_text(parsed)
    }
}

impl Summarizer for GeminiSummarizer {
    fn summarize(&self, batch: &DigestBatch) -> crate::error::Result<SummaryText> {
        if batch.is_empty() {
            return Err(DigestError::EmptyInput);
        }
        let text = self
            .generate(&build_prompt(batch))
            .map_err(|e| DigestError::Summarization(format!("{e:#}")))?;
        Ok(SummaryText::new(text))
    }
}

/// Text parts of the first candidate, concatenated verbatim.
fn response_text(resp: GenerateResponse) -> Result<String> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        bail!("prompt blocked: {reason}");
    }

    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("response has no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        bail!("response has no text");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(v: serde_json::Value) -> GenerateResponse {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let resp = parse(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [
                    { "text": "## Topic A\n" },
                    { "text": "- point one" }
                ] }, "finishReason": "STOP" },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }));
        assert_eq!(response_text(resp).unwrap(), "## Topic A\n- point one");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let resp = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        let err = response_text(resp).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn empty_or_missing_text_is_an_error() {
        assert!(response_text(parse(json!({ "candidates": [] }))).is_err());
        assert!(response_text(parse(json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] }))).is_err());
        assert!(response_text(parse(json!({
            "candidates": [{ "content": { "parts": [{ "text": "  \n" }] } }]
        })))
        .is_err());
    }

    #[test]
    fn empty_batch_is_rejected_before_any_request() {
        let s = GeminiSummarizer::new(
            SecretString::from("k".to_string()),
            "gemini-2.5-flash",
            Duration::from_secs(1),
        )
        .unwrap();
        let err = s.summarize(&DigestBatch::default()).unwrap_err();
        assert!(matches!(err, DigestError::EmptyInput));
    }
}
