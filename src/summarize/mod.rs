//! Turns a batch into one digest text with a single generative call.

pub mod gemini;
pub mod prompt;

use crate::domain::email::{DigestBatch, SummaryText};
use crate::error::Result;

pub trait Summarizer {
    /// One call per batch, no chunking. Fails on an empty batch.
    fn summarize(&self, batch: &DigestBatch) -> Result<SummaryText>;
}
