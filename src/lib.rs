//! Daily newsletter digest: unread Gmail → Gemini summary → SES email →
//! mark read, in that order and only in that order.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod mailer;
pub mod pipeline;
pub mod summarize;
