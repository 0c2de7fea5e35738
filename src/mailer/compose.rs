//! Builds the digest message: `multipart/alternative` with a plain and an
//! HTML rendering of the same summary.
//!
//! The summary is embedded into the HTML verbatim, without escaping.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use lettre::Message;
use lettre::message::{Mailbox, MultiPart};

use crate::domain::email::SummaryText;

pub const FOOTER: &str = "This is an automated digest from your newsletter subscriptions.";

pub fn digest_subject(date: NaiveDate) -> String {
    format!("Daily Newsletter Digest - {}", date.format("%Y-%m-%d"))
}

pub fn text_body(subject: &str, summary: &SummaryText) -> String {
    format!("{subject}\n\n{}\n\n---\n{FOOTER}", summary.as_str())
}

pub fn html_body(subject: &str, summary: &SummaryText) -> String {
    format!(
        r#"
    <html>
      <head></head>
      <body>
        <h2>{subject}</h2>
        <div style="white-space: pre-wrap; font-family: Arial, sans-serif;">
{summary}
        </div>
        <hr>
        <p style="color: #666; font-size: 12px;">
          {FOOTER}
        </p>
      </body>
    </html>
    "#,
        summary = summary.as_str()
    )
}

pub fn compose(
    summary: &SummaryText,
    from: &Mailbox,
    to: &Mailbox,
    date: NaiveDate,
) -> Result<Message> {
    let subject = digest_subject(date);
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            text_body(&subject, summary),
            html_body(&subject, summary),
        ))
        .context("failed to build digest message")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn subject_carries_the_date() {
        assert_eq!(digest_subject(date()), "Daily Newsletter Digest - 2026-10-18");
    }

    #[test]
    fn bodies_embed_summary_verbatim() {
        let summary = SummaryText::new("Topic A: <b>big</b> news");
        let subject = digest_subject(date());

        assert_eq!(
            text_body(&subject, &summary),
            "Daily Newsletter Digest - 2026-10-18\n\nTopic A: <b>big</b> news\n\n---\n\
             This is an automated digest from your newsletter subscriptions."
        );

        let html = html_body(&subject, &summary);
        assert!(html.contains("<h2>Daily Newsletter Digest - 2026-10-18</h2>"));
        assert!(html.contains("\nTopic A: <b>big</b> news\n"));
        assert!(html.contains(FOOTER));
    }

    #[test]
    fn composed_message_is_alternative_with_both_parts() {
        let from: Mailbox = "Digest <digest@example.com>".parse().unwrap();
        let to: Mailbox = "me@example.com".parse().unwrap();
        let msg = compose(&SummaryText::new("Topic A: short"), &from, &to, date()).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();

        assert!(raw.contains("Subject: Daily Newsletter Digest - 2026-10-18"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("To: me@example.com"));
    }
}
