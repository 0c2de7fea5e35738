use crate::domain::email::DigestBatch;

pub fn build_prompt(batch: &DigestBatch) -> String {
    let emails_text = batch
        .records()
        .iter()
        .enumerate()
        .map(|(i, email)| {
            format!(
                "Email {}:\nFrom: {}\nSubject: {}\nDate: {}\nPreview: {}...",
                i + 1,
                email.sender,
                email.subject,
                email.date,
                email.preview()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful assistant that summarizes newsletter emails.
Below are {} emails from the last 24 hours. Please provide a concise summary of the key information,
organized by topic or theme. Focus on actionable insights and important updates.

{emails_text}

Please provide a well-organized summary with clear sections and bullet points.",
        batch.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email::EmailRecord;

    #[test]
    fn prompt_lists_every_email_with_preview() {
        let batch = DigestBatch::from(vec![
            EmailRecord::new(
                "a",
                Some("Rust weekly".into()),
                Some("This Week in Rust <twir@example.com>".into()),
                Some("Sat, 17 Oct 2026 08:00:00 +0000".into()),
                "Edition 600 is out",
            ),
            EmailRecord::new("b", None, None, None, &"y".repeat(800)),
        ]);
        let prompt = build_prompt(&batch);

        assert!(prompt.contains("Below are 2 emails from the last 24 hours."));
        assert!(prompt.contains(
            "Email 1:\nFrom: This Week in Rust <twir@example.com>\nSubject: Rust weekly\n\
             Date: Sat, 17 Oct 2026 08:00:00 +0000\nPreview: Edition 600 is out..."
        ));
        assert!(prompt.contains("Email 2:\nFrom: Unknown\nSubject: No Subject\nDate: Unknown\n"));
        assert!(prompt.contains(&format!("Preview: {}...", "y".repeat(500))));
        assert!(!prompt.contains(&"y".repeat(501)));
        assert!(prompt.ends_with("clear sections and bullet points."));
    }
}
