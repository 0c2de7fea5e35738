use anyhow::{Context, Result};
use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use serde::Deserialize;

use crate::domain::email::{EmailId, EmailRecord};

/// Gmail sends body data as URL-safe base64, with or without padding.
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A `format=full` message payload, or one of its parts.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl MessagePart {
    fn data(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.data.as_deref())
    }
}

pub fn record_from_payload(id: impl Into<EmailId>, payload: &MessagePart) -> Result<EmailRecord> {
    let id = id.into();
    let body = extract_body(payload).with_context(|| format!("message {id}: bad body data"))?;
    Ok(EmailRecord::new(
        id,
        header(&payload.headers, "Subject"),
        header(&payload.headers, "From"),
        header(&payload.headers, "Date"),
        &body,
    ))
}

/// First header called `name` (ASCII case-insensitive), with RFC 2047 words decoded.
pub fn header(headers: &[Header], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| decode_mime_words(&h.value))
}

/// Plain-text body of a message.
///
/// Multipart: the first `text/plain` part carrying data, depth first.
/// Single part: its own data, whatever the type. No text is an empty body.
pub fn extract_body(payload: &MessagePart) -> Result<String> {
    let data = if payload.parts.is_empty() {
        payload.data()
    } else {
        first_plain_part(payload)
    };
    match data {
        Some(d) => decode_body_data(d),
        None => Ok(String::new()),
    }
}

fn first_plain_part(p: &MessagePart) -> Option<&str> {
    for sp in &p.parts {
        if sp.mime_type.eq_ignore_ascii_case("text/plain")
            && let Some(d) = sp.data()
        {
            return Some(d);
        }
        if let Some(d) = first_plain_part(sp) {
            return Some(d);
        }
    }
    None
}

pub fn decode_body_data(data: &str) -> Result<String> {
    let bytes = GMAIL_BASE64
        .decode(data.trim())
        .context("invalid URL-safe base64")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decodes RFC 2047 encoded-words anywhere in `raw`, leaving the surrounding
/// text (which may already be UTF-8) as is.
pub fn decode_mime_words(raw: &str) -> String {
    if !raw.contains("=?") {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut after_word = false;
    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        let decoded = encoded_word_len(candidate)
            .and_then(|n| decode_word(&candidate[..n]).map(|text| (n, text)));
        match decoded {
            Some((n, text)) => {
                // whitespace between adjacent encoded-words is not part of the text
                if !(after_word && before.trim().is_empty()) {
                    out.push_str(before);
                }
                out.push_str(&text);
                rest = &candidate[n..];
                after_word = true;
            }
            None => {
                out.push_str(before);
                out.push_str("=?");
                rest = &candidate[2..];
                after_word = false;
            }
        }
    }
    out.push_str(rest);
    out
}

// Length of the `=?charset?B|Q?text?=` token at the start of `s`, if any.
fn encoded_word_len(s: &str) -> Option<usize> {
    let inner = s.strip_prefix("=?")?;
    let charset_end = inner.find('?')?;
    let after_charset = &inner[charset_end + 1..];
    let encoding = after_charset.chars().next()?;
    if charset_end == 0
        || !matches!(encoding, 'B' | 'b' | 'Q' | 'q')
        || !after_charset[1..].starts_with('?')
    {
        return None;
    }
    let text_end = after_charset[2..].find("?=")?;
    let len = 2 + charset_end + 1 + 2 + text_end + 2;
    if s[..len].chars().any(char::is_whitespace) {
        return None;
    }
    Some(len)
}

fn decode_word(word: &str) -> Option<String> {
    // mailparse expects a full "Key: value" header line
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(word.as_bytes());
    line.extend_from_slice(b"\r\n");

    let (h, _) = mailparse::parse_header(&line).ok()?;
    let value = h.get_value();
    (value != word).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;
    use serde_json::json;

    fn b64(s: &str) -> String {
        URL_SAFE.encode(s)
    }

    fn payload(v: serde_json::Value) -> MessagePart {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn multipart_takes_first_plain_part() {
        let p = payload(json!({
            "mimeType": "multipart/alternative",
            "parts": [
                { "mimeType": "text/html", "body": { "data": b64("<p>html</p>") } },
                { "mimeType": "text/plain", "body": { "data": b64("first plain") } },
                { "mimeType": "text/plain", "body": { "data": b64("second plain") } }
            ]
        }));
        assert_eq!(extract_body(&p).unwrap(), "first plain");
    }

    #[test]
    fn multipart_without_plain_text_is_empty() {
        let p = payload(json!({
            "mimeType": "multipart/alternative",
            "parts": [
                { "mimeType": "text/html", "body": { "data": b64("<p>only html</p>") } }
            ]
        }));
        assert_eq!(extract_body(&p).unwrap(), "");
    }

    #[test]
    fn nested_multipart_is_searched_depth_first() {
        let p = payload(json!({
            "mimeType": "multipart/mixed",
            "parts": [
                {
                    "mimeType": "multipart/alternative",
                    "parts": [
                        { "mimeType": "text/plain", "body": { "data": b64("nested plain") } }
                    ]
                },
                { "mimeType": "text/plain", "body": { "data": b64("outer plain") } }
            ]
        }));
        assert_eq!(extract_body(&p).unwrap(), "nested plain");
    }

    #[test]
    fn single_part_decodes_own_body() {
        let p = payload(json!({
            "mimeType": "text/html",
            "body": { "size": 9, "data": b64("<b>hi</b>") }
        }));
        assert_eq!(extract_body(&p).unwrap(), "<b>hi</b>");

        let no_data = payload(json!({ "mimeType": "text/plain", "body": { "size": 0 } }));
        assert_eq!(extract_body(&no_data).unwrap(), "");
    }

    #[test]
    fn unpadded_data_decodes() {
        let padded = b64("ab");
        let unpadded = padded.trim_end_matches('=');
        assert_eq!(decode_body_data(unpadded).unwrap(), "ab");
    }

    #[test]
    fn garbage_body_data_is_an_error() {
        assert!(decode_body_data("***").is_err());
    }

    #[test]
    fn headers_are_defaulted_and_decoded() {
        let p = payload(json!({
            "mimeType": "text/plain",
            "headers": [
                { "name": "from", "value": "News <news@example.com>" },
                { "name": "Subject", "value": "=?UTF-8?B?Q2Fmw6kgd2Vla2x5?=" }
            ],
            "body": { "data": b64("hello") }
        }));
        let r = record_from_payload("m1", &p).unwrap();
        assert_eq!(r.id, "m1");
        assert_eq!(r.subject, "Café weekly");
        assert_eq!(r.sender, "News <news@example.com>");
        assert_eq!(r.date, "Unknown");
        assert_eq!(r.body, "hello");
    }

    #[test]
    fn encoded_words_mixed_with_raw_utf8_are_decoded() {
        assert_eq!(
            decode_mime_words("Café news =?UTF-8?B?Q2Fmw6k=?="),
            "Café news Café"
        );
        assert_eq!(
            decode_mime_words("=?UTF-8?Q?Hello?= =?UTF-8?Q?World?= today"),
            "HelloWorld today"
        );
    }

    #[test]
    fn text_that_only_looks_encoded_is_kept() {
        assert_eq!(decode_mime_words("Is 2 =? 3"), "Is 2 =? 3");
        assert_eq!(decode_mime_words("=?UTF-8?X?abc?= end"), "=?UTF-8?X?abc?= end");
        assert_eq!(decode_mime_words("plain"), "plain");
    }

    #[test]
    fn missing_subject_gets_placeholder() {
        let p = payload(json!({ "mimeType": "text/plain", "headers": [] }));
        let r = record_from_payload("m2", &p).unwrap();
        assert_eq!(r.subject, "No Subject");
        assert_eq!(r.sender, "Unknown");
    }

    #[test]
    fn long_body_is_truncated_on_record() {
        let long = "x".repeat(1500);
        let p = payload(json!({ "mimeType": "text/plain", "body": { "data": b64(&long) } }));
        assert_eq!(record_from_payload("m3", &p).unwrap().body.len(), 1000);
    }
}
