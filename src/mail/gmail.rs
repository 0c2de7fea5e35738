//! Gmail REST adapter: list unread, fetch `format=full`, batch-clear UNREAD.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::auth::credentials::load_credentials;
use crate::auth::token_manager::TokenManager;
use crate::config::Config;
use crate::domain::email::{DigestBatch, EmailId, EmailRecord};
use crate::error::DigestError;
use crate::mail::MailboxClient;
use crate::mail::decoders::{MessagePart, record_from_payload};

const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages";
const UNREAD_QUERY: &str = "is:unread";
const UNREAD_LABEL: &str = "UNREAD";
/// Gmail's batchModify accepts up to 1000 IDs per request.
const BATCH_MODIFY_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FullMessage {
    #[serde(default)]
    payload: MessagePart,
}

pub struct GmailClient {
    http: Client,
    access_token: SecretString,
    base_url: String,
}

impl GmailClient {
    pub fn new(access_token: SecretString, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            access_token,
            base_url: GMAIL_API.to_string(),
        })
    }

    /// Point the client at another `users/me/messages` endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Decode the configured token, refresh it if stale, and build a client.
    pub fn connect(config: &Config) -> crate::error::Result<Self> {
        let creds = load_credentials(config.gmail_token_b64.expose_secret())?;
        let token = TokenManager::new(creds).access_token(Utc::now())?;
        Self::new(token, config.http_timeout)
            .map_err(|e| DigestError::Authentication(format!("cannot build HTTP client: {e:#}")))
    }

    fn list_unread(&self, max_results: u32) -> Result<Vec<MessageStub>> {
        let max = max_results.to_string();
        let resp = self
            .http
            .get(&self.base_url)
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("q", UNREAD_QUERY), ("maxResults", max.as_str())])
            .send()
            .context("list request failed")?;
        let list: MessageList = check_status(resp)?.json().context("malformed list response")?;
        Ok(list.messages)
    }

    fn get_message(&self, id: &str) -> Result<EmailRecord> {
        let resp = self
            .http
            .get(format!("{}/{id}", self.base_url))
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("format", "full")])
            .send()
            .with_context(|| format!("get request for message {id} failed"))?;
        let msg: FullMessage = check_status(resp)
            .with_context(|| format!("message {id}"))?
            .json()
            .with_context(|| format!("malformed message {id}"))?;
        record_from_payload(id, &msg.payload)
    }

    fn fetch_all(&self, max_results: u32) -> Result<DigestBatch> {
        let stubs = self.list_unread(max_results)?;
        if stubs.is_empty() {
            return Ok(DigestBatch::default());
        }
        debug!("Listing returned {} unread messages", stubs.len());

        let mut out = Vec::with_capacity(stubs.len());
        for stub in &stubs {
            // one failed message fails the run; no partial digests
            out.push(self.get_message(&stub.id)?);
        }
        Ok(DigestBatch::new(out))
    }

    fn batch_modify(&self, ids: &[EmailId]) -> Result<()> {
        for chunk in ids.chunks(BATCH_MODIFY_LIMIT) {
            let body = json!({
                "ids": chunk,
                "removeLabelIds": [UNREAD_LABEL],
            });
            let resp = self
                .http
                .post(format!("{}/batchModify", self.base_url))
                .bearer_auth(self.access_token.expose_secret())
                .json(&body)
                .send()
                .context("batchModify request failed")?;
            check_status(resp)?;
        }
        Ok(())
    }
}

impl MailboxClient for GmailClient {
    fn fetch_unread(&self, max_results: u32) -> crate::error::Result<DigestBatch> {
        self.fetch_all(max_results)
            .map_err(|e| DigestError::Fetch(format!("{e:#}")))
    }

    fn acknowledge(&self, ids: &[EmailId]) -> crate::error::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.batch_modify(ids)
            .map_err(|e| DigestError::Acknowledge(format!("{e:#}")))?;
        info!("Marked {} emails as read.", ids.len());
        Ok(())
    }
}

fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        bail!("Gmail API returned {status}: {}", body.trim());
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> GmailClient {
        GmailClient::new(SecretString::from("tok".to_string()), Duration::from_secs(5))
            .unwrap()
            .with_base_url(format!("{}/messages", server.url()))
    }

    fn message_json(id: &str, subject: &str, body: &str) -> String {
        json!({
            "id": id,
            "payload": {
                "mimeType": "text/plain",
                "headers": [{ "name": "Subject", "value": subject }],
                "body": { "data": URL_SAFE.encode(body) }
            }
        })
        .to_string()
    }

    fn listing(server: &mut Server, body: &str) -> mockito::Mock {
        server
            .mock("GET", "/messages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "is:unread".into()),
                Matcher::UrlEncoded("maxResults".into(), "5".into()),
            ]))
            .match_header("authorization", "Bearer tok")
            .with_header("content-type", "application/json")
            .with_body(body)
            .create()
    }

    fn message(server: &mut Server, id: &str, status: usize, body: &str) -> mockito::Mock {
        server
            .mock("GET", format!("/messages/{id}").as_str())
            .match_query(Matcher::UrlEncoded("format".into(), "full".into()))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create()
    }

    #[test]
    fn fetches_every_listed_message_in_order() {
        let mut server = Server::new();
        let list = listing(&mut server, r#"{"messages":[{"id":"m1"},{"id":"m2"}]}"#);
        let m1 = message(&mut server, "m1", 200, &message_json("m1", "First", "one"));
        let m2 = message(&mut server, "m2", 200, &message_json("m2", "Second", "two"));

        let batch = client(&server).fetch_unread(5).unwrap();

        assert_eq!(batch.ids(), vec!["m1".to_string(), "m2".to_string()]);
        assert_eq!(batch.records()[0].subject, "First");
        assert_eq!(batch.records()[1].body, "two");
        list.assert();
        m1.assert();
        m2.assert();
    }

    #[test]
    fn listing_without_messages_is_an_empty_batch() {
        let mut server = Server::new();
        let list = listing(&mut server, r#"{"resultSizeEstimate":0}"#);
        let gets = server
            .mock("GET", Matcher::Regex(r"^/messages/".to_string()))
            .expect(0)
            .create();

        let batch = client(&server).fetch_unread(5).unwrap();

        assert!(batch.is_empty());
        list.assert();
        gets.assert();
    }

    #[test]
    fn one_failed_message_fails_the_whole_fetch() {
        let mut server = Server::new();
        listing(
            &mut server,
            r#"{"messages":[{"id":"m1"},{"id":"m2"},{"id":"m3"}]}"#,
        );
        message(&mut server, "m1", 200, &message_json("m1", "First", "one"));
        message(&mut server, "m2", 500, r#"{"error":{"code":500}}"#);
        let m3 = message(&mut server, "m3", 200, &message_json("m3", "Third", "three"));

        let err = client(&server).fetch_unread(5).unwrap_err();

        match err {
            DigestError::Fetch(msg) => {
                assert!(msg.contains("m2"), "{msg}");
                assert!(msg.contains("500"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
        m3.assert();
    }

    #[test]
    fn listing_error_status_is_a_fetch_error() {
        let mut server = Server::new();
        server
            .mock("GET", "/messages")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("invalid credentials")
            .create();

        let err = client(&server).fetch_unread(5).unwrap_err();
        assert!(matches!(err, DigestError::Fetch(ref m) if m.contains("401")));
    }

    #[test]
    fn acknowledge_removes_unread_label_from_given_ids() {
        let mut server = Server::new();
        let modify = server
            .mock("POST", "/messages/batchModify")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::Json(json!({
                "ids": ["m1", "m2"],
                "removeLabelIds": ["UNREAD"]
            })))
            .with_status(204)
            .create();

        client(&server)
            .acknowledge(&["m1".to_string(), "m2".to_string()])
            .unwrap();
        modify.assert();
    }

    #[test]
    fn acknowledge_splits_ids_into_chunks_of_1000() {
        let mut server = Server::new();
        let modify = server
            .mock("POST", "/messages/batchModify")
            .match_body(Matcher::PartialJson(json!({ "removeLabelIds": ["UNREAD"] })))
            .with_status(204)
            .expect(2)
            .create();

        let ids: Vec<EmailId> = (0..1001).map(|i| format!("id-{i}")).collect();
        client(&server).acknowledge(&ids).unwrap();
        modify.assert();

        let mut server = Server::new();
        let single = server
            .mock("POST", "/messages/batchModify")
            .with_status(204)
            .expect(1)
            .create();
        client(&server).acknowledge(&ids[..1000]).unwrap();
        single.assert();
    }

    #[test]
    fn acknowledge_with_no_ids_sends_nothing() {
        let mut server = Server::new();
        let modify = server
            .mock("POST", "/messages/batchModify")
            .expect(0)
            .create();

        client(&server).acknowledge(&[]).unwrap();
        modify.assert();
    }

    #[test]
    fn acknowledge_error_status_is_an_acknowledge_error() {
        let mut server = Server::new();
        server
            .mock("POST", "/messages/batchModify")
            .with_status(403)
            .with_body("insufficient permissions")
            .create();

        let err = client(&server).acknowledge(&["m1".to_string()]).unwrap_err();
        assert!(matches!(err, DigestError::Acknowledge(ref m) if m.contains("403")));
        assert!(!err.is_fatal());
    }
}
