pub mod decoders;
pub mod gmail;

use crate::domain::email::{DigestBatch, EmailId};
use crate::error::Result;

/// The mailbox side of a run: read the unread set, later clear it.
pub trait MailboxClient {
    /// Up to `max_results` unread messages. No unread mail is an empty batch,
    /// not an error; any failure aborts the whole fetch.
    fn fetch_unread(&self, max_results: u32) -> Result<DigestBatch>;

    /// Clears the unread flag on exactly `ids`.
    fn acknowledge(&self, ids: &[EmailId]) -> Result<()>;
}
