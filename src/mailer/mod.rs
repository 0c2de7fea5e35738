pub mod compose;
pub mod ses;

use crate::domain::email::{SendResult, SummaryText};

pub trait Mailer {
    /// Deliver the digest. Never errors: failures come back as
    /// `SendResult { success: false, .. }` after being logged.
    fn send(&self, summary: &SummaryText) -> SendResult;
}
