//! One digest run: fetch, summarize, send, then acknowledge.
//!
//! Each stage owns the data the next one needs. Acknowledging takes a
//! [`DeliveryReceipt`], and only a successful send produces one, so the
//! mailbox is never touched before delivery is confirmed.

pub mod live;
pub mod state;

use log::{error, info, warn};

use crate::config::{Config, Settings};
use crate::domain::email::{DeliveryReceipt, DigestBatch, SummaryText};
use crate::error::{DigestError, Result};
use crate::mail::MailboxClient;
use crate::mailer::Mailer;
use crate::summarize::Summarizer;

pub use live::LiveBackend;
pub use state::RunState;

/// The external services a run talks to, built from the resolved config.
pub trait Backend {
    /// Load credentials and open the mailbox.
    fn connect(&self, config: &Config) -> Result<Box<dyn MailboxClient>>;
    fn summarizer(&self, config: &Config) -> Result<Box<dyn Summarizer>>;
    fn mailer(&self, config: &Config) -> Result<Box<dyn Mailer>>;
}

#[derive(Debug)]
pub enum RunOutcome {
    /// No unread mail; nothing was summarized, sent or acknowledged.
    NothingToDo,
    Delivered {
        emails: usize,
        message_id: Option<String>,
        acknowledged: bool,
    },
    Failed(DigestError),
}

#[derive(Debug)]
pub struct RunReport {
    /// Every state the run passed through, starting at `Idle`.
    pub trace: Vec<RunState>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, RunOutcome::Failed(_))
    }

    /// 0 on success (including nothing to do), 1 on any fatal failure.
    pub fn exit_code(&self) -> u8 {
        if self.succeeded() { 0 } else { 1 }
    }

    pub fn final_state(&self) -> RunState {
        self.trace.last().copied().unwrap_or(RunState::Idle)
    }
}

enum Stage {
    Idle(Settings),
    Authenticating(Config),
    Fetching {
        config: Config,
        mailbox: Box<dyn MailboxClient>,
    },
    Summarizing {
        config: Config,
        mailbox: Box<dyn MailboxClient>,
        batch: DigestBatch,
    },
    Sending {
        config: Config,
        mailbox: Box<dyn MailboxClient>,
        batch: DigestBatch,
        summary: SummaryText,
    },
    Acknowledging {
        mailbox: Box<dyn MailboxClient>,
        batch: DigestBatch,
        receipt: DeliveryReceipt,
    },
    Finished(RunOutcome),
}

impl Stage {
    fn state(&self) -> RunState {
        match self {
            Stage::Idle(_) => RunState::Idle,
            Stage::Authenticating(_) => RunState::Authenticating,
            Stage::Fetching { .. } => RunState::Fetching,
            Stage::Summarizing { .. } => RunState::Summarizing,
            Stage::Sending { .. } => RunState::Sending,
            Stage::Acknowledging { .. } => RunState::Acknowledging,
            Stage::Finished(RunOutcome::NothingToDo) => RunState::EmptyExit,
            Stage::Finished(RunOutcome::Delivered { .. }) => RunState::Done,
            Stage::Finished(RunOutcome::Failed(_)) => RunState::Failed,
        }
    }
}

/// Drive one run to a terminal state. Never panics on service failures;
/// the report carries the outcome and the exit code.
pub fn run(settings: Settings, backend: &dyn Backend) -> RunReport {
    let mut trace = vec![RunState::Idle];
    let mut stage = Stage::Idle(settings);

    loop {
        stage = match stage {
            Stage::Finished(outcome) => return RunReport { trace, outcome },
            current => {
                let from = current.state();
                let next = advance(current, backend);
                let to = next.state();
                debug_assert!(from.permits(to), "illegal transition {from} -> {to}");
                trace.push(to);
                next
            }
        };
    }
}

fn advance(stage: Stage, backend: &dyn Backend) -> Stage {
    match stage {
        Stage::Idle(settings) => match settings.resolve() {
            Ok(config) => Stage::Authenticating(config),
            Err(e) => fail(e),
        },

        Stage::Authenticating(config) => {
            info!("Connecting to mailbox...");
            match backend.connect(&config) {
                Ok(mailbox) => Stage::Fetching { config, mailbox },
                Err(e) => fail(e),
            }
        }

        Stage::Fetching { config, mailbox } => {
            info!("Fetching unread emails...");
            match mailbox.fetch_unread(config.max_results) {
                Ok(batch) if batch.is_empty() => {
                    info!("No unread emails found. Nothing to do. Exiting successfully.");
                    Stage::Finished(RunOutcome::NothingToDo)
                }
                Ok(batch) => {
                    info!("Found {} unread emails.", batch.len());
                    Stage::Summarizing {
                        config,
                        mailbox,
                        batch,
                    }
                }
                Err(e) => fail(e),
            }
        }

        Stage::Summarizing {
            config,
            mailbox,
            batch,
        } => {
            info!("Generating summary...");
            let summary = backend
                .summarizer(&config)
                .and_then(|s| s.summarize(&batch));
            match summary {
                Ok(summary) if !summary.is_blank() => {
                    info!("Summary generated successfully.");
                    Stage::Sending {
                        config,
                        mailbox,
                        batch,
                        summary,
                    }
                }
                Ok(_) => abort(DigestError::Summarization(
                    "summarizer returned an empty digest".to_string(),
                )),
                Err(e) => abort(e),
            }
        }

        Stage::Sending {
            config,
            mailbox,
            batch,
            summary,
        } => {
            info!("Sending digest email...");
            let result = match backend.mailer(&config) {
                Ok(mailer) => mailer.send(&summary),
                Err(e) => return abort(e),
            };
            let reason = result
                .error
                .clone()
                .unwrap_or_else(|| "mailer reported failure".to_string());
            match result.receipt() {
                Some(receipt) => Stage::Acknowledging {
                    mailbox,
                    batch,
                    receipt,
                },
                None => abort(DigestError::SendFailure(reason)),
            }
        }

        Stage::Acknowledging {
            mailbox,
            batch,
            receipt,
        } => {
            info!("Marking emails as read...");
            let ids = batch.ids();
            let acknowledged = match mailbox.acknowledge(&ids) {
                Ok(()) => true,
                Err(e) => {
                    // the digest is already out; a rerun may send a duplicate
                    warn!("{e}");
                    false
                }
            };
            info!("Digest completed successfully!");
            Stage::Finished(RunOutcome::Delivered {
                emails: ids.len(),
                message_id: receipt.message_id().map(str::to_string),
                acknowledged,
            })
        }

        finished @ Stage::Finished(_) => finished,
    }
}

fn fail(e: DigestError) -> Stage {
    debug_assert!(e.is_fatal());
    error!("{e}");
    Stage::Finished(RunOutcome::Failed(e))
}

fn abort(e: DigestError) -> Stage {
    let stage = fail(e);
    error!("Aborting. Emails will remain unread.");
    stage
}
