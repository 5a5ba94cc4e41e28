//! Sequential, paced delivery of a batch of messages over one relay session

use crate::smtp::{MailTransport, OutboundMessage, SmtpError};
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a whole batch
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Authentication failed. Check the account address and app password: {0}")]
    Authentication(#[source] SmtpError),

    #[error("Could not open a session with the mail relay: {0}")]
    Connection(#[source] SmtpError),
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Pacing and retry policy for a batch
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOptions {
    /// Pause after every message except the last
    pub delay: Duration,
    /// Extra attempts after a transient failure
    pub retries: u32,
    /// Backoff before retry `n` is `backoff_base * 2^n`
    pub backoff_base: Duration,
    /// Report planned sends without connecting
    pub dry_run: bool,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            retries: 2,
            backoff_base: Duration::from_secs(1),
            dry_run: false,
        }
    }
}

impl DeliveryOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Wait before retry number `attempt` (counted from 1)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Disconnected,
    Authenticated,
    Sending,
    Done,
    /// Authentication or connection failed; nothing was sent
    Failed,
}

/// Final result for one recipient
#[derive(Debug)]
pub enum DeliveryOutcome {
    Sent,
    FailedAfterRetries(SmtpError),
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}

#[derive(Debug)]
pub struct RecipientReport {
    pub recipient: String,
    pub outcome: DeliveryOutcome,
    /// Number of send attempts made
    pub attempts: u32,
}

/// A send that a dry run would have made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSend {
    pub recipient: String,
    pub subject: String,
}

/// What happened to every message in a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub dry_run: bool,
    pub planned: Vec<PlannedSend>,
    pub deliveries: Vec<RecipientReport>,
}

impl BatchReport {
    pub fn sent_count(&self) -> usize {
        self.deliveries.iter().filter(|d| d.outcome.is_sent()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.deliveries.len() - self.sent_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecipientReport> {
        self.deliveries.iter().filter(|d| !d.outcome.is_sent())
    }
}

/// List the sends a batch would make, without touching the network
pub fn plan_batch(messages: &[OutboundMessage]) -> BatchReport {
    let planned = messages
        .iter()
        .map(|message| PlannedSend {
            recipient: message.recipient_address.clone(),
            subject: message.subject.clone(),
        })
        .collect();

    BatchReport {
        dry_run: true,
        planned,
        deliveries: Vec::new(),
    }
}

/// Sends a batch in order over a single transport session
pub struct DeliveryEngine<T: MailTransport> {
    transport: T,
    options: DeliveryOptions,
    state: DeliveryState,
}

impl<T: MailTransport> DeliveryEngine<T> {
    pub fn new(transport: T, options: DeliveryOptions) -> Self {
        Self {
            transport,
            options,
            state: DeliveryState::Disconnected,
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn options(&self) -> &DeliveryOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Deliver every message.
    ///
    /// Only a failed connect aborts the batch; a recipient that keeps failing
    /// is recorded and the next one is attempted.
    pub async fn run(&mut self, messages: &[OutboundMessage]) -> DeliveryResult<BatchReport> {
        if self.options.dry_run {
            tracing::info!("DRY RUN: no messages will be sent. Listing planned sends:");
            let report = plan_batch(messages);
            for (index, planned) in report.planned.iter().enumerate() {
                tracing::info!(
                    "[{}/{}] To: {} Subject: {}",
                    index + 1,
                    report.planned.len(),
                    planned.recipient,
                    planned.subject
                );
            }
            self.state = DeliveryState::Done;
            return Ok(report);
        }

        let mut report = BatchReport::default();
        if messages.is_empty() {
            self.state = DeliveryState::Done;
            return Ok(report);
        }

        if let Err(e) = self.transport.connect().await {
            self.state = DeliveryState::Failed;
            return Err(match e {
                SmtpError::AuthenticationFailed(_) => DeliveryError::Authentication(e),
                other => DeliveryError::Connection(other),
            });
        }
        self.state = DeliveryState::Authenticated;

        tracing::info!(
            "Logged in as {}. Sending {} messages...",
            self.transport.account(),
            messages.len()
        );

        self.state = DeliveryState::Sending;
        let total = messages.len();
        for (index, message) in messages.iter().enumerate() {
            let delivery = self.deliver_one(index + 1, total, message).await;
            report.deliveries.push(delivery);

            if index + 1 != total && !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }
        }

        self.transport.close().await;
        self.state = DeliveryState::Done;
        Ok(report)
    }

    async fn deliver_one(
        &mut self,
        position: usize,
        total: usize,
        message: &OutboundMessage,
    ) -> RecipientReport {
        let recipient = message.recipient_address.clone();
        let mut attempt = 0;

        loop {
            match self.transport.send(message).await {
                Ok(()) => {
                    tracing::info!("[{}/{}] Sent to {}", position, total, recipient);
                    return RecipientReport {
                        recipient,
                        outcome: DeliveryOutcome::Sent,
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt > self.options.retries {
                        tracing::error!("[{}/{}] FAILED to {}: {}", position, total, recipient, e);
                        return RecipientReport {
                            recipient,
                            outcome: DeliveryOutcome::FailedAfterRetries(e),
                            attempts: attempt,
                        };
                    }

                    let backoff = self.options.backoff_for(attempt);
                    tracing::warn!(
                        "[{}/{}] Transient error: {}. Retrying in {:?} (attempt {}/{})",
                        position,
                        total,
                        e,
                        backoff,
                        attempt,
                        self.options.retries
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
