use anyhow::{bail, Context, Result};
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::attachments::{self, AttachmentRef, ShareLinkFetcher, TempAttachment};
use crate::config::CampaignConfig;
use crate::contacts::{self, Contact, NameFallback};
use crate::delivery::{self, BatchReport, DeliveryEngine};
use crate::secrets::{SecretProvider, DEFAULT_SECRET_ENV};
use crate::smtp::{OutboundMessage, SmtpClient};

/// Recruiter Mailer - send a personalized letter and resume to a list of recruiters
#[derive(Parser, Debug)]
#[command(name = "recruiter-mailer")]
#[command(about = "Send personalized application emails with a resume attached")]
#[command(version)]
pub struct Cli {
    /// Contact list with name,email rows (header optional)
    #[arg(long)]
    pub csv: PathBuf,

    /// Local files to attach (e.g. resume.pdf)
    #[arg(long, num_args = 1.., conflicts_with = "drive_link")]
    pub attachments: Vec<PathBuf>,

    /// Public share link of a resume to download and attach
    #[arg(long)]
    pub drive_link: Option<String>,

    /// Filename recipients see for the attachment
    #[arg(long)]
    pub attachment_name: Option<String>,

    /// Seconds to wait between sends [default: 2.0]
    #[arg(long)]
    pub delay: Option<f64>,

    /// Email subject
    #[arg(long)]
    pub subject: Option<String>,

    /// Sender email address (also the relay login)
    #[arg(long)]
    pub from_email: Option<String>,

    /// Sender display name
    #[arg(long)]
    pub from_name: Option<String>,

    /// Retries on transient send errors [default: 2]
    #[arg(long)]
    pub retries: Option<u32>,

    /// Print planned sends without connecting to the relay
    #[arg(long)]
    pub dry_run: bool,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// File holding the body template; `{name}` is replaced per recipient
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Name derived from the email when a row has none: title-case or first-token
    #[arg(long)]
    pub name_fallback: Option<NameFallback>,

    /// Environment variable holding the relay app password
    #[arg(long, default_value = DEFAULT_SECRET_ENV)]
    pub secret_env: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Load the config file and apply command-line overrides on top
    pub fn campaign_config(&self) -> Result<CampaignConfig> {
        let mut config = CampaignConfig::load(self.config.as_deref())?;

        if let Some(subject) = &self.subject {
            config.subject = subject.clone();
        }
        if let Some(from_email) = &self.from_email {
            config.sender_email = from_email.clone();
        }
        if let Some(from_name) = &self.from_name {
            config.sender_name = from_name.clone();
        }
        if let Some(name) = &self.attachment_name {
            config.attachment_name = name.clone();
        }
        if let Some(delay) = self.delay {
            config.delivery.delay_secs = delay;
        }
        if let Some(retries) = self.retries {
            config.delivery.retries = retries;
        }
        if let Some(fallback) = self.name_fallback {
            config.name_fallback = fallback;
        }
        if let Some(path) = &self.body_file {
            config.body_template = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read body template {}", path.display()))?;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Runs one batch from parsed command-line arguments
pub struct CliHandler<S: SecretProvider> {
    secrets: Arc<S>,
}

impl<S: SecretProvider> CliHandler<S> {
    pub fn new(secrets: S) -> Self {
        Self {
            secrets: Arc::new(secrets),
        }
    }

    pub fn secrets(&self) -> &S {
        &self.secrets
    }

    /// Load, dedup, attach, build and deliver.
    ///
    /// Every configuration problem is reported before the relay is contacted.
    /// Ctrl-C stops the batch and still removes a downloaded attachment.
    pub async fn run(&self, cli: &Cli) -> Result<BatchReport> {
        let config = cli.campaign_config()?;

        if let Some(link) = &cli.drive_link {
            attachments::extract_file_id(link)?;
        }

        let local_attachments = if cli.attachments.is_empty() {
            Vec::new()
        } else {
            let display_name = cli.attachment_name.as_deref();
            attachments::resolve_local(&cli.attachments, display_name)?
        };

        let loaded = contacts::load_contacts(&cli.csv, config.name_fallback)
            .context("Error reading contact list")?;
        if loaded.is_empty() {
            bail!("No recruiter entries found in {}", cli.csv.display());
        }

        let dedup = contacts::dedup_contacts(loaded);
        println!(
            "Total unique recruiters: {} (Skipped {} duplicates)",
            dedup.contacts.len(),
            dedup.duplicate_count()
        );

        // Asked before anything is downloaded
        let secret = if cli.dry_run {
            None
        } else {
            Some(self.request_secret().await?)
        };

        let batch = deliver(cli, &config, &dedup.contacts, local_attachments, secret);
        let report = until_interrupted(batch, ctrl_c()).await?;

        print_summary(&report);
        Ok(report)
    }

    /// Ask the provider for the relay secret on a blocking thread
    async fn request_secret(&self) -> Result<String> {
        let secrets = Arc::clone(&self.secrets);
        let secret = tokio::task::spawn_blocking(move || secrets.secret())
            .await
            .context("Secret prompt did not complete")??;
        Ok(secret)
    }
}

/// Fetch the remote attachment if there is one, build every message and run
/// the engine.
///
/// A downloaded attachment is owned by this future, so it is removed when the
/// batch completes, fails or is cancelled.
async fn deliver(
    cli: &Cli,
    config: &CampaignConfig,
    recipients: &[Contact],
    local_attachments: Vec<AttachmentRef>,
    secret: Option<String>,
) -> Result<BatchReport> {
    let downloaded: Option<TempAttachment> = match &cli.drive_link {
        Some(link) if cli.dry_run => {
            let file_id = attachments::extract_file_id(link)?;
            println!("DRY RUN: resume would be downloaded from share link (id {})", file_id);
            None
        }
        Some(link) => {
            println!("Downloading resume from share link...");
            let fetcher = ShareLinkFetcher::new(config.attachment_name.clone())?;
            let temp = fetcher
                .fetch(link)
                .await
                .context("Error downloading attachment from share link")?;
            println!("Resume downloaded: {}", temp.path().display());
            Some(temp)
        }
        None => None,
    };

    let attachment_refs: Vec<AttachmentRef> = match &downloaded {
        Some(temp) => vec![temp.attachment().clone()],
        None => local_attachments,
    };

    let builder = config.message_builder();
    let messages: Vec<OutboundMessage> = recipients
        .iter()
        .map(|contact| builder.build(contact, &attachment_refs))
        .collect();

    let client = SmtpClient::new(config.smtp_config(secret.unwrap_or_default()));
    let mut engine = DeliveryEngine::new(client, config.delivery_options(cli.dry_run)?);

    let report = engine.run(&messages).await?;
    Ok(report)
}

/// Run `work` unless `interrupt` resolves first; `work` is then dropped along
/// with everything it owns
async fn until_interrupted<T>(
    work: impl Future<Output = Result<T>>,
    interrupt: impl Future<Output = ()>,
) -> Result<T> {
    tokio::select! {
        result = work => result,
        () = interrupt => {
            tracing::warn!("Interrupted, stopping the batch");
            bail!("Interrupted before the batch finished")
        }
    }
}

/// Resolves on Ctrl-C; never resolves when no handler can be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::debug!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_summary(report: &BatchReport) {
    println!();
    if report.dry_run {
        println!(
            "Dry run complete: {} message(s) planned, none sent.",
            report.planned.len()
        );
        return;
    }

    println!(
        "Sent {} of {} messages ({} failed)",
        report.sent_count(),
        report.deliveries.len(),
        report.failed_count()
    );

    for failure in report.failures() {
        if let delivery::DeliveryOutcome::FailedAfterRetries(e) = &failure.outcome {
            eprintln!(
                "  FAILED {} after {} attempt(s): {}",
                failure.recipient, failure.attempts, e
            );
        }
    }

    println!("All done.");
}
