//! End-to-end batch tests over the public API
//!
//! Contacts are loaded from a real file, deduplicated, rendered into
//! messages and delivered through a recording transport.

use async_trait::async_trait;
use recruiter_mailer::attachments::{self, AttachmentRef};
use recruiter_mailer::contacts::{self, NameFallback};
use recruiter_mailer::delivery::{DeliveryEngine, DeliveryOptions, DeliveryOutcome, DeliveryState};
use recruiter_mailer::smtp::{MailTransport, MessageBuilder, OutboundMessage, SmtpError, SmtpResult};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

/// Records every rendered message and fails selected recipients a fixed number of times
#[derive(Default)]
struct RecordingTransport {
    failures_left: HashMap<String, u32>,
    rendered: Vec<(String, String)>,
    attempts: Vec<String>,
    closed: bool,
}

impl RecordingTransport {
    fn failing(recipient: &str, times: u32) -> Self {
        let mut transport = Self::default();
        transport.failures_left.insert(recipient.to_string(), times);
        transport
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn connect(&mut self) -> SmtpResult<()> {
        Ok(())
    }

    async fn send(&mut self, message: &OutboundMessage) -> SmtpResult<()> {
        self.attempts.push(message.recipient_address.clone());

        if let Some(left) = self.failures_left.get_mut(&message.recipient_address) {
            if *left > 0 {
                *left -= 1;
                return Err(SmtpError::Transient("451 temporary local problem".to_string()));
            }
        }

        let rendered = message.to_lettre_message()?;
        let raw = String::from_utf8_lossy(&rendered.formatted()).into_owned();
        self.rendered.push((message.recipient_address.clone(), raw));
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }

    fn account(&self) -> &str {
        "sender@example.com"
    }
}

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn builder() -> MessageBuilder {
    MessageBuilder::new(
        "Sam Sender",
        "sender@example.com",
        "Application",
        "Dear {name},\n\nPlease find my resume attached.\n",
    )
}

fn instant() -> DeliveryOptions {
    DeliveryOptions::default()
        .with_delay(Duration::ZERO)
        .with_backoff_base(Duration::from_millis(1))
}

#[tokio::test]
async fn test_batch_from_csv_with_transient_failure() {
    let csv = write_temp(
        "name,email\n\
         Jane Doe,jane@example.com\n\
         ,john.smith@example.com\n\
         Jane Again,JANE@example.com\n\
         Ana,ana@example.com\n",
    );
    let resume = write_temp("%PDF-1.4 fake resume");

    let loaded = contacts::load_contacts(csv.path(), NameFallback::TitleCase).unwrap();
    assert_eq!(loaded.len(), 4);

    let dedup = contacts::dedup_contacts(loaded);
    assert_eq!(dedup.contacts.len(), 3);
    assert_eq!(dedup.duplicate_count(), 1);

    let refs = attachments::resolve_local(&[resume.path().to_path_buf()], Some("resume.pdf")).unwrap();
    let builder = builder();
    let messages: Vec<OutboundMessage> = dedup
        .contacts
        .iter()
        .map(|contact| builder.build(contact, &refs))
        .collect();

    let transport = RecordingTransport::failing("john.smith@example.com", 1);
    let mut engine = DeliveryEngine::new(transport, instant());
    let report = tokio_test::assert_ok!(engine.run(&messages).await);

    assert_eq!(engine.state(), DeliveryState::Done);
    assert_eq!(report.sent_count(), 3);
    assert_eq!(report.failed_count(), 0);
    assert_eq!(report.deliveries[1].attempts, 2);

    let transport = engine.into_transport();
    assert!(transport.closed);
    assert_eq!(
        transport.attempts,
        vec![
            "jane@example.com",
            "john.smith@example.com",
            "john.smith@example.com",
            "ana@example.com",
        ]
    );

    let (_, john) = &transport.rendered[1];
    assert!(john.contains("Dear John Smith,"));
    assert!(john.contains("resume.pdf"));
    assert!(john.contains("multipart/mixed"));
}

#[tokio::test]
async fn test_batch_continues_after_exhausted_retries() {
    let messages: Vec<OutboundMessage> = ["a@example.com", "b@example.com", "c@example.com"]
        .iter()
        .map(|email| builder().build(&contacts::Contact::new("Someone", *email), &[]))
        .collect();

    let transport = RecordingTransport::failing("b@example.com", 10);
    let mut engine = DeliveryEngine::new(transport, instant().with_retries(2));
    let report = engine.run(&messages).await.unwrap();

    assert_eq!(report.sent_count(), 2);
    assert_eq!(report.failed_count(), 1);

    let failed = report.failures().next().unwrap();
    assert_eq!(failed.recipient, "b@example.com");
    assert_eq!(failed.attempts, 3);
    assert!(matches!(
        failed.outcome,
        DeliveryOutcome::FailedAfterRetries(SmtpError::Transient(_))
    ));

    let transport = engine.into_transport();
    assert_eq!(transport.rendered.len(), 2);
    assert_eq!(transport.rendered[1].0, "c@example.com");
}

#[tokio::test]
async fn test_unreadable_attachment_is_not_retried() {
    let missing = AttachmentRef::new("/nonexistent/recruiter-mailer/resume.pdf");
    let message = builder().build(&contacts::Contact::new("Jane", "jane@example.com"), &[missing]);

    let mut engine = DeliveryEngine::new(RecordingTransport::default(), instant());
    let report = engine.run(&[message]).await.unwrap();

    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.deliveries[0].attempts, 1);
    assert!(matches!(
        report.deliveries[0].outcome,
        DeliveryOutcome::FailedAfterRetries(SmtpError::AttachmentRead { .. })
    ));
}
