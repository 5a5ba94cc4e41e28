use crate::attachments::AttachmentRef;
use crate::contacts::Contact;
use crate::smtp::{SmtpError, SmtpResult};
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    Address, Message,
};

/// Placeholder replaced with the recipient's display name
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Builds one personalized message per contact
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    sender_display_name: String,
    sender_address: String,
    subject: String,
    body_template: String,
}

impl MessageBuilder {
    pub fn new(
        sender_display_name: impl Into<String>,
        sender_address: impl Into<String>,
        subject: impl Into<String>,
        body_template: impl Into<String>,
    ) -> Self {
        Self {
            sender_display_name: sender_display_name.into(),
            sender_address: sender_address.into(),
            subject: subject.into(),
            body_template: body_template.into(),
        }
    }

    /// Substitute a display name into the body template
    pub fn personalize(&self, name: &str) -> String {
        self.body_template.replace(NAME_PLACEHOLDER, name)
    }

    /// Compose the message for one contact
    pub fn build(&self, contact: &Contact, attachments: &[AttachmentRef]) -> OutboundMessage {
        OutboundMessage {
            sender_display_name: self.sender_display_name.clone(),
            sender_address: self.sender_address.clone(),
            recipient_address: contact.email_address.clone(),
            subject: self.subject.clone(),
            body_text: self.personalize(&contact.display_name),
            attachments: attachments.to_vec(),
        }
    }
}

/// A fully personalized message waiting to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub sender_display_name: String,
    pub sender_address: String,
    pub recipient_address: String,
    pub subject: String,
    pub body_text: String,
    pub attachments: Vec<AttachmentRef>,
}

impl OutboundMessage {
    /// `From` mailbox, carrying the display name when one is set
    pub fn sender_mailbox(&self) -> SmtpResult<Mailbox> {
        let address: Address = self.sender_address.trim().parse()?;
        let name = self.sender_display_name.trim();
        let name = (!name.is_empty()).then(|| name.to_string());
        Ok(Mailbox::new(name, address))
    }

    /// Render as `multipart/mixed`: the text body, then one part per attachment.
    ///
    /// Attachment bytes are read from disk here.
    pub fn to_lettre_message(&self) -> SmtpResult<Message> {
        let recipient: Address = self.recipient_address.trim().parse()?;

        let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(self.body_text.clone()));

        for attachment in &self.attachments {
            let bytes = attachment.read().map_err(|source| SmtpError::AttachmentRead {
                path: attachment.file_path.clone(),
                source,
            })?;
            let content_type = ContentType::parse(attachment.mime_type())
                .map_err(|e| SmtpError::MessageFormatError(e.to_string()))?;

            multipart = multipart.singlepart(
                Attachment::new(attachment.display_filename.clone()).body(bytes, content_type),
            );
        }

        let message = Message::builder()
            .from(self.sender_mailbox()?)
            .to(Mailbox::new(None, recipient))
            .subject(self.subject.clone())
            .date_now()
            .multipart(multipart)?;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MessageBuilder {
        MessageBuilder::new(
            "Sam Sender",
            "sam@example.com",
            "Applying for DevOps Engineer position",
            "Hi {name},\n\nPlease find my resume attached.\n",
        )
    }

    fn rendered(message: &OutboundMessage) -> String {
        String::from_utf8_lossy(&message.to_lettre_message().unwrap().formatted()).into_owned()
    }

    #[test]
    fn test_personalized_body() {
        let message = builder().build(&Contact::new("Jane Doe", "jane@example.com"), &[]);

        assert_eq!(message.recipient_address, "jane@example.com");
        assert_eq!(message.subject, "Applying for DevOps Engineer position");
        assert!(message.body_text.starts_with("Hi Jane Doe,"));
        assert!(!message.body_text.contains(NAME_PLACEHOLDER));
    }

    #[test]
    fn test_rendered_headers_and_body() {
        let message = builder().build(&Contact::new("Jane", "jane@example.com"), &[]);
        let raw = rendered(&message);

        assert!(raw.contains("Sam Sender"));
        assert!(raw.contains("<sam@example.com>"));
        assert!(raw.contains("jane@example.com"));
        assert!(raw.contains("Subject: Applying for DevOps Engineer position"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("Hi Jane,"));
    }

    #[test]
    fn test_one_part_per_attachment_with_display_name() {
        let dir = tempfile::tempdir().unwrap();
        let resume = dir.path().join("resume.pdf");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&resume, b"%PDF-1.4 fake").unwrap();
        std::fs::write(&notes, b"portfolio links").unwrap();

        let attachments = vec![
            AttachmentRef::new(resume).with_display_filename("Jane Candidate.pdf"),
            AttachmentRef::new(notes),
        ];
        let message = builder().build(&Contact::new("Ann", "ann@example.com"), &attachments);
        let raw = rendered(&message);

        assert_eq!(raw.matches("Content-Disposition: attachment").count(), 2);
        assert!(raw.contains("Jane Candidate.pdf"));
        assert!(raw.contains("notes.txt"));
        assert!(!raw.contains("filename=\"resume.pdf\""));
        assert!(raw.contains("application/pdf"));
    }

    #[test]
    fn test_missing_attachment_file_is_reported() {
        let message = builder().build(
            &Contact::new("Ann", "ann@example.com"),
            &[AttachmentRef::new("/nonexistent/resume.pdf")],
        );

        assert!(matches!(
            message.to_lettre_message(),
            Err(SmtpError::AttachmentRead { .. })
        ));
    }

    #[test]
    fn test_invalid_recipient_address() {
        let message = builder().build(&Contact::new("Ann", "not-an-address"), &[]);
        assert!(matches!(
            message.to_lettre_message(),
            Err(SmtpError::AddressParseError(_))
        ));
    }

    #[test]
    fn test_sender_without_display_name() {
        let message = MessageBuilder::new("", "sam@example.com", "Hi", "Hi {name}")
            .build(&Contact::new("Ann", "ann@example.com"), &[]);

        let mailbox = message.sender_mailbox().unwrap();
        assert!(mailbox.name.is_none());
        assert_eq!(mailbox.email.to_string(), "sam@example.com");
    }
}
