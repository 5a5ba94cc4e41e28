pub mod client;
pub mod message;

pub use client::{SmtpClient, SmtpConfig};
pub use message::{MessageBuilder, OutboundMessage, NAME_PLACEHOLDER};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// SMTP-related errors
#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Transient send failure: {0}")]
    Transient(String),

    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("Not connected to the mail relay")]
    NotConnected,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Message formatting error: {0}")]
    MessageFormatError(String),

    #[error("Failed to read attachment {}: {source}", path.display())]
    AttachmentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Address parse error: {0}")]
    AddressParseError(#[from] lettre::address::AddressError),

    #[error("Message build error: {0}")]
    MessageBuildError(#[from] lettre::error::Error),
}

impl SmtpError {
    /// Whether a failed send is worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, SmtpError::Transient(_) | SmtpError::ConnectionFailed(_))
    }

    /// Classify an error raised while opening and authenticating the session
    pub(crate) fn from_connect(error: lettre::transport::smtp::Error) -> Self {
        if error.is_permanent() {
            SmtpError::AuthenticationFailed(error.to_string())
        } else {
            SmtpError::ConnectionFailed(error.to_string())
        }
    }

    /// Classify an error raised while sending one message
    pub(crate) fn from_send(error: lettre::transport::smtp::Error) -> Self {
        if error.is_permanent() || error.is_client() {
            SmtpError::Rejected(error.to_string())
        } else {
            SmtpError::Transient(error.to_string())
        }
    }
}

pub type SmtpResult<T> = Result<T, SmtpError>;

/// Relay account login. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub account_address: String,
    secret: String,
}

impl Credentials {
    pub fn new(account_address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account_address: account_address.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_address", &self.account_address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// SMTP authentication mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpAuthMechanism {
    #[default]
    Plain,
    Login,
}

/// SMTP connection security
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Direct TLS connection (port 465)
    #[default]
    Tls,
    /// STARTTLS upgrade, required (port 587)
    StartTls,
    /// Plaintext, for a relay on the local machine only
    None,
}

impl SmtpSecurity {
    /// Recommended security for a relay port
    pub fn for_port(port: u16) -> Self {
        match port {
            465 => SmtpSecurity::Tls,
            _ => SmtpSecurity::StartTls,
        }
    }
}

/// One authenticated session with a mail relay.
///
/// `connect` is called once per batch, then `send` for every message, then
/// `close`.
#[async_trait]
pub trait MailTransport: Send {
    /// Open the connection and authenticate
    async fn connect(&mut self) -> SmtpResult<()>;

    /// Send one message over the open session
    async fn send(&mut self, message: &OutboundMessage) -> SmtpResult<()>;

    /// Release the session
    async fn close(&mut self);

    /// Address of the authenticated account, for reporting
    fn account(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SmtpError::Transient("421 try later".into()).is_retryable());
        assert!(SmtpError::ConnectionFailed("reset".into()).is_retryable());
        assert!(!SmtpError::Rejected("550 no such user".into()).is_retryable());
        assert!(!SmtpError::AuthenticationFailed("535".into()).is_retryable());
        assert!(!SmtpError::NotConnected.is_retryable());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = Credentials::new("me@example.com", "hunter2 app pass");
        let debug = format!("{:?}", credentials);

        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(credentials.secret(), "hunter2 app pass");
    }

    #[test]
    fn test_security_recommendations() {
        assert_eq!(SmtpSecurity::for_port(465), SmtpSecurity::Tls);
        assert_eq!(SmtpSecurity::for_port(587), SmtpSecurity::StartTls);
        assert_eq!(SmtpSecurity::for_port(2525), SmtpSecurity::StartTls);
    }
}
