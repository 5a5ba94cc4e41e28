use crate::contacts::NameFallback;
use crate::delivery::DeliveryOptions;
use crate::smtp::{
    Credentials, MessageBuilder, SmtpAuthMechanism, SmtpConfig, SmtpSecurity, NAME_PLACEHOLDER,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "recruiter-mailer";
const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_SUBJECT: &str = "Applying for DevOps Engineer position";

pub const DEFAULT_BODY_TEMPLATE: &str = "Hi {name},

Trust you are doing well!

Please find my resume attached for your reference.
If anything else is required, please let me know.

I recently came across an opening that matches my background and wanted to explore
whether it could be a fit. I would greatly appreciate it if you could take a moment
to review my profile.

Thank you for your time and consideration.

Thanks & Regards
";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Everything one run needs to know about the sender, the letter and the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    pub sender_name: String,
    pub sender_email: String,
    pub subject: String,
    pub body_template: String,
    /// Filename recipients see for a downloaded or renamed attachment
    pub attachment_name: String,
    pub name_fallback: NameFallback,
    pub relay: RelayConfig,
    pub delivery: DeliverySettings,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            sender_name: String::new(),
            sender_email: String::new(),
            subject: DEFAULT_SUBJECT.to_string(),
            body_template: DEFAULT_BODY_TEMPLATE.to_string(),
            attachment_name: "resume.pdf".to_string(),
            name_fallback: NameFallback::default(),
            relay: RelayConfig::default(),
            delivery: DeliverySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub mechanism: SmtpAuthMechanism,
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            security: SmtpSecurity::Tls,
            mechanism: SmtpAuthMechanism::Plain,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub delay_secs: f64,
    pub retries: u32,
    pub backoff_base_secs: f64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            delay_secs: 2.0,
            retries: 2,
            backoff_base_secs: 1.0,
        }
    }
}

impl CampaignConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load `path` if given, else the default location if it exists, else defaults
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings that would fail only after connecting
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sender_email.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sender email is required (set sender_email or pass --from-email)".to_string(),
            ));
        }

        if self.sender_email.trim().parse::<lettre::Address>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "sender email is not a valid address: {}",
                self.sender_email
            )));
        }

        if self.relay.host.trim().is_empty() {
            return Err(ConfigError::Invalid("relay host cannot be empty".to_string()));
        }

        if self.relay.port == 0 {
            return Err(ConfigError::Invalid("relay port cannot be zero".to_string()));
        }

        seconds(self.delivery.delay_secs, "delay")?;
        seconds(self.delivery.backoff_base_secs, "backoff base")?;

        if !self.body_template.contains(NAME_PLACEHOLDER) {
            tracing::warn!(
                "Body template has no {} placeholder; every recipient gets the same text",
                NAME_PLACEHOLDER
            );
        }

        Ok(())
    }

    pub fn message_builder(&self) -> MessageBuilder {
        MessageBuilder::new(
            self.sender_name.clone(),
            self.sender_email.clone(),
            self.subject.clone(),
            self.body_template.clone(),
        )
    }

    pub fn delivery_options(&self, dry_run: bool) -> ConfigResult<DeliveryOptions> {
        Ok(DeliveryOptions::default()
            .with_delay(seconds(self.delivery.delay_secs, "delay")?)
            .with_retries(self.delivery.retries)
            .with_backoff_base(seconds(self.delivery.backoff_base_secs, "backoff base")?)
            .with_dry_run(dry_run))
    }

    /// Relay settings for the account that sends as `sender_email`
    pub fn smtp_config(&self, secret: String) -> SmtpConfig {
        SmtpConfig::new(
            self.relay.host.clone(),
            self.relay.port,
            Credentials::new(self.sender_email.trim(), secret),
        )
        .with_security(self.relay.security)
        .with_mechanism(self.relay.mechanism)
        .with_timeout(Duration::from_secs(self.relay.timeout_secs))
    }
}

fn seconds(value: f64, what: &str) -> ConfigResult<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| ConfigError::Invalid(format!("{} must be a non-negative number of seconds, got {}", what, value)))
}
