use crate::smtp::{
    Credentials, MailTransport, OutboundMessage, SmtpAuthMechanism, SmtpError, SmtpResult,
    SmtpSecurity,
};
use async_trait::async_trait;
use lettre::{
    transport::smtp::{
        authentication::{Credentials as LettreCredentials, Mechanism},
        client::{Tls, TlsParameters},
        PoolConfig,
    },
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use std::time::Duration;

/// SMTP client configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub mechanism: SmtpAuthMechanism,
    pub credentials: Credentials,
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(server: String, port: u16, credentials: Credentials) -> Self {
        Self {
            server,
            port,
            security: SmtpSecurity::for_port(port),
            mechanism: SmtpAuthMechanism::Plain,
            credentials,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_security(mut self, security: SmtpSecurity) -> Self {
        self.security = security;
        self
    }

    pub fn with_mechanism(mut self, mechanism: SmtpAuthMechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the configuration before any network activity
    pub fn validate(&self) -> SmtpResult<()> {
        if self.server.is_empty() {
            return Err(SmtpError::InvalidConfig(
                "SMTP server cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(SmtpError::InvalidConfig(
                "SMTP port cannot be zero".to_string(),
            ));
        }

        if self.credentials.account_address.is_empty() {
            return Err(SmtpError::InvalidConfig(
                "Account address cannot be empty".to_string(),
            ));
        }

        if self.credentials.secret().is_empty() {
            return Err(SmtpError::InvalidConfig(
                "Account secret cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// SMTP client holding one authenticated relay session
pub struct SmtpClient {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpClient {
    /// Create a client; nothing is opened until `connect`
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Build the lettre transport from configuration
    fn build_transport(config: &SmtpConfig) -> SmtpResult<AsyncSmtpTransport<Tokio1Executor>> {
        let tls_parameters = TlsParameters::builder(config.server.clone())
            .dangerous_accept_invalid_certs(false)
            .dangerous_accept_invalid_hostnames(false)
            .build()
            .map_err(|e| SmtpError::ConnectionFailed(format!("TLS configuration failed: {}", e)))?;

        let tls = match config.security {
            SmtpSecurity::Tls => Tls::Wrapper(tls_parameters),
            SmtpSecurity::StartTls => Tls::Required(tls_parameters),
            SmtpSecurity::None => Tls::None,
        };

        let mechanism = match config.mechanism {
            SmtpAuthMechanism::Plain => Mechanism::Plain,
            SmtpAuthMechanism::Login => Mechanism::Login,
        };

        let credentials = LettreCredentials::new(
            config.credentials.account_address.clone(),
            config.credentials.secret().to_string(),
        );

        // A pool of one keeps every send on the session opened by `connect`
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
            .port(config.port)
            .tls(tls)
            .timeout(Some(config.timeout))
            .pool_config(PoolConfig::new().max_size(1))
            .credentials(credentials)
            .authentication(vec![mechanism])
            .build();

        Ok(transport)
    }

    /// Get the current configuration
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl MailTransport for SmtpClient {
    async fn connect(&mut self) -> SmtpResult<()> {
        self.config.validate()?;
        let transport = Self::build_transport(&self.config)?;

        tracing::debug!(
            "Connecting to {}:{} ({:?})",
            self.config.server,
            self.config.port,
            self.config.security
        );

        match transport.test_connection().await {
            Ok(true) => {
                // The checked connection is parked by a spawned task; let it
                // land so the first send reuses it
                tokio::task::yield_now().await;
                tracing::info!(
                    "SMTP session established with {}:{}",
                    self.config.server,
                    self.config.port
                );
                self.transport = Some(transport);
                Ok(())
            }
            Ok(false) => Err(SmtpError::ConnectionFailed(format!(
                "{}:{} did not respond",
                self.config.server, self.config.port
            ))),
            Err(e) => {
                tracing::error!("SMTP connection failed: {}", e);
                Err(SmtpError::from_connect(e))
            }
        }
    }

    async fn send(&mut self, message: &OutboundMessage) -> SmtpResult<()> {
        let transport = self.transport.as_ref().ok_or(SmtpError::NotConnected)?;
        let email = message.to_lettre_message()?;

        transport.send(email).await.map_err(SmtpError::from_send)?;

        tracing::debug!("Relay accepted message for {}", message.recipient_address);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.shutdown().await;
            tracing::debug!("Closed SMTP session with {}", self.config.server);
        }
    }

    fn account(&self) -> &str {
        &self.config.credentials.account_address
    }
}
