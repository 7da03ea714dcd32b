//! SMTP relay transport

use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use lettre::{
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        client::{AsyncSmtpConnection, TlsParameters},
        extension::ClientId,
        Error as SmtpError,
    },
    Message,
};
use tracing::{debug, warn};

use crate::domain::dispatch::{errors::TransportError, Transport, TransportSession};

/// SMTP configuration
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
pub struct SmtpConfig {
    /// The SMTP host
    #[clap(long = "smtp-host", env = "SMTP_HOST", default_value = "localhost")]
    pub host: String,

    /// The SMTP port
    #[clap(long = "smtp-port", env = "SMTP_PORT", default_value = "2525")]
    pub port: u16,

    /// Authenticate with the username and password
    #[clap(long = "smtp-auth", env = "SMTP_AUTH", default_value = "false", action = clap::ArgAction::Set)]
    pub auth: bool,

    /// The SMTP username
    #[clap(long = "smtp-user", env = "SMTP_USER", default_value = "")]
    pub username: String,

    /// The SMTP password
    #[clap(long = "smtp-password", env = "SMTP_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Upgrade the connection with STARTTLS when the relay offers it
    #[clap(long = "smtp-tls", env = "SMTP_TLS", default_value = "false", action = clap::ArgAction::Set)]
    pub tls: bool,

    /// Connect over TLS from the start. Takes precedence over `tls`.
    #[clap(long = "smtp-ssl", env = "SMTP_SSL", default_value = "false", action = clap::ArgAction::Set)]
    pub ssl: bool,

    /// Verify the TLS certificate
    #[clap(long = "smtp-verify-tls", env = "SMTP_VERIFY_TLS", default_value = "true", action = clap::ArgAction::Set)]
    pub verify_tls: bool,

    /// The name to greet the relay with
    #[clap(long = "smtp-hello-name", env = "SMTP_HELLO_NAME", default_value = "localhost")]
    pub hello_name: String,

    /// Seconds to wait on the relay before giving up. Waits indefinitely when unset.
    #[clap(long = "smtp-timeout-seconds", env = "SMTP_TIMEOUT_SECONDS")]
    pub timeout_seconds: Option<u64>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 2525,
            auth: false,
            username: String::new(),
            password: String::new(),
            tls: false,
            ssl: false,
            verify_tls: true,
            hello_name: "localhost".to_string(),
            timeout_seconds: None,
        }
    }
}

/// How the connection to the relay is secured
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Security {
    /// Plain text
    None,

    /// Plain text upgraded with STARTTLS when offered
    StartTls,

    /// TLS from the first byte
    Implicit,
}

impl SmtpConfig {
    /// The security mode, SSL winning over TLS when both are set
    pub fn security(&self) -> Security {
        if self.ssl {
            Security::Implicit
        } else if self.tls {
            Security::StartTls
        } else {
            Security::None
        }
    }

    /// Credentials, when authentication is enabled
    pub fn credentials(&self) -> Option<Credentials> {
        self.auth
            .then(|| Credentials::new(self.username.clone(), self.password.clone()))
    }

    /// Network timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

/// Opens sessions with an SMTP relay
#[derive(Debug, Default, Clone)]
pub struct SmtpRelay {
    config: SmtpConfig,
}

impl SmtpRelay {
    /// Create a new SMTP relay
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn tls_parameters(&self) -> Result<TlsParameters, SmtpError> {
        TlsParameters::builder(self.config.host.clone())
            .dangerous_accept_invalid_certs(!self.config.verify_tls)
            .build()
    }

    #[mutants::skip]
    async fn connect(&self) -> Result<AsyncSmtpConnection, SmtpError> {
        let hello_name = ClientId::Domain(self.config.hello_name.clone());

        let implicit_tls = match self.config.security() {
            Security::Implicit => Some(self.tls_parameters()?),
            Security::StartTls | Security::None => None,
        };

        let mut connection = AsyncSmtpConnection::connect_tokio1(
            (self.config.host.as_str(), self.config.port),
            self.config.timeout(),
            &hello_name,
            implicit_tls,
            None,
        )
        .await?;

        if self.config.security() == Security::StartTls {
            if connection.can_starttls() {
                connection
                    .starttls(self.tls_parameters()?, &hello_name)
                    .await?;
            } else {
                debug!("{} does not offer STARTTLS", self.config.host);
            }
        }

        if let Some(credentials) = self.config.credentials() {
            connection
                .auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
                .await?;
        }

        Ok(connection)
    }
}

#[async_trait]
impl Transport for SmtpRelay {
    type Session = SmtpSession;

    #[mutants::skip]
    async fn open(&self) -> Result<SmtpSession, TransportError> {
        debug!(
            "Connecting to {}:{} ({:?})",
            self.config.host,
            self.config.port,
            self.config.security()
        );

        match self.connect().await {
            Ok(connection) => Ok(SmtpSession {
                relay: self.clone(),
                connection,
            }),
            Err(err) => Err(TransportError::ConnectError(err.to_string())),
        }
    }
}

/// An open SMTP connection.
///
/// The relay may drop the connection after rejecting a single message, in which case the next
/// send reconnects first.
pub struct SmtpSession {
    relay: SmtpRelay,
    connection: AsyncSmtpConnection,
}

impl std::fmt::Debug for SmtpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSession").finish_non_exhaustive()
    }
}

#[async_trait]
impl TransportSession for SmtpSession {
    #[mutants::skip]
    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        if self.connection.has_broken() {
            debug!("Reconnecting to {}", self.relay.config.host);

            self.connection = self
                .relay
                .connect()
                .await
                .map_err(|err| TransportError::ConnectError(err.to_string()))?;
        }

        match self
            .connection
            .send(message.envelope(), &message.formatted())
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => Err(TransportError::DeliveryError(err.to_string())),
        }
    }

    #[mutants::skip]
    async fn close(&mut self) {
        if self.connection.has_broken() {
            return;
        }

        if let Err(err) = self.connection.quit().await {
            warn!("Could not close SMTP session cleanly: {}", err);
        }
    }
}
