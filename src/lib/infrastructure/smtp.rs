//! SMTP sessions over lettre's low-level client

use std::{error::Error as StdError, fmt, fs, io};

use lettre::{
    transport::smtp::{
        authentication::{Credentials as LettreCredentials, Mechanism},
        client::{Certificate, CertificateStore, SmtpConnection, TlsParameters},
        commands::{Data, Mail, Rcpt, Rset},
        extension::{ClientId, Extension, MailBodyParameter, MailParameter},
        Error as SmtpError,
    },
    Address,
};
use tracing::{debug, warn};

use crate::domain::transport::{
    CaBundle, Connector, Credentials, Encryption, MailOptions, SessionError, SmtpSession,
    TransportConfig,
};

/// Mechanisms offered to the server, in order of preference
const MECHANISMS: &[Mechanism] = &[Mechanism::Plain, Mechanism::Login];

/// Opens real SMTP connections
#[derive(Clone, Debug)]
pub struct LettreConnector {
    config: TransportConfig,
    client_id: ClientId,
}

impl LettreConnector {
    /// Creates a connector for the given transport
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            client_id: ClientId::default(),
        }
    }
}

impl Connector for LettreConnector {
    fn connect(&self) -> Result<Box<dyn SmtpSession>, SessionError> {
        let tls = match self.config.encryption {
            Encryption::ImplicitTls | Encryption::StartTls => {
                if self.config.accept_invalid_certs {
                    warn!("certificate verification is disabled");
                }

                Some(tls_parameters(&self.config)?)
            }
            Encryption::None => None,
        };
        let implicit = match self.config.encryption {
            Encryption::ImplicitTls => tls.as_ref(),
            Encryption::StartTls | Encryption::None => None,
        };

        debug!(
            server = %self.config.server(),
            encryption = %self.config.encryption,
            "opening connection"
        );

        let conn = SmtpConnection::connect(
            (self.config.host.as_str(), self.config.port),
            Some(self.config.timeout),
            &self.client_id,
            implicit,
            None,
        )?;

        Ok(Box::new(LettreSession {
            conn,
            tls,
            client_id: self.client_id.clone(),
        }))
    }
}

/// Builds the TLS parameters for `config`: the bundled Mozilla roots, or only
/// the certificates in the configured PEM file.
pub fn tls_parameters(config: &TransportConfig) -> Result<TlsParameters, SessionError> {
    let builder = TlsParameters::builder(config.host.clone())
        .dangerous_accept_invalid_certs(config.accept_invalid_certs);

    let builder = match &config.ca_bundle {
        CaBundle::Bundled => builder.certificate_store(CertificateStore::WebpkiRoots),
        CaBundle::File(path) => {
            let pem = fs::read(path).map_err(|err| {
                SessionError::Tls(format!("cannot read {}: {err}", path.display()))
            })?;
            let certificate = Certificate::from_pem(&pem).map_err(|err| {
                SessionError::Tls(format!("no usable certificate in {}: {err}", path.display()))
            })?;

            builder
                .certificate_store(CertificateStore::None)
                .add_root_certificate(certificate)
        }
    };

    builder
        .build()
        .map_err(|err| SessionError::Tls(err.to_string()))
}

/// An open connection
pub struct LettreSession {
    conn: SmtpConnection,
    tls: Option<TlsParameters>,
    client_id: ClientId,
}

impl fmt::Debug for LettreSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LettreSession")
            .field("encrypted", &self.conn.is_encrypted())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl SmtpSession for LettreSession {
    fn is_encrypted(&self) -> bool {
        self.conn.is_encrypted()
    }

    fn starttls(&mut self) -> Result<(), SessionError> {
        if !self
            .conn
            .server_info()
            .supports_feature(Extension::StartTls)
        {
            return Err(SessionError::Tls(
                "the server does not offer STARTTLS".to_string(),
            ));
        }

        let tls = self.tls.as_ref().ok_or_else(|| {
            SessionError::Tls("no TLS parameters for an unencrypted transport".to_string())
        })?;

        self.conn.starttls(tls, &self.client_id)?;

        Ok(())
    }

    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), SessionError> {
        let login = LettreCredentials::new(
            credentials.username.clone(),
            credentials.password.expose().to_string(),
        );

        self.conn.auth(MECHANISMS, &login)?;

        Ok(())
    }

    fn mail_from(&mut self, sender: &Address, options: MailOptions) -> Result<(), SessionError> {
        let info = self.conn.server_info();
        let mut parameters = Vec::new();

        if options.smtputf8 {
            if !info.supports_feature(Extension::SmtpUtfEight) {
                return Err(SessionError::Protocol(
                    "the message needs SMTPUTF8, which the server does not support".to_string(),
                ));
            }

            parameters.push(MailParameter::SmtpUtfEight);
        }

        if options.eight_bit_mime && info.supports_feature(Extension::EightBitMime) {
            parameters.push(MailParameter::Body(MailBodyParameter::EightBitMime));
        }

        self.conn.command(Mail::new(Some(sender.clone()), parameters))?;

        Ok(())
    }

    fn rcpt_to(&mut self, recipient: &Address) -> Result<(), SessionError> {
        self.conn.command(Rcpt::new(recipient.clone(), vec![]))?;

        Ok(())
    }

    fn data(&mut self, message: &[u8]) -> Result<String, SessionError> {
        self.conn.command(Data)?;
        let response = self.conn.message(message)?;

        Ok(format!(
            "{} {}",
            response.code(),
            response.message().collect::<Vec<_>>().join(" ")
        ))
    }

    fn reset(&mut self) -> Result<(), SessionError> {
        self.conn.command(Rset)?;

        Ok(())
    }

    fn quit(&mut self) -> Result<(), SessionError> {
        self.conn.quit()?;

        Ok(())
    }

    fn abort(&mut self) {
        self.conn.abort();
    }
}

impl From<SmtpError> for SessionError {
    fn from(err: SmtpError) -> Self {
        let detail = err
            .source()
            .map(ToString::to_string)
            .unwrap_or_else(|| err.to_string());

        if let Some(code) = err.status() {
            return SessionError::Rejected {
                code: code.into(),
                message: detail,
            };
        }

        if err.is_tls() || caused_by_tls(&err) {
            return SessionError::Tls(detail);
        }

        if err.is_timeout() || caused_by_io(&err, io::ErrorKind::WouldBlock) {
            return SessionError::Timeout(detail);
        }

        if err.is_client() || err.is_response() {
            return SessionError::Protocol(detail);
        }

        SessionError::Network(detail)
    }
}

/// Certificate problems during a handshake surface from rustls as I/O errors
fn caused_by_tls(err: &SmtpError) -> bool {
    let mut source = err.source();

    while let Some(cause) = source {
        if cause.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err
                .get_ref()
                .is_some_and(|inner| inner.downcast_ref::<rustls::Error>().is_some())
            {
                return true;
            }
        }

        source = cause.source();
    }

    false
}

fn caused_by_io(err: &SmtpError, kind: io::ErrorKind) -> bool {
    let mut source = err.source();

    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return io_err.kind() == kind;
        }

        source = cause.source();
    }

    false
}
