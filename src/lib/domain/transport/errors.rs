//! Transport errors

use std::fmt;

use thiserror::Error;

use crate::domain::mail::EmailAddress;

/// A failure reported by an [`SmtpSession`](super::SmtpSession), before the
/// dispatcher has attributed it to a stage
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The socket could not be opened, or broke
    #[error("network error: {0}")]
    Network(String),

    /// The server did not answer in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// TLS negotiation or certificate verification failed
    #[error("tls error: {0}")]
    Tls(String),

    /// The server answered with a 4xx or 5xx reply
    #[error("server replied {code}: {message}")]
    Rejected {
        /// The SMTP reply code
        code: u16,

        /// The reply text
        message: String,
    },

    /// The client and server could not agree on something
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// The transition a failure happened in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Opening the connection (including an implicit TLS handshake)
    Connect,

    /// The `STARTTLS` upgrade
    Encrypt,

    /// `AUTH`
    Authenticate,

    /// `MAIL FROM`, `RCPT TO` and `DATA`
    Deliver,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Connect => write!(f, "connect"),
            Stage::Encrypt => write!(f, "encrypt"),
            Stage::Authenticate => write!(f, "authenticate"),
            Stage::Deliver => write!(f, "deliver"),
        }
    }
}

/// A recipient the server refused
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    /// The refused address
    pub address: EmailAddress,

    /// The SMTP reply code, when the server sent one
    pub code: Option<u16>,

    /// The server's explanation
    pub message: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({code} {})", self.address, self.message),
            None => write!(f, "{} ({})", self.address, self.message),
        }
    }
}

/// Errors that can occur while talking to the SMTP server
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The server could not be reached
    #[error("could not connect to {server}: {source}")]
    Connectivity {
        /// `host:port`
        server: String,

        /// What went wrong
        source: SessionError,
    },

    /// Encryption could not be established
    #[error("TLS with {server} failed during {stage}: {source}")]
    Tls {
        /// `host:port`
        server: String,

        /// [`Stage::Connect`] for implicit TLS, [`Stage::Encrypt`] for `STARTTLS`
        stage: Stage,

        /// What went wrong
        source: SessionError,
    },

    /// The server refused the credentials
    #[error("authentication as {username} failed: {source}")]
    Authentication {
        /// The username that was tried
        username: String,

        /// What went wrong
        source: SessionError,
    },

    /// The server refused the envelope-from address
    #[error("the server refused sender {sender}: {source}")]
    SenderRejected {
        /// The envelope-from address
        sender: String,

        /// What went wrong
        source: SessionError,
    },

    /// At least one recipient was refused; nothing was sent
    #[error("the server refused {}", describe_rejections(.accepted, .rejected))]
    RecipientsRejected {
        /// Recipients the server would have taken
        accepted: Vec<EmailAddress>,

        /// Recipients the server refused
        rejected: Vec<Rejection>,
    },

    /// The server refused the message body, or the session broke while
    /// delivering it
    #[error("delivery failed: {source}")]
    Delivery {
        /// What went wrong
        source: SessionError,
    },
}

impl TransportError {
    /// The transition that failed
    pub fn stage(&self) -> Stage {
        match self {
            TransportError::Connectivity { .. } => Stage::Connect,
            TransportError::Tls { stage, .. } => *stage,
            TransportError::Authentication { .. } => Stage::Authenticate,
            TransportError::SenderRejected { .. }
            | TransportError::RecipientsRejected { .. }
            | TransportError::Delivery { .. } => Stage::Deliver,
        }
    }
}

fn describe_rejections(accepted: &[EmailAddress], rejected: &[Rejection]) -> String {
    format!(
        "{} of {} recipient(s): {}",
        rejected.len(),
        rejected.len() + accepted.len(),
        rejected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    )
}
