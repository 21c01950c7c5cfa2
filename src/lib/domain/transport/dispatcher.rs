//! Transport dispatcher

use std::fmt;

use tracing::{debug, info, warn};

use super::{
    Connector, Credentials, Encryption, MailOptions, Rejection, SessionError, SmtpSession, Stage,
    TransportConfig, TransportError,
};
use crate::domain::mail::{ComposedMessage, EmailAddress};

/// Where a delivery attempt currently stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No connection yet
    Disconnected,

    /// The server greeted us
    Connected,

    /// The connection is encrypted
    Encrypted,

    /// The server accepted our credentials
    Authenticated,

    /// The server accepted the message
    Sent,

    /// The session was closed after a successful send
    Closed,

    /// A transition failed; the session was aborted
    Failed(Stage),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Encrypted => write!(f, "encrypted"),
            SessionState::Authenticated => write!(f, "authenticated"),
            SessionState::Sent => write!(f, "sent"),
            SessionState::Closed => write!(f, "closed"),
            SessionState::Failed(stage) => write!(f, "failed ({stage})"),
        }
    }
}

/// The result of a successful delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Every recipient the server accepted
    pub accepted: Vec<EmailAddress>,

    /// The server's reply to the message body
    pub reply: String,
}

/// Drives one delivery attempt through connect, encrypt, authenticate and
/// send. There is no retry: every transition is attempted once, and any
/// failure moves the dispatcher to [`SessionState::Failed`].
#[derive(Debug)]
pub struct Dispatcher {
    server: String,
    encryption: Encryption,
    credentials: Option<Credentials>,
    state: SessionState,
    history: Vec<SessionState>,
}

impl Dispatcher {
    /// Creates a dispatcher for the given transport
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            server: config.server(),
            encryption: config.encryption,
            credentials: config.credentials.clone(),
            state: SessionState::Disconnected,
            history: Vec::new(),
        }
    }

    /// The current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, in order
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Delivers `message` over a session opened by `connector`.
    ///
    /// The session is closed on every path: with `QUIT` after a successful
    /// send, or aborted after a failure.
    pub fn dispatch(
        &mut self,
        connector: &dyn Connector,
        message: &ComposedMessage,
    ) -> Result<DeliveryReport, TransportError> {
        debug!(server = %self.server, encryption = %self.encryption, "connecting");

        let mut session = match connector.connect() {
            Ok(session) => session,
            Err(source) => {
                let err = match source {
                    SessionError::Tls(_) => TransportError::Tls {
                        server: self.server.clone(),
                        stage: Stage::Connect,
                        source,
                    },
                    _ => TransportError::Connectivity {
                        server: self.server.clone(),
                        source,
                    },
                };

                return Err(self.fail(err));
            }
        };

        self.advance(SessionState::Connected);

        match self.converse(session.as_mut(), message) {
            Ok(report) => {
                if let Err(err) = session.quit() {
                    warn!(%err, "the message was sent but the session did not close cleanly");
                }

                self.advance(SessionState::Closed);

                Ok(report)
            }
            Err(err) => {
                session.abort();

                Err(self.fail(err))
            }
        }
    }

    fn converse(
        &mut self,
        session: &mut dyn SmtpSession,
        message: &ComposedMessage,
    ) -> Result<DeliveryReport, TransportError> {
        match self.encryption {
            Encryption::ImplicitTls => {
                if !session.is_encrypted() {
                    return Err(TransportError::Tls {
                        server: self.server.clone(),
                        stage: Stage::Connect,
                        source: SessionError::Protocol(
                            "the connection is not encrypted".to_string(),
                        ),
                    });
                }

                self.advance(SessionState::Encrypted);
            }
            Encryption::StartTls => {
                session
                    .starttls()
                    .map_err(|source| TransportError::Tls {
                        server: self.server.clone(),
                        stage: Stage::Encrypt,
                        source,
                    })?;

                self.advance(SessionState::Encrypted);
            }
            Encryption::None => {}
        }

        if let Some(credentials) = &self.credentials {
            if !session.is_encrypted() {
                warn!("sending credentials over an unencrypted connection");
            }

            session
                .authenticate(credentials)
                .map_err(|source| TransportError::Authentication {
                    username: credentials.username.clone(),
                    source,
                })?;

            self.advance(SessionState::Authenticated);
        }

        let body = message.formatted();
        let options = MailOptions {
            smtputf8: message.needs_smtputf8(),
            eight_bit_mime: !body.is_ascii(),
        };

        session
            .mail_from(message.sender(), options)
            .map_err(|source| TransportError::SenderRejected {
                sender: message.sender().to_string(),
                source,
            })?;

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for recipient in message.delivery_set() {
            match session.rcpt_to(recipient.address()) {
                Ok(()) => accepted.push(recipient.clone()),
                Err(SessionError::Rejected { code, message: reply }) => {
                    debug!(%recipient, code, %reply, "recipient refused");

                    rejected.push(Rejection {
                        address: recipient.clone(),
                        code: Some(code),
                        message: reply,
                    });
                }
                Err(source) => return Err(TransportError::Delivery { source }),
            }
        }

        if !rejected.is_empty() {
            if let Err(err) = session.reset() {
                debug!(%err, "could not reset the transaction");
            }

            return Err(TransportError::RecipientsRejected { accepted, rejected });
        }

        let reply = session
            .data(&body)
            .map_err(|source| TransportError::Delivery { source })?;

        self.advance(SessionState::Sent);

        info!(recipients = accepted.len(), %reply, "message accepted");

        Ok(DeliveryReport { accepted, reply })
    }

    fn advance(&mut self, state: SessionState) {
        debug!(from = %self.state, to = %state, "transition");

        self.state = state;
        self.history.push(state);
    }

    fn fail(&mut self, err: TransportError) -> TransportError {
        self.advance(SessionState::Failed(err.stage()));

        err
    }
}
