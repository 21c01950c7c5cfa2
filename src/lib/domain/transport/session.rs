//! SMTP session seam

#[cfg(test)]
use mockall::mock;

use lettre::Address;

use super::{Credentials, SessionError};

/// Parameters for `MAIL FROM`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MailOptions {
    /// Some address is not ASCII; the server must support `SMTPUTF8`
    pub smtputf8: bool,

    /// The body is not 7-bit clean; the server must support `8BITMIME`
    pub eight_bit_mime: bool,
}

/// One open SMTP connection.
///
/// Each method is a single protocol step; ordering is the caller's concern.
pub trait SmtpSession {
    /// Whether the connection is currently encrypted
    fn is_encrypted(&self) -> bool;

    /// Upgrades the connection with `STARTTLS` and repeats `EHLO`
    fn starttls(&mut self) -> Result<(), SessionError>;

    /// Logs in with the first mechanism both sides support
    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), SessionError>;

    /// Sends `MAIL FROM`
    fn mail_from(&mut self, sender: &Address, options: MailOptions) -> Result<(), SessionError>;

    /// Sends `RCPT TO` for a single recipient
    fn rcpt_to(&mut self, recipient: &Address) -> Result<(), SessionError>;

    /// Sends `DATA` followed by the message, returning the server's reply
    fn data(&mut self, message: &[u8]) -> Result<String, SessionError>;

    /// Sends `RSET`
    fn reset(&mut self) -> Result<(), SessionError>;

    /// Sends `QUIT`
    fn quit(&mut self) -> Result<(), SessionError>;

    /// Best-effort `QUIT` followed by closing the socket
    fn abort(&mut self);
}

/// Opens [`SmtpSession`]s
pub trait Connector {
    /// Connects, performs any implicit TLS handshake, and greets the server
    fn connect(&self) -> Result<Box<dyn SmtpSession>, SessionError>;
}

#[cfg(test)]
mock! {
    pub SmtpSession {}

    impl SmtpSession for SmtpSession {
        fn is_encrypted(&self) -> bool;
        fn starttls(&mut self) -> Result<(), SessionError>;
        fn authenticate(&mut self, credentials: &Credentials) -> Result<(), SessionError>;
        fn mail_from(&mut self, sender: &Address, options: MailOptions) -> Result<(), SessionError>;
        fn rcpt_to(&mut self, recipient: &Address) -> Result<(), SessionError>;
        fn data(&mut self, message: &[u8]) -> Result<String, SessionError>;
        fn reset(&mut self) -> Result<(), SessionError>;
        fn quit(&mut self) -> Result<(), SessionError>;
        fn abort(&mut self);
    }
}

#[cfg(test)]
mock! {
    pub Connector {}

    impl Connector for Connector {
        fn connect(&self) -> Result<Box<dyn SmtpSession>, SessionError>;
    }
}
