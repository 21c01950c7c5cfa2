//! Delivering a composed message to an SMTP server

mod config;
mod dispatcher;
mod password;
mod session;

pub mod errors;

pub use config::{CaBundle, Credentials, Encryption, TransportConfig, UnknownEncryption};
pub use dispatcher::{DeliveryReport, Dispatcher, SessionState};
pub use errors::{Rejection, SessionError, Stage, TransportError};
pub use password::{Password, PasswordError};
pub use session::{Connector, MailOptions, SmtpSession};
