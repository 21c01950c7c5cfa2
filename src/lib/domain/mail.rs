//! Composing the message

mod composer;
mod email_address;
mod envelope;
mod preview;

pub mod errors;

pub use composer::{compose, AttachmentSummary, ComposedMessage};
pub use email_address::{EmailAddress, EmailAddressError};
pub use envelope::{Envelope, Sender};
pub use errors::BuildError;
pub use preview::Preview;
