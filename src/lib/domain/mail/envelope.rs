//! Message envelope

use std::path::PathBuf;

use super::EmailAddress;

/// The sender of a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    /// The sender's address, also used as the SMTP envelope-from
    pub address: EmailAddress,

    /// The display name shown in the `From` header
    pub name: Option<String>,
}

/// Everything needed to compose and deliver one message.
///
/// The envelope is built once per invocation and consumed by the composer.
/// BCC recipients take part in delivery only: [`Envelope::visible_recipients`]
/// never yields them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// The sender
    pub sender: Sender,

    /// Visible primary recipients
    pub to: Vec<EmailAddress>,

    /// Visible carbon-copy recipients
    pub cc: Vec<EmailAddress>,

    /// Hidden recipients
    pub bcc: Vec<EmailAddress>,

    /// The subject line
    pub subject: String,

    /// The plain text body
    pub text: Option<String>,

    /// The HTML body
    pub html: Option<String>,

    /// Files to attach, in order
    pub attachments: Vec<PathBuf>,

    /// The `Reply-To` address
    pub reply_to: Option<EmailAddress>,
}

impl Envelope {
    /// Creates an envelope with only the required fields set
    pub fn new(sender: Sender, subject: impl Into<String>) -> Self {
        Self {
            sender,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            text: None,
            html: None,
            attachments: Vec::new(),
            reply_to: None,
        }
    }

    /// Every address the message is delivered to: To, then CC, then BCC,
    /// without duplicates.
    pub fn delivery_set(&self) -> Vec<EmailAddress> {
        let mut set: Vec<EmailAddress> = Vec::new();

        for address in self.to.iter().chain(&self.cc).chain(&self.bcc) {
            if !set.contains(address) {
                set.push(address.clone());
            }
        }

        set
    }

    /// Every address allowed to appear in a transmitted header
    pub fn visible_recipients(&self) -> impl Iterator<Item = &EmailAddress> {
        self.to.iter().chain(&self.cc)
    }

    /// Whether the message has BCC recipients but no visible `To` recipient
    pub fn is_bcc_only(&self) -> bool {
        self.to.is_empty() && !self.bcc.is_empty()
    }
}
