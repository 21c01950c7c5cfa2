//! Dry-run preview

use std::fmt;

use super::{AttachmentSummary, ComposedMessage};
use crate::domain::transport::{CaBundle, TransportConfig};

const PRINCIPAL_HEADERS: [&str; 5] = ["From", "To", "Cc", "Subject", "Reply-To"];

/// What would have been sent, for inspection without any network activity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preview {
    /// Principal headers as they appear in the composed message
    pub headers: Vec<(String, String)>,

    /// Number of BCC recipients, whose addresses are not shown
    pub hidden_recipients: usize,

    /// Total number of addresses the message would be submitted to
    pub delivery_count: usize,

    /// The attached files
    pub attachments: Vec<AttachmentSummary>,

    /// The transport that would have been used, if it is valid
    pub transport: Option<TransportConfig>,

    /// Where trusted roots would come from, valid transport or not
    pub ca_bundle: CaBundle,

    /// Problems with the transport configuration
    pub transport_issues: Vec<String>,
}

impl Preview {
    /// Creates a preview of `message`
    pub fn new(
        message: &ComposedMessage,
        transport: Option<TransportConfig>,
        ca_bundle: CaBundle,
        transport_issues: Vec<String>,
    ) -> Self {
        let headers = message.message().headers();
        let envelope = message.envelope();

        let mut principal: Vec<(String, String)> = PRINCIPAL_HEADERS
            .iter()
            .filter_map(|name| {
                headers
                    .get_raw(name)
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();

        if envelope.is_bcc_only() {
            principal.insert(1, ("To".to_string(), "(undisclosed recipients)".to_string()));
        }

        let hidden_recipients = message
            .delivery_set()
            .iter()
            .filter(|address| !envelope.visible_recipients().any(|v| v == *address))
            .count();

        Self {
            headers: principal,
            hidden_recipients,
            delivery_count: message.delivery_set().len(),
            attachments: message.attachments().to_vec(),
            transport,
            ca_bundle,
            transport_issues,
        }
    }

    /// The value of a principal header, if present
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[dry run] message composed, nothing was sent")?;
        writeln!(f)?;

        for (name, value) in &self.headers {
            writeln!(f, "{name}: {value}")?;
        }

        if self.hidden_recipients > 0 {
            writeln!(f, "Bcc: {} hidden recipient(s)", self.hidden_recipients)?;
        }

        writeln!(f)?;
        writeln!(f, "Delivery: {} address(es)", self.delivery_count)?;

        if self.attachments.is_empty() {
            writeln!(f, "Attachments: none")?;
        } else {
            writeln!(f, "Attachments:")?;

            for attachment in &self.attachments {
                writeln!(
                    f,
                    "  {} ({}, {} bytes)",
                    attachment.filename, attachment.content_type, attachment.size
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Transport:")?;

        if let Some(transport) = &self.transport {
            writeln!(
                f,
                "  Host: {}  Port: {}  Encryption: {}  User: {}",
                transport.host,
                transport.port,
                transport.encryption,
                transport
                    .credentials
                    .as_ref()
                    .map(|c| c.username.as_str())
                    .unwrap_or("(none)")
            )?;
        }

        writeln!(f, "  CA bundle: {}", self.ca_bundle)?;

        if self
            .transport
            .as_ref()
            .is_some_and(|transport| transport.accept_invalid_certs)
        {
            writeln!(f, "  Certificate verification: DISABLED")?;
        }

        for issue in &self.transport_issues {
            writeln!(f, "  warning: {issue}")?;
        }

        Ok(())
    }
}
