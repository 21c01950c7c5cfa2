//! Turns an [`Envelope`] into a wire-ready message

use std::{fs, path::Path};

use lettre::{
    address::Envelope as SmtpEnvelope,
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    Address, Message,
};
use tracing::debug;

use super::{BuildError, EmailAddress, Envelope};

/// Summary of one attached file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentSummary {
    /// The file name written into the part's `Content-Disposition`
    pub filename: String,

    /// The guessed MIME type
    pub content_type: String,

    /// Size of the file in bytes
    pub size: usize,
}

/// A fully composed message together with its delivery set
#[derive(Clone, Debug)]
pub struct ComposedMessage {
    envelope: Envelope,
    message: Message,
    delivery_set: Vec<EmailAddress>,
    attachments: Vec<AttachmentSummary>,
}

enum Body {
    Single(SinglePart),
    Alternative(MultiPart),
}

/// Builds the MIME message for `envelope`.
///
/// Attachments are read eagerly so that a missing or unreadable file is
/// reported before any connection is made.
pub fn compose(envelope: &Envelope) -> Result<ComposedMessage, BuildError> {
    let body = match (&envelope.text, &envelope.html) {
        (Some(text), Some(html)) => Body::Alternative(MultiPart::alternative_plain_html(
            text.clone(),
            html.clone(),
        )),
        (Some(text), None) => Body::Single(SinglePart::plain(text.clone())),
        (None, Some(html)) => Body::Single(SinglePart::html(html.clone())),
        (None, None) => return Err(BuildError::EmptyBody),
    };

    let delivery_set = envelope.delivery_set();
    if delivery_set.is_empty() {
        return Err(BuildError::NoRecipients);
    }

    let mut parts = Vec::with_capacity(envelope.attachments.len());
    let mut attachments = Vec::with_capacity(envelope.attachments.len());

    for path in &envelope.attachments {
        let (part, summary) = attachment(path)?;

        debug!(
            filename = %summary.filename,
            content_type = %summary.content_type,
            size = summary.size,
            "attached file"
        );

        parts.push(part);
        attachments.push(summary);
    }

    let smtp_envelope = SmtpEnvelope::new(
        Some(envelope.sender.address.address().clone()),
        delivery_set.iter().map(|a| a.address().clone()).collect(),
    )?;

    let mut builder = Message::builder()
        .from(Mailbox::new(
            envelope.sender.name.clone(),
            envelope.sender.address.address().clone(),
        ))
        .subject(envelope.subject.clone())
        .envelope(smtp_envelope);

    for to in &envelope.to {
        builder = builder.to(mailbox(to));
    }

    for cc in &envelope.cc {
        builder = builder.cc(mailbox(cc));
    }

    if let Some(reply_to) = &envelope.reply_to {
        builder = builder.reply_to(mailbox(reply_to));
    }

    let message = if parts.is_empty() {
        match body {
            Body::Single(part) => builder.singlepart(part)?,
            Body::Alternative(multipart) => builder.multipart(multipart)?,
        }
    } else {
        let mixed = match body {
            Body::Single(part) => MultiPart::mixed().singlepart(part),
            Body::Alternative(multipart) => MultiPart::mixed().multipart(multipart),
        };

        builder.multipart(parts.into_iter().fold(mixed, MultiPart::singlepart))?
    };

    Ok(ComposedMessage {
        envelope: envelope.clone(),
        message,
        delivery_set,
        attachments,
    })
}

fn mailbox(address: &EmailAddress) -> Mailbox {
    Mailbox::new(None, address.address().clone())
}

fn attachment(path: &Path) -> Result<(SinglePart, AttachmentSummary), BuildError> {
    if !path.is_file() {
        return Err(BuildError::AttachmentNotFound(path.to_path_buf()));
    }

    let content = fs::read(path).map_err(|source| BuildError::AttachmentUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    let content_type = ContentType::parse(guessed.essence_str())
        .or_else(|_| ContentType::parse("application/octet-stream"))
        .map_err(|err| BuildError::Assembly(err.to_string()))?;

    let summary = AttachmentSummary {
        filename: filename.clone(),
        content_type: guessed.essence_str().to_string(),
        size: content.len(),
    };

    Ok((Attachment::new(filename).body(content, content_type), summary))
}

impl ComposedMessage {
    /// The envelope the message was composed from
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The lettre message
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// The envelope-from address
    pub fn sender(&self) -> &Address {
        self.envelope.sender.address.address()
    }

    /// Every address the message is submitted to (To, CC and BCC)
    pub fn delivery_set(&self) -> &[EmailAddress] {
        &self.delivery_set
    }

    /// The attached files, in order
    pub fn attachments(&self) -> &[AttachmentSummary] {
        &self.attachments
    }

    /// The message serialised for the DATA command
    pub fn formatted(&self) -> Vec<u8> {
        self.message.formatted()
    }

    /// Whether any address in the delivery set needs SMTPUTF8
    pub fn needs_smtputf8(&self) -> bool {
        !self.envelope.sender.address.is_ascii()
            || self.delivery_set.iter().any(|address| !address.is_ascii())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use testresult::TestResult;

    use super::*;
    use crate::domain::mail::Sender;

    fn address(raw: &str) -> EmailAddress {
        EmailAddress::new(raw).unwrap()
    }

    fn envelope() -> Envelope {
        let mut envelope = Envelope::new(
            Sender {
                address: address("sender@example.com"),
                name: Some("Sender Name".to_string()),
            },
            "Report",
        );
        envelope.to = vec![address("a@x.com"), address("b@x.com")];
        envelope.cc = vec![address("c@x.com")];
        envelope.bcc = vec![address("d@x.com")];
        envelope.text = Some("v1".to_string());
        envelope
    }

    fn formatted(composed: &ComposedMessage) -> String {
        String::from_utf8_lossy(&composed.formatted()).into_owned()
    }

    fn header_block(composed: &ComposedMessage) -> String {
        let formatted = formatted(composed);

        match formatted.split_once("\r\n\r\n") {
            Some((headers, _)) => headers.to_string(),
            None => formatted,
        }
    }

    #[test]
    fn test_bcc_never_appears_in_the_message() -> TestResult {
        let composed = compose(&envelope())?;

        assert!(!formatted(&composed).contains("d@x.com"));
        assert!(!header_block(&composed).contains("Bcc:"));

        Ok(())
    }

    #[test]
    fn test_bcc_is_part_of_the_delivery_set() -> TestResult {
        let composed = compose(&envelope())?;

        let smtp_recipients: Vec<String> = composed
            .message()
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert!(smtp_recipients.contains(&"d@x.com".to_string()));
        assert_eq!(composed.delivery_set().len(), 4);

        Ok(())
    }

    #[test]
    fn test_visible_headers() -> TestResult {
        let composed = compose(&envelope())?;
        let headers = composed.message().headers();

        assert_eq!(headers.get_raw("To"), Some("a@x.com, b@x.com"));
        assert_eq!(headers.get_raw("Cc"), Some("c@x.com"));
        assert_eq!(headers.get_raw("Subject"), Some("Report"));
        assert!(headers
            .get_raw("From")
            .is_some_and(|from| from.contains("sender@example.com")));

        Ok(())
    }

    #[test]
    fn test_reply_to_header() -> TestResult {
        let mut envelope = envelope();
        envelope.reply_to = Some(address("replies@example.com"));

        let composed = compose(&envelope)?;

        assert_eq!(
            composed.message().headers().get_raw("Reply-To"),
            Some("replies@example.com")
        );

        Ok(())
    }

    #[test]
    fn test_bcc_only_message_has_no_to_header() -> TestResult {
        let mut envelope = envelope();
        envelope.to.clear();
        envelope.cc.clear();

        let composed = compose(&envelope)?;

        assert!(composed.message().headers().get_raw("To").is_none());
        assert_eq!(composed.delivery_set().len(), 1);
        assert!(!formatted(&composed).contains("d@x.com"));

        Ok(())
    }

    #[test]
    fn test_empty_body_is_rejected() {
        let mut envelope = envelope();
        envelope.text = None;

        assert!(matches!(compose(&envelope), Err(BuildError::EmptyBody)));
    }

    #[test]
    fn test_no_recipients_is_rejected() {
        let mut envelope = envelope();
        envelope.to.clear();
        envelope.cc.clear();
        envelope.bcc.clear();

        assert!(matches!(compose(&envelope), Err(BuildError::NoRecipients)));
    }

    #[test]
    fn test_text_and_html_are_alternatives() -> TestResult {
        let mut envelope = envelope();
        envelope.html = Some("<h1>Report</h1>".to_string());

        let formatted = formatted(&compose(&envelope)?);

        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains("text/plain"));
        assert!(formatted.contains("text/html"));
        assert!(!formatted.contains("multipart/mixed"));

        Ok(())
    }

    #[test]
    fn test_html_only_body() -> TestResult {
        let mut envelope = envelope();
        envelope.text = None;
        envelope.html = Some("<p>hello</p>".to_string());

        let formatted = formatted(&compose(&envelope)?);

        assert!(formatted.contains("text/html"));
        assert!(!formatted.contains("multipart/alternative"));

        Ok(())
    }

    #[test]
    fn test_attachments_follow_the_body() -> TestResult {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        file.write_all(b"%PDF-1.4 fake")?;

        let mut envelope = envelope();
        envelope.attachments = vec![file.path().to_path_buf()];

        let composed = compose(&envelope)?;
        let formatted = formatted(&composed);
        let filename = file
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        assert!(formatted.contains("multipart/mixed"));
        assert!(formatted.contains(&filename));
        assert!(formatted.contains("application/pdf"));
        assert_eq!(
            composed.attachments(),
            &[AttachmentSummary {
                filename,
                content_type: "application/pdf".to_string(),
                size: 13,
            }]
        );

        Ok(())
    }

    #[test]
    fn test_unknown_extension_is_octet_stream() -> TestResult {
        let file = tempfile::Builder::new().suffix(".zzqq").tempfile()?;

        let mut envelope = envelope();
        envelope.attachments = vec![file.path().to_path_buf()];

        let composed = compose(&envelope)?;

        assert_eq!(
            composed.attachments()[0].content_type,
            "application/octet-stream"
        );

        Ok(())
    }

    #[test]
    fn test_missing_attachment_names_the_path() -> TestResult {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("missing.txt");

        let mut envelope = envelope();
        envelope.attachments = vec![missing.clone()];

        let err = compose(&envelope).unwrap_err();

        assert!(matches!(&err, BuildError::AttachmentNotFound(path) if *path == missing));
        assert!(err.to_string().contains("missing.txt"));

        Ok(())
    }

    #[test]
    fn test_directory_is_not_an_attachment() -> TestResult {
        let dir = tempfile::tempdir()?;

        let mut envelope = envelope();
        envelope.attachments = vec![dir.path().to_path_buf()];

        assert!(matches!(
            compose(&envelope),
            Err(BuildError::AttachmentNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn test_smtputf8_detection() -> TestResult {
        assert!(!compose(&envelope())?.needs_smtputf8());

        let mut envelope = envelope();
        envelope.bcc = vec![address("åke@example.com")];

        assert!(compose(&envelope)?.needs_smtputf8());

        Ok(())
    }
}
