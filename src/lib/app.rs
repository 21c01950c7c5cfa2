//! One invocation: compose, then preview or send

use std::process::ExitCode;

use thiserror::Error;
use tracing::warn;

use crate::{
    domain::{
        mail::{compose, BuildError, ComposedMessage, Preview},
        transport::{Connector, DeliveryReport, Dispatcher, TransportConfig, TransportError},
    },
    infrastructure::config::{ConfigError, Settings, Violation},
};

/// Exit status for configuration errors (`EX_CONFIG`)
pub const EXIT_CONFIG: u8 = 78;

/// Exit status for message build errors (`EX_DATAERR`)
pub const EXIT_BUILD: u8 = 65;

/// Exit status for transport errors (`EX_UNAVAILABLE`)
pub const EXIT_TRANSPORT: u8 = 69;

/// Any failure of an invocation
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid settings
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The message could not be assembled
    #[error("message error: {0}")]
    Build(#[from] BuildError),

    /// The server could not be reached or refused the message
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl AppError {
    /// The process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => EXIT_CONFIG,
            AppError::Build(_) => EXIT_BUILD,
            AppError::Transport(_) => EXIT_TRANSPORT,
        }
    }
}

impl From<&AppError> for ExitCode {
    fn from(err: &AppError) -> Self {
        ExitCode::from(err.exit_code())
    }
}

/// What a successful invocation did
#[derive(Debug)]
pub enum Outcome {
    /// The message was composed and previewed; nothing was sent
    DryRun(Preview),

    /// The server accepted the message
    Sent {
        /// The server's report
        report: DeliveryReport,

        /// The `Subject` that was sent
        subject: String,
    },
}

/// Composes the message described by `settings`, then either previews it
/// or delivers it over a connector built by `connector`.
///
/// A dry run never builds a connector.
pub fn run<F, C>(settings: Settings, connector: F) -> Result<Outcome, AppError>
where
    F: FnOnce(TransportConfig) -> C,
    C: Connector,
{
    let message = compose(&settings.envelope)?;

    if settings.dry_run {
        for issue in &settings.transport_issues {
            warn!(%issue, "transport configuration would prevent sending");
        }

        return Ok(Outcome::DryRun(preview(&message, &settings)));
    }

    let transport = settings.transport.ok_or_else(|| ConfigError {
        violations: if settings.transport_issues.is_empty() {
            vec![Violation::missing("host", "MAIL_HOST")]
        } else {
            settings.transport_issues
        },
    })?;

    let mut dispatcher = Dispatcher::new(&transport);
    let report = dispatcher.dispatch(&connector(transport), &message)?;

    Ok(Outcome::Sent {
        report,
        subject: settings.envelope.subject,
    })
}

fn preview(message: &ComposedMessage, settings: &Settings) -> Preview {
    Preview::new(
        message,
        settings.transport.clone(),
        settings.ca_bundle.clone(),
        settings
            .transport_issues
            .iter()
            .map(ToString::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::domain::{
        mail::{EmailAddress, Envelope, Sender},
        transport::{
            tests::{MockConnector, MockSmtpSession},
            CaBundle, Encryption, SessionError, SmtpSession,
        },
    };

    fn address(raw: &str) -> EmailAddress {
        EmailAddress::new(raw).unwrap()
    }

    fn settings(dry_run: bool) -> Settings {
        let mut envelope = Envelope::new(
            Sender {
                address: address("sender@example.com"),
                name: Some("Sender".to_string()),
            },
            "Report",
        );
        envelope.to = vec![address("a@x.com")];
        envelope.bcc = vec![address("d@x.com")];
        envelope.text = Some("v1".to_string());

        Settings {
            envelope,
            transport: Some(TransportConfig {
                host: "smtp.example.com".to_string(),
                port: 25,
                encryption: Encryption::None,
                credentials: None,
                ca_bundle: CaBundle::Bundled,
                accept_invalid_certs: false,
                timeout: TransportConfig::DEFAULT_TIMEOUT,
            }),
            ca_bundle: CaBundle::Bundled,
            transport_issues: vec![],
            dry_run,
        }
    }

    #[test]
    fn test_dry_run_never_connects() -> TestResult {
        let mut connector = MockConnector::new();
        connector.expect_connect().times(0);

        let outcome = run(settings(true), move |_| connector)?;

        let Outcome::DryRun(preview) = outcome else {
            panic!("expected a dry run");
        };
        assert_eq!(preview.header("To"), Some("a@x.com"));
        assert_eq!(preview.hidden_recipients, 1);

        Ok(())
    }

    #[test]
    fn test_dry_run_reports_transport_issues() -> TestResult {
        let mut settings = settings(true);
        settings.transport = None;
        settings.transport_issues = vec![Violation::missing("host", "MAIL_HOST")];

        let Outcome::DryRun(preview) = run(settings, |_| MockConnector::new())? else {
            panic!("expected a dry run");
        };

        assert_eq!(preview.transport_issues.len(), 1);
        assert!(preview.transport_issues[0].starts_with("host:"));

        Ok(())
    }

    #[test]
    fn test_send_delivers_to_every_recipient() -> TestResult {
        let mut session = MockSmtpSession::new();
        session.expect_mail_from().returning(|_, _| Ok(()));
        session.expect_rcpt_to().times(2).returning(|_| Ok(()));
        session
            .expect_data()
            .returning(|_| Ok("250 queued".to_string()));
        session.expect_quit().returning(|| Ok(()));

        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move || Ok(Box::new(session) as Box<dyn SmtpSession>));

        let Outcome::Sent { report, subject } = run(settings(false), move |_| connector)? else {
            panic!("expected a send");
        };

        assert_eq!(report.accepted, vec![address("a@x.com"), address("d@x.com")]);
        assert_eq!(subject, "Report");

        Ok(())
    }

    #[test]
    fn test_empty_body_is_a_build_error() {
        let mut settings = settings(true);
        settings.envelope.text = None;

        let err = run(settings, |_| MockConnector::new()).unwrap_err();

        assert!(matches!(err, AppError::Build(BuildError::EmptyBody)));
        assert_eq!(err.exit_code(), EXIT_BUILD);
    }

    #[test]
    fn test_unreachable_server_is_a_transport_error() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .return_once(|| Err(SessionError::Network("connection refused".to_string())));

        let err = run(settings(false), move |_| connector).unwrap_err();

        assert!(matches!(
            err,
            AppError::Transport(TransportError::Connectivity { .. })
        ));
        assert_eq!(err.exit_code(), EXIT_TRANSPORT);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err = AppError::from(ConfigError {
            violations: vec![Violation::missing("host", "MAIL_HOST")],
        });

        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }
}
