//! Command-line flags, environment variables, and their resolution

use std::{env, path::PathBuf, time::Duration};

use clap::{
    builder::{OsStringValueParser, TypedValueParser},
    Parser,
};
use tracing::debug;

use crate::domain::{
    mail::{EmailAddress, Envelope, Sender},
    transport::{CaBundle, Credentials, Encryption, Password, TransportConfig},
};

mod errors;

pub use errors::{ConfigError, Violation};

/// Command-line arguments / environment variables. A flag always wins over
/// its environment variable.
#[derive(Clone, Debug, Default, Parser)]
#[command(
    name = "smtp-send",
    version,
    about = "Compose one email and send it through an SMTP server"
)]
pub struct Args {
    /// Recipient; repeat or separate with commas
    #[arg(long, value_name = "ADDRESS", value_delimiter = ',')]
    pub to: Vec<String>,

    /// Carbon-copy recipient; repeat or separate with commas
    #[arg(long, value_name = "ADDRESS", value_delimiter = ',')]
    pub cc: Vec<String>,

    /// Blind carbon-copy recipient; repeat or separate with commas
    #[arg(long, value_name = "ADDRESS", value_delimiter = ',')]
    pub bcc: Vec<String>,

    /// The subject line
    #[arg(short, long)]
    pub subject: Option<String>,

    /// The plain text body
    #[arg(long)]
    pub text: Option<String>,

    /// The HTML body
    #[arg(long)]
    pub html: Option<String>,

    /// File to attach; repeat for more
    #[arg(long = "attach", value_name = "PATH")]
    pub attachments: Vec<PathBuf>,

    /// The Reply-To address
    #[arg(long, value_name = "ADDRESS")]
    pub reply_to: Option<String>,

    /// Sender address (defaults to the SMTP username)
    #[arg(long, env = "MAIL_FROM_ADDRESS", value_name = "ADDRESS")]
    pub from_address: Option<String>,

    /// Sender display name
    #[arg(long, env = "MAIL_FROM_NAME", value_name = "NAME")]
    pub from_name: Option<String>,

    /// Mail provider; only smtp is supported
    #[arg(long, env = "MAIL_PROVIDER", hide = true)]
    pub provider: Option<String>,

    /// SMTP username
    #[arg(long, env = "MAIL_USER")]
    pub user: Option<String>,

    /// SMTP password or app password
    #[arg(long, env = "MAIL_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// SMTP host
    #[arg(long, env = "MAIL_HOST")]
    pub host: Option<String>,

    /// SMTP port (defaults to 465, 587 or 25 depending on the encryption)
    #[arg(long, env = "MAIL_PORT")]
    pub port: Option<String>,

    /// none, ssl (implicit TLS) or tls (STARTTLS)
    #[arg(long, env = "MAIL_ENCRYPTION", value_name = "MODE")]
    pub encryption: Option<String>,

    /// PEM bundle of trusted roots, replacing the bundled ones; falls back
    /// to SSL_CERT_FILE
    #[arg(
        long,
        env = "MAIL_SSL_CAFILE",
        value_name = "PATH",
        value_parser = OsStringValueParser::new().map(PathBuf::from)
    )]
    pub cafile: Option<PathBuf>,

    /// Connection timeout in seconds
    #[arg(long, env = "MAIL_TIMEOUT", value_name = "SECONDS")]
    pub timeout: Option<String>,

    /// Do not verify the server certificate (testing only)
    #[arg(long)]
    pub insecure: bool,

    /// Compose the message and print it without sending
    #[arg(long)]
    pub dry_run: bool,
}

/// The fully resolved invocation
#[derive(Clone, Debug)]
pub struct Settings {
    /// The message to compose
    pub envelope: Envelope,

    /// The transport, when its configuration is valid
    pub transport: Option<TransportConfig>,

    /// Where trusted roots come from, whether or not the transport is valid
    pub ca_bundle: CaBundle,

    /// Transport problems tolerated because this is a dry run
    pub transport_issues: Vec<Violation>,

    /// Compose only, never connect
    pub dry_run: bool,
}

/// Validates `args`, falling back to `SSL_CERT_FILE` when no CA bundle was
/// given.
///
/// Every violation is collected before returning. Transport problems only
/// fail a real send; in a dry run they are kept in
/// [`Settings::transport_issues`].
pub fn resolve(args: &Args) -> Result<Settings, ConfigError> {
    resolve_with(args, env::var_os("SSL_CERT_FILE").map(PathBuf::from))
}

fn resolve_with(args: &Args, system_ca: Option<PathBuf>) -> Result<Settings, ConfigError> {
    let mut violations = Vec::new();

    let envelope = resolve_envelope(args, &mut violations);

    let ca_bundle = ca_bundle(args, system_ca);

    let mut transport_issues = Vec::new();
    let transport = resolve_transport(args, &ca_bundle, &mut transport_issues);

    if !args.dry_run {
        violations.append(&mut transport_issues);
    }

    match envelope {
        Some(envelope) if violations.is_empty() => {
            debug!(
                dry_run = args.dry_run,
                transport_valid = transport.is_some(),
                ca_bundle = %ca_bundle,
                "configuration resolved"
            );

            Ok(Settings {
                envelope,
                transport,
                ca_bundle,
                transport_issues,
                dry_run: args.dry_run,
            })
        }
        _ => Err(ConfigError { violations }),
    }
}

fn resolve_envelope(args: &Args, violations: &mut Vec<Violation>) -> Option<Envelope> {
    let from_address = non_empty(&args.from_address).or_else(|| non_empty(&args.user));

    let sender = match from_address {
        Some(raw) => address("from-address", &raw, violations),
        None => {
            violations.push(Violation::missing("from-address", "MAIL_FROM_ADDRESS"));
            None
        }
    };

    let to = addresses("to", &args.to, violations);
    let cc = addresses("cc", &args.cc, violations);
    let bcc = addresses("bcc", &args.bcc, violations);

    if !has_entries(&args.to) && !has_entries(&args.bcc) {
        violations.push(Violation::new(
            "to",
            "at least one recipient is required (use --to, or --bcc alone)",
        ));
    }

    let subject = match non_empty(&args.subject) {
        Some(subject) => Some(subject),
        None => {
            violations.push(Violation::new("subject", "not set (use --subject)"));
            None
        }
    };

    let reply_to = args
        .reply_to
        .as_deref()
        .and_then(|raw| address("reply-to", raw, violations));

    let sender = Sender {
        address: sender?,
        name: non_empty(&args.from_name),
    };

    let mut envelope = Envelope::new(sender, subject?);
    envelope.to = to?;
    envelope.cc = cc?;
    envelope.bcc = bcc?;
    envelope.text = non_empty(&args.text);
    envelope.html = non_empty(&args.html);
    envelope.attachments = args.attachments.clone();
    envelope.reply_to = reply_to;

    Some(envelope)
}

/// `--cafile` / `MAIL_SSL_CAFILE`, then `system_ca`, then the bundled roots
fn ca_bundle(args: &Args, system_ca: Option<PathBuf>) -> CaBundle {
    args.cafile
        .clone()
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| system_ca.filter(|path| !path.as_os_str().is_empty()))
        .map_or(CaBundle::Bundled, CaBundle::File)
}

fn resolve_transport(
    args: &Args,
    ca_bundle: &CaBundle,
    violations: &mut Vec<Violation>,
) -> Option<TransportConfig> {
    let before = violations.len();

    if let Some(provider) = non_empty(&args.provider) {
        if !provider.eq_ignore_ascii_case("smtp") {
            violations.push(Violation::new(
                "provider",
                format!("unsupported provider \"{provider}\" (only smtp)"),
            ));
        }
    }

    let host = non_empty(&args.host);
    if host.is_none() {
        violations.push(Violation::missing("host", "MAIL_HOST"));
    }

    let encryption = match non_empty(&args.encryption) {
        Some(raw) => match raw.parse::<Encryption>() {
            Ok(encryption) => encryption,
            Err(err) => {
                violations.push(Violation::new("encryption", err.to_string()));
                Encryption::default()
            }
        },
        None => Encryption::default(),
    };

    let port = match non_empty(&args.port) {
        Some(raw) => match raw.parse::<u16>() {
            Ok(0) | Err(_) => {
                violations.push(Violation::new(
                    "port",
                    format!("\"{raw}\" is not a positive port number"),
                ));
                None
            }
            Ok(port) => Some(port),
        },
        None => Some(encryption.default_port()),
    };

    let credentials = resolve_credentials(args, encryption, violations);

    let timeout = match non_empty(&args.timeout) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) | Err(_) => {
                violations.push(Violation::new(
                    "timeout",
                    format!("\"{raw}\" is not a positive number of seconds"),
                ));
                None
            }
            Ok(seconds) => Some(Duration::from_secs(seconds)),
        },
        None => Some(TransportConfig::DEFAULT_TIMEOUT),
    };

    if let CaBundle::File(path) = ca_bundle {
        if !path.is_file() {
            violations.push(Violation::new(
                "cafile",
                format!("{} is not a readable file", path.display()),
            ));
        }
    }

    if violations.len() > before {
        return None;
    }

    Some(TransportConfig {
        host: host?,
        port: port?,
        encryption,
        credentials: credentials?,
        ca_bundle: ca_bundle.clone(),
        accept_invalid_certs: args.insecure,
        timeout: timeout?,
    })
}

/// `Some(None)` means "no authentication", `None` means "invalid"
fn resolve_credentials(
    args: &Args,
    encryption: Encryption,
    violations: &mut Vec<Violation>,
) -> Option<Option<Credentials>> {
    let user = non_empty(&args.user);
    let password = args.password.clone().filter(|password| !password.is_empty());

    match (user, password) {
        (Some(username), Some(password)) => {
            let password = Password::new(&password)
                .map_err(|err| violations.push(Violation::new("password", err.to_string())))
                .ok()?;

            Some(Some(Credentials { username, password }))
        }
        (None, None) if encryption == Encryption::None => Some(None),
        (user, password) => {
            if user.is_none() {
                violations.push(Violation::missing("user", "MAIL_USER"));
            }

            if password.is_none() {
                violations.push(Violation::new(
                    "password",
                    "not set (use --password or MAIL_PASS)",
                ));
            }

            None
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn has_entries(raw: &[String]) -> bool {
    raw.iter().any(|raw| !raw.trim().is_empty())
}

fn address(field: &'static str, raw: &str, violations: &mut Vec<Violation>) -> Option<EmailAddress> {
    EmailAddress::new(raw)
        .map_err(|err| violations.push(Violation::new(field, err.to_string())))
        .ok()
}

/// Parses a recipient list, skipping the empty segments a trailing or doubled
/// comma leaves behind
fn addresses(
    field: &'static str,
    raw: &[String],
    violations: &mut Vec<Violation>,
) -> Option<Vec<EmailAddress>> {
    let before = violations.len();

    let parsed: Vec<EmailAddress> = raw
        .iter()
        .filter(|raw| !raw.trim().is_empty())
        .filter_map(|raw| address(field, raw, violations))
        .collect();

    (violations.len() == before).then_some(parsed)
}
