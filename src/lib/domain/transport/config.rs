//! Transport configuration

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

use super::Password;

/// How the connection to the server is secured
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encryption {
    /// Plain text for the whole session
    None,

    /// TLS from the first byte (SMTPS)
    ImplicitTls,

    /// Plain text connection upgraded with `STARTTLS`
    #[default]
    StartTls,
}

/// The encryption mode string is not recognised
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown encryption mode \"{0}\" (expected none, ssl or tls)")]
pub struct UnknownEncryption(pub String);

impl Encryption {
    /// The conventional port for this mode
    pub fn default_port(self) -> u16 {
        match self {
            Encryption::None => 25,
            Encryption::ImplicitTls => 465,
            Encryption::StartTls => 587,
        }
    }
}

impl FromStr for Encryption {
    type Err = UnknownEncryption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Encryption::None),
            "ssl" | "smtps" | "implicit" | "tls-wrapper" => Ok(Encryption::ImplicitTls),
            "tls" | "starttls" => Ok(Encryption::StartTls),
            _ => Err(UnknownEncryption(s.to_string())),
        }
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encryption::None => write!(f, "none"),
            Encryption::ImplicitTls => write!(f, "ssl (implicit TLS)"),
            Encryption::StartTls => write!(f, "tls (STARTTLS)"),
        }
    }
}

/// Where trusted root certificates come from
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CaBundle {
    /// The Mozilla root store compiled into the binary
    #[default]
    Bundled,

    /// A PEM bundle on disk, replacing the bundled roots
    File(PathBuf),
}

impl fmt::Display for CaBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaBundle::Bundled => write!(f, "bundled Mozilla roots"),
            CaBundle::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// SMTP login
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    /// The username
    pub username: String,

    /// The password
    pub password: Password,
}

/// Everything needed to reach and log in to the SMTP server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// The SMTP host
    pub host: String,

    /// The SMTP port
    pub port: u16,

    /// The encryption mode
    pub encryption: Encryption,

    /// Login, if the server requires one
    pub credentials: Option<Credentials>,

    /// Trusted roots for certificate verification
    pub ca_bundle: CaBundle,

    /// Skip certificate verification entirely
    pub accept_invalid_certs: bool,

    /// Read/write timeout for the connection
    pub timeout: Duration,
}

impl TransportConfig {
    /// Default connection timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// `host:port`, for messages
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn test_encryption_aliases() -> TestResult {
        assert_eq!("none".parse::<Encryption>()?, Encryption::None);
        assert_eq!("SSL".parse::<Encryption>()?, Encryption::ImplicitTls);
        assert_eq!("smtps".parse::<Encryption>()?, Encryption::ImplicitTls);
        assert_eq!("tls".parse::<Encryption>()?, Encryption::StartTls);
        assert_eq!(" StartTLS ".parse::<Encryption>()?, Encryption::StartTls);

        Ok(())
    }

    #[test]
    fn test_unknown_encryption() {
        assert_eq!(
            "rot13".parse::<Encryption>(),
            Err(UnknownEncryption("rot13".to_string()))
        );
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(Encryption::None.default_port(), 25);
        assert_eq!(Encryption::ImplicitTls.default_port(), 465);
        assert_eq!(Encryption::StartTls.default_port(), 587);
    }

    #[test]
    fn test_credentials_debug_hides_password() -> TestResult {
        let credentials = Credentials {
            username: "user".to_string(),
            password: Password::new("secret")?,
        };

        assert!(!format!("{:?}", credentials).contains("secret"));

        Ok(())
    }
}
