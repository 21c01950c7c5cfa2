//! Email Address

use lazy_static::lazy_static;
use lettre::Address;
use regex::Regex;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]*?@[^@\s]*?\.[^@\s]*$").unwrap();
}

use std::{fmt, str::FromStr};

use thiserror::Error;

use EmailAddressError::*;

/// An error that can occur when creating an email address
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmailAddressError {
    /// The email address is empty
    #[error("email is empty")]
    EmptyEmailAddress,

    /// The email address is invalid
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmailAddress(String),
}

/// A syntactically plausible email address, usable as an SMTP envelope address
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmailAddress(Address);

impl EmailAddress {
    /// Create a new email address
    pub fn new(raw: &str) -> Result<Self, EmailAddressError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(EmptyEmailAddress);
        }

        if !EMAIL_REGEX.is_match(trimmed) {
            return Err(InvalidEmailAddress(trimmed.to_string()));
        }

        let address = Address::from_str(trimmed)
            .map_err(|_| InvalidEmailAddress(trimmed.to_string()))?;

        Ok(Self(address))
    }

    /// The underlying envelope address
    pub fn address(&self) -> &Address {
        &self.0
    }

    /// Whether the address needs SMTPUTF8 to be transmitted
    pub fn is_ascii(&self) -> bool {
        AsRef::<str>::as_ref(&self.0).is_ascii()
    }
}

impl FromStr for EmailAddress {
    type Err = EmailAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0.to_string()
    }
}

impl From<EmailAddress> for Address {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn test_email_address_display() -> TestResult {
        let email = EmailAddress::new("email@example.com")?;

        assert_eq!(format!("{}", email), "email@example.com".to_string());

        Ok(())
    }

    #[test]
    fn test_email_address_is_trimmed() -> TestResult {
        let email = EmailAddress::new("  email@example.com ")?;

        assert_eq!(String::from(email), "email@example.com".to_string());

        Ok(())
    }

    #[test]
    fn test_empty_email_address_is_invalid() {
        let result = EmailAddress::new("   ");
        assert!(matches!(result, Err(EmptyEmailAddress)));
    }

    #[test]
    fn test_email_address_without_at_symbol_is_invalid() {
        let result = EmailAddress::new("email");
        assert!(matches!(result, Err(InvalidEmailAddress(raw)) if raw == "email"));
    }

    #[test]
    fn test_email_address_without_domain_dot_is_invalid() {
        assert!(EmailAddress::new("email@localhost").is_err());
    }

    #[test]
    fn test_email_address_with_two_at_symbols_is_invalid() {
        assert!(EmailAddress::new("a@b@example.com").is_err());
    }

    #[test]
    fn test_ascii_detection() -> TestResult {
        assert!(EmailAddress::new("email@example.com")?.is_ascii());
        assert!(!EmailAddress::new("åke@example.com")?.is_ascii());

        Ok(())
    }
}
