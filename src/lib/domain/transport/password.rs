//! Password

use std::fmt;

use thiserror::Error;

/// Password error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    /// Password is empty
    #[error("password is empty")]
    Empty,
}

/// An SMTP password that never shows up in logs or previews
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Create a new password
    pub fn new(raw: &str) -> Result<Self, PasswordError> {
        if raw.is_empty() {
            return Err(PasswordError::Empty);
        }

        Ok(Self(raw.to_string()))
    }

    /// The password in clear, for handing to the SMTP client
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}
