//! Message build errors

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while composing a message
#[derive(Debug, Error)]
pub enum BuildError {
    /// Neither a plain text nor an HTML body was given
    #[error("the message has neither a text nor an HTML body")]
    EmptyBody,

    /// The message has nobody to deliver to
    #[error("the message has no recipients")]
    NoRecipients,

    /// An attachment path does not point at a regular file
    #[error("attachment not found: {}", .0.display())]
    AttachmentNotFound(PathBuf),

    /// An attachment exists but could not be read
    #[error("attachment {} could not be read: {source}", .path.display())]
    AttachmentUnreadable {
        /// The offending path
        path: PathBuf,

        /// The underlying I/O error
        source: io::Error,
    },

    /// lettre refused to assemble the message
    #[error("the message could not be assembled: {0}")]
    Assembly(String),
}

impl From<lettre::error::Error> for BuildError {
    fn from(err: lettre::error::Error) -> Self {
        BuildError::Assembly(err.to_string())
    }
}
