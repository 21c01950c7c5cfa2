//! Adapters for the outside world: the command line, the environment and
//! the SMTP server

pub mod config;
pub mod smtp;
