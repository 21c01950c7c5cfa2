//! Domain types and rules

pub mod mail;
pub mod transport;
