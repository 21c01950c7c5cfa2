#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Compose one email and send it through an SMTP server

pub mod app;
pub mod domain;
pub mod infrastructure;
