#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Send one email through an SMTP server

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use smtp_send::{
    app::{self, Outcome, EXIT_CONFIG},
    infrastructure::{
        config::{resolve, Args},
        smtp::LettreConnector,
    },
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[mutants::skip]
fn main() -> ExitCode {
    if let Err(e) = load_environment() {
        eprintln!("{e:#}");

        return ExitCode::from(EXIT_CONFIG);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            let _ = e.print();

            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();

            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let result = resolve(&args)
        .map_err(app::AppError::from)
        .and_then(|settings| app::run(settings, LettreConnector::new));

    match result {
        Ok(Outcome::DryRun(preview)) => {
            print!("{preview}");

            ExitCode::SUCCESS
        }
        Ok(Outcome::Sent { report, subject }) => {
            let recipients = report
                .accepted
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");

            info!(%recipients, reply = %report.reply, "delivery complete");
            println!("Sent \"{subject}\" to {recipients}");

            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(exit_code = e.exit_code(), "{e}");
            eprintln!("{e}");

            ExitCode::from(&e)
        }
    }
}

/// Loads `.env` from the working directory, if there is one
fn load_environment() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).context("Failed to load environment"),
    }
}
