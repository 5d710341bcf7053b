//! AMI cleaner CLI entry point.
//!
//! This binary is the composition root for the workspace. Responsibilities:
//!
//! 1. **Parse configuration**: read flags (with environment fallbacks) and
//!    turn them into an [`amiclean::CleanupPolicy`]. Invalid combinations are
//!    rejected before any AWS call.
//! 2. **Wire observability**: configure `tracing-subscriber` with a JSON or
//!    pretty layer and, when an OTLP endpoint is configured, an OpenTelemetry
//!    exporter.
//! 3. **Construct infrastructure**: load the AWS config chain and build the
//!    [`ec2::Ec2ImageService`].
//! 4. **Run**: drive one [`cleaner::AmiCleaner::run`] pass and print the
//!    report on stdout.
//!
//! Exit status is non-zero when the run fails; every selected image processed
//! before the failure has already been purged.

mod observability;
mod options;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use amiclean::{CleanupRunId, Timestamp};
use cleaner::AmiCleaner;
use ec2::Ec2ImageService;

use crate::options::{Options, OutputFormat};

#[tokio::main]
async fn main() -> ExitCode {
    let options = Options::parse();

    let telemetry = match observability::init(options.log_format) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("ami-cleaner: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(options).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "ami cleanup failed");
    }
    telemetry.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn run(options: Options) -> anyhow::Result<()> {
    let policy = options
        .policy(Timestamp::now())
        .context("invalid cleanup options")?;

    let config = ec2::load_sdk_config(options.region.clone(), options.profile.clone()).await;
    let service = Ec2ImageService::from_conf(&config);
    let region = service.region().cloned();

    let cleaner = AmiCleaner::new(policy, options.delete(), service)?;
    info!(
        region = ?region,
        profile = options.profile.as_deref().unwrap_or("default"),
        dry_run = cleaner.is_dry_run(),
        expiration = %cleaner.policy().expiration,
        prefix = %cleaner.policy().name_prefix,
        unused_only = cleaner.policy().unused_only,
        "connected to EC2"
    );
    let report = cleaner.run(CleanupRunId::new_random()).await?;

    match options.output {
        OutputFormat::Text => println!("{report}"),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to render report")?
        ),
    }
    Ok(())
}
