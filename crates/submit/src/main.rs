//! `mixbuild-submit` -- hand five face photographs to the reconstruction
//! worker and wait for its result.
//!
//! Probes the images, stages them, launches the worker and prints the
//! result path once the worker reports completion. Ctrl-C cancels the
//! job; staged files are left in place.
//!
//! # Environment variables
//!
//! | Variable                    | Required | Default                   | Description                        |
//! |-----------------------------|----------|---------------------------|------------------------------------|
//! | `MIXBUILD_STAGING_DIR`      | no       | `$HOME/Pictures/MixBuild` | Directory shared with the worker   |
//! | `MIXBUILD_STATUS_FILE`      | no       | `status.json`             | Status record file name            |
//! | `MIXBUILD_WORKER_PATH`      | no       | `mixbuild-worker`         | Worker executable                  |
//! | `MIXBUILD_WORKER_ARGS`      | no       | --                        | Fixed worker arguments             |
//! | `MIXBUILD_JOB_TIMEOUT_SECS` | no       | --                        | Give up after this many seconds    |
//! | `RUST_LOG`                  | no       | `mixbuild_submit=info,mixbuild_handoff=info` | Log filter      |

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mixbuild_core::JobOutcome;
use mixbuild_handoff::{HandoffConfig, JobCoordinator};
use mixbuild_submit::{exit_code, SubmitArgs};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = SubmitArgs::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixbuild_submit=info,mixbuild_handoff=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = HandoffConfig::from_env().context("invalid handoff configuration")?;
    let input = args.build_input().context("cannot read input images")?;

    tracing::info!(
        staging_dir = %config.staging_dir.display(),
        worker = %config.worker_program.display(),
        "Starting mixbuild-submit",
    );

    let coordinator = JobCoordinator::new(&config);
    let ticket = match args.timeout() {
        Some(timeout) => coordinator.submit_with_timeout(input, timeout),
        None => coordinator.submit(input),
    }?;

    let interrupt = coordinator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let outcome = ticket.outcome().await;
    match &outcome {
        JobOutcome::Success { result_path } => println!("{}", result_path.display()),
        other => eprintln!("{other}"),
    }
    Ok(exit_code(&outcome))
}
