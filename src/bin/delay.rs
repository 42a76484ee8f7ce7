//! Demo binary mirroring the `delay` scenario: sleep for a configurable
//! duration, printing when it starts and finishes, and exit early with
//! a distinct code if `Ctrl-C` cancels it first.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use coro_rt::error::Error;
use coro_rt::task::Fiber;

#[derive(Parser)]
#[command(about = "Sleep for a configurable duration under cooperative cancellation")]
struct Args {
    /// How long to sleep, in milliseconds.
    #[arg(default_value_t = 100)]
    millis: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    coro_rt::program::main(|argv, fiber: Fiber| async move {
        let args = Args::parse_from(argv);
        tracing::info!(millis = args.millis, "sleeping");
        match fiber.sleep(Duration::from_millis(args.millis)).await {
            Ok(()) => {
                tracing::info!("slept to completion");
                0
            }
            Err(Error::Cancelled(kind)) => {
                tracing::warn!(?kind, "sleep cancelled");
                130
            }
            Err(err) => {
                tracing::error!(%err, "unexpected error");
                1
            }
        }
    })
}
