//! Demo binary mirroring the `channel` scenario: a producer coroutine
//! sends a configurable number of messages through a bounded channel to
//! the main coroutine, which echoes each one back to stdout.

use std::process::ExitCode;

use clap::Parser;
use coro_rt::channel;
use coro_rt::task::{Fiber, Promise};

#[derive(Parser)]
#[command(about = "Echo messages produced on a background coroutine over a bounded channel")]
struct Args {
    /// How many messages to produce and echo.
    #[arg(long, default_value_t = 5)]
    count: u32,

    /// Channel capacity; 0 makes it a rendezvous channel.
    #[arg(long, default_value_t = 1)]
    capacity: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    coro_rt::program::main(|argv, fiber: Fiber| async move {
        let args = Args::parse_from(argv);
        let (tx, rx) = channel::channel::<u32>(args.capacity);

        let producer = Promise::spawn_on(fiber.handle(), move |fiber: Fiber| async move {
            for i in 0..args.count {
                if tx.send(i).await.is_err() {
                    break;
                }
                fiber.next_tick().await.ok();
            }
            tx.close();
        });

        let mut received = 0u32;
        loop {
            match rx.recv().await {
                Ok(value) => {
                    println!("echo: {value}");
                    received += 1;
                }
                Err(_) => break,
            }
        }
        let _ = producer.await;
        tracing::info!(received, "channel drained");
        0
    })
}
