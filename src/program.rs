//! Program-entry glue: install OS signal handling, run the user's
//! top-level coroutine to completion, map its result onto a process
//! exit code.
//!
//! `SIGINT` maps to [`CancelKind::TOTAL`] (stop now), `SIGTERM` to
//! [`CancelKind::TERMINAL`] (stop promptly but let in-flight cleanup
//! run), wired through `signal-hook` rather than a hand-rolled signal
//! handler.

use std::future::Future;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cancel::CancelKind;
use crate::executor::Executor;
use crate::task::Fiber;

/// Run `body` to completion on a fresh executor, forwarding `SIGINT`/
/// `SIGTERM` into its root cancellation slot, and translate its `i32`
/// result into an [`ExitCode`].
pub fn main<F, Fut>(body: F) -> ExitCode
where
    F: FnOnce(Vec<String>, Fiber) -> Fut,
    Fut: Future<Output = i32> + 'static,
{
    let executor = Executor::new();
    let handle = executor.handle();
    let (cancel_signal, fiber) = Fiber::root(handle.clone());

    let sigint = Arc::new(AtomicBool::new(false));
    let sigterm = Arc::new(AtomicBool::new(false));
    if let Err(err) = signal_hook::flag::register(signal_hook::consts::SIGINT, sigint.clone()) {
        tracing::warn!(%err, "failed to install SIGINT handler");
    }
    if let Err(err) = signal_hook::flag::register(signal_hook::consts::SIGTERM, sigterm.clone()) {
        tracing::warn!(%err, "failed to install SIGTERM handler");
    }

    let watcher_signal = cancel_signal.clone();
    let watcher_fiber = fiber.clone();
    handle.spawn(Box::pin(async move {
        loop {
            if sigterm.load(Ordering::Relaxed) {
                tracing::info!("SIGTERM received, cancelling");
                watcher_signal.emit(CancelKind::TERMINAL);
                break;
            }
            if sigint.load(Ordering::Relaxed) {
                tracing::info!("SIGINT received, cancelling");
                watcher_signal.emit(CancelKind::TOTAL);
                break;
            }
            if watcher_fiber.cancel_slot().is_cancelled() {
                break;
            }
            watcher_fiber.next_tick().await.ok();
        }
    }));

    let args: Vec<String> = std::env::args().collect();
    let code = executor.block_on(body(args, fiber));
    ExitCode::from(code.clamp(0, 255) as u8)
}
