//! `Detached`: fire-and-forget.
//!
//! Only a weak cancellation handle is returned — the [`cancel::Signal`]
//! — so a caller can still ask it to stop, but nothing awaits its
//! result and an abnormal outcome has no owner to report to, which is
//! exactly what [`crate::error::Error::Detached`] names. It's logged
//! instead of dropped silently, since nothing observes it otherwise.

use std::future::Future;

use crate::cancel;
use crate::error::Result;
use crate::executor;
use crate::task::Fiber;

pub struct Detached;

impl Detached {
    /// Spawn `body` on the current executor with no result-observing
    /// owner, returning a [`cancel::Signal`] that can still cancel it. A
    /// cancelled outcome is expected and logged at `debug`; anything
    /// else is logged at `error` under [`crate::error::Error::Detached`].
    pub fn spawn<F, Fut>(body: F) -> Result<cancel::Signal>
    where
        F: FnOnce(Fiber) -> Fut,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let handle = crate::context::current_executor()?;
        Ok(Self::spawn_on(&handle, body))
    }

    pub(crate) fn spawn_on<F, Fut>(handle: &executor::Handle, body: F) -> cancel::Signal
    where
        F: FnOnce(Fiber) -> Fut,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let (signal, fiber) = Fiber::root(handle.clone());
        let inner = body(fiber);
        handle.spawn(Box::pin(async move {
            match inner.await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {
                    tracing::debug!(%err, "detached coroutine was cancelled");
                }
                Err(err) => {
                    tracing::error!(%err, "detached coroutine terminated abnormally");
                }
            }
        }));
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelKind;
    use crate::executor::Executor;

    #[test]
    fn detached_runs_without_a_handle() {
        let executor = Executor::new();
        let ran = std::rc::Rc::new(std::cell::Cell::new(false));
        let ran2 = ran.clone();
        executor.block_on(async move {
            let signal = Detached::spawn(move |_fiber| {
                let ran3 = ran2.clone();
                async move {
                    ran3.set(true);
                    Ok(())
                }
            })
            .unwrap();
            drop(signal);
        });
        executor.handle().run_until_idle();
        assert!(ran.get());
    }

    #[test]
    fn the_returned_signal_can_cancel_the_detached_coroutine() {
        let executor = Executor::new();
        let seen = std::rc::Rc::new(std::cell::Cell::new(CancelKind::empty()));
        let seen2 = seen.clone();
        let signal = executor.block_on(async move {
            Detached::spawn(move |fiber| {
                let seen3 = seen2.clone();
                async move {
                    fiber.next_tick().await.ok();
                    seen3.set(fiber.cancel_slot().state());
                    Ok(())
                }
            })
            .unwrap()
        });
        signal.emit(CancelKind::TOTAL);
        executor.handle().run_until_idle();
        assert_eq!(seen.get(), CancelKind::TOTAL);
    }
}
