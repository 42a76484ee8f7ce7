//! `Promise<T>`: the eager, detachable shape.
//!
//! Starts running the moment it's constructed, registered with the
//! executor as its own top-level coroutine. Dropping the handle before
//! it resolves does not cancel the underlying coroutine — it keeps
//! running on the executor, which already owns it independently through
//! the `Rc`-shared task map. That "detachable" half of the name falls
//! out of the ownership split for free; call [`Promise::cancel`]
//! explicitly to actually stop it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cancel::{CancelKind, Signal};
use crate::error::Result;
use crate::executor;
use crate::receiver::{self, Receiver};
use crate::task::Fiber;

pub struct Promise<T> {
    receiver: Receiver<T>,
    cancel_signal: Signal,
}

impl<T: 'static> Promise<T> {
    /// Spawn `body` on the currently-installed executor right away.
    pub fn spawn<F, Fut>(body: F) -> Result<Self>
    where
        F: FnOnce(Fiber) -> Fut,
        Fut: Future<Output = T> + 'static,
    {
        let handle = crate::context::current_executor()?;
        Ok(Self::spawn_on(&handle, body))
    }

    pub(crate) fn spawn_on<F, Fut>(handle: &executor::Handle, body: F) -> Self
    where
        F: FnOnce(Fiber) -> Fut,
        Fut: Future<Output = T> + 'static,
    {
        let (cancel_signal, fiber) = Fiber::root(handle.clone());
        let (producer, receiver) = receiver::channel();
        let inner = body(fiber);
        let driver = async move {
            let value = inner.await;
            producer.finish(Ok(value));
        };
        handle.spawn(Box::pin(driver));
        Promise {
            receiver,
            cancel_signal,
        }
    }

    pub fn ready(&self) -> bool {
        self.receiver.is_ready()
    }

    /// Non-suspending read; see [`crate::error::Error::WaitNotReady`].
    pub fn get(&self) -> Result<T> {
        self.receiver.get()
    }

    pub fn cancel(&self, kind: CancelKind) {
        self.cancel_signal.emit(kind);
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver.poll_attach(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;

    #[test]
    fn promise_runs_eagerly_and_resolves() {
        let executor = Executor::new();
        let value = executor.block_on(async {
            let promise = Promise::spawn(|_fiber| async { 41 + 1 }).unwrap();
            promise.await.unwrap()
        });
        assert_eq!(value, 42);
    }

    #[test]
    fn promise_progresses_even_if_never_awaited() {
        let executor = Executor::new();
        let done = std::rc::Rc::new(std::cell::Cell::new(false));
        let done2 = done.clone();
        executor.block_on(async move {
            let promise = Promise::spawn(move |_fiber| async move {
                done2.set(true);
            })
            .unwrap();
            drop(promise);
        });
        executor.handle().run_until_idle();
        assert!(done.get());
    }

    #[test]
    fn cancel_emits_into_the_fibers_slot() {
        let executor = Executor::new();
        let seen = std::rc::Rc::new(std::cell::Cell::new(CancelKind::empty()));
        let seen2 = seen.clone();
        executor.block_on(async move {
            let promise = Promise::spawn(move |fiber| {
                let seen3 = seen2.clone();
                async move {
                    fiber.next_tick().await.ok();
                    seen3.set(fiber.cancel_slot().state());
                }
            })
            .unwrap();
            promise.cancel(CancelKind::TOTAL);
        });
        executor.handle().run_until_idle();
        assert_eq!(seen.get(), CancelKind::TOTAL);
    }
}
