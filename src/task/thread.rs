//! `ThreadTask<T>`: the OS-thread-backed shape.
//!
//! Spins up a private [`crate::executor::Executor`] on a fresh OS
//! thread, joins back through a cross-thread channel, and forwards a
//! cross-thread cancellation flag into that private executor's root
//! fiber with the same watcher-loop idiom [`crate::program::main`] uses
//! for `SIGINT`/`SIGTERM`: a spawned task that polls the flag each tick
//! and emits into the fiber's own cancellation slot once it sees
//! anything set. A `ThreadTask` body is therefore an ordinary coroutine
//! — it can `.await`, spawn children, and use everything else a `Fiber`
//! offers — that happens to run on a thread of its own rather than
//! sharing the caller's executor. `parking_lot` carries the one piece
//! of state actually shared across the thread boundary (the
//! cancellation flag); our `Rc`-based [`crate::cancel`] pair is
//! thread-affine by design and cannot cross here.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use std::sync::Arc;

use crate::cancel::CancelKind;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::task::Fiber;

/// Handed to a `ThreadTask` body alongside its private [`Fiber`]; lets
/// the body check cross-thread cancellation directly without going
/// through `fiber.cancel_slot()` if it would rather poll than await.
#[derive(Clone)]
pub struct ThreadCancelToken {
    flag: Arc<Mutex<CancelKind>>,
}

impl ThreadCancelToken {
    pub fn state(&self) -> CancelKind {
        *self.flag.lock()
    }

    pub fn is_cancelled(&self) -> bool {
        !self.state().is_empty()
    }
}

pub struct ThreadTask<T> {
    receiver: oneshot::Receiver<T>,
    flag: Arc<Mutex<CancelKind>>,
    join: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> ThreadTask<T> {
    /// Run `body` to completion on a fresh OS thread under its own
    /// private executor. `body` receives a [`ThreadCancelToken`] and a
    /// [`Fiber`] rooted on that private executor, and can use either to
    /// observe cancellation requested through [`ThreadTask::cancel`].
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(ThreadCancelToken, Fiber) -> Fut + Send + 'static,
        Fut: Future<Output = T> + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let flag = Arc::new(Mutex::new(CancelKind::empty()));
        let token = ThreadCancelToken { flag: flag.clone() };
        let join = std::thread::spawn(move || {
            let executor = Executor::new();
            let handle = executor.handle();
            let (signal, fiber) = Fiber::root(handle.clone());

            let watcher_flag = flag.clone();
            let watcher_fiber = fiber.clone();
            handle.spawn(Box::pin(async move {
                loop {
                    let pending = *watcher_flag.lock();
                    if !pending.is_empty() {
                        signal.emit(pending);
                        break;
                    }
                    if watcher_fiber.cancel_slot().is_cancelled() {
                        break;
                    }
                    watcher_fiber.next_tick().await.ok();
                }
            }));

            let value = executor.block_on(body(token, fiber));
            let _ = sender.send(value);
        });
        ThreadTask {
            receiver,
            flag,
            join: Some(join),
        }
    }

    pub fn cancel(&self, kind: CancelKind) {
        *self.flag.lock() |= kind;
    }
}

impl<T> Future for ThreadTask<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(value)) => {
                if let Some(join) = this.join.take() {
                    let _ = join.join();
                }
                Poll::Ready(Ok(value))
            }
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Detached)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for ThreadTask<T> {
    fn drop(&mut self) {
        self.cancel(CancelKind::TOTAL);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;

    #[test]
    fn thread_task_joins_its_result() {
        let executor = Executor::new();
        let value =
            executor.block_on(async { ThreadTask::spawn(|_token, _fiber| async { 2 + 2 }).await.unwrap() });
        assert_eq!(value, 4);
    }

    #[test]
    fn the_body_can_await_on_its_own_private_fiber() {
        let executor = Executor::new();
        let value = executor.block_on(async {
            ThreadTask::spawn(|_token, fiber| async move {
                fiber.next_tick().await.ok();
                fiber.sleep(std::time::Duration::from_millis(1)).await.ok();
                7
            })
            .await
            .unwrap()
        });
        assert_eq!(value, 7);
    }

    #[test]
    fn cancellation_is_observable_from_the_thread() {
        let executor = Executor::new();
        let value = executor.block_on(async {
            let task = ThreadTask::spawn(|token, fiber| async move {
                loop {
                    if token.is_cancelled() {
                        break;
                    }
                    fiber.next_tick().await.ok();
                }
                token.state()
            });
            task.cancel(CancelKind::TOTAL);
            task.await
        });
        assert_eq!(value.unwrap(), CancelKind::TOTAL);
    }

    #[test]
    fn cancellation_is_also_observable_through_the_private_fiber() {
        let executor = Executor::new();
        let value = executor.block_on(async {
            let task = ThreadTask::spawn(|_token, fiber| async move {
                loop {
                    if fiber.cancel_slot().is_cancelled() {
                        break;
                    }
                    fiber.next_tick().await.ok();
                }
                fiber.cancel_slot().state()
            });
            task.cancel(CancelKind::PARTIAL);
            task.await
        });
        assert_eq!(value.unwrap(), CancelKind::PARTIAL);
    }
}
