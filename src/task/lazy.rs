//! `Task<T>`: the lazy shape.
//!
//! Nothing runs until the task is first polled (i.e. first `.await`ed),
//! and dropping it before completion cancels the underlying coroutine
//! rather than detaching it — the opposite of [`crate::task::Promise`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cancel::{CancelKind, Signal};
use crate::error::Result;
use crate::executor;
use crate::receiver::{self, Receiver};
use crate::task::Fiber;

type Body<T> = Box<dyn FnOnce(Fiber) -> Pin<Box<dyn Future<Output = T>>>>;

enum State<T> {
    Pending(Body<T>),
    Started { receiver: Receiver<T>, signal: Signal },
    Taken,
}

pub struct Task<T> {
    state: State<T>,
}

impl<T: 'static> Task<T> {
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Fiber) -> Fut + 'static,
        Fut: Future<Output = T> + 'static,
    {
        Task {
            state: State::Pending(Box::new(move |fiber| Box::pin(body(fiber)))),
        }
    }

    fn start(&mut self, handle: &executor::Handle) {
        let State::Pending(body) = std::mem::replace(&mut self.state, State::Taken) else {
            unreachable!("start called twice")
        };
        let (signal, fiber) = Fiber::root(handle.clone());
        let (producer, receiver) = receiver::channel();
        let inner = body(fiber);
        let driver = async move {
            let value = inner.await;
            producer.finish(Ok(value));
        };
        handle.spawn(Box::pin(driver));
        self.state = State::Started { receiver, signal };
    }

    /// Cancel the task. A no-op if it has never been started (there is
    /// nothing to cancel yet) or has already finished.
    pub fn cancel(&self, kind: CancelKind) {
        if let State::Started { signal, .. } = &self.state {
            signal.emit(kind);
        }
    }

    pub fn ready(&self) -> bool {
        matches!(&self.state, State::Started { receiver, .. } if receiver.is_ready())
    }
}

impl<T: 'static> Future for Task<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if matches!(this.state, State::Pending(_)) {
            let handle = match crate::context::current_executor() {
                Ok(handle) => handle,
                Err(err) => return Poll::Ready(Err(err)),
            };
            this.start(&handle);
        }
        match &this.state {
            State::Started { receiver, .. } => receiver.poll_attach(cx),
            State::Pending(_) => unreachable!("just started"),
            State::Taken => panic!("Task polled after completion"),
        }
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if let State::Started { receiver, signal } = &self.state {
            if !receiver.is_ready() {
                signal.emit(CancelKind::TOTAL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;

    #[test]
    fn task_does_not_run_until_awaited() {
        let executor = Executor::new();
        let ran = std::rc::Rc::new(std::cell::Cell::new(false));
        let ran2 = ran.clone();
        executor.block_on(async move {
            let task = Task::new(move |_fiber| {
                let ran3 = ran2.clone();
                async move {
                    ran3.set(true);
                }
            });
            assert!(!ran.get());
            drop(task);
        });
        executor.handle().run_until_idle();
        assert!(!ran.get(), "a lazy task that is never awaited must never run");
    }

    #[test]
    fn task_runs_and_resolves_when_awaited() {
        let executor = Executor::new();
        let value = executor.block_on(async {
            Task::new(|_fiber| async { 7 }).await.unwrap()
        });
        assert_eq!(value, 7);
    }
}
