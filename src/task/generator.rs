//! `Generator<T, Push = ()>`: the multi-value shape.
//!
//! Each `.resume(push)` hands `push` to whatever `yield_value` call the
//! body is currently parked on and waits for the next value the body
//! yields (or `None` once the body returns). Built from the same
//! single-slot rendezvous idiom as [`crate::receiver::Receiver`], used
//! twice over for the two directions data can flow.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::cancel::{CancelKind, Signal};
use crate::task::Fiber;

struct Shared<T, Push> {
    yielded: RefCell<Option<T>>,
    yield_waker: RefCell<Option<Waker>>,
    pushed: RefCell<Option<Push>>,
    push_waker: RefCell<Option<Waker>>,
    finished: Cell<bool>,
}

/// Handed to the generator body alongside its [`Fiber`]; the only way
/// to produce a value for the consumer.
pub struct Yielder<T, Push = ()> {
    shared: Rc<Shared<T, Push>>,
}

impl<T, Push> Yielder<T, Push> {
    pub fn yield_value(&self, value: T) -> YieldValue<'_, T, Push> {
        YieldValue {
            shared: &self.shared,
            value: Some(value),
        }
    }
}

pub struct YieldValue<'a, T, Push> {
    shared: &'a Rc<Shared<T, Push>>,
    value: Option<T>,
}

impl<'a, T, Push> Future for YieldValue<'a, T, Push> {
    type Output = Push;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Push> {
        let this = self.get_mut();
        if let Some(value) = this.value.take() {
            *this.shared.yielded.borrow_mut() = Some(value);
            if let Some(waker) = this.shared.yield_waker.borrow_mut().take() {
                waker.wake();
            }
        }
        if let Some(push) = this.shared.pushed.borrow_mut().take() {
            return Poll::Ready(push);
        }
        *this.shared.push_waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

type Body<T, Push> = Box<dyn FnOnce(Fiber, Yielder<T, Push>) -> Pin<Box<dyn Future<Output = ()>>>>;

pub struct Generator<T, Push = ()> {
    shared: Rc<Shared<T, Push>>,
    ctor: RefCell<Option<Body<T, Push>>>,
    cancel_signal: RefCell<Option<Signal>>,
    started: Cell<bool>,
}

impl<T: 'static, Push: 'static> Generator<T, Push> {
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Fiber, Yielder<T, Push>) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        Generator {
            shared: Rc::new(Shared {
                yielded: RefCell::new(None),
                yield_waker: RefCell::new(None),
                pushed: RefCell::new(None),
                push_waker: RefCell::new(None),
                finished: Cell::new(false),
            }),
            ctor: RefCell::new(Some(Box::new(move |fiber, yielder| {
                Box::pin(body(fiber, yielder)) as Pin<Box<dyn Future<Output = ()>>>
            }))),
            cancel_signal: RefCell::new(None),
            started: Cell::new(false),
        }
    }

    fn ensure_started(&self) {
        if self.started.get() {
            return;
        }
        self.started.set(true);
        let Some(ctor) = self.ctor.borrow_mut().take() else {
            return;
        };
        let Ok(handle) = crate::context::current_executor() else {
            return;
        };
        let (signal, fiber) = Fiber::root(handle.clone());
        *self.cancel_signal.borrow_mut() = Some(signal);
        let yielder = Yielder {
            shared: self.shared.clone(),
        };
        let shared_for_driver = self.shared.clone();
        let body_future = ctor(fiber, yielder);
        let driver = async move {
            body_future.await;
            shared_for_driver.finished.set(true);
            if let Some(waker) = shared_for_driver.yield_waker.borrow_mut().take() {
                waker.wake();
            }
        };
        handle.spawn(Box::pin(driver));
    }

    /// Resume the generator, delivering `push` to whatever
    /// `yield_value` it is parked on (ignored before the first value has
    /// been produced), and wait for its next yielded value.
    pub fn resume(&self, push: Push) -> Resume<'_, T, Push> {
        Resume {
            generator: self,
            push: Some(push),
        }
    }

    pub fn cancel(&self, kind: CancelKind) {
        if let Some(signal) = self.cancel_signal.borrow().as_ref() {
            signal.emit(kind);
        }
    }
}

impl<T: 'static> Generator<T, ()> {
    pub fn next(&self) -> Resume<'_, T, ()> {
        self.resume(())
    }
}

pub struct Resume<'a, T, Push> {
    generator: &'a Generator<T, Push>,
    push: Option<Push>,
}

impl<'a, T: 'static, Push: 'static> Future for Resume<'a, T, Push> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        this.generator.ensure_started();
        let shared = &this.generator.shared;
        if let Some(push) = this.push.take() {
            *shared.pushed.borrow_mut() = Some(push);
            if let Some(waker) = shared.push_waker.borrow_mut().take() {
                waker.wake();
            }
        }
        if let Some(value) = shared.yielded.borrow_mut().take() {
            return Poll::Ready(Some(value));
        }
        if shared.finished.get() {
            return Poll::Ready(None);
        }
        *shared.yield_waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T, Push> Drop for Generator<T, Push> {
    fn drop(&mut self) {
        if self.started.get() && !self.shared.finished.get() {
            if let Some(signal) = self.cancel_signal.borrow().as_ref() {
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
    fn generator_yields_values_in_order() {
        let executor = Executor::new();
        let values = executor.block_on(async {
            let gen = Generator::new(|_fiber, yielder| async move {
                yielder.yield_value(1).await;
                yielder.yield_value(2).await;
            });
            let mut out = Vec::new();
            while let Some(v) = gen.next().await {
                out.push(v);
            }
            out
        });
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn push_values_are_delivered_to_the_body() {
        let executor = Executor::new();
        let doubled = executor.block_on(async {
            let gen = Generator::new(|_fiber, yielder: Yielder<i32, i32>| async move {
                let first = yielder.yield_value(0).await;
                yielder.yield_value(first * 2).await;
            });
            let _ = gen.resume(0).await;
            gen.resume(21).await
        });
        assert_eq!(doubled, Some(42));
    }
}
