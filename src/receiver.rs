//! The rendezvous object between a producing coroutine and its awaiter.
//!
//! Rust's ownership model gives move-invalidation for free, so "is this
//! receiver still owned by its originating promise" is answered by the
//! type system rather than a tracked back-pointer.

use std::cell::RefCell;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::{Error, Result};

enum Slot<T> {
    Pending,
    Done(Result<T>),
    Taken,
}

struct State<T> {
    slot: Slot<T>,
    awaited_from: Option<Waker>,
}

/// The producer-side handle: held by the machinery driving the
/// coroutine to completion.
pub struct Producer<T> {
    inner: Rc<RefCell<State<T>>>,
}

/// The consumer-side handle: held by whoever may `.await` the coroutine.
pub struct Receiver<T> {
    inner: Rc<RefCell<State<T>>>,
}

pub fn channel<T>() -> (Producer<T>, Receiver<T>) {
    let inner = Rc::new(RefCell::new(State {
        slot: Slot::Pending,
        awaited_from: None,
    }));
    (
        Producer {
            inner: inner.clone(),
        },
        Receiver { inner },
    )
}

impl<T> Producer<T> {
    /// Store the final result and wake whoever is attached. Must be
    /// called at most once: the slot flips from pending to done exactly
    /// once.
    pub fn finish(&self, result: Result<T>) {
        let mut state = self.inner.borrow_mut();
        debug_assert!(
            matches!(state.slot, Slot::Pending),
            "a Receiver's producer finished twice"
        );
        state.slot = Slot::Done(result);
        if let Some(waker) = state.awaited_from.take() {
            waker.wake();
        }
    }

    pub fn is_done(&self) -> bool {
        !matches!(self.inner.borrow().slot, Slot::Pending)
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Receiver {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Receiver<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self.inner.borrow().slot, Slot::Done(_))
    }

    /// Non-suspending read. Errors with [`Error::WaitNotReady`] before
    /// completion.
    pub fn get(&self) -> Result<T> {
        let mut state = self.inner.borrow_mut();
        match std::mem::replace(&mut state.slot, Slot::Taken) {
            Slot::Pending => {
                state.slot = Slot::Pending;
                Err(Error::WaitNotReady)
            }
            Slot::Done(result) => result,
            Slot::Taken => Err(Error::AlreadyAwaited),
        }
    }

    /// Attach as the single awaiter: ready iff already done, otherwise
    /// park `waker`; a second attach before resolution fails outright
    /// rather than silently queuing.
    pub fn poll_attach(&self, cx: &Context<'_>) -> Poll<Result<T>> {
        let mut state = self.inner.borrow_mut();
        match &state.slot {
            Slot::Pending => {
                if state
                    .awaited_from
                    .as_ref()
                    .is_some_and(|w| !w.will_wake(cx.waker()))
                {
                    return Poll::Ready(Err(Error::AlreadyAwaited));
                }
                state.awaited_from = Some(cx.waker().clone());
                Poll::Pending
            }
            Slot::Done(_) => {
                let Slot::Done(result) = std::mem::replace(&mut state.slot, Slot::Taken) else {
                    unreachable!()
                };
                Poll::Ready(result)
            }
            Slot::Taken => Poll::Ready(Err(Error::AlreadyAwaited)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::poll_fn;

    #[test]
    fn finish_before_attach_resolves_immediately() {
        let (producer, receiver) = channel::<u32>();
        producer.finish(Ok(42));
        assert!(receiver.is_ready());
        assert_eq!(receiver.get().unwrap(), 42);
    }

    #[test]
    fn get_before_done_is_wait_not_ready() {
        let (_producer, receiver) = channel::<u32>();
        assert!(matches!(receiver.get(), Err(Error::WaitNotReady)));
    }

    #[test]
    fn double_attach_fails() {
        let waker = futures_test_waker();
        let (producer, receiver) = channel::<u32>();
        let mut cx = Context::from_waker(&waker);
        assert_eq!(receiver.poll_attach(&cx), Poll::Pending);

        let other_waker = futures_test_waker();
        let mut other_cx = Context::from_waker(&other_waker);
        assert!(matches!(
            receiver.poll_attach(&other_cx),
            Poll::Ready(Err(Error::AlreadyAwaited))
        ));
        producer.finish(Ok(1));
        let _ = poll_fn(|_| Poll::<()>::Pending);
        let _ = &mut cx;
    }

    fn futures_test_waker() -> Waker {
        use std::task::{RawWaker, RawWakerVTable};
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        unsafe fn noop(_: *const ()) {}
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
    }
}
