//! The asynchronous-operation contract and its two awaiter flavors.
//!
//! `Op` interprets a cancellation delivered while the operation is
//! pending as an error, the way most of this crate's call sites want;
//! `AsTuple` hands back the operation's raw output and leaves
//! cancellation entirely to the caller, for call sites that need to
//! observe a result regardless of what was concurrently cancelled.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::cancel::{CancelKind, Slot};
use crate::error::{Error, Result};
use crate::handler::{CompletionHandler, Shared};

/// Anything that can be initiated with a completion handler and, some
/// time later (possibly before `initiate` even returns), invoke it
/// exactly once.
pub trait AsyncOp {
    type Output;

    fn initiate(self, handler: CompletionHandler<Self::Output>);
}

enum State<O: AsyncOp> {
    NotStarted(O),
    Started(Rc<Shared<O::Output>>),
    Done,
}

/// The raw awaiter: resolves to `O::Output` with no cancellation
/// interpretation at all.
pub struct AsTuple<O: AsyncOp> {
    state: State<O>,
    cancel_slot: Slot,
}

impl<O: AsyncOp> AsTuple<O> {
    pub fn new(op: O, cancel_slot: Slot) -> Self {
        AsTuple {
            state: State::NotStarted(op),
            cancel_slot,
        }
    }
}

impl<O: AsyncOp + Unpin> Future for AsTuple<O>
where
    O::Output: Unpin,
{
    type Output = O::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, State::Done) {
                State::NotStarted(op) => {
                    let handle = crate::context::current_executor().expect("executor installed");
                    let source = crate::context::current_source();
                    let (handler, shared) =
                        CompletionHandler::new(handle, source, this.cancel_slot.clone());
                    op.initiate(handler);
                    shared.finish_initiating();
                    this.state = State::Started(shared);
                }
                State::Started(shared) => {
                    if shared.is_complete() {
                        let result = shared
                            .take_result()
                            .expect("Immediacy::Yes implies a stored result");
                        this.state = State::Done;
                        return Poll::Ready(result);
                    }
                    shared.park(cx.waker());
                    this.state = State::Started(shared);
                    return Poll::Pending;
                }
                State::Done => panic!("AsTuple polled after completion"),
            }
        }
    }
}

/// The error-interpreting awaiter: a cancellation observed on `slot`
/// while the operation is still pending resolves the future with
/// `Err(Error::Cancelled(_))` instead of waiting for the underlying
/// operation to ever notice.
pub struct Op<O: AsyncOp> {
    inner: AsTuple<O>,
    slot: Slot,
    cancelled: Option<CancelKind>,
}

impl<O: AsyncOp> Op<O> {
    pub fn new(op: O, slot: Slot) -> Self {
        Op {
            inner: AsTuple::new(op, slot.clone()),
            slot,
            cancelled: None,
        }
    }
}

impl<O: AsyncOp + Unpin> Future for Op<O>
where
    O::Output: Unpin,
{
    type Output = Result<O::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(kind) = this.cancelled {
            return Poll::Ready(Err(Error::Cancelled(kind)));
        }
        this.slot.park(cx.waker().clone());
        if this.slot.is_cancelled() {
            // A lone `INTERRUPT_AWAIT` cancels only this suspension, not
            // the owning promise: clear it rather than latch it, so a
            // fresh `Op` built over the same slot can run normally.
            if this.slot.is_interrupt_only() {
                this.slot.clear_interrupt();
                return Poll::Ready(Err(Error::Cancelled(CancelKind::INTERRUPT_AWAIT)));
            }
            let kind = this.slot.state();
            this.cancelled = Some(kind);
            return Poll::Ready(Err(Error::Cancelled(kind)));
        }
        Pin::new(&mut this.inner).poll(cx).map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel;
    use std::future::poll_fn;

    struct Immediate(u32);
    impl AsyncOp for Immediate {
        type Output = u32;
        fn initiate(self, handler: CompletionHandler<u32>) {
            handler.invoke(self.0);
        }
    }

    #[test]
    fn as_tuple_resolves_synchronous_op_on_first_poll() {
        let executor = crate::executor::Executor::new();
        let (_signal, slot) = cancel::pair();
        let value = executor.block_on(AsTuple::new(Immediate(5), slot));
        assert_eq!(value, 5);
    }

    #[test]
    fn op_reports_cancellation_while_pending() {
        struct NeverCompletes;
        impl AsyncOp for NeverCompletes {
            type Output = ();
            fn initiate(self, _handler: CompletionHandler<()>) {}
        }

        let executor = crate::executor::Executor::new();
        let (signal, slot) = cancel::pair();
        let result = executor.block_on(async move {
            let op = Op::new(NeverCompletes, slot);
            futures_lite_poll_once_then_cancel(op, &signal).await
        });
        assert!(matches!(result, Err(Error::Cancelled(_))));
    }

    #[test]
    fn interrupt_await_alone_resolves_but_leaves_the_slot_reawaitable() {
        let executor = crate::executor::Executor::new();
        let (signal, slot) = cancel::pair();
        signal.emit(CancelKind::INTERRUPT_AWAIT);

        let first = executor.block_on(Op::new(Immediate(1), slot.clone()));
        assert!(matches!(
            first,
            Err(Error::Cancelled(CancelKind::INTERRUPT_AWAIT))
        ));
        assert!(!slot.is_cancelled());

        let second = executor.block_on(Op::new(Immediate(2), slot));
        assert_eq!(second.unwrap(), 2);
    }

    #[test]
    fn terminal_cancellation_is_latched_unlike_a_lone_interrupt() {
        let executor = crate::executor::Executor::new();
        let (signal, slot) = cancel::pair();
        signal.emit(CancelKind::TOTAL);

        let result = executor.block_on(Op::new(Immediate(1), slot.clone()));
        assert!(matches!(
            result,
            Err(Error::Cancelled(CancelKind::TOTAL))
        ));
        assert!(slot.is_cancelled());
    }

    async fn futures_lite_poll_once_then_cancel<F>(
        mut future: F,
        signal: &cancel::Signal,
    ) -> F::Output
    where
        F: Future + Unpin,
    {
        let mut polled_once = false;
        poll_fn(move |cx| {
            if !polled_once {
                polled_once = true;
                let _ = Pin::new(&mut future).poll(cx);
                signal.emit(CancelKind::TOTAL);
            }
            Pin::new(&mut future).poll(cx)
        })
        .await
    }
}
