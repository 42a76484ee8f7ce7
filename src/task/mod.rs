//! The five coroutine task shapes and the context object every user
//! coroutine body is handed by value into its `async fn`.

pub mod detached;
pub mod generator;
pub mod lazy;
pub mod promise;
pub mod thread;

use crate::alloc::{self, SourceHandle};
use crate::cancel::{self, Slot};
use crate::executor;
use crate::op::{AsTuple, AsyncOp, Op};

pub use detached::Detached;
pub use generator::Generator;
pub use lazy::Task;
pub use promise::Promise;
pub use thread::ThreadTask;

/// The handle a coroutine body receives as its first parameter,
/// bundling the three pieces of ambient context every coroutine frame
/// carries: the executor, the memory source, and the cancellation slot
/// it should honor.
#[derive(Clone)]
pub struct Fiber {
    handle: executor::Handle,
    source: SourceHandle,
    cancel_slot: Slot,
}

impl Fiber {
    pub(crate) fn new(handle: executor::Handle, source: SourceHandle, cancel_slot: Slot) -> Self {
        Fiber {
            handle,
            source,
            cancel_slot,
        }
    }

    /// A root fiber with no caller to inherit cancellation from, used
    /// when spawning a fresh top-level task.
    pub(crate) fn root(handle: executor::Handle) -> (cancel::Signal, Self) {
        let (signal, slot) = cancel::pair();
        (signal, Fiber::new(handle.clone(), alloc::global_source(), slot))
    }

    pub fn handle(&self) -> &executor::Handle {
        &self.handle
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn cancel_slot(&self) -> &Slot {
        &self.cancel_slot
    }

    /// Wrap `op` so that a cancellation delivered to this fiber while
    /// the operation is pending resolves it with
    /// [`crate::error::Error::Cancelled`] — the default cancellation
    /// policy for an awaited operation.
    pub fn op<O>(&self, op: O) -> Op<O>
    where
        O: AsyncOp + Unpin,
        O::Output: Unpin,
    {
        Op::new(op, self.cancel_slot.clone())
    }

    /// Wrap `op` with no cancellation interpretation at all.
    pub fn op_raw<O>(&self, op: O) -> AsTuple<O>
    where
        O: AsyncOp + Unpin,
        O::Output: Unpin,
    {
        AsTuple::new(op, self.cancel_slot.clone())
    }

    /// Derive a child scope with its own cancellation signal, used by
    /// structured-concurrency combinators to cancel individual branches
    /// independently while still forwarding this fiber's own
    /// cancellation into every child.
    pub fn child_scope(&self) -> (cancel::Signal, Fiber) {
        let (signal, slot) = cancel::pair();
        (
            signal,
            Fiber::new(self.handle.clone(), self.source.clone(), slot),
        )
    }

    pub async fn next_tick(&self) -> crate::error::Result<()> {
        self.op(crate::time::NextTick).await
    }

    pub async fn sleep(&self, duration: std::time::Duration) -> crate::error::Result<()> {
        self.op(crate::time::Sleep::for_duration(duration)).await
    }

    /// Build a boxed child future sharing this fiber's handle and
    /// source but owning its own cancellation slot, paired with the
    /// [`cancel::Signal`] used to cancel it independently. Used by the
    /// structured-concurrency combinators in [`crate::combinators`].
    pub fn spawn_child<F, Fut, T>(
        &self,
        body: F,
    ) -> (cancel::Signal, std::pin::Pin<Box<dyn std::future::Future<Output = T>>>)
    where
        F: FnOnce(Fiber) -> Fut,
        Fut: std::future::Future<Output = T> + 'static,
    {
        let (signal, fiber) = self.child_scope();
        (signal, Box::pin(body(fiber)))
    }
}
