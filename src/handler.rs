//! The completion-handler contract every [`crate::op::AsyncOp`] is
//! initiated with.
//!
//! The three-state `Immediacy` flag is what lets a synchronously-
//! completing operation (one invoked before `initiate` returns) finish
//! without ever touching the executor's ready queue,
//! while an operation that completes later (a timer firing, a channel
//! gaining a peer) wakes its parked `Waker` exactly like any other
//! `Future`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::task::Waker;

use crate::alloc::SourceHandle;
use crate::cancel::Slot;
use crate::executor;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Immediacy {
    /// `initiate` is still running; a synchronous `invoke` during this
    /// window does not need a wake.
    Initiating,
    /// `initiate` returned without completing; a later `invoke` must
    /// wake whatever `Waker` got parked.
    No,
    /// Completed (either synchronously during `initiate` or later).
    Yes,
}

pub(crate) struct Shared<T> {
    immediacy: Cell<Immediacy>,
    result: RefCell<Option<T>>,
    waker: RefCell<Option<Waker>>,
    handle: executor::Handle,
    source: SourceHandle,
    cancel_slot: Slot,
}

impl<T> Shared<T> {
    fn new(handle: executor::Handle, source: SourceHandle, cancel_slot: Slot) -> Rc<Self> {
        Rc::new(Shared {
            immediacy: Cell::new(Immediacy::Initiating),
            result: RefCell::new(None),
            waker: RefCell::new(None),
            handle,
            source,
            cancel_slot,
        })
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.immediacy.get() == Immediacy::Yes
    }

    pub(crate) fn take_result(&self) -> Option<T> {
        self.result.borrow_mut().take()
    }

    /// Called once `initiate` has returned; downgrades `Initiating` to
    /// `No` so a later async `invoke` knows it must wake the parker.
    pub(crate) fn finish_initiating(&self) {
        if self.immediacy.get() == Immediacy::Initiating {
            self.immediacy.set(Immediacy::No);
        }
    }

    pub(crate) fn park(&self, waker: &Waker) {
        let mut slot = self.waker.borrow_mut();
        if !slot.as_ref().is_some_and(|w| w.will_wake(waker)) {
            *slot = Some(waker.clone());
        }
    }
}

/// Handed to [`crate::op::AsyncOp::initiate`]; the only way to deliver a
/// result back into the awaiting `Future`.
pub struct CompletionHandler<T> {
    shared: Rc<Shared<T>>,
}

impl<T> CompletionHandler<T> {
    pub(crate) fn new(
        handle: executor::Handle,
        source: SourceHandle,
        cancel_slot: Slot,
    ) -> (Self, Rc<Shared<T>>) {
        let shared = Shared::new(handle, source, cancel_slot);
        (
            CompletionHandler {
                shared: shared.clone(),
            },
            shared,
        )
    }

    /// The executor this operation was initiated under.
    pub fn handle(&self) -> &executor::Handle {
        &self.shared.handle
    }

    /// The memory source in scope when this operation was initiated.
    pub fn source(&self) -> &SourceHandle {
        &self.shared.source
    }

    /// The owning coroutine's cancellation slot, for operations that need
    /// to observe cancellation themselves rather than leaving it to
    /// `Op`'s poll loop.
    pub fn cancel_slot(&self) -> &Slot {
        &self.shared.cancel_slot
    }

    /// Deliver the final result. Consumes `self`: a handler can only be
    /// invoked once: a coroutine is resumed exactly once per operation.
    pub fn invoke(self, value: T) {
        let was_initiating = self.shared.immediacy.get() == Immediacy::Initiating;
        *self.shared.result.borrow_mut() = Some(value);
        self.shared.immediacy.set(Immediacy::Yes);
        if !was_initiating {
            if let Some(waker) = self.shared.waker.borrow_mut().take() {
                let handle = self.shared.handle.clone();
                handle.dispatch_now(move || waker.wake());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel;

    fn fixture<T>() -> (Rc<Shared<T>>, CompletionHandler<T>) {
        let executor = crate::executor::Executor::new();
        let (_signal, slot) = cancel::pair();
        let (handler, shared) =
            CompletionHandler::new(executor.handle(), crate::alloc::global_source(), slot);
        (shared, handler)
    }

    #[test]
    fn synchronous_invoke_does_not_need_a_wake() {
        let (shared, handler) = fixture::<u32>();
        handler.invoke(7);
        shared.finish_initiating();
        assert!(shared.is_complete());
        assert_eq!(shared.take_result(), Some(7));
    }

    #[test]
    fn accessors_expose_the_ambient_context_the_handler_was_built_with() {
        let executor = crate::executor::Executor::new();
        let (_signal, slot) = cancel::pair();
        let (handler, _shared) =
            CompletionHandler::<()>::new(executor.handle(), crate::alloc::global_source(), slot);
        assert!(!handler.cancel_slot().is_cancelled());
        let _ = handler.handle();
        let _ = handler.source();
    }

    #[test]
    fn async_invoke_wakes_parked_waker() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::task::{RawWaker, RawWakerVTable};

        static WOKEN: AtomicBool = AtomicBool::new(false);
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        unsafe fn wake(_: *const ()) {
            WOKEN.store(true, Ordering::SeqCst);
        }
        unsafe fn wake_by_ref(p: *const ()) {
            wake(p)
        }
        unsafe fn drop_fn(_: *const ()) {}
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop_fn);
        let raw = RawWaker::new(std::ptr::null(), &VTABLE);
        let waker = unsafe { Waker::from_raw(raw) };
        let _unused = Arc::new(());

        let executor = crate::executor::Executor::new();
        let (_signal, slot) = cancel::pair();
        let (handler, shared) =
            CompletionHandler::<u32>::new(executor.handle(), crate::alloc::global_source(), slot);
        let _scope = crate::context::install(executor.handle(), None);
        shared.finish_initiating();
        shared.park(&waker);
        handler.invoke(9);
        executor.handle().run_until_idle();
        assert!(WOKEN.load(Ordering::SeqCst));
    }
}
