//! Cancellation signals (emitters) and slots (receivers).
//!
//! A waiter-list cancellation token: a small state flag plus a list of
//! parked wakers that all get woken on cancel, generalized from a plain
//! bool to the [`CancelKind`] flag set.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::task::Waker;

use bitflags::bitflags;

bitflags! {
    /// `total` ⊇ `partial` ⊇ `terminal`; `interrupt_await` is orthogonal
    /// to the other three.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct CancelKind: u8 {
        const TERMINAL        = 0b0001;
        const PARTIAL         = 0b0011;
        const TOTAL           = 0b0111;
        const INTERRUPT_AWAIT = 0b1000;
    }
}

struct Inner {
    /// Accumulated kinds emitted so far; empty means "not cancelled".
    state: Cell<CancelKind>,
    /// At most one installed handler at a time.
    handler: RefCell<Option<Box<dyn FnMut(CancelKind)>>>,
    waiters: RefCell<Vec<Waker>>,
}

/// The emitter half of a cancellation signal/slot pair.
#[derive(Clone)]
pub struct Signal {
    inner: Rc<Inner>,
}

/// The single-receiver half of a cancellation signal/slot pair.
#[derive(Clone)]
pub struct Slot {
    inner: Rc<Inner>,
}

/// Build a fresh, unset signal/slot pair.
pub fn pair() -> (Signal, Slot) {
    let inner = Rc::new(Inner {
        state: Cell::new(CancelKind::empty()),
        handler: RefCell::new(None),
        waiters: RefCell::new(Vec::new()),
    });
    (
        Signal {
            inner: inner.clone(),
        },
        Slot { inner },
    )
}

impl Signal {
    /// Emit a cancellation of `kind`. Idempotent: emitting the same kind
    /// twice is a no-op past the first time, emitting a broader kind
    /// widens the accumulated state.
    pub fn emit(&self, kind: CancelKind) {
        let merged = self.inner.state.get() | kind;
        self.inner.state.set(merged);
        if let Some(handler) = self.inner.handler.borrow_mut().as_mut() {
            handler(kind);
        }
        for waker in self.inner.waiters.borrow_mut().drain(..) {
            waker.wake();
        }
    }

    pub fn state(&self) -> CancelKind {
        self.inner.state.get()
    }
}

impl Slot {
    pub fn state(&self) -> CancelKind {
        self.inner.state.get()
    }

    pub fn is_cancelled(&self) -> bool {
        !self.inner.state.get().is_empty()
    }

    /// True if the accumulated state is `INTERRUPT_AWAIT` alone, with none
    /// of `TERMINAL`/`PARTIAL`/`TOTAL` set. All three of those share the
    /// `TERMINAL` bit, so checking for its absence is enough.
    pub fn is_interrupt_only(&self) -> bool {
        let state = self.inner.state.get();
        state.contains(CancelKind::INTERRUPT_AWAIT) && !state.intersects(CancelKind::TERMINAL)
    }

    /// Clear the `INTERRUPT_AWAIT` bit, leaving any `TERMINAL`/`PARTIAL`/
    /// `TOTAL` bits untouched. An operation that only ever saw a lone
    /// interrupt can be re-awaited afterward instead of finding a
    /// permanently cancelled slot.
    pub fn clear_interrupt(&self) {
        let cleared = self.inner.state.get().difference(CancelKind::INTERRUPT_AWAIT);
        self.inner.state.set(cleared);
    }

    /// Install the handler invoked synchronously when a cancellation is
    /// emitted on this slot, replacing (and returning) whatever handler
    /// was installed before. This is how a promise shape forwards a
    /// cancellation it received into the operation it currently awaits.
    pub fn install(&self, handler: Box<dyn FnMut(CancelKind)>) -> Option<Box<dyn FnMut(CancelKind)>> {
        self.inner.handler.borrow_mut().replace(handler)
    }

    pub fn clear(&self) -> Option<Box<dyn FnMut(CancelKind)>> {
        self.inner.handler.borrow_mut().take()
    }

    /// Register `waker` to be woken the next time this slot's signal
    /// fires, regardless of whether a handler is installed. Used by
    /// `cancellation_future`-style awaiters (e.g. a `race` branch
    /// waiting only to be told to withdraw).
    pub fn park(&self, waker: Waker) {
        if self.is_cancelled() {
            waker.wake();
            return;
        }
        self.inner.waiters.borrow_mut().push(waker);
    }
}

/// An RAII guard produced by [`reset`]; restores the previous handler on
/// a slot when dropped, after the caller temporarily swapped in a
/// different one.
pub struct ResetGuard<'a> {
    slot: &'a Slot,
    previous: Option<Box<dyn FnMut(CancelKind)>>,
}

impl<'a> Drop for ResetGuard<'a> {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(handler) => {
                self.slot.install(handler);
            }
            None => {
                self.slot.clear();
            }
        }
    }
}

/// Temporarily swap in `handler` on `slot`, restoring whatever was
/// installed before once the returned guard drops.
pub fn reset(slot: &Slot, handler: Box<dyn FnMut(CancelKind)>) -> ResetGuard<'_> {
    let previous = slot.install(handler);
    ResetGuard { slot, previous }
}
