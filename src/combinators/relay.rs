//! The outer-to-children cancellation relay shared by every combinator
//! in this module: a cancellation delivered to the combinator itself is
//! forwarded into every still-pending child.
//!
//! Shaped like [`crate::cancel::reset`], but implemented without its
//! borrowing guard so the relay can live as a plain field of a
//! `Vec`-holding combinator struct instead of a self-referential one.

use crate::cancel::{CancelKind, Slot};

pub(crate) struct CancelRelay {
    slot: Slot,
    previous: Option<Box<dyn FnMut(CancelKind)>>,
    installed: bool,
}

impl CancelRelay {
    pub(crate) fn new(slot: Slot) -> Self {
        CancelRelay {
            slot,
            previous: None,
            installed: false,
        }
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.installed
    }

    pub(crate) fn ensure_installed(&mut self, handler: impl FnMut(CancelKind) + 'static) {
        if self.installed {
            return;
        }
        self.previous = self.slot.install(Box::new(handler));
        self.installed = true;
    }
}

impl Drop for CancelRelay {
    fn drop(&mut self) {
        if !self.installed {
            return;
        }
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
