//! Thread-local "current executor" / "current memory source" context,
//! giving coroutine code access to ambient state without threading a
//! parameter through every call.

use std::cell::RefCell;
use std::rc::Rc;

use crate::alloc::{self, MemorySource, SourceHandle};
use crate::error::{Error, Result};
use crate::executor::Handle;

thread_local! {
    static CURRENT_EXECUTOR: RefCell<Option<Handle>> = const { RefCell::new(None) };
    static CURRENT_SOURCE: RefCell<Option<SourceHandle>> = const { RefCell::new(None) };
}

/// The executor driving the current thread, if any.
pub fn current_executor() -> Result<Handle> {
    CURRENT_EXECUTOR.with(|cell| cell.borrow().clone().ok_or(Error::NoExecutor))
}

/// The memory source in scope on the current thread, falling back to
/// [`alloc::global_source`] when nothing narrower was installed.
pub fn current_source() -> SourceHandle {
    CURRENT_SOURCE.with(|cell| cell.borrow().clone().unwrap_or_else(alloc::global_source))
}

/// RAII guard restoring whatever was installed before on drop.
pub struct Scope {
    previous_executor: Option<Handle>,
    previous_source: Option<SourceHandle>,
}

impl Drop for Scope {
    fn drop(&mut self) {
        CURRENT_EXECUTOR.with(|cell| *cell.borrow_mut() = self.previous_executor.take());
        CURRENT_SOURCE.with(|cell| *cell.borrow_mut() = self.previous_source.take());
    }
}

/// Install `handle` (and optionally a narrower `source`) as current for
/// the lifetime of the returned [`Scope`].
pub fn install(handle: Handle, source: Option<Rc<dyn MemorySource>>) -> Scope {
    let previous_executor =
        CURRENT_EXECUTOR.with(|cell| cell.borrow_mut().replace(handle).clone());
    let previous_source = CURRENT_SOURCE.with(|cell| {
        let mut cell = cell.borrow_mut();
        let previous = cell.clone();
        if let Some(source) = source {
            *cell = Some(source);
        }
        previous
    });
    Scope {
        previous_executor,
        previous_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_executor_before_install() {
        assert!(matches!(current_executor(), Err(Error::NoExecutor)));
    }
}
