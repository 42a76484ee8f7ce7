//! `with(arg, f, exit)`: run `f` against a scoped resource and guarantee
//! `exit` runs exactly once afterward, with the error `f` produced (if
//! any) in hand, even if the whole `with(...)` future is dropped
//! mid-`.await` by an enclosing cancellation or a lost race branch.
//!
//! `exit` always runs; its own error is only re-raised when `f` itself
//! succeeded, so a resource's teardown failure never masks the error
//! that made the scope exit in the first place. The ordinary case needs
//! nothing more exotic than an `async fn`'s drop glue; only the
//! drop-before-exit-ran fallback below needs a single manual poll, since
//! `Drop::drop` cannot `.await`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use crate::error::{Error, Result};

struct ExitGuard<'a, A, Exit, ExitFut>
where
    Exit: FnMut(&mut A, Option<&Error>) -> ExitFut,
    ExitFut: Future<Output = Result<()>>,
{
    arg: &'a mut A,
    exit: Option<Exit>,
}

impl<'a, A, Exit, ExitFut> ExitGuard<'a, A, Exit, ExitFut>
where
    Exit: FnMut(&mut A, Option<&Error>) -> ExitFut,
    ExitFut: Future<Output = Result<()>>,
{
    /// Run `exit` with `error`, disarming the `Drop` fallback below.
    /// Safe to call at most once; `with` is the only caller.
    async fn run(&mut self, error: Option<&Error>) -> Result<()> {
        match self.exit.take() {
            Some(mut exit) => exit(self.arg, error).await,
            None => Ok(()),
        }
    }
}

impl<'a, A, Exit, ExitFut> Drop for ExitGuard<'a, A, Exit, ExitFut>
where
    Exit: FnMut(&mut A, Option<&Error>) -> ExitFut,
    ExitFut: Future<Output = Result<()>>,
{
    fn drop(&mut self) {
        let Some(mut exit) = self.exit.take() else {
            return;
        };
        // `run` never got to call this: the whole `with` future was
        // dropped mid-`.await` on `f`, with no captured error to hand
        // over. Give the hook one synchronous chance to finish.
        let mut fut = exit(self.arg, None);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let pinned = unsafe { Pin::new_unchecked(&mut fut) };
        if matches!(pinned.poll(&mut cx), Poll::Pending) {
            tracing::warn!(
                "with's exit hook did not finish synchronously after being dropped mid-await"
            );
        }
    }
}

pub async fn with<A, F, Fut, R, Exit, ExitFut>(mut arg: A, f: F, exit: Exit) -> Result<R>
where
    F: FnOnce(&mut A) -> Fut,
    Fut: Future<Output = Result<R>>,
    Exit: FnMut(&mut A, Option<&Error>) -> ExitFut,
    ExitFut: Future<Output = Result<()>>,
{
    let mut guard = ExitGuard {
        arg: &mut arg,
        exit: Some(exit),
    };
    let result = f(&mut *guard.arg).await;
    let captured = result.as_ref().err().cloned();
    let exit_result = guard.run(captured.as_ref()).await;
    match captured {
        Some(err) => Err(err),
        None => exit_result.and(result),
    }
}

fn noop_waker() -> Waker {
    fn clone(_: *const ()) -> RawWaker {
        RawWaker::new(std::ptr::null(), &VTABLE)
    }
    unsafe fn noop(_: *const ()) {}
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
}
