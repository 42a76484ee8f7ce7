//! The error taxonomy reachable from user code.

use crate::cancel::CancelKind;

/// Every error kind the runtime core itself can raise.
///
/// Operations plugged in through [`crate::op::AsyncOp`] are free to
/// raise their own domain errors (a closed channel, a broken pipe); this
/// enum only covers what the core fixes once, for everyone.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// An operation was attempted on a receiver whose backing coroutine
    /// was moved away.
    #[error("operation attempted on a moved-from coroutine")]
    MovedFrom,

    /// A detached coroutine terminated abnormally and no owner existed
    /// to observe the failure.
    #[error("detached coroutine terminated abnormally")]
    Detached,

    /// A coroutine completed without producing a result where one was
    /// required.
    #[error("coroutine completed without a result")]
    CompletedUnexpected,

    /// [`crate::task::Handle::get`]-style access was attempted before
    /// [`crate::task::Handle::ready`] reported readiness.
    #[error("result polled before it was ready")]
    WaitNotReady,

    /// A second awaiter attempted to attach to a single-consumer
    /// receiver.
    #[error("a second awaiter attached to a single-consumer receiver")]
    AlreadyAwaited,

    /// A coroutine frame's memory source refused the allocation.
    #[error("allocation refused by the bound memory source")]
    AllocationFailed,

    /// The current thread has no installed executor.
    #[error("no executor is installed on the current thread")]
    NoExecutor,

    /// The awaited operation or its owning coroutine was cancelled.
    #[error("cancelled ({0:?})")]
    Cancelled(CancelKind),

    /// A channel operation observed the channel closed.
    #[error("channel closed")]
    ChannelClosed,

    /// An opaque error surfaced by an external [`crate::op::AsyncOp`].
    #[error("{0}")]
    Op(String),
}

impl Error {
    /// True for any variant produced by cancellation delivery, which is
    /// what `with`'s suppression hook and `join`/`race` match against.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
