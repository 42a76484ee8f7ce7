//! `join`: like `gather`, but the first failing branch cancels every
//! remaining branch and becomes the overall result.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cancel::{CancelKind, Signal};
use crate::error::{Error, Result};
use crate::task::Fiber;

use super::relay::CancelRelay;
use super::Child;

enum Entry<T> {
    Pending(Signal, Pin<Box<dyn Future<Output = Result<T>>>>),
    Done,
}

pub struct Join<T> {
    relay: CancelRelay,
    entries: Vec<Entry<T>>,
    values: Vec<Option<T>>,
    failure: Option<Error>,
}

/// Run every branch, fanning a cancellation from `fiber` into all of
/// them. As soon as any branch errors, every branch still pending is
/// cancelled and that first error becomes the overall result once
/// everything has unwound.
pub fn join<T>(fiber: &Fiber, children: Vec<Child<Result<T>>>) -> Join<T> {
    let len = children.len();
    Join {
        relay: CancelRelay::new(fiber.cancel_slot().clone()),
        entries: children
            .into_iter()
            .map(|(signal, future)| Entry::Pending(signal, future))
            .collect(),
        values: (0..len).map(|_| None).collect(),
        failure: None,
    }
}

impl<T> Future for Join<T> {
    type Output = Result<Vec<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Vec<T>>> {
        let this = self.get_mut();
        if !this.relay.is_installed() {
            let signals: Vec<Signal> = this
                .entries
                .iter()
                .filter_map(|e| match e {
                    Entry::Pending(signal, _) => Some(signal.clone()),
                    Entry::Done => None,
                })
                .collect();
            this.relay.ensure_installed(move |kind| {
                for signal in &signals {
                    signal.emit(kind);
                }
            });
        }

        for (index, entry) in this.entries.iter_mut().enumerate() {
            if let Entry::Pending(_, future) = entry {
                match future.as_mut().poll(cx) {
                    Poll::Ready(Ok(value)) => {
                        this.values[index] = Some(value);
                        *entry = Entry::Done;
                    }
                    Poll::Ready(Err(err)) => {
                        if this.failure.is_none() {
                            this.failure = Some(err);
                        }
                        *entry = Entry::Done;
                    }
                    Poll::Pending => {}
                }
            }
        }

        if this.failure.is_some() {
            for entry in this.entries.iter() {
                if let Entry::Pending(signal, _) = entry {
                    signal.emit(CancelKind::TOTAL);
                }
            }
        }

        let any_pending = this
            .entries
            .iter()
            .any(|entry| matches!(entry, Entry::Pending(..)));
        if any_pending {
            return Poll::Pending;
        }

        match this.failure.take() {
            Some(err) => Poll::Ready(Err(err)),
            None => {
                let values = std::mem::take(&mut this.values)
                    .into_iter()
                    .map(|v| v.expect("every branch resolved without failure"))
                    .collect();
                Poll::Ready(Ok(values))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;

    #[test]
    fn join_short_circuits_on_first_error() {
        let executor = Executor::new();
        let result = executor.block_on(async {
            let handle = crate::context::current_executor().unwrap();
            let (_signal, root) = Fiber::root(handle);
            let children: Vec<Child<Result<u32>>> = vec![
                root.spawn_child(|_fiber| async { Err(Error::ChannelClosed) }),
                root.spawn_child(|fiber| async move {
                    fiber.next_tick().await.ok();
                    Ok(1)
                }),
            ];
            join(&root, children).await
        });
        assert!(result.is_err());
    }
}
