//! `gather`: wait for every branch, collecting every result in branch
//! order regardless of individual failure or completion order.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cancel::Signal;
use crate::task::Fiber;

use super::relay::CancelRelay;
use super::Child;

enum Entry<T> {
    Pending(Signal, Pin<Box<dyn Future<Output = T>>>),
    Done(T),
}

pub struct Gather<T> {
    relay: CancelRelay,
    entries: Vec<Entry<T>>,
}

/// Run every branch in `children` to completion, forwarding any
/// cancellation delivered to `fiber` into all of them, and collect their
/// results in branch order.
pub fn gather<T>(fiber: &Fiber, children: Vec<Child<T>>) -> Gather<T> {
    Gather {
        relay: CancelRelay::new(fiber.cancel_slot().clone()),
        entries: children
            .into_iter()
            .map(|(signal, future)| Entry::Pending(signal, future))
            .collect(),
    }
}

impl<T> Future for Gather<T> {
    type Output = Vec<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Vec<T>> {
        let this = self.get_mut();
        if !this.relay.is_installed() {
            let signals: Vec<Signal> = this
                .entries
                .iter()
                .filter_map(|e| match e {
                    Entry::Pending(signal, _) => Some(signal.clone()),
                    Entry::Done(_) => None,
                })
                .collect();
            this.relay.ensure_installed(move |kind| {
                for signal in &signals {
                    signal.emit(kind);
                }
            });
        }

        let mut all_done = true;
        for entry in this.entries.iter_mut() {
            if let Entry::Pending(_, future) = entry {
                match future.as_mut().poll(cx) {
                    Poll::Ready(value) => *entry = Entry::Done(value),
                    Poll::Pending => all_done = false,
                }
            }
        }

        if !all_done {
            return Poll::Pending;
        }
        let values = std::mem::take(&mut this.entries)
            .into_iter()
            .map(|entry| match entry {
                Entry::Done(value) => value,
                Entry::Pending(..) => unreachable!("checked all_done above"),
            })
            .collect();
        Poll::Ready(values)
    }
}
