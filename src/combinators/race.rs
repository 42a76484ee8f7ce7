//! `race`/`select`/`left_select`: resolve as soon as any one branch
//! does, cancelling every other branch.
//!
//! `select` differs from `race` only in returning which branch won
//! alongside its value. `left_select` scans branches in the same
//! left-to-right order `select` already does, so it is exactly `select`
//! under a name that makes the bias explicit at call sites that care.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cancel::{CancelKind, Signal};
use crate::task::Fiber;

use super::relay::CancelRelay;
use super::Child;

enum Entry<T> {
    Pending(Signal, Pin<Box<dyn Future<Output = T>>>),
    Done,
}

pub struct Select<T> {
    relay: CancelRelay,
    entries: Vec<Entry<T>>,
    winner: Option<(usize, T)>,
    loser_cancel: CancelKind,
}

fn new_select<T>(fiber: &Fiber, children: Vec<Child<T>>, loser_cancel: CancelKind) -> Select<T> {
    Select {
        relay: CancelRelay::new(fiber.cancel_slot().clone()),
        entries: children
            .into_iter()
            .map(|(signal, future)| Entry::Pending(signal, future))
            .collect(),
        winner: None,
        loser_cancel,
    }
}

impl<T> Future for Select<T> {
    type Output = (usize, T);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<(usize, T)> {
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

        for index in 0..this.entries.len() {
            if let Entry::Pending(_, future) = &mut this.entries[index] {
                if let Poll::Ready(value) = future.as_mut().poll(cx) {
                    this.entries[index] = Entry::Done;
                    if this.winner.is_none() {
                        this.winner = Some((index, value));
                        for entry in this.entries.iter() {
                            if let Entry::Pending(signal, _) = entry {
                                signal.emit(this.loser_cancel);
                            }
                        }
                    }
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
        Poll::Ready(this.winner.take().expect("at least one branch must complete"))
    }
}

/// Resolve with `(index, value)` of whichever branch completes first,
/// left-to-right on ties, cancelling every other branch with
/// [`CancelKind::TOTAL`].
pub fn select<T>(fiber: &Fiber, children: Vec<Child<T>>) -> Select<T> {
    select_with_cancel(fiber, children, CancelKind::TOTAL)
}

/// Like [`select`], but the losing branches are cancelled with `cancel`
/// instead of the default [`CancelKind::TOTAL`].
pub fn select_with_cancel<T>(
    fiber: &Fiber,
    children: Vec<Child<T>>,
    cancel: CancelKind,
) -> Select<T> {
    new_select(fiber, children, cancel)
}

/// Identical to [`select`]; named separately so call sites can document
/// that the left-to-right bias on simultaneous readiness is load-bearing.
pub fn left_select<T>(fiber: &Fiber, children: Vec<Child<T>>) -> Select<T> {
    left_select_with_cancel(fiber, children, CancelKind::TOTAL)
}

/// Like [`left_select`], with an explicit loser cancel kind.
pub fn left_select_with_cancel<T>(
    fiber: &Fiber,
    children: Vec<Child<T>>,
    cancel: CancelKind,
) -> Select<T> {
    new_select(fiber, children, cancel)
}

/// Resolve with just the winning branch's value, discarding its index.
pub async fn race<T>(fiber: &Fiber, children: Vec<Child<T>>) -> T {
    select(fiber, children).await.1
}

/// Like [`race`], with an explicit loser cancel kind.
pub async fn race_with_cancel<T>(fiber: &Fiber, children: Vec<Child<T>>, cancel: CancelKind) -> T {
    select_with_cancel(fiber, children, cancel).await.1
}
