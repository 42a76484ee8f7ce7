//! `WaitGroup`: an open-ended set of eagerly-running children you can
//! keep adding to, then wait on.
//!
//! Each member here is an eager [`crate::task::Promise`], so `add` alone
//! is enough to start it running regardless of whether `wait` is ever
//! called. Dropping the group without waiting cancels every still-
//! running member but does not block on their teardown (see DESIGN.md).

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::task::Poll;

use crate::cancel::CancelKind;
use crate::error::Error;
use crate::task::{Fiber, Promise};

pub struct WaitGroup {
    members: RefCell<Vec<Promise<()>>>,
    normal_cancel: CancelKind,
    exception_cancel: CancelKind,
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    /// Cancels remaining members with [`CancelKind::TOTAL`] on both a
    /// clean and an exceptional exit; use [`WaitGroup::with_cancel_kinds`]
    /// to pick something gentler.
    pub fn new() -> Self {
        Self::with_cancel_kinds(CancelKind::TOTAL, CancelKind::TOTAL)
    }

    /// Build a group whose [`WaitGroup::exit`] cancels remaining members
    /// with `normal_cancel` on a clean exit, or `exception_cancel` when
    /// exiting because of an error.
    pub fn with_cancel_kinds(normal_cancel: CancelKind, exception_cancel: CancelKind) -> Self {
        WaitGroup {
            members: RefCell::new(Vec::new()),
            normal_cancel,
            exception_cancel,
        }
    }

    /// Start `body` running immediately as a new member.
    pub fn add<F, Fut>(&self, fiber: &Fiber, body: F)
    where
        F: FnOnce(Fiber) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let promise = Promise::spawn_on(fiber.handle(), body);
        self.members.borrow_mut().push(promise);
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    /// Wait for every member added so far to finish. Members added
    /// after this call begins are not waited on.
    pub fn wait(&self) -> impl Future<Output = ()> + '_ {
        std::future::poll_fn(move |cx| {
            let mut members = self.members.borrow_mut();
            let mut all_done = true;
            for member in members.iter_mut() {
                if !member.ready() {
                    let mut pinned = Pin::new(member);
                    if pinned.as_mut().poll(cx).is_pending() {
                        all_done = false;
                    }
                }
            }
            if all_done {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }

    /// Wait for the next member to complete, then drop it from the
    /// group. Resolves immediately if the group is currently empty.
    pub fn wait_one(&self) -> impl Future<Output = ()> + '_ {
        std::future::poll_fn(move |cx| {
            let mut members = self.members.borrow_mut();
            if members.is_empty() {
                return Poll::Ready(());
            }
            for member in members.iter_mut() {
                if !member.ready() {
                    let _ = Pin::new(member).poll(cx);
                }
            }
            if let Some(index) = members.iter().position(Promise::ready) {
                members.remove(index);
                return Poll::Ready(());
            }
            Poll::Pending
        })
    }

    /// Cancel every member still running and wait for all of them to
    /// unwind, choosing `exception_cancel` over `normal_cancel` when
    /// `error` is `Some`.
    pub async fn exit(&self, error: Option<&Error>) {
        let kind = if error.is_some() {
            self.exception_cancel
        } else {
            self.normal_cancel
        };
        for member in self.members.borrow().iter() {
            if !member.ready() {
                member.cancel(kind);
            }
        }
        self.wait().await;
    }
}

impl Drop for WaitGroup {
    fn drop(&mut self) {
        for member in self.members.borrow().iter() {
            if !member.ready() {
                member.cancel(self.normal_cancel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;

    #[test]
    fn wait_group_waits_for_all_added_members() {
        let executor = Executor::new();
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        executor.block_on(async {
            let handle = crate::context::current_executor().unwrap();
            let (_signal, root) = Fiber::root(handle);
            let group = WaitGroup::new();
            for _ in 0..3 {
                let count = count.clone();
                group.add(&root, move |_fiber| async move {
                    count.set(count.get() + 1);
                });
            }
            group.wait().await;
        });
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn dropping_without_waiting_cancels_members() {
        let executor = Executor::new();
        let seen = std::rc::Rc::new(std::cell::Cell::new(CancelKind::empty()));
        executor.block_on(async {
            let handle = crate::context::current_executor().unwrap();
            let (_signal, root) = Fiber::root(handle);
            let group = WaitGroup::new();
            let seen2 = seen.clone();
            group.add(&root, move |fiber| async move {
                fiber.next_tick().await.ok();
                seen2.set(fiber.cancel_slot().state());
            });
            drop(group);
        });
        executor.handle().run_until_idle();
        assert_eq!(seen.get(), CancelKind::TOTAL);
    }

    #[test]
    fn wait_one_resolves_immediately_when_empty() {
        let executor = Executor::new();
        executor.block_on(async {
            let group = WaitGroup::new();
            group.wait_one().await;
        });
    }

    #[test]
    fn wait_one_takes_and_removes_the_next_to_complete() {
        let executor = Executor::new();
        let order = std::rc::Rc::new(RefCell::new(Vec::new()));
        executor.block_on(async {
            let handle = crate::context::current_executor().unwrap();
            let (_signal, root) = Fiber::root(handle);
            let group = WaitGroup::new();
            let o1 = order.clone();
            group.add(&root, move |_fiber| async move {
                o1.borrow_mut().push(1);
            });
            let o2 = order.clone();
            group.add(&root, move |fiber| async move {
                fiber.next_tick().await.ok();
                o2.borrow_mut().push(2);
            });
            assert_eq!(group.len(), 2);
            group.wait_one().await;
            assert_eq!(group.len(), 1);
            group.wait_one().await;
            assert_eq!(group.len(), 0);
        });
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn exit_cancels_with_the_exception_kind_when_an_error_is_given() {
        let executor = Executor::new();
        let seen = std::rc::Rc::new(std::cell::Cell::new(CancelKind::empty()));
        executor.block_on(async {
            let handle = crate::context::current_executor().unwrap();
            let (_signal, root) = Fiber::root(handle);
            let group =
                WaitGroup::with_cancel_kinds(CancelKind::TERMINAL, CancelKind::PARTIAL);
            let seen2 = seen.clone();
            group.add(&root, move |fiber| async move {
                fiber.next_tick().await.ok();
                seen2.set(fiber.cancel_slot().state());
            });
            group.exit(Some(&Error::ChannelClosed)).await;
        });
        assert_eq!(seen.get(), CancelKind::PARTIAL);
    }
}
