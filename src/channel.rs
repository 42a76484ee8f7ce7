//! A bounded SPSC channel: capacity 0 is a rendezvous (`send` only
//! completes once a `recv` has taken the value), capacity N ≥ 1 buffers
//! up to N values before `send` must wait.
//!
//! Built on a `VecDeque` buffer and a pair of parked-waker queues for
//! back-pressure in both directions.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::poll_fn;
use std::rc::Rc;
use std::task::{Poll, Waker};

use crate::error::{Error, Result};

struct Shared<T> {
    capacity: usize,
    buffer: RefCell<VecDeque<T>>,
    send_waiters: RefCell<VecDeque<Waker>>,
    recv_waiters: RefCell<VecDeque<Waker>>,
    /// For a rendezvous channel (`capacity == 0`): the number of pending
    /// `recv` calls ready to take a value directly from a waiting
    /// `send`, bypassing the buffer entirely.
    rendezvous_slot: RefCell<Option<T>>,
    closed: Cell<bool>,
}

pub struct Sender<T> {
    shared: Rc<Shared<T>>,
}

pub struct Receiver<T> {
    shared: Rc<Shared<T>>,
}

pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let shared = Rc::new(Shared {
        capacity,
        buffer: RefCell::new(VecDeque::new()),
        send_waiters: RefCell::new(VecDeque::new()),
        recv_waiters: RefCell::new(VecDeque::new()),
        rendezvous_slot: RefCell::new(None),
        closed: Cell::new(false),
    });
    (
        Sender {
            shared: shared.clone(),
        },
        Receiver { shared },
    )
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Sender {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Receiver {
            shared: self.shared.clone(),
        }
    }
}

fn wake_all(queue: &RefCell<VecDeque<Waker>>) {
    for waker in queue.borrow_mut().drain(..) {
        waker.wake();
    }
}

impl<T> Sender<T> {
    /// Send `value`, suspending until either buffer space is available
    /// (capacity ≥ 1), a receiver is waiting to take it directly
    /// (capacity 0), or the channel is closed.
    pub async fn send(&self, value: T) -> Result<()> {
        let mut value = Some(value);
        poll_fn(|cx| {
            if self.shared.closed.get() {
                return Poll::Ready(Err(Error::ChannelClosed));
            }
            if self.shared.capacity == 0 {
                if !self.shared.recv_waiters.borrow().is_empty()
                    && self.shared.rendezvous_slot.borrow().is_none()
                {
                    *self.shared.rendezvous_slot.borrow_mut() =
                        Some(value.take().expect("polled after completion"));
                    wake_all(&self.shared.recv_waiters);
                    return Poll::Ready(Ok(()));
                }
            } else if self.shared.buffer.borrow().len() < self.shared.capacity {
                self.shared
                    .buffer
                    .borrow_mut()
                    .push_back(value.take().expect("polled after completion"));
                wake_all(&self.shared.recv_waiters);
                return Poll::Ready(Ok(()));
            }
            self.shared.send_waiters.borrow_mut().push_back(cx.waker().clone());
            Poll::Pending
        })
        .await
    }

    pub fn close(&self) {
        self.shared.closed.set(true);
        wake_all(&self.shared.send_waiters);
        wake_all(&self.shared.recv_waiters);
    }

    /// False once [`Sender::close`]/[`Receiver::close`] has run, from
    /// either side of the pair.
    pub fn is_open(&self) -> bool {
        !self.shared.closed.get()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }
}

impl<T> Receiver<T> {
    pub async fn recv(&self) -> Result<T> {
        poll_fn(|cx| {
            if let Some(value) = self.shared.buffer.borrow_mut().pop_front() {
                wake_all(&self.shared.send_waiters);
                return Poll::Ready(Ok(value));
            }
            if let Some(value) = self.shared.rendezvous_slot.borrow_mut().take() {
                wake_all(&self.shared.send_waiters);
                return Poll::Ready(Ok(value));
            }
            if self.shared.closed.get() {
                return Poll::Ready(Err(Error::ChannelClosed));
            }
            self.shared.recv_waiters.borrow_mut().push_back(cx.waker().clone());
            // Announce readiness to receive so a rendezvous-capacity
            // sender parked in `send` notices it can proceed.
            wake_all(&self.shared.send_waiters);
            Poll::Pending
        })
        .await
    }

    pub fn close(&self) {
        self.shared.closed.set(true);
        wake_all(&self.shared.send_waiters);
        wake_all(&self.shared.recv_waiters);
    }

    /// False once either side has closed the channel. Does not reflect
    /// whether buffered values remain to be drained; check `recv`'s
    /// result for that.
    pub fn is_open(&self) -> bool {
        !self.shared.closed.get()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;

    #[test]
    fn buffered_channel_delivers_in_order() {
        let executor = Executor::new();
        let values = executor.block_on(async {
            let (tx, rx) = channel::<u32>(2);
            tx.send(1).await.unwrap();
            tx.send(2).await.unwrap();
            let mut out = Vec::new();
            out.push(rx.recv().await.unwrap());
            out.push(rx.recv().await.unwrap());
            out
        });
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn recv_after_close_and_drain_errors() {
        let executor = Executor::new();
        let (result, was_open_before_close, is_closed_after) = executor.block_on(async {
            let (tx, rx) = channel::<u32>(1);
            tx.send(1).await.unwrap();
            let was_open_before_close = tx.is_open() && rx.is_open();
            tx.close();
            let first = rx.recv().await;
            let second = rx.recv().await;
            ((first, second), was_open_before_close, rx.is_closed())
        });
        assert!(was_open_before_close);
        assert!(is_closed_after);
        assert_eq!(result.0.unwrap(), 1);
        assert!(matches!(result.1, Err(Error::ChannelClosed)));
    }

    #[test]
    fn rendezvous_channel_hands_off_directly() {
        let executor = Executor::new();
        let value = executor.block_on(async {
            let (tx, rx) = channel::<u32>(0);
            let handle = crate::context::current_executor().unwrap();
            handle.spawn(Box::pin(async move {
                tx.send(7).await.ok();
            }));
            rx.recv().await.unwrap()
        });
        assert_eq!(value, 7);
    }
}
