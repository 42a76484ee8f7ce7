//! Structured-concurrency combinators: `gather`, `join`, `race`,
//! `select`, `left_select`, `wait`, `wait_group`.
//!
//! Every combinator here composes by ordinary `Future::poll` forwarding
//! using whatever `Waker` was handed to *it*, the same shape
//! `futures::join_all`/`tokio::join!` use, rather than routing children
//! through an external scheduler via a side channel.

mod gather;
mod join;
mod race;
mod relay;
mod wait;
mod wait_group;

pub use gather::gather;
pub use join::join;
pub use race::{
    left_select, left_select_with_cancel, race, race_with_cancel, select, select_with_cancel,
};
pub use wait::wait;
pub use wait_group::WaitGroup;

use std::future::Future;
use std::pin::Pin;

use crate::cancel::Signal;

/// One branch handed to a combinator: its own cancellation emitter plus
/// the boxed future it owns. Built with [`crate::task::Fiber::spawn_child`].
pub type Child<T> = (Signal, Pin<Box<dyn Future<Output = T>>>);
