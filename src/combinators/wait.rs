//! `wait`: run every branch to completion like `join`, but without
//! collecting any values — grounded on `detail/wait_group.hpp`'s
//! `wait_wrapper`, the fire-and-forget sibling of its `select_wrapper`.
//! Unlike `gather`, a failing branch still short-circuits and its error
//! becomes the overall result, cancelling whatever branches remain.

use crate::error::Result;
use crate::task::Fiber;

use super::join::join;
use super::Child;

pub async fn wait<T>(fiber: &Fiber, children: Vec<Child<Result<T>>>) -> Result<()> {
    join(fiber, children).await.map(|_| ())
}
