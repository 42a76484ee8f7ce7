//! Time-based operations: `next_tick` and `duration`, expressed as
//! ordinary [`crate::op::AsyncOp`]s backed by the executor's timer
//! wheel.

use std::time::{Duration, Instant};

use crate::handler::CompletionHandler;
use crate::op::AsyncOp;

/// Resolves the next time the executor drains its ready queue.
pub struct NextTick;

impl AsyncOp for NextTick {
    type Output = ();

    fn initiate(self, handler: CompletionHandler<()>) {
        let handle = crate::context::current_executor().expect("executor installed");
        handle.arm_timer(Instant::now(), Box::new(move || handler.invoke(())));
    }
}

/// Resolves no sooner than `duration` from now.
pub struct Sleep {
    duration: Duration,
}

impl Sleep {
    pub fn for_duration(duration: Duration) -> Self {
        Sleep { duration }
    }
}

impl AsyncOp for Sleep {
    type Output = ();

    fn initiate(self, handler: CompletionHandler<()>) {
        let handle = crate::context::current_executor().expect("executor installed");
        let at = Instant::now() + self.duration;
        handle.arm_timer(at, Box::new(move || handler.invoke(())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel;
    use crate::executor::Executor;
    use crate::op::AsTuple;

    #[test]
    fn sleep_resolves_after_duration() {
        let executor = Executor::new();
        let (_signal, slot) = cancel::pair();
        executor.block_on(AsTuple::new(
            Sleep::for_duration(Duration::from_millis(1)),
            slot,
        ));
    }

    #[test]
    fn next_tick_resolves() {
        let executor = Executor::new();
        let (_signal, slot) = cancel::pair();
        executor.block_on(AsTuple::new(NextTick, slot));
    }
}
