//! The single-threaded cooperative executor.
//!
//! A tick-driven run queue: a `HashMap` of boxed coroutine futures,
//! drained through a ready queue until idle or until a driving future
//! resolves, backed by a real reference-counted [`std::task::Waker`] so
//! nothing needs an outside party re-polling every task on its behalf.

mod timer;
mod waker;

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

pub use timer::Deadline;

use crate::context;

pub(crate) type TaskId = u64;

struct Scheduled {
    future: Pin<Box<dyn Future<Output = ()>>>,
    /// Built once at spawn time and reused across every poll so that
    /// `Waker::will_wake` comparisons made by e.g.
    /// `crate::receiver::Receiver::poll_attach` stay valid across ticks.
    waker: Waker,
}

struct Inner {
    tasks: RefCell<HashMap<TaskId, Scheduled>>,
    ready: RefCell<VecDeque<TaskId>>,
    next_id: RefCell<TaskId>,
    timers: RefCell<timer::Wheel>,
    /// Closures queued by [`Handle::dispatch`] while no tick of this
    /// executor was on the stack; drained alongside the ready queue.
    posted: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    /// Set for the duration of [`Handle::drain_ready`]/[`Handle::fire_due_timers`];
    /// lets `dispatch` tell a reentrant call from an unrelated one.
    ticking: Cell<bool>,
}

/// Marks `flag` as ticking for its lifetime, restoring whatever value was
/// there before on drop so nested ticks (a timer callback that itself
/// drains ready tasks) stay correct.
struct TickGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> TickGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        TickGuard { flag, previous }
    }
}

impl<'a> Drop for TickGuard<'a> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// A cheaply-cloned reference to the executor, installed as the current
/// thread's context for the duration of a [`Executor::block_on`] call.
#[derive(Clone)]
pub struct Handle {
    inner: Rc<Inner>,
}

impl Handle {
    fn alloc_id(&self) -> TaskId {
        let mut next = self.inner.next_id.borrow_mut();
        let id = *next;
        *next += 1;
        id
    }

    /// Register a top-level coroutine with the executor and return the
    /// id it was scheduled under. Used by every eager promise shape
    /// (`Promise`, `Detached`, `ThreadTask`'s local pump) at construction
    /// time.
    pub fn spawn(&self, future: Pin<Box<dyn Future<Output = ()>>>) -> TaskId {
        let id = self.alloc_id();
        let waker = self.waker_for(id);
        self.inner
            .tasks
            .borrow_mut()
            .insert(id, Scheduled { future, waker });
        self.inner.ready.borrow_mut().push_back(id);
        id
    }

    /// Mark `id` ready to be polled again on the next drain. This is
    /// what every completion handler and every real `Waker` created for
    /// a task ultimately calls.
    pub(crate) fn wake(&self, id: TaskId) {
        if self.inner.tasks.borrow().contains_key(&id) {
            self.inner.ready.borrow_mut().push_back(id);
        }
    }

    /// Schedule `on_fire` to run no sooner than `at`, backing
    /// `delay`/`sleep`-style [`crate::op::AsyncOp`]s. `on_fire` is
    /// typically a
    /// [`crate::handler::CompletionHandler::invoke`] closure.
    pub fn arm_timer(&self, at: Instant, on_fire: Box<dyn FnOnce()>) -> Deadline {
        self.inner.timers.borrow_mut().arm(at, on_fire)
    }

    pub fn disarm_timer(&self, deadline: Deadline) {
        self.inner.timers.borrow_mut().disarm(deadline);
    }

    /// Run `f` immediately if this call is nested inside a tick of this
    /// same executor (a task poll or a firing timer callback), otherwise
    /// queue it to run on the next drain. This is what lets
    /// [`crate::handler::CompletionHandler::invoke`] wake a parked waker
    /// without re-entering the ready queue when it is itself already
    /// running from inside one.
    pub fn dispatch(&self, f: impl FnOnce() + 'static) {
        if self.inner.ticking.get() {
            f();
        } else {
            self.inner.posted.borrow_mut().push_back(Box::new(f));
        }
    }

    /// Alias for [`Handle::dispatch`], used where a caller wants to name
    /// the immediate-or-queued distinction explicitly.
    pub fn dispatch_now(&self, f: impl FnOnce() + 'static) {
        self.dispatch(f)
    }

    fn waker_for(&self, id: TaskId) -> Waker {
        waker::make(id, self.clone())
    }

    fn drain_ready(&self) -> bool {
        let _tick = TickGuard::enter(&self.inner.ticking);
        let mut made_progress = false;
        loop {
            let next = self.inner.ready.borrow_mut().pop_front();
            let Some(id) = next else { break };
            made_progress = true;
            let scheduled = self.inner.tasks.borrow_mut().remove(&id);
            let Some(mut scheduled) = scheduled else {
                continue;
            };
            let mut cx = Context::from_waker(&scheduled.waker);
            match scheduled.future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => {}
                Poll::Pending => {
                    self.inner.tasks.borrow_mut().insert(id, scheduled);
                }
            }
        }
        if self.drain_posted() {
            made_progress = true;
        }
        made_progress
    }

    fn drain_posted(&self) -> bool {
        let mut made_progress = false;
        loop {
            let next = self.inner.posted.borrow_mut().pop_front();
            let Some(f) = next else { break };
            made_progress = true;
            f();
        }
        made_progress
    }

    fn fire_due_timers(&self) -> bool {
        let _tick = TickGuard::enter(&self.inner.ticking);
        self.inner.timers.borrow_mut().fire_due(Instant::now()) > 0
    }

    /// Run until neither the ready queue nor the timer wheel can make
    /// further progress.
    pub fn run_until_idle(&self) {
        loop {
            if self.drain_ready() {
                continue;
            }
            if self.fire_due_timers() {
                continue;
            }
            match self.inner.timers.borrow().next_deadline() {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    }
                }
                None => break,
            }
        }
    }
}

/// The executor itself. Owns no coroutines directly; all state lives
/// behind the `Rc` shared with every [`Handle`] clone so completion
/// handlers can outlive a single `run_until_idle` turn.
pub struct Executor {
    handle: Handle,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Executor {
            handle: Handle {
                inner: Rc::new(Inner {
                    tasks: RefCell::new(HashMap::new()),
                    ready: RefCell::new(VecDeque::new()),
                    next_id: RefCell::new(0),
                    timers: RefCell::new(timer::Wheel::new()),
                    posted: RefCell::new(VecDeque::new()),
                    ticking: Cell::new(false),
                }),
            },
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Install this executor as current, drive `driver` to completion,
    /// and restore whatever context was current before.
    pub fn block_on<F>(&self, driver: F) -> F::Output
    where
        F: Future,
    {
        let _scope = context::install(self.handle.clone(), None);
        let mut driver = Box::pin(driver);
        let id = TaskId::MAX;
        let waker = self.handle.waker_for(id);
        let mut cx = Context::from_waker(&waker);
        loop {
            if let Poll::Ready(output) = driver.as_mut().poll(&mut cx) {
                return output;
            }
            self.handle.run_until_idle();
            if let Poll::Ready(output) = driver.as_mut().poll(&mut cx) {
                return output;
            }
            // Nothing left to do and the driver hasn't resolved: park on
            // the next armed timer, if any, otherwise this is a bug in
            // the caller's future (leaked waker) and we'd spin; block on
            // a short sleep instead of hanging a test suite forever.
            match self.handle.inner.timers.borrow().next_deadline() {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    }
                }
                None => std::thread::sleep(Duration::from_millis(1)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn spawned_task_runs_to_completion() {
        let executor = Executor::new();
        let ran = Rc::new(Cell::new(false));
        let ran2 = ran.clone();
        executor.handle().spawn(Box::pin(async move {
            ran2.set(true);
        }));
        executor.handle().run_until_idle();
        assert!(ran.get());
    }

    #[test]
    fn block_on_returns_driver_output() {
        let executor = Executor::new();
        let value = executor.block_on(async { 1 + 1 });
        assert_eq!(value, 2);
    }

    #[test]
    fn dispatch_outside_a_tick_is_queued_not_immediate() {
        let executor = Executor::new();
        let ran = Rc::new(Cell::new(false));
        let ran2 = ran.clone();
        executor.handle().dispatch(move || ran2.set(true));
        assert!(!ran.get());
        executor.handle().run_until_idle();
        assert!(ran.get());
    }

    #[test]
    fn dispatch_from_inside_a_tick_runs_inline() {
        let executor = Executor::new();
        let ran_inline = Rc::new(Cell::new(false));
        let ran_inline2 = ran_inline.clone();
        let handle = executor.handle();
        handle.spawn(Box::pin(async move {
            let handle = crate::context::current_executor().unwrap();
            let ran3 = ran_inline2.clone();
            handle.dispatch_now(move || ran3.set(true));
            assert!(ran_inline2.get());
        }));
        let _scope = context::install(executor.handle(), None);
        executor.handle().run_until_idle();
        assert!(ran_inline.get());
    }
}
