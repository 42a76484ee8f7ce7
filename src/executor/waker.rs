//! A real `Waker` backed by a task id and the executor handle that owns
//! it.

use std::rc::Rc;
use std::task::{RawWaker, RawWakerVTable, Waker};

use super::{Handle, TaskId};

struct Data {
    id: TaskId,
    handle: Handle,
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop_data);

fn raw(data: Rc<Data>) -> RawWaker {
    RawWaker::new(Rc::into_raw(data) as *const (), &VTABLE)
}

unsafe fn clone(ptr: *const ()) -> RawWaker {
    let data = Rc::from_raw(ptr as *const Data);
    let cloned = data.clone();
    std::mem::forget(data);
    raw(cloned)
}

unsafe fn wake(ptr: *const ()) {
    let data = Rc::from_raw(ptr as *const Data);
    data.handle.wake(data.id);
}

unsafe fn wake_by_ref(ptr: *const ()) {
    let data = Rc::from_raw(ptr as *const Data);
    data.handle.wake(data.id);
    std::mem::forget(data);
}

unsafe fn drop_data(ptr: *const ()) {
    drop(Rc::from_raw(ptr as *const Data));
}

/// Build a waker that, when woken, marks `id` ready on `handle`.
///
/// # Safety note
/// The resulting `Waker` is not actually `Send`/`Sync`-sound to move
/// across threads since `handle` wraps `Rc` state; nothing in this crate
/// does so, by construction (the executor and every task it owns are
/// thread-affine).
pub(super) fn make(id: TaskId, handle: Handle) -> Waker {
    let data = Rc::new(Data { id, handle });
    unsafe { Waker::from_raw(raw(data)) }
}
