//! A single-threaded, cooperative coroutine runtime: task shapes
//! (`Promise`, `Task`, `Generator`, `Detached`, `ThreadTask`), their
//! structured-concurrency combinators, and the channel/cancellation/
//! allocator primitives they're all built from.

pub mod alloc;
pub mod cancel;
pub mod channel;
pub mod combinators;
pub mod context;
pub mod error;
pub mod executor;
pub mod handler;
pub mod op;
pub mod program;
mod receiver;
pub mod task;
mod time;
pub mod with;

pub mod prelude {
    pub use crate::cancel::CancelKind;
    pub use crate::channel::{channel, Receiver as ChannelReceiver, Sender as ChannelSender};
    pub use crate::combinators::{
        gather, join, left_select, left_select_with_cancel, race, race_with_cancel, select,
        select_with_cancel, wait, WaitGroup,
    };
    pub use crate::error::{Error, Result};
    pub use crate::executor::{Executor, Handle};
    pub use crate::task::{Detached, Fiber, Generator, Promise, Task, ThreadTask};
    pub use crate::with::with;
}
