//! Thread classification, the listener worker pool, and run cancellation.
//!
//! Threads owned by [`WorkerPool`] are *asynchronous*; every other thread,
//! including the host's main thread, is synchronous. Methods registered as
//! not-async consult this classification on entry.

pub mod cancel;
pub mod pool;

use std::cell::Cell;

pub use cancel::CancelToken;
pub use pool::WorkerPool;

thread_local! {
    static ASYNC_CONTEXT: Cell<bool> = Cell::new(false);
}

/// True on worker threads of a [`WorkerPool`].
pub fn is_async() -> bool {
    ASYNC_CONTEXT.with(|c| c.get())
}

pub(crate) fn mark_async() {
    ASYNC_CONTEXT.with(|c| c.set(true));
}
