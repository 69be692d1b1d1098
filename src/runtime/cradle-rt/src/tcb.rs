//! The fixed entry trampoline and the calling thread's view of its own TLS.

use std::{cell::RefCell, panic::catch_unwind, sync::Arc};

use cradle_abi::{ThreadEntry, TlsBlock, TLS_SLOT_API0, TLS_SLOT_API1};
use tracing::trace;

// These two slots are unused during thread initialization, so the spawner
// repurposes them to carry the entry function and its argument across the
// thread-creation boundary.
pub(crate) const TLS_SLOT_THREAD_FUNC: usize = TLS_SLOT_API0;
pub(crate) const TLS_SLOT_THREAD_ARGS: usize = TLS_SLOT_API1;

// This is the same code used by libstd on catching a panic and turning it
// into an exit code.
const THREAD_PANIC_CODE: i32 = 101;

thread_local! {
    static CURRENT_TLS: RefCell<Option<Arc<TlsBlock>>> = const { RefCell::new(None) };
}

/// Run a closure against the calling thread's own TLS block. Returns `None`
/// on threads that were not created through the spawner.
pub fn with_current_tls<R>(f: impl FnOnce(&TlsBlock) -> R) -> Option<R> {
    CURRENT_TLS.with(|cur| cur.borrow().as_deref().map(f))
}

/// The entry point of new threads. The host runs this, and only this, in
/// every thread created through the spawner.
pub(crate) extern "C" fn trampoline(tls: *mut TlsBlock) -> i32 {
    // The spawner handed the block to us by ownership.
    let tls = unsafe { Arc::from_raw(tls.cast_const()) };

    // The slots are single-use: clear both before any user code can run, so
    // a later creation reusing this block never observes stale values.
    let func = tls.take(TLS_SLOT_THREAD_FUNC);
    let arg = tls.take(TLS_SLOT_THREAD_ARGS);
    debug_assert_ne!(func, 0);

    CURRENT_TLS.with(|cur| *cur.borrow_mut() = Some(tls));
    trace!("thread started, entry {:#x}", func);

    let entry: ThreadEntry = unsafe { core::mem::transmute(func) };
    start_thread(entry, arg)
}

/// The fixed start routine every spawned thread funnels through: run the
/// user entry exactly once and hand its status back to the host.
fn start_thread(entry: ThreadEntry, arg: usize) -> i32 {
    catch_unwind(|| entry(arg)).unwrap_or(THREAD_PANIC_CODE)
}
