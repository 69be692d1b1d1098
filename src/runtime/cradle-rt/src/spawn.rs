//! The thread spawner: a thin, carefully ordered wrapper around the host's
//! native-thread-creation call.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use cradle_abi::{
    HostError, RawHost, SpawnFlags, ThreadCreateArgs, ThreadEntry, Tid, TlsBlock, STACK_ALIGN,
};
use tracing::trace;

use crate::{
    tcb::{trampoline, TLS_SLOT_THREAD_ARGS, TLS_SLOT_THREAD_FUNC},
    tids::TidPolicy,
};

/// Possible error values for [`ThreadSpawner::spawn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    /// The thread-id space is exhausted. Reported before the host is ever
    /// invoked; no thread is created.
    #[error("out of memory: thread id space exhausted")]
    OutOfIds,
    /// The host rejected thread creation. Carries the host's own code.
    #[error("host thread creation failed: {0}")]
    Host(#[from] HostError),
}

/// Creates threads on a host `R`, assigning ids according to policy `P`.
pub struct ThreadSpawner<R, P> {
    host: R,
    tids: P,
}

impl<R: RawHost, P: TidPolicy<R>> ThreadSpawner<R, P> {
    pub fn new(host: R, tids: P) -> Self {
        Self { host, tids }
    }

    pub fn host(&self) -> &R {
        &self.host
    }

    /// Create a new thread running `entry(arg)`.
    ///
    /// `tls` is the new thread's storage block; ownership moves to the new
    /// thread on success. If `flags` contains [`SpawnFlags::PARENT_SETTID`],
    /// the new thread's id is also written to `parent_tid` on success;
    /// `parent_tid` is never written on failure.
    ///
    /// The new thread may begin running before this returns; there is no
    /// ordering guarantee between the caller's return and the child's first
    /// instruction.
    pub fn spawn(
        &self,
        entry: ThreadEntry,
        arg: usize,
        flags: SpawnFlags,
        tls: Arc<TlsBlock>,
        parent_tid: Option<&AtomicU32>,
    ) -> Result<Tid, SpawnError> {
        // Reserve an id first: if the allocator is spent, the host must
        // never see this request.
        let reserved = self.tids.reserve()?;

        let tls = Arc::into_raw(tls).cast_mut();
        // The stack is placed immediately below the TLS block, so the
        // block's address, aligned down, is the new thread's stack top.
        let stack_top = (tls as usize) & !(STACK_ALIGN - 1);

        // Pass the entry function and argument through the reserved slots.
        {
            let block = unsafe { &*tls };
            block.set(TLS_SLOT_THREAD_FUNC, entry as usize);
            block.set(TLS_SLOT_THREAD_ARGS, arg);
        }

        let args = ThreadCreateArgs {
            entry: trampoline,
            stack_top,
            tls,
        };
        trace!(
            "spawning thread with entry {:#x}, stack top {:#x}, tls {:p}",
            entry as usize,
            stack_top,
            tls,
        );

        match self.tids.create(&self.host, &args, reserved) {
            Ok(tid) => {
                if flags.contains(SpawnFlags::PARENT_SETTID) {
                    if let Some(out) = parent_tid {
                        out.store(tid, Ordering::Release);
                    }
                }
                Ok(tid)
            }
            Err(e) => {
                // No thread exists to read the slots; reclaim the block.
                drop(unsafe { Arc::from_raw(tls.cast_const()) });
                Err(e)
            }
        }
    }
}
