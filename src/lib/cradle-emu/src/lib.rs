//! An in-process emulated cradle host.
//!
//! Implements the raw host-call interface on top of `std::thread`, so the
//! runtime's thread-spawn path can run unmodified against it. The emulator
//! keeps call counters, records the arguments of the last creation, and
//! supports one-shot failure injection, which makes it the test double for
//! the spawn layer as well as a standalone in-process host.
//!
//! Native threads get their own stacks from std; the `stack_top` argument
//! is validated and recorded but not used to place the stack.

use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    thread::JoinHandle,
};

use cradle_abi::{HostCall, HostError, NativeEntry, RawHost, TlsBlock, STACK_ALIGN};
use tracing::debug;

/// Which thread-creation variant the emulated host speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TidMode {
    /// `ThreadCreate`: the caller reserves thread ids; the host hands back
    /// an opaque native id that needs signal-mask registration.
    CallerAllocated,
    /// `ThreadCreate`: the caller reserves thread ids; the host has no
    /// native ids to report.
    CallerAllocatedAnonymous,
    /// `ThreadCreateAssignId`: the host assigns and returns thread ids.
    HostAssigned,
}

/// Arguments of a thread-creation call, as the host saw them.
#[derive(Clone, Copy, Debug)]
pub struct CreateRecord {
    pub entry: usize,
    pub stack_top: usize,
    pub tls: usize,
}

/// The emulated host kernel.
pub struct EmuHost {
    mode: TidMode,
    next_id: AtomicU64,
    create_calls: AtomicUsize,
    fail_create: AtomicU64,
    last_create: Mutex<Option<CreateRecord>>,
    sigmasks: Mutex<Vec<u64>>,
    threads: Mutex<Vec<JoinHandle<i32>>>,
}

impl EmuHost {
    pub fn new(mode: TidMode) -> Self {
        Self {
            mode,
            next_id: AtomicU64::new(1),
            create_calls: AtomicUsize::new(0),
            fail_create: AtomicU64::new(0),
            last_create: Mutex::new(None),
            sigmasks: Mutex::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Make the next thread-creation call fail with `err`.
    ///
    /// `err` must not be [`HostError::Unknown`]: it encodes as 0, which the
    /// wire format reserves for success, so no host can return it.
    pub fn fail_next_create(&self, err: HostError) {
        let code = u64::from(err);
        assert_ne!(code, 0, "host code 0 is the success sentinel");
        self.fail_create.store(code, Ordering::SeqCst);
    }

    /// Number of thread-creation calls received, successful or not.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Native ids whose initial signal mask has been registered, in order.
    pub fn registered_sigmasks(&self) -> Vec<u64> {
        self.sigmasks.lock().unwrap().clone()
    }

    /// Arguments of the most recent thread-creation call, if any.
    pub fn last_create(&self) -> Option<CreateRecord> {
        *self.last_create.lock().unwrap()
    }

    /// Wait for every thread created so far and return their exit statuses,
    /// in creation order.
    pub fn join_all(&self) -> Vec<i32> {
        let handles: Vec<_> = self.threads.lock().unwrap().drain(..).collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(EXIT_PANICKED))
            .collect()
    }

    fn do_create(&self, args: &[u64]) -> (u64, u64) {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let fail = self.fail_create.swap(0, Ordering::SeqCst);
        if fail != 0 {
            return (fail, 0);
        }
        if args.len() < 3 {
            return (HostError::InvalidArgument.into(), 0);
        }

        let record = CreateRecord {
            entry: args[0] as usize,
            stack_top: args[1] as usize,
            tls: args[2] as usize,
        };
        if record.entry == 0 || record.tls == 0 || record.stack_top % STACK_ALIGN != 0 {
            return (HostError::InvalidArgument.into(), 0);
        }
        *self.last_create.lock().unwrap() = Some(record);

        let entry: NativeEntry = unsafe { core::mem::transmute(record.entry) };
        let tls = record.tls;
        let spawned = std::thread::Builder::new()
            .name("cradle-emu-thread".into())
            .spawn(move || entry(tls as *mut TlsBlock));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(_) => return (HostError::ResourceExhausted.into(), 0),
        };
        self.threads.lock().unwrap().push(handle);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!("created native thread {} in mode {:?}", id, self.mode);
        match self.mode {
            TidMode::CallerAllocated => (0, id),
            TidMode::CallerAllocatedAnonymous => (0, 0),
            TidMode::HostAssigned => (0, id),
        }
    }
}

impl RawHost for EmuHost {
    unsafe fn raw_call(&self, call: HostCall, args: &[u64]) -> (u64, u64) {
        match call {
            HostCall::ThreadCreate if self.mode != TidMode::HostAssigned => self.do_create(args),
            HostCall::ThreadCreateAssignId if self.mode == TidMode::HostAssigned => {
                self.do_create(args)
            }
            // The wrong creation variant for this host's configuration.
            HostCall::ThreadCreate | HostCall::ThreadCreateAssignId => {
                (HostError::InvalidArgument.into(), 0)
            }
            HostCall::SignalThreadInit => {
                let Some(&tid) = args.first() else {
                    return (HostError::InvalidArgument.into(), 0);
                };
                self.sigmasks.lock().unwrap().push(tid);
                (0, 0)
            }
            HostCall::Null | HostCall::MaxCalls => (HostError::Unsupported.into(), 0),
        }
    }
}

// Exit status reported for threads that died without one.
const EXIT_PANICKED: i32 = 101;

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn trivial_entry(tls: *mut TlsBlock) -> i32 {
        // Reclaim the block so the test does not leak it.
        drop(unsafe { std::sync::Arc::from_raw(tls.cast_const()) });
        42
    }

    fn create_args(tls: &std::sync::Arc<TlsBlock>) -> [u64; 3] {
        let ptr = std::sync::Arc::into_raw(tls.clone()) as usize;
        let entry = trivial_entry as usize as u64;
        [entry, (ptr & !(STACK_ALIGN - 1)) as u64, ptr as u64]
    }

    #[test]
    fn runs_entry_and_reports_status() {
        let host = EmuHost::new(TidMode::HostAssigned);
        let tls = std::sync::Arc::new(TlsBlock::new());
        let (code, id) =
            unsafe { host.raw_call(HostCall::ThreadCreateAssignId, &create_args(&tls)) };
        assert_eq!(code, 0);
        assert_eq!(id, 1);
        assert_eq!(host.join_all(), vec![42]);
    }

    #[test]
    fn rejects_mismatched_variant() {
        let host = EmuHost::new(TidMode::HostAssigned);
        let tls = std::sync::Arc::new(TlsBlock::new());
        let args = create_args(&tls);
        let (code, _) = unsafe { host.raw_call(HostCall::ThreadCreate, &args) };
        assert_eq!(code, u64::from(HostError::InvalidArgument));
        // Nothing ran; reclaim the block ourselves.
        drop(unsafe { std::sync::Arc::from_raw(args[2] as usize as *const TlsBlock) });
    }

    #[test]
    #[should_panic(expected = "success sentinel")]
    fn unknown_cannot_be_injected() {
        // Unknown encodes as 0, the wire's success value.
        EmuHost::new(TidMode::CallerAllocated).fail_next_create(HostError::Unknown);
    }

    #[test]
    fn one_shot_failure_injection() {
        let host = EmuHost::new(TidMode::CallerAllocated);
        host.fail_next_create(HostError::ResourceExhausted);
        let tls = std::sync::Arc::new(TlsBlock::new());
        let args = create_args(&tls);
        let (code, _) = unsafe { host.raw_call(HostCall::ThreadCreate, &args) };
        assert_eq!(code, u64::from(HostError::ResourceExhausted));
        drop(unsafe { std::sync::Arc::from_raw(args[2] as usize as *const TlsBlock) });

        let args = create_args(&tls);
        let (code, native) = unsafe { host.raw_call(HostCall::ThreadCreate, &args) };
        assert_eq!(code, 0);
        assert_ne!(native, 0);
        assert_eq!(host.create_calls(), 2);
        host.join_all();
    }
}
