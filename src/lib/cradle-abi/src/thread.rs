//! Typed wrappers over the host's thread-creation calls.

use bitflags::bitflags;
use num_enum::{FromPrimitive, IntoPrimitive};
use static_assertions::const_assert;

use crate::{
    call::{convert_codes_to_result, HostCall, RawHost},
    tls::TlsBlock,
};

bitflags! {
    /// Flags accepted by the runtime's thread spawner.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub struct SpawnFlags: u32 {
        /// Write the new thread's id to the parent-supplied output slot on
        /// success.
        const PARENT_SETTID = 1 << 0;
    }
}

/// A thread id as seen by the runtime.
pub type Tid = u32;

/// A user thread entry: one opaque argument, integer exit status. The
/// `C-unwind` ABI lets a panic unwind out of the entry so the runtime's
/// start routine can contain it.
pub type ThreadEntry = extern "C-unwind" fn(arg: usize) -> i32;

/// The entry the host actually runs in a new native thread. Receives the
/// thread's own TLS block; its return value is the thread's exit status.
pub type NativeEntry = extern "C" fn(tls: *mut TlsBlock) -> i32;

/// An opaque host-native thread id, used only for signal-mask registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NativeTid(pub u64);

/// Required alignment for the stack top handed to the host.
pub const STACK_ALIGN: usize = 16;

const_assert!(STACK_ALIGN.is_power_of_two());

/// Arguments to the host thread-creation calls.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct ThreadCreateArgs {
    /// The fixed trampoline every spawned thread enters through.
    pub entry: NativeEntry,
    /// Top of the new thread's stack, aligned to [`STACK_ALIGN`]. The stack
    /// sits immediately below the TLS block by layout contract.
    pub stack_top: usize,
    /// The new thread's TLS block. Owned by the new thread once creation
    /// succeeds.
    pub tls: *mut TlsBlock,
}

/// Error codes returned by a cradle host.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    PartialOrd,
    Ord,
    Eq,
    IntoPrimitive,
    FromPrimitive,
    thiserror::Error,
)]
#[repr(u64)]
pub enum HostError {
    /// An unknown error occurred.
    #[error("unknown error")]
    #[num_enum(default)]
    Unknown = 0,
    /// One of the arguments was invalid.
    #[error("invalid argument")]
    InvalidArgument = 1,
    /// The host is out of memory.
    #[error("out of memory")]
    OutOfMemory = 2,
    /// The host cannot create more threads right now.
    #[error("thread resources exhausted")]
    ResourceExhausted = 3,
    /// The host does not implement the requested call.
    #[error("call not supported")]
    Unsupported = 4,
}

impl ThreadCreateArgs {
    fn encode(&self) -> [u64; 3] {
        [
            self.entry as usize as u64,
            self.stack_top as u64,
            self.tls as u64,
        ]
    }
}

/// Create a native thread on a host whose ids are reserved by the caller.
///
/// On success the host may return an opaque native id; if it does, the
/// caller must register the new thread's initial signal mask via
/// [`host_signal_thread_init`] before reporting the thread as created.
pub fn host_thread_create<R: RawHost>(
    host: &R,
    args: &ThreadCreateArgs,
) -> Result<Option<NativeTid>, HostError> {
    let (code, val) = unsafe { host.raw_call(HostCall::ThreadCreate, &args.encode()) };
    convert_codes_to_result(
        code,
        val,
        |c, _| c != 0,
        |_, v| if v == 0 { None } else { Some(NativeTid(v)) },
        |c, _| HostError::from(c),
    )
}

/// Create a native thread on a host that assigns thread ids itself. Returns
/// the assigned id.
pub fn host_thread_create_assign_id<R: RawHost>(
    host: &R,
    args: &ThreadCreateArgs,
) -> Result<Tid, HostError> {
    let (code, val) = unsafe { host.raw_call(HostCall::ThreadCreateAssignId, &args.encode()) };
    convert_codes_to_result(
        code,
        val,
        |c, _| c != 0,
        |_, v| v as Tid,
        |c, _| HostError::from(c),
    )
}

/// Register the initial signal mask of a freshly created thread.
pub fn host_signal_thread_init<R: RawHost>(host: &R, tid: NativeTid) -> Result<(), HostError> {
    let (code, _) = unsafe { host.raw_call(HostCall::SignalThreadInit, &[tid.0]) };
    convert_codes_to_result(code, 0, |c, _| c != 0, |_, _| (), |c, _| HostError::from(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_error_codes_round_trip() {
        assert_eq!(HostError::from(3u64), HostError::ResourceExhausted);
        assert_eq!(u64::from(HostError::InvalidArgument), 1);
        // Unknown codes collapse to the default variant.
        assert_eq!(HostError::from(777u64), HostError::Unknown);
    }
}
