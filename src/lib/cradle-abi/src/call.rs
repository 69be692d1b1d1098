//! Host-call numbers and the raw dispatch interface.

/// All calls understood by a cradle host, addressed by number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub enum HostCall {
    Null = 0,
    /// Create a native thread. The caller has already reserved a thread id;
    /// the host may hand back an opaque native id for signal-mask
    /// registration.
    ThreadCreate = 1,
    /// Create a native thread. The host assigns the thread id itself and
    /// returns it.
    ThreadCreateAssignId = 2,
    /// Register the initial signal mask of a freshly created thread.
    SignalThreadInit = 3,
    MaxCalls = 4,
}

impl HostCall {
    /// Return the number associated with this host call.
    pub fn num(&self) -> u64 {
        *self as u64
    }
}

impl From<usize> for HostCall {
    fn from(x: usize) -> Self {
        match x {
            1 => Self::ThreadCreate,
            2 => Self::ThreadCreateAssignId,
            3 => Self::SignalThreadInit,
            _ => Self::Null,
        }
    }
}

/// A host sandbox kernel, reachable through numbered calls.
///
/// Every call returns a `(code, value)` pair; a nonzero code is a host
/// error code, and the meaning of `value` depends on the call.
pub trait RawHost {
    /// Issue a raw host call.
    ///
    /// # Safety
    /// `args` must encode exactly what `call` expects; pointer-valued
    /// arguments must be valid for the host to use.
    unsafe fn raw_call(&self, call: HostCall, args: &[u64]) -> (u64, u64);
}

/// Turn a raw `(code, value)` pair into a typed result. `d` decides whether
/// the pair is an error, `f` builds the success value, and `g` builds the
/// error.
#[inline]
pub fn convert_codes_to_result<T, E, D, F, G>(code: u64, val: u64, d: D, f: F, g: G) -> Result<T, E>
where
    F: Fn(u64, u64) -> T,
    G: Fn(u64, u64) -> E,
    D: Fn(u64, u64) -> bool,
{
    if d(code, val) {
        Err(g(code, val))
    } else {
        Ok(f(code, val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_numbers_round_trip() {
        for call in [
            HostCall::ThreadCreate,
            HostCall::ThreadCreateAssignId,
            HostCall::SignalThreadInit,
        ] {
            assert_eq!(HostCall::from(call.num() as usize), call);
        }
    }

    #[test]
    fn unknown_numbers_map_to_null() {
        assert_eq!(HostCall::from(0), HostCall::Null);
        assert_eq!(HostCall::from(99), HostCall::Null);
        assert_eq!(HostCall::from(HostCall::MaxCalls as usize), HostCall::Null);
    }

    #[test]
    fn convert_codes() {
        let ok: Result<u64, u64> =
            convert_codes_to_result(0, 7, |c, _| c != 0, |_, v| v, |c, _| c);
        assert_eq!(ok, Ok(7));
        let err: Result<u64, u64> =
            convert_codes_to_result(3, 0, |c, _| c != 0, |_, v| v, |c, _| c);
        assert_eq!(err, Err(3));
    }
}
