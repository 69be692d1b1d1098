//! Identifier-assignment strategies for thread creation.
//!
//! Hosts come in two flavors: those whose thread-creation call expects the
//! caller to have reserved a thread id up front, and those that assign the
//! id themselves during creation. Each flavor is a [`TidPolicy`]
//! implementation, chosen when the spawner is constructed, so both paths
//! stay independently testable.

use cradle_abi::{
    host_signal_thread_init, host_thread_create, host_thread_create_assign_id, RawHost,
    ThreadCreateArgs, Tid,
};
use tracing::warn;

use crate::{idcounter::IdCounter, spawn::SpawnError};

/// How thread ids are assigned, paired with the host-create variant that
/// assignment style requires.
pub trait TidPolicy<R: RawHost>: Send + Sync {
    /// Reserve a thread id ahead of the host call. Policies whose host
    /// assigns ids itself return `Ok(None)`.
    ///
    /// A failure here must leave the host untouched; the spawner aborts the
    /// operation without creating anything.
    fn reserve(&self) -> Result<Option<Tid>, SpawnError>;

    /// Invoke the host-create variant this policy pairs with. `reserved` is
    /// exactly what [`TidPolicy::reserve`] returned for this operation. A
    /// reserved id must be returned to the allocator if the host call
    /// fails.
    fn create(
        &self,
        host: &R,
        args: &ThreadCreateArgs,
        reserved: Option<Tid>,
    ) -> Result<Tid, SpawnError>;
}

/// Ids come from a local allocator; the host's create call does not assign
/// them.
pub struct LocalTids {
    counter: IdCounter,
}

impl LocalTids {
    pub fn new() -> Self {
        Self {
            counter: IdCounter::new_one(),
        }
    }

    /// A local allocator restricted to ids in `first..=last`.
    pub fn bounded(first: Tid, last: Tid) -> Self {
        Self {
            counter: IdCounter::bounded(first, last),
        }
    }
}

impl Default for LocalTids {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawHost> TidPolicy<R> for LocalTids {
    fn reserve(&self) -> Result<Option<Tid>, SpawnError> {
        match self.counter.fresh() {
            Some(tid) => Ok(Some(tid)),
            None => Err(SpawnError::OutOfIds),
        }
    }

    fn create(
        &self,
        host: &R,
        args: &ThreadCreateArgs,
        reserved: Option<Tid>,
    ) -> Result<Tid, SpawnError> {
        let tid = reserved.expect("LocalTids::create requires a reserved id");
        match host_thread_create(host, args) {
            Ok(native) => {
                // Set the child's initial signal mask while higher-level
                // thread setup still serializes on the caller; the child
                // cannot proceed past initialization until then. The thread
                // exists either way, so a registration failure cannot undo
                // the creation.
                if let Some(native) = native {
                    if let Err(e) = host_signal_thread_init(host, native) {
                        warn!(
                            "signal-mask registration for native id {} failed: {}",
                            native.0, e
                        );
                    }
                }
                Ok(tid)
            }
            Err(e) => {
                // No thread exists; the id can go straight back.
                self.counter.release(tid);
                Err(e.into())
            }
        }
    }
}

/// The host assigns thread ids itself during creation.
pub struct HostTids;

impl<R: RawHost> TidPolicy<R> for HostTids {
    fn reserve(&self) -> Result<Option<Tid>, SpawnError> {
        Ok(None)
    }

    fn create(
        &self,
        host: &R,
        args: &ThreadCreateArgs,
        _reserved: Option<Tid>,
    ) -> Result<Tid, SpawnError> {
        Ok(host_thread_create_assign_id(host, args)?)
    }
}
