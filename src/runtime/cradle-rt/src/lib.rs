//! Thread-spawn layer of the cradle sandboxed runtime.
//!
//! The runtime creates threads by handing a fixed trampoline to the host's
//! native-thread-creation call. The user entry function and its argument
//! cross the thread-creation boundary in two reserved TLS slots; the new
//! thread reads and clears both before any user code runs.

mod idcounter;
mod tcb;

pub mod spawn;
pub mod tids;

pub use spawn::{SpawnError, ThreadSpawner};
pub use tcb::with_current_tls;
pub use tids::{HostTids, LocalTids, TidPolicy};
