//! The per-thread storage block shared between the runtime and the host.

use core::sync::atomic::{AtomicUsize, Ordering};

use static_assertions::const_assert;

/// Slot holding a pointer to the block itself.
pub const TLS_SLOT_SELF: usize = 0;
/// Slot holding the thread's id once higher-level setup records it.
pub const TLS_SLOT_THREAD_ID: usize = 1;
/// Slot holding the thread's errno value.
pub const TLS_SLOT_ERRNO: usize = 2;
/// Reserved for host API bindings. Unused during early thread bring-up.
pub const TLS_SLOT_API0: usize = 3;
/// Reserved for host API bindings. Unused during early thread bring-up.
pub const TLS_SLOT_API1: usize = 4;
/// Total number of slots in a block.
pub const TLS_SLOT_COUNT: usize = 8;

const_assert!(TLS_SLOT_API0 != TLS_SLOT_API1);
const_assert!(TLS_SLOT_API1 < TLS_SLOT_COUNT);

/// A per-thread memory region addressable by fixed slot indices.
///
/// The layout contract with the host places the thread's stack immediately
/// below the block in address space, so the block's address doubles as the
/// upper bound of the new thread's stack.
#[repr(C, align(16))]
pub struct TlsBlock {
    slots: [AtomicUsize; TLS_SLOT_COUNT],
}

const_assert!(core::mem::align_of::<TlsBlock>() % 16 == 0);

impl TlsBlock {
    #[allow(clippy::declare_interior_mutable_const)]
    const ZERO: AtomicUsize = AtomicUsize::new(0);

    pub const fn new() -> Self {
        Self {
            slots: [Self::ZERO; TLS_SLOT_COUNT],
        }
    }

    pub fn get(&self, slot: usize) -> usize {
        self.slots[slot].load(Ordering::SeqCst)
    }

    pub fn set(&self, slot: usize, value: usize) {
        self.slots[slot].store(value, Ordering::SeqCst)
    }

    /// Read a slot and clear it in a single step.
    pub fn take(&self, slot: usize) -> usize {
        self.slots[slot].swap(0, Ordering::SeqCst)
    }
}

impl Default for TlsBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_blocks_are_zeroed() {
        let tls = TlsBlock::new();
        for slot in 0..TLS_SLOT_COUNT {
            assert_eq!(tls.get(slot), 0);
        }
    }

    #[test]
    fn take_clears_the_slot() {
        let tls = TlsBlock::new();
        tls.set(TLS_SLOT_API0, 0x1234);
        assert_eq!(tls.take(TLS_SLOT_API0), 0x1234);
        assert_eq!(tls.get(TLS_SLOT_API0), 0);
        assert_eq!(tls.take(TLS_SLOT_API0), 0);
    }
}
