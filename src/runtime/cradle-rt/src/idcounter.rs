//! Implements a simple unique reusable ID counter.

use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Mutex,
};

/// A manager for IDs of size u32. Hands out fresh IDs from a bounded range,
/// preferring previously released ones.
pub(crate) struct IdCounter {
    next: AtomicU32,
    last: u32,
    stack_non_empty: AtomicBool,
    stack: Mutex<Vec<u32>>,
}

impl IdCounter {
    /// Create a new IdCounter handing out IDs starting from 1.
    pub const fn new_one() -> Self {
        Self::bounded(1, u32::MAX)
    }

    /// Create a new IdCounter handing out IDs in `first..=last`. The value
    /// `u32::MAX` itself is never issued: the counter must be able to step
    /// past the last ID it hands out.
    pub const fn bounded(first: u32, last: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
            last,
            stack_non_empty: AtomicBool::new(false),
            stack: Mutex::new(Vec::new()),
        }
    }

    fn get_from_stack(&self) -> Option<u32> {
        self.stack.lock().unwrap().pop()
    }

    /// Return a fresh ID, that is, either a new ID or one that has been
    /// previously released. `None` means the range is exhausted.
    pub fn fresh(&self) -> Option<u32> {
        // Quickly check to see if we need to think about the stack.
        if self.stack_non_empty.load(Ordering::SeqCst) {
            if let Some(x) = self.get_from_stack() {
                // Got an old ID we can use.
                return Some(x);
            }
        }

        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                if next <= self.last {
                    next.checked_add(1)
                } else {
                    None
                }
            })
            .ok()
    }

    /// Release an ID so that it may be reused in the future. Note: it may
    /// not be immediately reused.
    pub fn release(&self, id: u32) {
        // First see if we can just subtract the next counter.
        if self
            .next
            .compare_exchange(id + 1, id, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return;
        }
        self.stack.lock().unwrap().push(id);
        self.stack_non_empty.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_one() {
        let ic = IdCounter::new_one();
        assert_eq!(ic.fresh(), Some(1))
    }

    #[test]
    fn test_fresh_simple() {
        let ic = IdCounter::bounded(0, u32::MAX - 1);
        assert_eq!(ic.fresh(), Some(0));
        assert_eq!(ic.fresh(), Some(1));
        assert_eq!(ic.fresh(), Some(2));

        ic.release(1);
        assert_eq!(ic.fresh(), Some(1));

        ic.release(2);
        ic.release(1);
        assert_eq!(ic.fresh(), Some(1));
    }

    #[test]
    fn test_upper_bound_is_reserved() {
        let ic = IdCounter::bounded(u32::MAX - 2, u32::MAX);
        assert_eq!(ic.fresh(), Some(u32::MAX - 2));
        assert_eq!(ic.fresh(), Some(u32::MAX - 1));
        // u32::MAX is never issued; the counter cannot step past it.
        assert_eq!(ic.fresh(), None);

        ic.release(u32::MAX - 1);
        assert_eq!(ic.fresh(), Some(u32::MAX - 1));
    }

    #[test]
    fn test_exhaustion() {
        let ic = IdCounter::bounded(1, 2);
        assert_eq!(ic.fresh(), Some(1));
        assert_eq!(ic.fresh(), Some(2));
        assert_eq!(ic.fresh(), None);

        // Released IDs become available again even after exhaustion.
        ic.release(2);
        assert_eq!(ic.fresh(), Some(2));
        assert_eq!(ic.fresh(), None);
    }
}
