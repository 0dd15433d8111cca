//! Load request tokens
//!
//! Every issued model load is identified by a [`LoadRequestId`]. The id is
//! returned to the caller at issuance time and threaded through every
//! completion event for that load, so completions can be matched to the
//! request that caused them without comparing file paths.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Token identifying one issued load
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadRequestId(u64);

impl LoadRequestId {
    /// Create a request id from a raw value
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get raw ID value
    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoadRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Hands out monotonically increasing request ids
#[derive(Debug)]
pub struct RequestIdAllocator {
    next: AtomicU64,
}

impl RequestIdAllocator {
    /// Create an allocator whose first id is 1
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id
    pub fn allocate(&self) -> LoadRequestId {
        LoadRequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let alloc = RequestIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(a.id(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(LoadRequestId::new(7).to_string(), "req#7");
    }
}
