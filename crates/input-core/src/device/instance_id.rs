//! Session identifiers for opened devices.
//!
//! Every time a device is announced it receives a fresh [`InstanceId`].  The
//! allocator only ever counts upwards, so an id can never be handed to a
//! different physical device while somebody still holds the old one: unplugging
//! a pad and plugging it back in yields a strictly greater id.
//!
//! # Thread safety
//!
//! The counter is an `AtomicU32`.  Producers allocate from their own thread
//! while the application reads ids from events, and `fetch_add` guarantees no
//! two callers ever observe the same value.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Stable integer identifying one device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of [`InstanceId`]s.
///
/// # Examples
///
/// ```rust
/// use input_core::device::InstanceIdAllocator;
///
/// let ids = InstanceIdAllocator::new();
/// let first = ids.allocate();
/// assert!(ids.allocate() > first);
/// ```
#[derive(Debug)]
pub struct InstanceIdAllocator {
    next: AtomicU32,
}

impl InstanceIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
        }
    }

    /// Returns a never-before-seen id.
    ///
    /// `Relaxed` is enough: ids only need to be unique and increasing, they do
    /// not publish any other memory.
    pub fn allocate(&self) -> InstanceId {
        InstanceId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the id the next call to [`allocate`](Self::allocate) would hand out.
    pub fn peek(&self) -> InstanceId {
        InstanceId(self.next.load(Ordering::Relaxed))
    }
}

impl Default for InstanceIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
