//! One-way abort flag shared across the suspension points of a wave.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-fire, monotonic abort signal. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns true only for the call that flipped it.
    pub fn trip(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
