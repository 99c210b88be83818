//! Volume-local monotonic clock

use serde::{Deserialize, Serialize};

/// Monotonic change counter. Wraparound is not expected within a session.
pub type Timestamp = u32;

/// Explicit monotonic counter owned by a single volume.
///
/// Every voxel write and every sync tick advances it, so any two events on a
/// volume are totally ordered by their stamps. Zero is reserved for "never".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    now: Timestamp,
}

impl Clock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self { now: 0 }
    }

    /// Current time without advancing
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Advance the clock and return the new time
    pub fn advance(&mut self) -> Timestamp {
        self.now += 1;
        self.now
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_monotonic() {
        let mut clock = Clock::new();
        assert_eq!(clock.now(), 0);
        let a = clock.advance();
        let b = clock.advance();
        assert!(b > a);
        assert_eq!(clock.now(), b);
    }
}
