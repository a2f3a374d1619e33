//! Pickup slots.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

/// Shop-local wall clock time of `at`.
#[must_use]
pub fn shop_local(at: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDateTime {
    at.naive_utc() + Duration::minutes(i64::from(utc_offset_minutes))
}

/// A pickup window in shop-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PickupSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub capacity: u32,
    /// Non-cancelled orders already booked for this start.
    pub booked: u32,
    /// Far enough ahead and not full.
    pub available: bool,
}

impl PickupSlot {
    /// Places left before the slot is full.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.booked)
    }
}
