//! Pickup slot generation.
//!
//! Slots are computed, not stored: every day in the booking window that is
//! not a closed day is cut into fixed-length slots between opening and
//! closing time, in shop-local time. A slot's booked count comes from the
//! non-cancelled orders picking up at its start.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, NaiveTime, Utc, Weekday};
use tracing::instrument;

use crate::config::SlotConfig;
use crate::db::{RepositoryError, Store};
use crate::models::PickupSlot;
use crate::models::slot::shop_local;

/// Why a slot cannot be booked.
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("no pickup slot starts at {0}")]
    Unknown(NaiveDateTime),

    #[error("the pickup slot at {0} is too soon, choose a later one")]
    TooSoon(NaiveDateTime),

    #[error("the pickup slot at {0} is full")]
    Full(NaiveDateTime),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Slot rules for the shop.
#[derive(Debug, Clone)]
pub struct SlotSchedule {
    config: SlotConfig,
}

impl SlotSchedule {
    #[must_use]
    pub const fn new(config: SlotConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Shop-local wall clock time for `now`.
    #[must_use]
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        shop_local(now, self.config.utc_offset_minutes)
    }

    /// Booking window `[start, end)`: from today's midnight, `days_ahead` days.
    #[must_use]
    pub fn window(&self, now: DateTime<Utc>) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.local_time(now).date().and_time(NaiveTime::MIN);
        let end = start + Duration::days(i64::from(self.config.days_ahead));
        (start, end)
    }

    /// Every slot in the window, with availability.
    #[must_use]
    pub fn generate(
        &self,
        now: DateTime<Utc>,
        booked: &HashMap<NaiveDateTime, u32>,
    ) -> Vec<PickupSlot> {
        let config = &self.config;
        let step = Duration::minutes(i64::from(config.slot_minutes.max(1)));
        let earliest = self.local_time(now) + Duration::minutes(i64::from(config.lead_minutes));
        let (window_start, _) = self.window(now);

        let mut slots = Vec::new();
        for offset in 0..config.days_ahead {
            let day = window_start.date() + Duration::days(i64::from(offset));
            if self.is_closed(day.weekday()) {
                continue;
            }
            let close = day.and_time(config.close);
            let mut start = day.and_time(config.open);
            while start + step <= close {
                let count = booked.get(&start).copied().unwrap_or(0);
                slots.push(PickupSlot {
                    start,
                    end: start + step,
                    capacity: config.capacity,
                    booked: count,
                    available: start >= earliest && count < config.capacity,
                });
                start += step;
            }
        }
        slots
    }

    /// Load bookings from `store` and list the slots.
    ///
    /// # Errors
    ///
    /// Returns a `RepositoryError` if bookings cannot be loaded.
    #[instrument(skip(self, store))]
    pub async fn list(
        &self,
        store: &dyn Store,
        now: DateTime<Utc>,
    ) -> Result<Vec<PickupSlot>, RepositoryError> {
        let (from, to) = self.window(now);
        let booked = store.count_booked_slots(from, to).await?;
        Ok(self.generate(now, &booked))
    }

    /// Check that `start` is a bookable slot right now.
    ///
    /// # Errors
    ///
    /// Returns `SlotError` if the slot does not exist, is too soon or is full.
    #[instrument(skip(self, store))]
    pub async fn ensure_available(
        &self,
        store: &dyn Store,
        start: NaiveDateTime,
        now: DateTime<Utc>,
    ) -> Result<PickupSlot, SlotError> {
        let slots = self.list(store, now).await?;
        let slot = slots
            .into_iter()
            .find(|s| s.start == start)
            .ok_or(SlotError::Unknown(start))?;
        if slot.available {
            return Ok(slot);
        }
        if slot.booked >= slot.capacity {
            Err(SlotError::Full(start))
        } else {
            Err(SlotError::TooSoon(start))
        }
    }

    fn is_closed(&self, weekday: Weekday) -> bool {
        self.config.closed_days.contains(&weekday)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn schedule() -> SlotSchedule {
        SlotSchedule::new(SlotConfig::default())
    }

    /// Tuesday 2 June 2026, 08:00 UTC = 09:00 shop time.
    fn tuesday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 2, 8, 0, 0).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_generates_week_without_closed_day() {
        let slots = schedule().generate(tuesday_morning(), &HashMap::new());
        // 07:00-19:00 in 30 minute steps = 24 slots/day, 6 open days out of 7.
        assert_eq!(slots.len(), 24 * 6);
        assert_eq!(slots.first().unwrap().start, at(2, 7, 0));
        // Monday 8 June is closed, so the week ends on Sunday evening.
        assert_eq!(slots.last().unwrap().end, at(7, 19, 0));
        assert!(slots.iter().all(|s| s.start.weekday() != Weekday::Mon));
    }

    #[test]
    fn test_lead_time() {
        let slots = schedule().generate(tuesday_morning(), &HashMap::new());
        let find = |start| slots.iter().find(|s| s.start == start).unwrap();
        // Shop time is 09:00, lead time two hours.
        assert!(!find(at(2, 10, 30)).available);
        assert!(find(at(2, 11, 0)).available);
    }

    #[test]
    fn test_full_slot() {
        let mut booked = HashMap::new();
        booked.insert(at(3, 9, 0), 10);
        booked.insert(at(3, 9, 30), 9);
        let slots = schedule().generate(tuesday_morning(), &booked);
        let find = |start| slots.iter().find(|s| s.start == start).unwrap();
        assert!(!find(at(3, 9, 0)).available);
        assert_eq!(find(at(3, 9, 30)).remaining(), 1);
        assert!(find(at(3, 9, 30)).available);
    }

    #[test]
    fn test_window() {
        let (start, end) = schedule().window(tuesday_morning());
        assert_eq!(start, at(2, 0, 0));
        assert_eq!(end, at(9, 0, 0));
    }

    #[tokio::test]
    async fn test_ensure_available() {
        let store = crate::db::MemoryStore::new();
        let schedule = schedule();
        let now = tuesday_morning();

        assert!(schedule.ensure_available(&store, at(3, 9, 0), now).await.is_ok());
        assert!(matches!(
            schedule.ensure_available(&store, at(3, 9, 10), now).await,
            Err(SlotError::Unknown(_))
        ));
        assert!(matches!(
            schedule.ensure_available(&store, at(2, 9, 30), now).await,
            Err(SlotError::TooSoon(_))
        ));
        assert!(matches!(
            schedule.ensure_available(&store, at(8, 9, 0), now).await,
            Err(SlotError::Unknown(_))
        ));
    }
}
