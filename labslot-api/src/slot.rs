//! Slot grid - the fixed 30-minute granularity all reservations snap to.
//!
//! A slot is an instant whose Unix timestamp is a whole multiple of
//! [`SLOT_MINUTES`] minutes with no sub-second part. Reservations start and
//! end on slots; availability is queried per slot.

use chrono::{DateTime, Duration, Utc};

/// Slot granularity in minutes.
pub const SLOT_MINUTES: i64 = 30;

/// Slot granularity in seconds.
pub const SLOT_SECONDS: i64 = SLOT_MINUTES * 60;

/// Upper bound on slots evaluated by one availability query (six weeks).
pub const MAX_SLOTS_PER_QUERY: usize = 2016;

/// Returns true if `t` lies exactly on the slot grid.
pub fn is_aligned(t: &DateTime<Utc>) -> bool {
    t.timestamp_subsec_nanos() == 0 && t.timestamp().rem_euclid(SLOT_SECONDS) == 0
}

/// Round a positive duration up to the next multiple of the slot size.
///
/// Returns `None` for non-positive input or on overflow.
pub fn round_up_minutes(minutes: i64) -> Option<i64> {
    if minutes <= 0 {
        return None;
    }
    let slots = minutes.checked_add(SLOT_MINUTES - 1)? / SLOT_MINUTES;
    slots.checked_mul(SLOT_MINUTES)
}

/// Add `minutes` to `start`, returning `None` if the result is not representable.
pub fn end_after(start: &DateTime<Utc>, minutes: i64) -> Option<DateTime<Utc>> {
    let delta = Duration::try_minutes(minutes)?;
    start.checked_add_signed(delta)
}

/// Floor `t` to the slot that contains it.
pub fn floor(t: &DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp();
    let floored = secs - secs.rem_euclid(SLOT_SECONDS);
    DateTime::from_timestamp(floored, 0).unwrap_or(*t)
}

/// Enumerate the slots in `[start, end)`.
///
/// `start` is floored to the grid first so a misaligned range still yields
/// the slots covering it. Returns `None` if the range would produce more than
/// [`MAX_SLOTS_PER_QUERY`] slots.
pub fn slots_in_range(start: &DateTime<Utc>, end: &DateTime<Utc>) -> Option<Vec<DateTime<Utc>>> {
    let step = Duration::seconds(SLOT_SECONDS);
    let mut slots = Vec::new();
    let mut cursor = floor(start);
    while cursor < *end {
        if slots.len() == MAX_SLOTS_PER_QUERY {
            return None;
        }
        slots.push(cursor);
        cursor += step;
    }
    Some(slots)
}
