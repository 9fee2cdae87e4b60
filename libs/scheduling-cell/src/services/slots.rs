use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    BookedSlot, ClinicHours, DayType, Doctor, SlotAvailability, DEFAULT_SLOT_INTERVAL_MINUTES,
    SLOT_CAPACITY,
};

/// Expands a clinic's configured hours for one calendar day into concrete
/// slot start times, in UTC.
///
/// A slot is emitted only when the full interval fits inside its window,
/// and only when it starts strictly after `now`. Malformed or inverted
/// windows are skipped. Overlapping morning and afternoon windows are
/// collapsed so each start time appears once, in ascending order.
pub fn generate_slots(
    hours: &ClinicHours,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let day_type = DayType::for_date(date, &hours.public_holidays);
    let day_hours = hours.day_hours(day_type);

    // A non-positive interval would never advance the walk.
    let interval = if hours.slot_interval_minutes > 0 {
        hours.slot_interval_minutes
    } else {
        DEFAULT_SLOT_INTERVAL_MINUTES
    };
    let step = Duration::minutes(interval);

    let mut slots = Vec::new();

    for window in day_hours.windows() {
        let Some((start, end)) = window.parse() else {
            continue;
        };

        let end_datetime = date.and_time(end).and_utc();
        let mut current_time = date.and_time(start).and_utc();

        while current_time + step <= end_datetime {
            if current_time > now {
                slots.push(current_time);
            }
            current_time += step;
        }
    }

    slots.sort();
    slots.dedup();
    slots
}

/// Pairs each generated slot for a doctor's day with how much of its
/// capacity is already taken.
///
/// `booked` is the snapshot of live claims against this doctor's pool
/// for the same day; `exclude_appointment` removes one appointment's own
/// claim from the count so a reschedule does not block itself. A doctor
/// who is not rostered on that weekday has no slots at all.
pub fn slot_availability(
    hours: &ClinicHours,
    doctor: &Doctor,
    date: NaiveDate,
    booked: &[BookedSlot],
    now: DateTime<Utc>,
    exclude_appointment: Option<Uuid>,
) -> Vec<SlotAvailability> {
    if !doctor.works_on(date) {
        return Vec::new();
    }

    generate_slots(hours, date, now)
        .into_iter()
        .map(|starts_at| {
            let scheduled = booked
                .iter()
                .filter(|slot| slot.starts_at == starts_at)
                .filter(|slot| exclude_appointment != Some(slot.appointment_id))
                .count();

            SlotAvailability {
                starts_at,
                scheduled,
                // Saturates so an overbooked slot reads as zero remaining
                // rather than wrapping.
                remaining: SLOT_CAPACITY.saturating_sub(scheduled),
            }
        })
        .collect()
}
