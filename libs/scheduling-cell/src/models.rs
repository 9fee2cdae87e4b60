use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of appointments that may share a single slot start time.
pub const SLOT_CAPACITY: usize = 3;

pub const DEFAULT_SLOT_INTERVAL_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Weekday,
    Saturday,
    Sunday,
    PublicHoliday,
}

impl DayType {
    /// Classifies a calendar date. A public holiday wins over the weekday
    /// lookup, so a holiday that falls on a Saturday uses holiday hours.
    pub fn for_date(date: NaiveDate, public_holidays: &[NaiveDate]) -> Self {
        if public_holidays.contains(&date) {
            return DayType::PublicHoliday;
        }

        match date.weekday() {
            Weekday::Sat => DayType::Saturday,
            Weekday::Sun => DayType::Sunday,
            _ => DayType::Weekday,
        }
    }
}

/// One opening window, stored as raw "HH:MM" strings the way the admin
/// front desk submits them. Parsing happens at the point of use so a bad
/// window degrades to "closed" instead of poisoning the whole record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursWindow {
    pub start: String,
    pub end: String,
}

impl HoursWindow {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    /// Returns the parsed bounds, or None when either bound is malformed
    /// or the window is empty or inverted.
    pub fn parse(&self) -> Option<(NaiveTime, NaiveTime)> {
        let start = NaiveTime::parse_from_str(&self.start, "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(&self.end, "%H:%M").ok()?;

        if start >= end {
            return None;
        }

        Some((start, end))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayHours {
    pub am: Option<HoursWindow>,
    pub pm: Option<HoursWindow>,
}

impl DayHours {
    pub fn windows(&self) -> impl Iterator<Item = &HoursWindow> {
        self.am.iter().chain(self.pm.iter())
    }

    pub fn closed() -> Self {
        Self { am: None, pm: None }
    }
}

/// Per-clinic opening hours, one `DayHours` per day class plus the slot
/// interval and the clinic's public holiday calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicHours {
    pub clinic_id: Uuid,
    pub weekdays: DayHours,
    pub saturday: DayHours,
    pub sunday: DayHours,
    pub public_holiday: DayHours,
    #[serde(default = "default_slot_interval")]
    pub slot_interval_minutes: i64,
    #[serde(default)]
    pub public_holidays: Vec<NaiveDate>,
}

fn default_slot_interval() -> i64 {
    DEFAULT_SLOT_INTERVAL_MINUTES
}

impl ClinicHours {
    pub fn day_hours(&self, day_type: DayType) -> &DayHours {
        match day_type {
            DayType::Weekday => &self.weekdays,
            DayType::Saturday => &self.saturday,
            DayType::Sunday => &self.sunday,
            DayType::PublicHoliday => &self.public_holiday,
        }
    }

    pub fn is_public_holiday(&self, date: NaiveDate) -> bool {
        self.public_holidays.contains(&date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub full_name: String,
    pub working_days: Vec<u32>, // 1 = Monday .. 7 = Sunday
}

impl Doctor {
    /// An empty shift roster means the doctor never consults.
    pub fn works_on(&self, date: NaiveDate) -> bool {
        self.working_days
            .contains(&date.weekday().number_from_monday())
    }
}

/// A slot claim held by an existing appointment, used when counting how
/// much of a slot's capacity is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookedSlot {
    pub appointment_id: Uuid,
    pub starts_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub starts_at: DateTime<Utc>,
    pub scheduled: usize,
    pub remaining: usize,
}

impl SlotAvailability {
    pub fn is_full(&self) -> bool {
        self.remaining == 0
    }
}

// Request payloads for the directory endpoints.

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertClinicHoursRequest {
    #[serde(default)]
    pub weekdays: DayHours,
    #[serde(default)]
    pub saturday: DayHours,
    #[serde(default)]
    pub sunday: DayHours,
    #[serde(default)]
    pub public_holiday: DayHours,
    #[serde(default = "default_slot_interval")]
    pub slot_interval_minutes: i64,
    #[serde(default)]
    pub public_holidays: Vec<NaiveDate>,
}

impl UpsertClinicHoursRequest {
    pub fn into_hours(self, clinic_id: Uuid) -> ClinicHours {
        ClinicHours {
            clinic_id,
            weekdays: self.weekdays,
            saturday: self.saturday,
            sunday: self.sunday,
            public_holiday: self.public_holiday,
            slot_interval_minutes: self.slot_interval_minutes,
            public_holidays: self.public_holidays,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDoctorRequest {
    pub clinic_id: Uuid,
    pub full_name: String,
    pub working_days: Vec<u32>,
}

impl RegisterDoctorRequest {
    pub fn into_doctor(self) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            clinic_id: self.clinic_id,
            full_name: self.full_name,
            working_days: self.working_days,
        }
    }
}
