use crate::config::BookingPolicy;
use crate::error::Result;
use anyhow::Context;
use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Disponibilité d'un intervenant sur une date de la fenêtre de réservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateAvailability {
    pub date: NaiveDate,
    pub is_carer_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotAvailability {
    pub time_slot: NaiveTime,
    pub is_carer_available: bool,
}

/// Verdict pour une date, dans l'ordre où les règles sont appliquées.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "slots")]
pub enum DayStatus {
    /// Débuts de créneau offerts (heure murale), triés.
    Available(Vec<NaiveTime>),
    NonWorkingDay,
    OffDay,
    OutsideBookingWindow,
    FullyBooked,
}

impl DayStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Fenêtre de réservation `[today + lead, today + lead + span - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookingWindow {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl BookingWindow {
    pub fn new(policy: &BookingPolicy, today: NaiveDate) -> Result<Self> {
        let first = today
            .checked_add_days(Days::new(u64::from(policy.min_lead_days)))
            .context("booking window start overflows")?;
        let span = u64::from(policy.window_span_days.max(1)) - 1;
        let last = first
            .checked_add_days(Days::new(span))
            .context("booking window end overflows")?;
        Ok(Self { first, last })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first.iter_days().take_while(move |d| *d <= self.last)
    }
}
