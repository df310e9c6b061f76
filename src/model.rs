use crate::error::{CareError, Result};
use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            pub fn new(id: $inner) -> Self {
                Self(id)
            }
            pub fn get(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

numeric_id!(
    /// Identifiant d'un intervenant (attribué par le système appelant)
    CarerId(u32)
);
numeric_id!(BookingId(u64));
numeric_id!(ServiceId(u32));
numeric_id!(ServiceDurationId(u32));

/// Identifiant fort pour un jour off
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OffDayId(String);

impl OffDayId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Index de jour de semaine, 0 = dimanche … 6 = samedi.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn weekday_name(weekday: u8) -> &'static str {
    WEEKDAY_NAMES[usize::from(weekday % 7)]
}

pub(crate) fn check_weekday(weekday: u8) -> Result<()> {
    if weekday > 6 {
        return Err(CareError::validation(
            "weekday",
            format!("{weekday} is outside 0..=6"),
        ));
    }
    Ok(())
}

/// Plage horaire locale (heure murale de l'intervenant), `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if end <= start {
            return Err(CareError::validation(
                "end_time",
                "end time must be strictly after start time",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Créneau de travail hebdomadaire d'un intervenant pour un jour donné.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    pub carer: CarerId,
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl WeeklyScheduleEntry {
    pub fn new(
        carer: CarerId,
        weekday: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Self> {
        let entry = Self {
            carer,
            weekday,
            start_time,
            end_time,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn validate(&self) -> Result<()> {
        check_weekday(self.weekday)?;
        TimeWindow::new(self.start_time, self.end_time)?;
        Ok(())
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// Semaine type d'un intervenant : au plus une plage par jour.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeeklySchedule {
    carer: Option<CarerId>,
    days: BTreeMap<u8, TimeWindow>,
}

impl WeeklySchedule {
    pub fn empty(carer: CarerId) -> Self {
        Self {
            carer: Some(carer),
            days: BTreeMap::new(),
        }
    }

    /// Construit la semaine en validant chaque entrée et l'unicité par jour.
    pub fn from_entries(carer: CarerId, entries: &[WeeklyScheduleEntry]) -> Result<Self> {
        let mut schedule = Self::empty(carer);
        for entry in entries {
            entry.validate()?;
            if entry.carer != carer {
                return Err(CareError::validation(
                    "carer",
                    format!("entry belongs to carer {}, expected {carer}", entry.carer),
                ));
            }
            if schedule.days.insert(entry.weekday, entry.window()).is_some() {
                return Err(CareError::validation(
                    "weekday",
                    format!("duplicate entry for {}", weekday_name(entry.weekday)),
                ));
            }
        }
        Ok(schedule)
    }

    pub fn carer(&self) -> Option<CarerId> {
        self.carer
    }

    pub fn window_for_weekday(&self, weekday: u8) -> Option<TimeWindow> {
        self.days.get(&weekday).copied()
    }

    pub fn window_on(&self, date: NaiveDate) -> Option<TimeWindow> {
        self.window_for_weekday(weekday_index(date))
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&weekday_index(date))
    }

    pub fn set_day(&mut self, weekday: u8, window: TimeWindow) -> Result<()> {
        check_weekday(weekday)?;
        self.days.insert(weekday, window);
        Ok(())
    }

    pub fn remove_day(&mut self, weekday: u8) -> bool {
        self.days.remove(&weekday).is_some()
    }

    pub fn entries(&self) -> Vec<WeeklyScheduleEntry> {
        let Some(carer) = self.carer else {
            return Vec::new();
        };
        self.days
            .iter()
            .map(|(weekday, w)| WeeklyScheduleEntry {
                carer,
                weekday: *weekday,
                start_time: w.start,
                end_time: w.end,
            })
            .collect()
    }
}

/// Exception de calendrier : plage fermée inclusive `[date_from, date_to]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffDayException {
    pub id: OffDayId,
    pub carer: CarerId,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl OffDayException {
    pub fn new(carer: CarerId, date_from: NaiveDate, date_to: NaiveDate) -> Result<Self> {
        let off_day = Self {
            id: OffDayId::random(),
            carer,
            date_from,
            date_to,
        };
        off_day.validate()?;
        Ok(off_day)
    }

    pub fn validate(&self) -> Result<()> {
        check_range(self.date_from, self.date_to)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.date_from <= date && date <= self.date_to
    }

    /// Nombre de jours couverts, bornes incluses.
    pub fn len_days(&self) -> i64 {
        (self.date_to - self.date_from).num_days() + 1
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.date_from
            .iter_days()
            .take_while(move |d| *d <= self.date_to)
    }
}

pub(crate) fn check_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        return Err(CareError::validation(
            "date_to",
            format!("{to} is before {from}"),
        ));
    }
    Ok(())
}

/// Aplatit des plages de jours off en dates individuelles.
pub fn expand_off_days(off_days: &[OffDayException]) -> BTreeSet<NaiveDate> {
    off_days.iter().flat_map(|o| o.dates()).collect()
}

/// Regroupe des dates triées en plages de jours consécutifs.
pub fn compact_dates(dates: &BTreeSet<NaiveDate>) -> Vec<(NaiveDate, NaiveDate)> {
    let mut ranges: Vec<(NaiveDate, NaiveDate)> = Vec::new();
    for date in dates {
        if let Some(last) = ranges.last_mut() {
            if last.1.succ_opt() == Some(*date) {
                last.1 = *date;
                continue;
            }
        }
        ranges.push((*date, *date));
    }
    ranges
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Une réservation occupe l'intervenant tant qu'elle n'est ni terminée ni annulée.
    pub fn occupies(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::InProgress)
    }
}

/// Réservation engagée (lecture seule), instant absolu UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingOccurrence {
    pub id: BookingId,
    pub carer: CarerId,
    pub service: ServiceId,
    pub start: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: BookingStatus,
}

impl BookingOccurrence {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn validate(&self) -> Result<()> {
        if self.duration_minutes == 0 {
            return Err(CareError::validation(
                "duration",
                format!("booking {} has a zero duration", self.id),
            ));
        }
        Ok(())
    }
}

/// Convertit un instant absolu en heure murale du fuseau de l'intervenant.
pub fn to_local<Z: TimeZone>(tz: &Z, instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(tz).naive_local()
}

/// Convertit une heure murale en instant absolu. Une heure tombant dans un
/// trou de changement d'heure est reportée au premier instant valide suivant.
pub fn to_utc<Z: TimeZone>(tz: &Z, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let mut probe = local;
            loop {
                probe += Duration::minutes(15);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    break dt.with_timezone(&Utc);
                }
            }
        }
    }
}

/// Intervenant proposé pour une réservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarerCandidate {
    pub carer: CarerId,
    pub is_available: bool,
}
