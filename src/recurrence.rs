//! Séries de réservations récurrentes.
//!
//! La date de fin affichée et la génération des occurrences passent par la
//! même fonction [`series_end_date`] : la dernière occurrence produite ne peut
//! pas diverger de la fin annoncée.

use crate::error::{CareError, Result};
use crate::model::{weekday_index, weekday_name};
use anyhow::Context;
use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Fortnightly,
    Monthly,
}

impl FromStr for Frequency {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "fortnightly" => Ok(Self::Fortnightly),
            "monthly" => Ok(Self::Monthly),
            other => Err(CareError::validation(
                "frequency",
                format!("unknown frequency {other:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Week,
    Month,
}

impl DurationUnit {
    /// Borne haute acceptée pour une durée personnalisée.
    pub fn custom_max(self) -> u32 {
        match self {
            Self::Week => 24,
            Self::Month => 6,
        }
    }
}

impl FromStr for DurationUnit {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" | "weeks" => Ok(Self::Week),
            "month" | "months" => Ok(Self::Month),
            other => Err(CareError::validation(
                "duration_unit",
                format!("unknown duration unit {other:?}"),
            )),
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Week => f.write_str("Week"),
            Self::Month => f.write_str("Month"),
        }
    }
}

/// Durée proposée d'office ou saisie librement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationKind {
    Canned,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceSpec {
    pub is_recurring: bool,
    pub frequency: Frequency,
    pub duration_value: u32,
    pub duration_unit: DurationUnit,
}

impl RecurrenceSpec {
    pub fn new(frequency: Frequency, duration_value: u32, duration_unit: DurationUnit) -> Self {
        Self {
            is_recurring: true,
            frequency,
            duration_value,
            duration_unit,
        }
    }

    /// Réservation ponctuelle.
    pub fn once() -> Self {
        Self {
            is_recurring: false,
            frequency: Frequency::Weekly,
            duration_value: 0,
            duration_unit: DurationUnit::Week,
        }
    }

    pub fn duration_kind(&self) -> DurationKind {
        let pair = (self.duration_value, self.duration_unit);
        if canned_durations(self.frequency).contains(&pair) {
            DurationKind::Canned
        } else {
            DurationKind::Custom
        }
    }
}

use DurationUnit::{Month, Week};

const DAILY_DURATIONS: &[(u32, DurationUnit)] = &[
    (1, Week),
    (2, Week),
    (3, Week),
    (1, Month),
    (2, Month),
    (3, Month),
    (6, Month),
];
const WEEKLY_DURATIONS: &[(u32, DurationUnit)] =
    &[(2, Week), (3, Week), (1, Month), (2, Month), (3, Month), (6, Month)];
const LONG_DURATIONS: &[(u32, DurationUnit)] = &[(1, Month), (2, Month), (3, Month), (6, Month)];

/// Durées proposées pour une fréquence donnée.
pub fn canned_durations(frequency: Frequency) -> &'static [(u32, DurationUnit)] {
    match frequency {
        Frequency::Daily => DAILY_DURATIONS,
        Frequency::Weekly => WEEKLY_DURATIONS,
        Frequency::Fortnightly | Frequency::Monthly => LONG_DURATIONS,
    }
}

/// `start + N unités - 1 jour`, fin de mois bornée au dernier jour.
pub fn series_end_date(start: NaiveDate, value: u32, unit: DurationUnit) -> Result<NaiveDate> {
    if value == 0 {
        return Err(CareError::validation(
            "duration_value",
            "duration must be at least 1",
        ));
    }
    let after = match unit {
        DurationUnit::Week => start.checked_add_days(Days::new(7 * u64::from(value))),
        DurationUnit::Month => start.checked_add_months(Months::new(value)),
    };
    let end = after
        .and_then(|d| d.pred_opt())
        .context("series end date overflows")?;
    Ok(end)
}

/// Date de début et fin retenues pour une série.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesSummary {
    pub series_end_date: NaiveDate,
    pub description: String,
    pub kind: Option<DurationKind>,
}

/// k-ième occurrence à partir de l'ancre (k = 0 pour l'ancre elle-même).
fn nth_occurrence(
    frequency: Frequency,
    anchor: NaiveDateTime,
    k: u32,
) -> Option<NaiveDateTime> {
    match frequency {
        Frequency::Daily => anchor.checked_add_days(Days::new(u64::from(k))),
        Frequency::Weekly => anchor.checked_add_days(Days::new(7 * u64::from(k))),
        Frequency::Fortnightly => anchor.checked_add_days(Days::new(14 * u64::from(k))),
        Frequency::Monthly => anchor.checked_add_months(Months::new(k)),
    }
}

/// Valide la durée et retourne la date de fin de série. Une durée
/// personnalisée doit tenir dans ses bornes ; une semaine hebdomadaire seule
/// n'est jamais une série.
fn validated_end(spec: &RecurrenceSpec, start: NaiveDateTime) -> Result<NaiveDate> {
    let pair = (spec.duration_value, spec.duration_unit);
    if spec.frequency == Frequency::Weekly && pair == (1, Week) {
        return Err(CareError::validation(
            "duration_value",
            "a weekly series of 1 Week holds a single occurrence",
        ));
    }
    if spec.duration_kind() == DurationKind::Custom {
        let max = spec.duration_unit.custom_max();
        if spec.duration_value == 0 || spec.duration_value > max {
            warn!(
                value = spec.duration_value,
                unit = %spec.duration_unit,
                "custom recurrence duration out of bounds"
            );
            return Err(CareError::validation(
                "duration_value",
                format!(
                    "custom duration must be 1..={max} {}(s), got {}",
                    spec.duration_unit, spec.duration_value
                ),
            ));
        }
    }
    series_end_date(start.date(), spec.duration_value, spec.duration_unit)
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (1, n) if n != 11 => "st",
        (2, n) if n != 12 => "nd",
        (3, n) if n != 13 => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}

fn pattern(frequency: Frequency, start: NaiveDate) -> String {
    match frequency {
        Frequency::Daily => "every day".to_string(),
        Frequency::Weekly => format!("every {}", weekday_name(weekday_index(start))),
        Frequency::Fortnightly => format!(
            "every second week on {}",
            weekday_name(weekday_index(start))
        ),
        Frequency::Monthly => format!("every month on the {}", ordinal(start.day())),
    }
}

/// Date de fin et libellé lisible d'une série ancrée à `start`.
pub fn summarize(spec: &RecurrenceSpec, start: NaiveDateTime) -> Result<SeriesSummary> {
    let date = start.date();
    let time = start.format("%H:%M");
    if !spec.is_recurring {
        return Ok(SeriesSummary {
            series_end_date: date,
            description: format!("once on {date} at {time}"),
            kind: None,
        });
    }

    let end = validated_end(spec, start)?;
    let description = format!(
        "{} at {time}, starting {date} until {end}",
        pattern(spec.frequency, date)
    );
    debug!(%description, "recurrence summarized");
    Ok(SeriesSummary {
        series_end_date: end,
        description,
        kind: Some(spec.duration_kind()),
    })
}

/// Occurrences concrètes de la série, ancre comprise, jusqu'à la date de fin
/// incluse.
pub fn expand_occurrences(
    spec: &RecurrenceSpec,
    start: NaiveDateTime,
) -> Result<Vec<NaiveDateTime>> {
    if !spec.is_recurring {
        return Ok(vec![start]);
    }
    let end = validated_end(spec, start)?;
    let mut out = Vec::new();
    for k in 0.. {
        let Some(occurrence) = nth_occurrence(spec.frequency, start, k) else {
            break;
        };
        if occurrence.date() > end {
            break;
        }
        out.push(occurrence);
    }
    Ok(out)
}
