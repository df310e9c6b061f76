//! Résolution des disponibilités d'un intervenant.
//!
//! Pour chaque date : semaine type (jour non travaillé ⇒ rien), jours off
//! (toute la date tombe), fenêtre de réservation, puis soustraction des
//! réservations engagées et recherche d'un créneau aligné assez long.
//! Les plages hebdomadaires sont en heure murale du fuseau configuré ; les
//! réservations, absolues, y sont converties avant tout calcul.

mod sequencer;
mod slots;
mod types;

pub use sequencer::{RequestSequencer, Ticket};
pub use types::{BookingWindow, DateAvailability, DayStatus, TimeSlotAvailability};

use crate::config::{BookingPolicy, Config};
use crate::error::{CareError, Result};
use crate::model::{
    to_local, to_utc, BookingId, CarerCandidate, CarerId, OffDayException, WeeklySchedule,
};
use crate::storage::{BookingLedger, OffDayStore, ScheduleStore};
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use slots::Interval;
use std::collections::BTreeSet;
use tracing::debug;

const MAX_DURATION_MINUTES: u32 = 24 * 60;

/// Données d'un intervenant chargées une fois pour une plage de dates.
struct CarerContext {
    schedule: WeeklySchedule,
    off_days: Vec<OffDayException>,
    busy: Vec<Interval>,
}

pub struct AvailabilityResolver<'a> {
    schedules: &'a dyn ScheduleStore,
    off_days: &'a dyn OffDayStore,
    ledger: &'a dyn BookingLedger,
    policy: BookingPolicy,
    tz: Tz,
}

impl<'a> AvailabilityResolver<'a> {
    pub fn new(
        schedules: &'a dyn ScheduleStore,
        off_days: &'a dyn OffDayStore,
        ledger: &'a dyn BookingLedger,
        policy: BookingPolicy,
        tz: Tz,
    ) -> Self {
        Self {
            schedules,
            off_days,
            ledger,
            policy,
            tz,
        }
    }

    /// Raccourci quand un même magasin sert les trois collaborateurs.
    pub fn from_store<S>(store: &'a S, config: &Config) -> Self
    where
        S: ScheduleStore + OffDayStore + BookingLedger,
    {
        Self::new(store, store, store, config.policy, config.timezone)
    }

    pub fn booking_window(&self, today: NaiveDate) -> Result<BookingWindow> {
        self.policy.validate()?;
        BookingWindow::new(&self.policy, today)
    }

    /// Verdict détaillé pour une date. `exclude` retire du calcul la
    /// réservation en cours de modification.
    pub fn day_status(
        &self,
        carer: CarerId,
        date: NaiveDate,
        duration_minutes: u32,
        today: NaiveDate,
        exclude: Option<BookingId>,
    ) -> Result<DayStatus> {
        let duration = checked_duration(duration_minutes)?;
        let window = self.booking_window(today)?;
        let ctx = self.load_context(carer, date, date, exclude)?;
        Ok(self.evaluate(&ctx, date, duration, &window))
    }

    /// Toutes les dates de la fenêtre de réservation, dans l'ordre.
    pub fn available_dates(
        &self,
        carer: CarerId,
        duration_minutes: u32,
        today: NaiveDate,
        exclude: Option<BookingId>,
    ) -> Result<Vec<DateAvailability>> {
        let duration = checked_duration(duration_minutes)?;
        let window = self.booking_window(today)?;
        let ctx = self.load_context(carer, window.first, window.last, exclude)?;
        let dates: Vec<DateAvailability> = window
            .dates()
            .map(|date| DateAvailability {
                date,
                is_carer_available: self.evaluate(&ctx, date, duration, &window).is_available(),
            })
            .collect();
        debug!(
            carer = carer.get(),
            offered = dates.iter().filter(|d| d.is_carer_available).count(),
            total = dates.len(),
            "available dates resolved"
        );
        Ok(dates)
    }

    /// Tous les créneaux alignés de la journée de travail, marqués offerts
    /// ou non. Vide pour un jour non travaillé.
    pub fn available_time_slots(
        &self,
        carer: CarerId,
        duration_minutes: u32,
        date: NaiveDate,
        today: NaiveDate,
        exclude: Option<BookingId>,
    ) -> Result<Vec<TimeSlotAvailability>> {
        let duration = checked_duration(duration_minutes)?;
        let window = self.booking_window(today)?;
        let ctx = self.load_context(carer, date, date, exclude)?;
        let Some(hours) = ctx.schedule.window_on(date) else {
            return Ok(Vec::new());
        };
        let offered: BTreeSet<NaiveTime> = match self.evaluate(&ctx, date, duration, &window) {
            DayStatus::Available(times) => times.into_iter().collect(),
            _ => BTreeSet::new(),
        };
        let day = (date.and_time(hours.start), date.and_time(hours.end));
        Ok(
            slots::local_starts(&self.tz, day, self.policy.slot_step_minutes, duration)
                .into_iter()
                .map(|start| TimeSlotAvailability {
                    time_slot: start.time(),
                    is_carer_available: offered.contains(&start.time()),
                })
                .collect(),
        )
    }

    /// Intervenants connus, avec leur disponibilité pour un créneau précis.
    pub fn candidate_carers(
        &self,
        duration_minutes: u32,
        at: DateTime<Utc>,
        today: NaiveDate,
        exclude: Option<BookingId>,
    ) -> Result<Vec<CarerCandidate>> {
        let duration = checked_duration(duration_minutes)?;
        let window = self.booking_window(today)?;
        let local = to_local(&self.tz, at);
        let date = local.date();

        let mut out = Vec::new();
        for carer in self.schedules.carers()? {
            let ctx = self.load_context(carer, date, date, exclude)?;
            let is_available = match self.evaluate(&ctx, date, duration, &window) {
                DayStatus::Available(times) => times.contains(&local.time()),
                _ => false,
            };
            out.push(CarerCandidate {
                carer,
                is_available,
            });
        }
        Ok(out)
    }

    fn load_context(
        &self,
        carer: CarerId,
        first: NaiveDate,
        last: NaiveDate,
        exclude: Option<BookingId>,
    ) -> Result<CarerContext> {
        let schedule = self.schedules.weekly_schedule(carer)?;
        let off_days = self.off_days.off_days(carer)?;

        let from = to_utc(&self.tz, first.and_time(NaiveTime::MIN));
        let after_last = last.succ_opt().context("date overflow")?;
        let to = to_utc(&self.tz, after_last.and_time(NaiveTime::MIN));
        let busy = self
            .ledger
            .bookings_for(carer, from, to)?
            .into_iter()
            .filter(|b| b.status.occupies() && Some(b.id) != exclude)
            .map(|b| (to_local(&self.tz, b.start), to_local(&self.tz, b.end())))
            .collect();

        Ok(CarerContext {
            schedule,
            off_days,
            busy,
        })
    }

    fn evaluate(
        &self,
        ctx: &CarerContext,
        date: NaiveDate,
        duration: Duration,
        window: &BookingWindow,
    ) -> DayStatus {
        let Some(hours) = ctx.schedule.window_on(date) else {
            return DayStatus::NonWorkingDay;
        };
        if ctx.off_days.iter().any(|o| o.contains(date)) {
            return DayStatus::OffDay;
        }
        if !window.contains(date) {
            return DayStatus::OutsideBookingWindow;
        }

        let day = (date.and_time(hours.start), date.and_time(hours.end));
        let free = slots::free_intervals(&ctx.busy, day);
        let starts: Vec<NaiveTime> =
            slots::local_starts(&self.tz, day, self.policy.slot_step_minutes, duration)
                .into_iter()
                .filter(|start| slots::fits(&free, *start, *start + duration))
                .map(|start| start.time())
                .collect();

        if starts.is_empty() {
            DayStatus::FullyBooked
        } else {
            DayStatus::Available(starts)
        }
    }
}

fn checked_duration(minutes: u32) -> Result<Duration> {
    if minutes == 0 || minutes > MAX_DURATION_MINUTES {
        return Err(CareError::validation(
            "duration",
            format!("{minutes} minutes is outside 1..={MAX_DURATION_MINUTES}"),
        ));
    }
    Ok(Duration::minutes(i64::from(minutes)))
}
