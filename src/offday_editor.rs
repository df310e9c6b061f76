//! Éditeur de calendrier des jours off.
//!
//! L'état est immuable : chaque clic passe par [`transition`], ce qui rend
//! l'éditeur testable sans couche d'affichage. L'éditeur
//! [`OffDayCalendarEditor`] ne fait qu'enrober ce réducteur avec les accès au
//! magasin pour l'ouverture, l'enregistrement et le changement d'année.

use crate::error::{CareError, Result};
use crate::model::{weekday_index, CarerId, OffDayException, WeeklySchedule};
use crate::storage::{OffDayStore, ScheduleStore};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// État d'affichage d'une date, recalculé à chaque rendu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarDayState {
    WorkingAvailable,
    NonWorkingDay,
    OriginalOffDay,
    PendingAddition,
    PendingRemoval,
}

impl CalendarDayState {
    /// Caractère utilisé par le rendu texte de la grille.
    pub fn glyph(self) -> char {
        match self {
            Self::WorkingAvailable => '.',
            Self::NonWorkingDay => '-',
            Self::OriginalOffDay => 'O',
            Self::PendingAddition => '+',
            Self::PendingRemoval => 'x',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    Toggle(NaiveDate),
    Discard,
    /// Enregistrement réussi : `dates` devient la référence persistée.
    Committed {
        dates: Vec<NaiveDate>,
        schedule: WeeklySchedule,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    period: (NaiveDate, NaiveDate),
    schedule: WeeklySchedule,
    original: BTreeSet<NaiveDate>,
    pending: BTreeSet<NaiveDate>,
}

impl EditorState {
    /// `off_days` sont dépliés en dates ; seules celles de `period` comptent.
    pub fn new(
        period: (NaiveDate, NaiveDate),
        schedule: WeeklySchedule,
        off_days: &[OffDayException],
    ) -> Result<Self> {
        crate::model::check_range(period.0, period.1)?;
        let original = off_days
            .iter()
            .flat_map(|o| o.dates())
            .filter(|d| period.0 <= *d && *d <= period.1)
            .collect();
        Ok(Self {
            period,
            schedule,
            original,
            pending: BTreeSet::new(),
        })
    }

    pub fn period(&self) -> (NaiveDate, NaiveDate) {
        self.period
    }

    pub fn pending(&self) -> &BTreeSet<NaiveDate> {
        &self.pending
    }

    pub fn has_pending_edits(&self) -> bool {
        !self.pending.is_empty()
    }

    fn in_period(&self, date: NaiveDate) -> bool {
        self.period.0 <= date && date <= self.period.1
    }

    pub fn day_state(&self, date: NaiveDate) -> CalendarDayState {
        if !self.schedule.is_working_day(date) {
            return CalendarDayState::NonWorkingDay;
        }
        match (self.original.contains(&date), self.pending.contains(&date)) {
            (true, true) => CalendarDayState::PendingRemoval,
            (true, false) => CalendarDayState::OriginalOffDay,
            (false, true) => CalendarDayState::PendingAddition,
            (false, false) => CalendarDayState::WorkingAvailable,
        }
    }

    /// `(originaux ∪ ajouts) − retraits`, limité aux jours travaillés de
    /// `current`, la semaine type relue au moment de l'enregistrement.
    pub fn final_selection(&self, current: &WeeklySchedule) -> Vec<NaiveDate> {
        self.original
            .symmetric_difference(&self.pending)
            .copied()
            .filter(|d| current.is_working_day(*d))
            .collect()
    }

    /// Grille du mois, semaines commençant le dimanche.
    pub fn month_grid(&self, year: i32, month: u32) -> Result<Vec<Week>> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            CareError::validation("month", format!("{year}-{month} is not a valid month"))
        })?;
        let mut weeks = Vec::new();
        let mut week: Week = [None; 7];
        for date in first.iter_days().take_while(|d| d.month() == month) {
            let col = usize::from(weekday_index(date));
            week[col] = Some(DayCell {
                date,
                state: self.day_state(date),
            });
            if col == 6 {
                weeks.push(week);
                week = [None; 7];
            }
        }
        if week.iter().any(Option::is_some) {
            weeks.push(week);
        }
        Ok(weeks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub state: CalendarDayState,
}

pub type Week = [Option<DayCell>; 7];

/// `state' = transition(state, event)`. Un clic sur un jour non travaillé ou
/// hors période est sans effet ; deux clics ramènent à l'état d'origine.
pub fn transition(state: &EditorState, event: EditorEvent) -> EditorState {
    let mut next = state.clone();
    match event {
        EditorEvent::Toggle(date) => {
            if !state.in_period(date) || state.day_state(date) == CalendarDayState::NonWorkingDay
            {
                return next;
            }
            if !next.pending.remove(&date) {
                next.pending.insert(date);
            }
        }
        EditorEvent::Discard => next.pending.clear(),
        EditorEvent::Committed { dates, schedule } => {
            next.original = dates.into_iter().filter(|d| state.in_period(*d)).collect();
            next.pending.clear();
            next.schedule = schedule;
        }
    }
    next
}

fn year_period(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1);
    let last = NaiveDate::from_ymd_opt(year, 12, 31);
    first
        .zip(last)
        .ok_or_else(|| CareError::validation("year", format!("{year} is out of range")))
}

/// Édition interactive des jours off d'un intervenant, une année à la fois.
pub struct OffDayCalendarEditor<'a, S> {
    store: &'a mut S,
    carer: CarerId,
    year: i32,
    state: EditorState,
}

impl<'a, S> OffDayCalendarEditor<'a, S>
where
    S: ScheduleStore + OffDayStore,
{
    pub fn open(store: &'a mut S, carer: CarerId, year: i32) -> Result<Self> {
        let state = load_state(&*store, carer, year)?;
        Ok(Self {
            store,
            carer,
            year,
            state,
        })
    }

    pub fn carer(&self) -> CarerId {
        self.carer
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn day_state(&self, date: NaiveDate) -> CalendarDayState {
        self.state.day_state(date)
    }

    /// Bascule une date et retourne son nouvel état. Ne peut pas échouer.
    pub fn toggle(&mut self, date: NaiveDate) -> CalendarDayState {
        self.state = transition(&self.state, EditorEvent::Toggle(date));
        let state = self.state.day_state(date);
        debug!(carer = self.carer.get(), %date, ?state, "off-day toggled");
        state
    }

    /// Abandonne les modifications en cours sans toucher au magasin.
    pub fn discard(&mut self) {
        self.state = transition(&self.state, EditorEvent::Discard);
    }

    /// Enregistre la sélection finale. En cas d'échec, les modifications en
    /// cours sont conservées.
    pub fn commit(&mut self) -> Result<Vec<NaiveDate>> {
        let schedule = self.store.weekly_schedule(self.carer)?;
        let dates = self.state.final_selection(&schedule);
        if let Err(err) = self
            .store
            .replace_off_days(self.carer, self.state.period(), &dates)
        {
            warn!(carer = self.carer.get(), error = %err, "off-day commit failed, edits kept");
            return Err(err);
        }
        info!(
            carer = self.carer.get(),
            year = self.year,
            days = dates.len(),
            "off-days committed"
        );
        self.state = transition(
            &self.state,
            EditorEvent::Committed {
                dates: dates.clone(),
                schedule,
            },
        );
        Ok(dates)
    }

    /// Change l'année affichée. Refusé tant que des modifications sont en
    /// attente, sauf si l'appelant confirme leur abandon.
    pub fn set_year(&mut self, year: i32, discard_pending: bool) -> Result<()> {
        if self.state.has_pending_edits() && !discard_pending {
            return Err(CareError::UnsavedChanges(self.state.pending().len()));
        }
        self.state = load_state(&*self.store, self.carer, year)?;
        self.year = year;
        Ok(())
    }

    pub fn month_grid(&self, month: u32) -> Result<Vec<Week>> {
        self.state.month_grid(self.year, month)
    }
}

fn load_state<S>(store: &S, carer: CarerId, year: i32) -> Result<EditorState>
where
    S: ScheduleStore + OffDayStore,
{
    let period = year_period(year)?;
    let schedule = store.weekly_schedule(carer)?;
    let off_days = store.off_days(carer)?;
    EditorState::new(period, schedule, &off_days)
}

/// Rendu texte d'une grille mensuelle, une ligne par semaine.
pub fn render_month(weeks: &[Week]) -> String {
    let mut out = String::from("  Su  Mo  Tu  We  Th  Fr  Sa\n");
    for week in weeks {
        let mut line = String::new();
        for cell in week {
            match cell {
                Some(c) => line.push_str(&format!(" {:>2}{}", c.date.day(), c.state.glyph())),
                None => line.push_str("    "),
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
