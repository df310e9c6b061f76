use crate::error::{CareError, Result};
use crate::model::{
    check_range, check_weekday, compact_dates, expand_off_days, to_local, BookingOccurrence,
    CarerId, OffDayException, OffDayId, WeeklySchedule, WeeklyScheduleEntry,
};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Accès aux semaines types des intervenants.
pub trait ScheduleStore {
    /// Intervenants ayant au moins une plage hebdomadaire.
    fn carers(&self) -> Result<Vec<CarerId>>;
    fn weekly_schedule(&self, carer: CarerId) -> Result<WeeklySchedule>;
    fn replace_weekly_schedule(
        &mut self,
        carer: CarerId,
        entries: &[WeeklyScheduleEntry],
    ) -> Result<()>;
    /// Retourne `false` si aucune plage n'existait pour ce jour.
    fn delete_weekday(&mut self, carer: CarerId, weekday: u8) -> Result<bool>;
}

/// Accès aux jours off des intervenants.
pub trait OffDayStore {
    fn off_days(&self, carer: CarerId) -> Result<Vec<OffDayException>>;
    fn create_off_day(
        &mut self,
        carer: CarerId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<OffDayId>;
    fn update_off_day(&mut self, id: &OffDayId, from: NaiveDate, to: NaiveDate) -> Result<()>;
    fn delete_off_day(&mut self, id: &OffDayId) -> Result<()>;
    /// Remplace l'ensemble des jours off de `carer` sur `period` (bornes
    /// incluses) par `dates`. Dernier écrivain gagnant, sans jeton de version.
    fn replace_off_days(
        &mut self,
        carer: CarerId,
        period: (NaiveDate, NaiveDate),
        dates: &[NaiveDate],
    ) -> Result<()>;
}

/// Lecture des réservations engagées.
pub trait BookingLedger {
    /// Réservations de `carer` chevauchant `[from, to)`.
    fn bookings_for(
        &self,
        carer: CarerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BookingOccurrence>>;
}

/// Jeu de données complet tel que persisté.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub schedules: Vec<WeeklyScheduleEntry>,
    #[serde(default)]
    pub off_days: Vec<OffDayException>,
    #[serde(default)]
    pub bookings: Vec<BookingOccurrence>,
}

impl Dataset {
    /// Revalide tout le contenu à l'entrée ; un seul enregistrement invalide
    /// rejette le jeu entier.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.schedules {
            entry.validate()?;
            if !seen.insert((entry.carer, entry.weekday)) {
                return Err(CareError::validation(
                    "weekday",
                    format!(
                        "duplicate schedule for carer {} weekday {}",
                        entry.carer, entry.weekday
                    ),
                ));
            }
        }
        let mut ids = HashSet::new();
        for off in &self.off_days {
            off.validate()?;
            if !ids.insert(off.id.as_str()) {
                return Err(CareError::validation(
                    "id",
                    format!("duplicate off-day id {}", off.id.as_str()),
                ));
            }
        }
        for booking in &self.bookings {
            booking.validate()?;
        }
        Ok(())
    }
}

/// Implémentation en mémoire des trois collaborateurs, sur un [`Dataset`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    data: Dataset,
    tz: Tz,
}

impl MemoryStore {
    pub fn new(data: Dataset, tz: Tz) -> Self {
        Self { data, tz }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    pub fn into_dataset(self) -> Dataset {
        self.data
    }

    fn occupying_bookings(&self, carer: CarerId) -> impl Iterator<Item = &BookingOccurrence> {
        self.data
            .bookings
            .iter()
            .filter(move |b| b.carer == carer && b.status.occupies())
    }

    fn fits_schedule(&self, schedule: &WeeklySchedule, booking: &BookingOccurrence) -> bool {
        let start = to_local(&self.tz, booking.start);
        let end = to_local(&self.tz, booking.end());
        match schedule.window_on(start.date()) {
            Some(w) => {
                start.time() >= w.start && end.date() == start.date() && end.time() <= w.end
            }
            None => false,
        }
    }

    /// Refuse un changement de semaine type qui laisserait une réservation
    /// jusque-là couverte en dehors des plages.
    fn check_schedule_change(
        &self,
        carer: CarerId,
        before: &WeeklySchedule,
        after: &WeeklySchedule,
    ) -> Result<()> {
        if let Some(b) = self
            .occupying_bookings(carer)
            .find(|b| self.fits_schedule(before, b) && !self.fits_schedule(after, b))
        {
            return Err(CareError::Conflict(format!(
                "booking {} at {} would fall outside the working hours of carer {carer}",
                b.id,
                b.start.to_rfc3339()
            )));
        }
        Ok(())
    }

    fn check_off_dates(&self, carer: CarerId, dates: &BTreeSet<NaiveDate>) -> Result<()> {
        if let Some(b) = self
            .occupying_bookings(carer)
            .find(|b| dates.contains(&to_local(&self.tz, b.start).date()))
        {
            return Err(CareError::Conflict(format!(
                "booking {} at {} falls on an off-day of carer {carer}",
                b.id,
                b.start.to_rfc3339()
            )));
        }
        Ok(())
    }

    fn off_day_index(&self, id: &OffDayId) -> Result<usize> {
        self.data
            .off_days
            .iter()
            .position(|o| &o.id == id)
            .ok_or_else(|| CareError::NotFound(format!("off-day {}", id.as_str())))
    }
}

impl ScheduleStore for MemoryStore {
    fn carers(&self) -> Result<Vec<CarerId>> {
        let carers: BTreeSet<CarerId> = self.data.schedules.iter().map(|e| e.carer).collect();
        Ok(carers.into_iter().collect())
    }

    fn weekly_schedule(&self, carer: CarerId) -> Result<WeeklySchedule> {
        let entries: Vec<WeeklyScheduleEntry> = self
            .data
            .schedules
            .iter()
            .filter(|e| e.carer == carer)
            .cloned()
            .collect();
        WeeklySchedule::from_entries(carer, &entries)
    }

    fn replace_weekly_schedule(
        &mut self,
        carer: CarerId,
        entries: &[WeeklyScheduleEntry],
    ) -> Result<()> {
        let after = WeeklySchedule::from_entries(carer, entries)?;
        let before = self.weekly_schedule(carer)?;
        self.check_schedule_change(carer, &before, &after)?;
        self.data.schedules.retain(|e| e.carer != carer);
        self.data.schedules.extend(after.entries());
        info!(carer = carer.get(), days = entries.len(), "weekly schedule replaced");
        Ok(())
    }

    fn delete_weekday(&mut self, carer: CarerId, weekday: u8) -> Result<bool> {
        check_weekday(weekday)?;
        let before = self.weekly_schedule(carer)?;
        let mut after = before.clone();
        if !after.remove_day(weekday) {
            debug!(carer = carer.get(), weekday, "no schedule entry to delete");
            return Ok(false);
        }
        self.check_schedule_change(carer, &before, &after)?;
        self.data
            .schedules
            .retain(|e| !(e.carer == carer && e.weekday == weekday));
        info!(carer = carer.get(), weekday, "weekday removed from schedule");
        Ok(true)
    }
}

impl OffDayStore for MemoryStore {
    fn off_days(&self, carer: CarerId) -> Result<Vec<OffDayException>> {
        let mut out: Vec<OffDayException> = self
            .data
            .off_days
            .iter()
            .filter(|o| o.carer == carer)
            .cloned()
            .collect();
        out.sort_by_key(|o| (o.date_from, o.date_to));
        Ok(out)
    }

    fn create_off_day(
        &mut self,
        carer: CarerId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<OffDayId> {
        let off = OffDayException::new(carer, from, to)?;
        self.check_off_dates(carer, &off.dates().collect::<BTreeSet<_>>())?;
        let id = off.id.clone();
        self.data.off_days.push(off);
        info!(carer = carer.get(), %from, %to, "off-day created");
        Ok(id)
    }

    fn update_off_day(&mut self, id: &OffDayId, from: NaiveDate, to: NaiveDate) -> Result<()> {
        check_range(from, to)?;
        let pos = self.off_day_index(id)?;
        let mut updated = self.data.off_days[pos].clone();
        updated.date_from = from;
        updated.date_to = to;
        self.check_off_dates(updated.carer, &updated.dates().collect::<BTreeSet<_>>())?;
        self.data.off_days[pos] = updated;
        info!(id = id.as_str(), %from, %to, "off-day updated");
        Ok(())
    }

    fn delete_off_day(&mut self, id: &OffDayId) -> Result<()> {
        let pos = self.off_day_index(id)?;
        self.data.off_days.remove(pos);
        info!(id = id.as_str(), "off-day deleted");
        Ok(())
    }

    fn replace_off_days(
        &mut self,
        carer: CarerId,
        period: (NaiveDate, NaiveDate),
        dates: &[NaiveDate],
    ) -> Result<()> {
        let (from, to) = period;
        check_range(from, to)?;
        let wanted: BTreeSet<NaiveDate> = dates.iter().copied().collect();
        if let Some(outside) = wanted.iter().find(|d| **d < from || **d > to) {
            return Err(CareError::validation(
                "dates",
                format!("{outside} is outside the edited period {from}..{to}"),
            ));
        }

        let mine: Vec<OffDayException> = self
            .data
            .off_days
            .iter()
            .filter(|o| o.carer == carer)
            .cloned()
            .collect();
        let previous: BTreeSet<NaiveDate> = expand_off_days(&mine)
            .into_iter()
            .filter(|d| *d >= from && *d <= to)
            .collect();
        let added: BTreeSet<NaiveDate> = wanted.difference(&previous).copied().collect();
        self.check_off_dates(carer, &added)?;

        let mut kept = Vec::new();
        for off in mine {
            if off.date_to < from || off.date_from > to {
                kept.push(off);
                continue;
            }
            if off.date_from < from {
                let before = from.pred_opt().context("date underflow")?;
                kept.push(OffDayException {
                    id: off.id.clone(),
                    carer,
                    date_from: off.date_from,
                    date_to: before,
                });
            }
            if off.date_to > to {
                let after = to.succ_opt().context("date overflow")?;
                kept.push(OffDayException {
                    id: OffDayId::random(),
                    carer,
                    date_from: after,
                    date_to: off.date_to,
                });
            }
        }
        for (date_from, date_to) in compact_dates(&wanted) {
            kept.push(OffDayException::new(carer, date_from, date_to)?);
        }
        self.data.off_days.retain(|o| o.carer != carer);
        self.data.off_days.extend(kept);
        info!(
            carer = carer.get(),
            %from,
            %to,
            days = wanted.len(),
            "off-days replaced for period"
        );
        Ok(())
    }
}

impl BookingLedger for MemoryStore {
    fn bookings_for(
        &self,
        carer: CarerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BookingOccurrence>> {
        let mut out: Vec<BookingOccurrence> = self
            .data
            .bookings
            .iter()
            .filter(|b| b.carer == carer && b.start < to && b.end() > from)
            .cloned()
            .collect();
        out.sort_by_key(|b| b.start);
        Ok(out)
    }
}

pub trait Storage {
    /// Charge un jeu de données depuis un support.
    fn load(&self) -> anyhow::Result<Dataset>;
    /// Sauvegarde de manière atomique.
    fn save(&self, data: &Dataset) -> anyhow::Result<()>;
}

pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for JsonStorage {
    fn load(&self) -> anyhow::Result<Dataset> {
        let data =
            fs::read(&self.path).with_context(|| format!("reading {}", self.path.display()))?;
        let dataset: Dataset =
            serde_json::from_slice(&data).with_context(|| "parsing dataset json")?;
        dataset
            .validate()
            .with_context(|| format!("validating {}", self.path.display()))?;
        Ok(dataset)
    }

    fn save(&self, data: &Dataset) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(data)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).with_context(|| "creating temp file")?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).with_context(|| "atomic rename")?;
        Ok(())
    }
}
