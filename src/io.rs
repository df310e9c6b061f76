use crate::availability::DateAvailability;
use crate::model::{CarerId, OffDayException, WeeklyScheduleEntry};
use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveTime};
use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

/// Import de semaines types depuis CSV: header `carer,weekday,start,end`
/// (weekday 0 = dimanche, heures `HH:MM`).
pub fn import_schedule_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<WeeklyScheduleEntry>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let carer = parse_carer(rec.get(0).context("missing carer")?)?;
        let weekday: u8 = rec
            .get(1)
            .context("missing weekday")?
            .trim()
            .parse()
            .with_context(|| format!("invalid weekday on row {}", line + 1))?;
        let start = parse_time(rec.get(2).context("missing start")?)?;
        let end = parse_time(rec.get(3).context("missing end")?)?;
        let entry = WeeklyScheduleEntry::new(carer, weekday, start, end)
            .with_context(|| format!("invalid schedule row {}", line + 1))?;
        out.push(entry);
    }
    Ok(out)
}

/// Import de jours off: header `carer,date_from,date_to` (`date_to` vide = un seul jour)
pub fn import_off_days_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<OffDayException>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let carer = parse_carer(rec.get(0).context("missing carer")?)?;
        let from = parse_date(rec.get(1).context("missing date_from")?)?;
        let to = match rec.get(2).map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_date(raw)?,
            _ => from,
        };
        let off = OffDayException::new(carer, from, to)
            .with_context(|| format!("invalid off-day row {}", line + 1))?;
        out.push(off);
    }
    Ok(out)
}

/// Export CSV des dates: header `date,is_carer_available`
pub fn export_dates_csv<P: AsRef<Path>>(path: P, dates: &[DateAvailability]) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_path(path)?;
    w.write_record(["date", "is_carer_available"])?;
    for d in dates {
        let date = d.date.to_string();
        w.write_record([date.as_str(), if d.is_carer_available { "true" } else { "false" }])?;
    }
    w.flush()?;
    Ok(())
}

pub fn parse_carer(raw: &str) -> anyhow::Result<CarerId> {
    let id: u32 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid carer id: {raw}"))?;
    Ok(CarerId::new(id))
}

pub fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date: {raw}"))
}

/// Accepte `HH:MM` ou `HH:MM:SS`.
pub fn parse_time(raw: &str) -> anyhow::Result<NaiveTime> {
    let raw = raw.trim();
    if let Ok(t) = NaiveTime::parse_from_str(raw, "%H:%M") {
        return Ok(t);
    }
    match NaiveTime::parse_from_str(raw, "%H:%M:%S") {
        Ok(t) => Ok(t),
        Err(_) => bail!("invalid time: {raw}"),
    }
}
