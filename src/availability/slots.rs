use crate::model::{to_local, to_utc};
use chrono::{Duration, NaiveDateTime, TimeZone};

/// Intervalle semi-ouvert `[start, end)` en heure murale.
pub(super) type Interval = (NaiveDateTime, NaiveDateTime);

/// Fusionne les périodes occupées qui se chevauchent ou se touchent, rognées
/// à la fenêtre.
fn merge_busy(busy: &[Interval], window: Interval) -> Vec<Interval> {
    let (window_start, window_end) = window;
    let mut intervals: Vec<Interval> = busy
        .iter()
        .filter(|(start, end)| *start < window_end && *end > window_start)
        .map(|(start, end)| ((*start).max(window_start), (*end).min(window_end)))
        .collect();
    intervals.sort();

    let mut merged: Vec<Interval> = Vec::new();
    for (start, end) in intervals {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }
    merged
}

/// Trous libres de la fenêtre une fois les périodes occupées retirées.
pub(super) fn free_intervals(busy: &[Interval], window: Interval) -> Vec<Interval> {
    let (window_start, window_end) = window;
    let mut free = Vec::new();
    let mut cursor = window_start;
    for (busy_start, busy_end) in merge_busy(busy, window) {
        if cursor < busy_start {
            free.push((cursor, busy_start));
        }
        cursor = cursor.max(busy_end);
    }
    if cursor < window_end {
        free.push((cursor, window_end));
    }
    free
}

/// Débuts de créneau `window.start + k * step` dont la fin reste dans la fenêtre.
fn aligned_starts(
    window: Interval,
    step_minutes: u32,
    duration: Duration,
) -> Vec<NaiveDateTime> {
    let step = Duration::minutes(i64::from(step_minutes.max(1)));
    let mut out = Vec::new();
    let mut start = window.0;
    while start + duration <= window.1 {
        out.push(start);
        start += step;
    }
    out
}

/// Débuts alignés réellement utilisables dans le fuseau `tz` : l'heure de
/// début existe (pas dans un saut d'heure) et la durée écoulée réelle vaut
/// `duration`, y compris les jours de changement d'heure.
pub(super) fn local_starts<Z: TimeZone>(
    tz: &Z,
    window: Interval,
    step_minutes: u32,
    duration: Duration,
) -> Vec<NaiveDateTime> {
    aligned_starts(window, step_minutes, duration)
        .into_iter()
        .filter(|start| {
            let begin = to_utc(tz, *start);
            to_local(tz, begin) == *start && to_utc(tz, *start + duration) - begin == duration
        })
        .collect()
}

/// Vrai si `[start, end)` tient entièrement dans un seul trou libre.
pub(super) fn fits(free: &[Interval], start: NaiveDateTime, end: NaiveDateTime) -> bool {
    free.iter().any(|(f_start, f_end)| *f_start <= start && end <= *f_end)
}
