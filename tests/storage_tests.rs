#![forbid(unsafe_code)]
use care_schedule::{
    BookingId, BookingLedger, BookingOccurrence, BookingStatus, CareError, CarerId, Dataset,
    JsonStorage, MemoryStore, OffDayException, OffDayId, OffDayStore, ScheduleStore, ServiceId,
    Storage, WeeklyScheduleEntry,
};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use std::fs;
use tempfile::tempdir;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn carer() -> CarerId {
    CarerId::new(4)
}

fn entry(weekday: u8, start: NaiveTime, end: NaiveTime) -> WeeklyScheduleEntry {
    WeeklyScheduleEntry::new(carer(), weekday, start, end).unwrap()
}

/// 2024-03-05 est un mardi.
fn tuesday_booking(status: BookingStatus) -> BookingOccurrence {
    BookingOccurrence {
        id: BookingId::new(21),
        carer: carer(),
        service: ServiceId::new(1),
        start: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
        duration_minutes: 90,
        status,
    }
}

fn tuesday_store(status: BookingStatus) -> MemoryStore {
    let data = Dataset {
        schedules: vec![entry(1, t(9, 0), t(17, 0)), entry(2, t(9, 0), t(17, 0))],
        off_days: Vec::new(),
        bookings: vec![tuesday_booking(status)],
    };
    MemoryStore::new(data, chrono_tz::UTC)
}

#[test]
fn json_storage_roundtrip() {
    let dir = tempdir().unwrap();
    let storage = JsonStorage::open(dir.path().join("data.json")).unwrap();
    let mut store = tuesday_store(BookingStatus::Confirmed);
    store.create_off_day(carer(), d(2024, 4, 1), d(2024, 4, 3)).unwrap();

    storage.save(store.dataset()).unwrap();
    let loaded = storage.load().unwrap();
    assert_eq!(&loaded, store.dataset());
}

#[test]
fn invalid_dataset_is_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.json");
    fs::write(
        &path,
        r#"{"schedules":[{"carer":4,"weekday":9,"start_time":"09:00:00","end_time":"17:00:00"}]}"#,
    )
    .unwrap();
    let err = JsonStorage::open(&path).unwrap().load().unwrap_err();
    assert!(format!("{err:#}").contains("weekday"), "{err:#}");
}

#[test]
fn duplicate_weekday_is_rejected() {
    let data = Dataset {
        schedules: vec![entry(1, t(9, 0), t(12, 0)), entry(1, t(13, 0), t(17, 0))],
        ..Dataset::default()
    };
    let err = data.validate().unwrap_err();
    assert_eq!(err.field(), Some("weekday"));
}

#[test]
fn delete_weekday_reports_missing_entries() {
    let mut store = tuesday_store(BookingStatus::Cancelled);
    assert!(store.delete_weekday(carer(), 1).unwrap());
    assert!(!store.delete_weekday(carer(), 1).unwrap());
    assert!(!store.delete_weekday(carer(), 6).unwrap());
    assert!(store.weekly_schedule(carer()).unwrap().window_for_weekday(1).is_none());
}

#[test]
fn delete_weekday_rejects_weekday_out_of_range() {
    let mut store = tuesday_store(BookingStatus::Cancelled);
    let err = store.delete_weekday(carer(), 9).unwrap_err();
    assert_eq!(err.field(), Some("weekday"));
    assert_eq!(store.weekly_schedule(carer()).unwrap().entries().len(), 2);
}

#[test]
fn schedule_change_conflicting_with_a_booking_is_refused() {
    let mut store = tuesday_store(BookingStatus::Confirmed);
    let err = store.delete_weekday(carer(), 2).unwrap_err();
    assert!(matches!(err, CareError::Conflict(_)), "{err}");

    let err = store
        .replace_weekly_schedule(carer(), &[entry(2, t(11, 0), t(17, 0))])
        .unwrap_err();
    assert!(matches!(err, CareError::Conflict(_)), "{err}");
    assert!(store.weekly_schedule(carer()).unwrap().window_for_weekday(1).is_some());

    // La réservation tient toujours dans la nouvelle plage.
    store
        .replace_weekly_schedule(carer(), &[entry(2, t(10, 0), t(12, 0))])
        .unwrap();
}

#[test]
fn cancelled_bookings_do_not_conflict() {
    let mut store = tuesday_store(BookingStatus::Cancelled);
    assert!(store.delete_weekday(carer(), 2).unwrap());
    store.create_off_day(carer(), d(2024, 3, 5), d(2024, 3, 5)).unwrap();
}

#[test]
fn off_day_on_a_booked_date_is_refused() {
    let mut store = tuesday_store(BookingStatus::Pending);
    let err = store
        .create_off_day(carer(), d(2024, 3, 4), d(2024, 3, 6))
        .unwrap_err();
    assert!(matches!(err, CareError::Conflict(_)), "{err}");
    assert!(store.off_days(carer()).unwrap().is_empty());

    let id = store.create_off_day(carer(), d(2024, 3, 6), d(2024, 3, 8)).unwrap();
    assert!(matches!(
        store.update_off_day(&id, d(2024, 3, 5), d(2024, 3, 8)),
        Err(CareError::Conflict(_))
    ));
}

#[test]
fn off_day_crud() {
    let mut store = tuesday_store(BookingStatus::Confirmed);
    let id = store.create_off_day(carer(), d(2024, 5, 1), d(2024, 5, 1)).unwrap();
    store.update_off_day(&id, d(2024, 5, 1), d(2024, 5, 4)).unwrap();
    let off = store.off_days(carer()).unwrap();
    assert_eq!(off.len(), 1);
    assert_eq!(off[0].len_days(), 4);

    assert!(store.update_off_day(&id, d(2024, 5, 4), d(2024, 5, 1)).is_err());
    store.delete_off_day(&id).unwrap();
    assert!(matches!(
        store.delete_off_day(&id),
        Err(CareError::NotFound(_))
    ));
    assert!(matches!(
        store.update_off_day(&OffDayId::new("missing"), d(2024, 5, 1), d(2024, 5, 1)),
        Err(CareError::NotFound(_))
    ));
}

#[test]
fn replace_off_days_compacts_and_keeps_other_periods() {
    let mut store = tuesday_store(BookingStatus::Confirmed);
    store.create_off_day(carer(), d(2023, 8, 1), d(2023, 8, 2)).unwrap();
    store
        .replace_off_days(
            carer(),
            (d(2024, 1, 1), d(2024, 12, 31)),
            &[d(2024, 6, 3), d(2024, 6, 4), d(2024, 6, 5), d(2024, 6, 10)],
        )
        .unwrap();

    let ranges: Vec<_> = store
        .off_days(carer())
        .unwrap()
        .iter()
        .map(|o| (o.date_from, o.date_to))
        .collect();
    assert_eq!(
        ranges,
        vec![
            (d(2023, 8, 1), d(2023, 8, 2)),
            (d(2024, 6, 3), d(2024, 6, 5)),
            (d(2024, 6, 10), d(2024, 6, 10)),
        ]
    );
}

#[test]
fn replace_off_days_rejects_dates_outside_the_period() {
    let mut store = tuesday_store(BookingStatus::Confirmed);
    let err = store
        .replace_off_days(carer(), (d(2024, 1, 1), d(2024, 12, 31)), &[d(2025, 1, 1)])
        .unwrap_err();
    assert_eq!(err.field(), Some("dates"));
}

#[test]
fn replace_off_days_keeps_existing_off_day_over_a_booking() {
    // Un jour off déjà posé n'est pas revérifié contre les réservations.
    let off = OffDayException::new(carer(), d(2024, 3, 5), d(2024, 3, 5)).unwrap();
    let data = Dataset {
        off_days: vec![off],
        bookings: vec![tuesday_booking(BookingStatus::Confirmed)],
        ..Dataset::default()
    };
    let mut store = MemoryStore::new(data, chrono_tz::UTC);
    store
        .replace_off_days(
            carer(),
            (d(2024, 1, 1), d(2024, 12, 31)),
            &[d(2024, 3, 5), d(2024, 3, 6)],
        )
        .unwrap();
    assert_eq!(store.off_days(carer()).unwrap().len(), 1);
}

#[test]
fn ledger_returns_overlapping_bookings_only() {
    let store = tuesday_store(BookingStatus::Confirmed);
    let hit = store
        .bookings_for(
            carer(),
            Utc.with_ymd_and_hms(2024, 3, 5, 11, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap(),
        )
        .unwrap();
    assert_eq!(hit.len(), 1);
    let miss = store
        .bookings_for(
            carer(),
            Utc.with_ymd_and_hms(2024, 3, 5, 11, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap(),
        )
        .unwrap();
    assert!(miss.is_empty());
    assert_eq!(store.carers().unwrap(), vec![carer()]);
}
