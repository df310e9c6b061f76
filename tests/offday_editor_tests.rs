#![forbid(unsafe_code)]
use care_schedule::offday_editor::render_month;
use care_schedule::{
    transition, BookingId, BookingOccurrence, BookingStatus, CalendarDayState, CareError, CarerId,
    Dataset, EditorEvent, EditorState, MemoryStore, OffDayCalendarEditor, OffDayException,
    OffDayStore, ServiceId, WeeklySchedule, WeeklyScheduleEntry,
};
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use proptest::prelude::*;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn carer() -> CarerId {
    CarerId::new(1)
}

fn schedule_entries(days: &[u8]) -> Vec<WeeklyScheduleEntry> {
    let start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
    let end = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
    days.iter()
        .map(|wd| WeeklyScheduleEntry::new(carer(), *wd, start, end).unwrap())
        .collect()
}

fn seeded(days: &[u8], off: &[(NaiveDate, NaiveDate)]) -> MemoryStore {
    let data = Dataset {
        schedules: schedule_entries(days),
        off_days: off
            .iter()
            .map(|(from, to)| OffDayException::new(carer(), *from, *to).unwrap())
            .collect(),
        bookings: Vec::new(),
    };
    MemoryStore::new(data, chrono_tz::UTC)
}

const ALL_WEEK: &[u8] = &[0, 1, 2, 3, 4, 5, 6];
const MON_FRI: &[u8] = &[1, 2, 3, 4, 5];

fn ranges(store: &MemoryStore) -> Vec<(NaiveDate, NaiveDate)> {
    store
        .off_days(carer())
        .unwrap()
        .iter()
        .map(|o| (o.date_from, o.date_to))
        .collect()
}

#[test]
fn commit_applies_additions_and_removals() {
    let mut store = seeded(ALL_WEEK, &[(d(2024, 3, 1), d(2024, 3, 2))]);
    let mut editor = OffDayCalendarEditor::open(&mut store, carer(), 2024).unwrap();
    assert_eq!(editor.day_state(d(2024, 3, 1)), CalendarDayState::OriginalOffDay);

    assert_eq!(editor.toggle(d(2024, 3, 1)), CalendarDayState::PendingRemoval);
    assert_eq!(editor.toggle(d(2024, 3, 5)), CalendarDayState::PendingAddition);
    assert_eq!(editor.day_state(d(2024, 3, 4)), CalendarDayState::WorkingAvailable);

    let dates = editor.commit().unwrap();
    assert_eq!(dates, vec![d(2024, 3, 2), d(2024, 3, 5)]);
    assert!(!editor.state().has_pending_edits());
    assert_eq!(editor.day_state(d(2024, 3, 5)), CalendarDayState::OriginalOffDay);
    assert_eq!(editor.day_state(d(2024, 3, 1)), CalendarDayState::WorkingAvailable);

    assert_eq!(
        ranges(&store),
        vec![(d(2024, 3, 2), d(2024, 3, 2)), (d(2024, 3, 5), d(2024, 3, 5))]
    );
}

#[test]
fn commit_without_edits_is_idempotent() {
    let mut store = seeded(ALL_WEEK, &[(d(2024, 3, 1), d(2024, 3, 3))]);
    let before = ranges(&store);
    {
        let mut editor = OffDayCalendarEditor::open(&mut store, carer(), 2024).unwrap();
        let first = editor.commit().unwrap();
        let second = editor.commit().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
    assert_eq!(ranges(&store), before);
}

#[test]
fn double_toggle_restores_the_original_state() {
    let mut store = seeded(ALL_WEEK, &[(d(2024, 3, 1), d(2024, 3, 1))]);
    let mut editor = OffDayCalendarEditor::open(&mut store, carer(), 2024).unwrap();
    let original = editor.state().clone();
    editor.toggle(d(2024, 3, 1));
    editor.toggle(d(2024, 3, 1));
    assert_eq!(editor.state(), &original);
}

#[test]
fn non_working_days_cannot_be_toggled() {
    let mut store = seeded(MON_FRI, &[]);
    let mut editor = OffDayCalendarEditor::open(&mut store, carer(), 2024).unwrap();
    // 2024-03-02 est un samedi.
    assert_eq!(editor.toggle(d(2024, 3, 2)), CalendarDayState::NonWorkingDay);
    assert!(!editor.state().has_pending_edits());
    // Hors de l'année affichée.
    editor.toggle(d(2025, 3, 3));
    assert!(!editor.state().has_pending_edits());
}

#[test]
fn failed_commit_keeps_pending_edits() {
    let mut store = seeded(ALL_WEEK, &[]);
    let booking = BookingOccurrence {
        id: BookingId::new(9),
        carer: carer(),
        service: ServiceId::new(1),
        start: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
        duration_minutes: 60,
        status: BookingStatus::Pending,
    };
    let mut data = store.dataset().clone();
    data.bookings.push(booking);
    store = MemoryStore::new(data, chrono_tz::UTC);

    {
        let mut editor = OffDayCalendarEditor::open(&mut store, carer(), 2024).unwrap();
        editor.toggle(d(2024, 3, 5));
        let err = editor.commit().unwrap_err();
        assert!(matches!(err, CareError::Conflict(_)), "{err}");
        assert!(editor.state().pending().contains(&d(2024, 3, 5)));
        assert_eq!(editor.day_state(d(2024, 3, 5)), CalendarDayState::PendingAddition);

        editor.discard();
        assert!(!editor.state().has_pending_edits());
    }
    assert!(ranges(&store).is_empty());
}

#[test]
fn final_selection_follows_the_schedule_read_at_commit() {
    let all_week = WeeklySchedule::from_entries(carer(), &schedule_entries(ALL_WEEK)).unwrap();
    let mon_fri = WeeklySchedule::from_entries(carer(), &schedule_entries(MON_FRI)).unwrap();
    let off = OffDayException::new(carer(), d(2024, 3, 2), d(2024, 3, 2)).unwrap();
    let state = EditorState::new((d(2024, 1, 1), d(2024, 12, 31)), all_week, &[off]).unwrap();

    let state = transition(&state, EditorEvent::Toggle(d(2024, 3, 4)));
    assert_eq!(
        state.final_selection(&mon_fri),
        vec![d(2024, 3, 4)],
        "the Saturday off-day is no longer a working day"
    );
}

#[test]
fn year_change_requires_confirmation_with_pending_edits() {
    let mut store = seeded(ALL_WEEK, &[(d(2025, 1, 6), d(2025, 1, 6))]);
    let mut editor = OffDayCalendarEditor::open(&mut store, carer(), 2024).unwrap();
    editor.toggle(d(2024, 6, 3));

    let err = editor.set_year(2025, false).unwrap_err();
    assert!(matches!(err, CareError::UnsavedChanges(1)));
    assert_eq!(editor.year(), 2024);
    assert!(editor.state().has_pending_edits());

    editor.set_year(2025, true).unwrap();
    assert_eq!(editor.year(), 2025);
    assert!(!editor.state().has_pending_edits());
    assert_eq!(editor.day_state(d(2025, 1, 6)), CalendarDayState::OriginalOffDay);
}

#[test]
fn ranges_straddling_the_year_are_split() {
    let mut store = seeded(ALL_WEEK, &[(d(2023, 12, 30), d(2024, 1, 2))]);
    {
        let mut editor = OffDayCalendarEditor::open(&mut store, carer(), 2024).unwrap();
        assert_eq!(editor.day_state(d(2024, 1, 1)), CalendarDayState::OriginalOffDay);
        editor.toggle(d(2024, 1, 2));
        assert_eq!(editor.commit().unwrap(), vec![d(2024, 1, 1)]);
    }
    assert_eq!(
        ranges(&store),
        vec![(d(2023, 12, 30), d(2023, 12, 31)), (d(2024, 1, 1), d(2024, 1, 1))]
    );
}

#[test]
fn month_grid_renders_sunday_first() {
    let mut store = seeded(MON_FRI, &[(d(2024, 3, 1), d(2024, 3, 1))]);
    let mut editor = OffDayCalendarEditor::open(&mut store, carer(), 2024).unwrap();
    editor.toggle(d(2024, 3, 1));
    editor.toggle(d(2024, 3, 5));

    let weeks = editor.month_grid(3).unwrap();
    assert_eq!(weeks.len(), 6);
    assert!(weeks[0][..5].iter().all(Option::is_none));

    let first_week = format!("{}1x  2-", " ".repeat(22));
    let expected = [
        "  Su  Mo  Tu  We  Th  Fr  Sa",
        first_week.as_str(),
        "  3-  4.  5+  6.  7.  8.  9-",
        " 10- 11. 12. 13. 14. 15. 16-",
        " 17- 18. 19. 20. 21. 22. 23-",
        " 24- 25. 26. 27. 28. 29. 30-",
        " 31-",
    ];
    let rendered = render_month(&weeks);
    assert_eq!(rendered.lines().collect::<Vec<_>>(), expected);
    assert!(editor.month_grid(13).is_err());
}

proptest! {
    #[test]
    fn toggle_is_an_involution(
        offset in 0i64..366,
        weekdays in proptest::collection::btree_set(0u8..7, 0..7),
    ) {
        let days: Vec<u8> = weekdays.into_iter().collect();
        let schedule = WeeklySchedule::from_entries(carer(), &schedule_entries(&days)).unwrap();
        let off = OffDayException::new(carer(), d(2024, 2, 1), d(2024, 2, 10)).unwrap();
        let state = EditorState::new((d(2024, 1, 1), d(2024, 12, 31)), schedule, &[off]).unwrap();
        let date = d(2024, 1, 1) + Duration::days(offset);

        let once = transition(&state, EditorEvent::Toggle(date));
        let twice = transition(&once, EditorEvent::Toggle(date));
        prop_assert_eq!(twice, state);
    }
}
