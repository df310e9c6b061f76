#![forbid(unsafe_code)]
//! Care-schedule — cœur de planification des visites d'aide à domicile.
//!
//! - Semaines types et jours off par intervenant.
//! - Disponibilités (dates, créneaux, intervenants candidats) sous politique
//!   de fenêtre de réservation.
//! - Séries récurrentes : date de fin, libellé, occurrences.
//! - Garde anti double affectation sur le panier de la session.
//! - Éditeur de calendrier des jours off, sous forme de réducteur.
//!
//! Plages hebdomadaires en heure murale du fuseau configuré, réservations en
//! UTC ; « aujourd'hui » est toujours passé explicitement.

pub mod availability;
pub mod cart;
pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod offday_editor;
pub mod recurrence;
pub mod storage;

pub use availability::{
    AvailabilityResolver, BookingWindow, DateAvailability, DayStatus, RequestSequencer, Ticket,
    TimeSlotAvailability,
};
pub use cart::{filter_carers, Cart, CartEntry, CartEntryId, CartSelection, EditingContext};
pub use config::{BookingPolicy, Config, Service, ServiceDuration};
pub use error::CareError;
pub use model::{
    BookingId, BookingOccurrence, BookingStatus, CarerCandidate, CarerId, OffDayException,
    OffDayId, ServiceDurationId, ServiceId, TimeWindow, WeeklySchedule, WeeklyScheduleEntry,
};
pub use offday_editor::{
    transition, CalendarDayState, EditorEvent, EditorState, OffDayCalendarEditor,
};
pub use recurrence::{
    expand_occurrences, series_end_date, summarize, DurationKind, DurationUnit, Frequency,
    RecurrenceSpec, SeriesSummary,
};
pub use storage::{
    BookingLedger, Dataset, JsonStorage, MemoryStore, OffDayStore, ScheduleStore, Storage,
};
