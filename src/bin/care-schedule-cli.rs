#![forbid(unsafe_code)]
use anyhow::{bail, Context, Result};
use care_schedule::{
    io,
    model::{BookingId, CarerId, OffDayId, ServiceDurationId, ServiceId, TimeWindow},
    offday_editor::{render_month, OffDayCalendarEditor},
    recurrence::{expand_occurrences, summarize, RecurrenceSpec},
    storage::{JsonStorage, MemoryStore, OffDayStore, ScheduleStore, Storage},
    AvailabilityResolver, Config, Dataset,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI de planification des intervenants (semaines types, jours off, disponibilités)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON du jeu de données
    #[arg(long, global = true, default_value = "care-data.json")]
    data: String,

    /// Fichier JSON de configuration (politique, fuseau, services)
    #[arg(long, global = true, default_value = "care-config.json")]
    config: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Définir la plage d'un jour de la semaine type
    SetDay {
        #[arg(long)]
        carer: u32,
        /// 0 = dimanche … 6 = samedi
        #[arg(long)]
        weekday: u8,
        /// HH:MM
        #[arg(long)]
        start: String,
        /// HH:MM
        #[arg(long)]
        end: String,
    },

    /// Retirer un jour de la semaine type
    DeleteDay {
        #[arg(long)]
        carer: u32,
        #[arg(long)]
        weekday: u8,
    },

    /// Importer des semaines types depuis un CSV (remplace celles des intervenants cités)
    ImportSchedule {
        #[arg(long)]
        csv: String,
    },

    /// Importer des jours off depuis un CSV
    ImportOffDays {
        #[arg(long)]
        csv: String,
    },

    /// Ajouter une plage de jours off
    AddOffDay {
        #[arg(long)]
        carer: u32,
        /// YYYY-MM-DD
        #[arg(long)]
        from: String,
        /// YYYY-MM-DD (défaut : même jour)
        #[arg(long)]
        to: Option<String>,
    },

    /// Modifier une plage de jours off
    UpdateOffDay {
        #[arg(long)]
        id: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Supprimer une plage de jours off
    DeleteOffDay {
        #[arg(long)]
        id: String,
    },

    /// Dates disponibles dans la fenêtre de réservation
    Dates {
        #[arg(long)]
        carer: u32,
        #[arg(long)]
        service: u32,
        #[arg(long)]
        duration: u32,
        /// YYYY-MM-DD (défaut : date du jour dans le fuseau configuré)
        #[arg(long)]
        today: Option<String>,
        /// Réservation en cours de modification
        #[arg(long)]
        exclude_booking: Option<u64>,
        #[arg(long)]
        out_csv: Option<String>,
    },

    /// Créneaux d'une date
    Slots {
        #[arg(long)]
        carer: u32,
        #[arg(long)]
        service: u32,
        #[arg(long)]
        duration: u32,
        #[arg(long)]
        date: String,
        #[arg(long)]
        today: Option<String>,
        #[arg(long)]
        exclude_booking: Option<u64>,
    },

    /// Intervenants disponibles pour un créneau précis
    Carers {
        #[arg(long)]
        service: u32,
        #[arg(long)]
        duration: u32,
        /// RFC3339
        #[arg(long)]
        at: String,
        #[arg(long)]
        today: Option<String>,
        #[arg(long)]
        exclude_booking: Option<u64>,
    },

    /// Date de fin et libellé d'une série récurrente
    Recurrence {
        /// daily | weekly | fortnightly | monthly
        #[arg(long)]
        frequency: String,
        #[arg(long)]
        value: u32,
        /// week | month
        #[arg(long)]
        unit: String,
        /// YYYY-MM-DDTHH:MM
        #[arg(long)]
        start: String,
        /// Lister aussi les occurrences
        #[arg(long)]
        list: bool,
    },

    /// Afficher et éditer le calendrier des jours off d'une année
    OffDays {
        #[arg(long)]
        carer: u32,
        #[arg(long)]
        year: i32,
        /// Mois à afficher (défaut : tous)
        #[arg(long)]
        month: Option<u32>,
        /// Dates à basculer (YYYY-MM-DD), répétable
        #[arg(long)]
        toggle: Vec<String>,
        /// Enregistrer les bascules
        #[arg(long)]
        commit: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let config = Config::load_or_default(&cli.config)?;
    let storage = JsonStorage::open(&cli.data)?;
    let dataset = if storage.path().exists() {
        storage.load()?
    } else {
        Dataset::default()
    };
    let mut store = MemoryStore::new(dataset, config.timezone);

    let code = match cli.cmd {
        Commands::SetDay {
            carer,
            weekday,
            start,
            end,
        } => {
            let carer = CarerId::new(carer);
            let window = TimeWindow::new(io::parse_time(&start)?, io::parse_time(&end)?)?;
            let mut schedule = store.weekly_schedule(carer)?;
            schedule.set_day(weekday, window)?;
            store.replace_weekly_schedule(carer, &schedule.entries())?;
            storage.save(store.dataset())?;
            0
        }
        Commands::DeleteDay { carer, weekday } => {
            if store.delete_weekday(CarerId::new(carer), weekday)? {
                storage.save(store.dataset())?;
                0
            } else {
                eprintln!("no schedule entry for weekday {weekday}");
                2
            }
        }
        Commands::ImportSchedule { csv } => {
            let mut by_carer: BTreeMap<CarerId, Vec<_>> = BTreeMap::new();
            for entry in io::import_schedule_csv(csv)? {
                by_carer.entry(entry.carer).or_default().push(entry);
            }
            for (carer, entries) in by_carer {
                store.replace_weekly_schedule(carer, &entries)?;
            }
            storage.save(store.dataset())?;
            0
        }
        Commands::ImportOffDays { csv } => {
            for off in io::import_off_days_csv(csv)? {
                store.create_off_day(off.carer, off.date_from, off.date_to)?;
            }
            storage.save(store.dataset())?;
            0
        }
        Commands::AddOffDay { carer, from, to } => {
            let from = io::parse_date(&from)?;
            let to = match to {
                Some(raw) => io::parse_date(&raw)?,
                None => from,
            };
            let id = store.create_off_day(CarerId::new(carer), from, to)?;
            storage.save(store.dataset())?;
            println!("{}", id.as_str());
            0
        }
        Commands::UpdateOffDay { id, from, to } => {
            store.update_off_day(&OffDayId::new(id), io::parse_date(&from)?, io::parse_date(&to)?)?;
            storage.save(store.dataset())?;
            0
        }
        Commands::DeleteOffDay { id } => {
            store.delete_off_day(&OffDayId::new(id))?;
            storage.save(store.dataset())?;
            0
        }
        Commands::Dates {
            carer,
            service,
            duration,
            today,
            exclude_booking,
            out_csv,
        } => {
            let minutes =
                config.duration_minutes(ServiceId::new(service), ServiceDurationId::new(duration))?;
            let today = resolve_today(today.as_deref(), &config)?;
            let resolver = AvailabilityResolver::from_store(&store, &config);
            let dates = resolver.available_dates(
                CarerId::new(carer),
                minutes,
                today,
                exclude_booking.map(BookingId::new),
            )?;
            if let Some(path) = out_csv {
                io::export_dates_csv(path, &dates)?;
            }
            for d in &dates {
                println!("{} {}", d.date, if d.is_carer_available { "available" } else { "-" });
            }
            if dates.iter().any(|d| d.is_carer_available) {
                0
            } else {
                // Code 2 = aucune date offerte
                2
            }
        }
        Commands::Slots {
            carer,
            service,
            duration,
            date,
            today,
            exclude_booking,
        } => {
            let minutes =
                config.duration_minutes(ServiceId::new(service), ServiceDurationId::new(duration))?;
            let today = resolve_today(today.as_deref(), &config)?;
            let resolver = AvailabilityResolver::from_store(&store, &config);
            let slots = resolver.available_time_slots(
                CarerId::new(carer),
                minutes,
                io::parse_date(&date)?,
                today,
                exclude_booking.map(BookingId::new),
            )?;
            for s in &slots {
                println!(
                    "{} {}",
                    s.time_slot.format("%H:%M"),
                    if s.is_carer_available { "available" } else { "-" }
                );
            }
            0
        }
        Commands::Carers {
            service,
            duration,
            at,
            today,
            exclude_booking,
        } => {
            let minutes =
                config.duration_minutes(ServiceId::new(service), ServiceDurationId::new(duration))?;
            let today = resolve_today(today.as_deref(), &config)?;
            let at: DateTime<Utc> = at.parse().context("at RFC3339")?;
            let resolver = AvailabilityResolver::from_store(&store, &config);
            let candidates =
                resolver.candidate_carers(minutes, at, today, exclude_booking.map(BookingId::new))?;
            for c in &candidates {
                println!("{} {}", c.carer, if c.is_available { "available" } else { "-" });
            }
            0
        }
        Commands::Recurrence {
            frequency,
            value,
            unit,
            start,
            list,
        } => {
            let spec = RecurrenceSpec::new(frequency.parse()?, value, unit.parse()?);
            let start = parse_local_datetime(&start)?;
            let summary = summarize(&spec, start)?;
            println!("end: {}", summary.series_end_date);
            println!("{}", summary.description);
            if list {
                for occurrence in expand_occurrences(&spec, start)? {
                    println!("{}", occurrence.format("%Y-%m-%d %H:%M"));
                }
            }
            0
        }
        Commands::OffDays {
            carer,
            year,
            month,
            toggle,
            commit,
        } => {
            let mut editor = OffDayCalendarEditor::open(&mut store, CarerId::new(carer), year)?;
            for raw in &toggle {
                editor.toggle(io::parse_date(raw)?);
            }
            let months: Vec<u32> = match month {
                Some(m) => vec![m],
                None => (1..=12).collect(),
            };
            for m in months {
                println!("{year}-{m:02}");
                print!("{}", render_month(&editor.month_grid(m)?));
            }
            if commit {
                let dates = editor.commit()?;
                println!("committed {} off-day(s)", dates.len());
                storage.save(store.dataset())?;
            } else if editor.state().has_pending_edits() {
                eprintln!(
                    "{} pending edit(s) not saved (use --commit)",
                    editor.state().pending().len()
                );
            }
            0
        }
    };

    std::process::exit(code);
}

fn resolve_today(raw: Option<&str>, config: &Config) -> Result<NaiveDate> {
    match raw {
        Some(raw) => io::parse_date(raw),
        None => Ok(Utc::now().with_timezone(&config.timezone).date_naive()),
    }
}

fn parse_local_datetime(raw: &str) -> Result<NaiveDateTime> {
    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw.trim(), fmt) {
            return Ok(dt);
        }
    }
    bail!("invalid local datetime: {raw}")
}
