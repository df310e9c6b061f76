use crate::error::{CareError, Result};
use crate::model::{ServiceDurationId, ServiceId};
use anyhow::Context;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Politique de réservation : délai administratif minimal et horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingPolicy {
    pub min_lead_days: u32,
    pub window_span_days: u32,
    /// Pas d'alignement des débuts de créneau à partir du début de journée.
    pub slot_step_minutes: u32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            min_lead_days: 8,
            window_span_days: 28,
            slot_step_minutes: 60,
        }
    }
}

impl BookingPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.window_span_days == 0 {
            return Err(CareError::validation(
                "window_span_days",
                "booking window must span at least one day",
            ));
        }
        if self.slot_step_minutes == 0 || self.slot_step_minutes > 24 * 60 {
            return Err(CareError::validation(
                "slot_step_minutes",
                format!("{} is outside 1..=1440", self.slot_step_minutes),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDuration {
    pub id: ServiceDurationId,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    #[serde(default)]
    pub durations: Vec<ServiceDuration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub policy: BookingPolicy,
    /// Fuseau des plages hebdomadaires (heure murale des intervenants).
    pub timezone: Tz,
    pub services: Vec<Service>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: BookingPolicy::default(),
            timezone: chrono_tz::UTC,
            services: Vec::new(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_slice(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Charge le fichier s'il existe, sinon retourne la configuration par défaut.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        for service in &self.services {
            if let Some(d) = service.durations.iter().find(|d| d.minutes == 0) {
                return Err(CareError::validation(
                    "duration",
                    format!("service {} duration {} is zero", service.id, d.id),
                ));
            }
        }
        Ok(())
    }

    pub fn service(&self, id: ServiceId) -> Result<&Service> {
        self.services
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CareError::NotFound(format!("service {id}")))
    }

    /// Durée en minutes d'une déclinaison de service.
    pub fn duration_minutes(&self, service: ServiceId, duration: ServiceDurationId) -> Result<u32> {
        self.service(service)?
            .durations
            .iter()
            .find(|d| d.id == duration)
            .map(|d| d.minutes)
            .ok_or_else(|| CareError::NotFound(format!("duration {duration} of service {service}")))
    }
}
