//! Panier de réservations non engagées d'une session de saisie.
//!
//! Le panier vit uniquement en mémoire, le temps de la session. Il sert à
//! éviter d'affecter un même intervenant à deux réservations du même jour
//! avant que la persistance ne détecte le conflit.

use crate::error::{CareError, Result};
use crate::model::{CarerCandidate, CarerId, ServiceId};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CartEntryId(u32);

/// Sélection saisie pour une réservation du panier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSelection {
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub service: Option<ServiceId>,
    #[serde(default)]
    pub carer: Option<CarerId>,
}

impl CartSelection {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            time: None,
            service: None,
            carer: None,
        }
    }

    pub fn with_carer(mut self, carer: CarerId) -> Self {
        self.carer = Some(carer);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartEntry {
    pub id: CartEntryId,
    #[serde(flatten)]
    pub selection: CartSelection,
}

#[derive(Debug, Clone, Default)]
pub struct Cart {
    entries: Vec<CartEntry>,
    next_id: u32,
    revision: u64,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    pub fn get(&self, id: CartEntryId) -> Option<&CartEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Incrémenté à chaque mutation ; toute disponibilité calculée pour une
    /// révision antérieure est à recalculer.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn add(&mut self, selection: CartSelection) -> CartEntryId {
        self.next_id += 1;
        let id = CartEntryId(self.next_id);
        self.entries.push(CartEntry { id, selection });
        self.revision += 1;
        id
    }

    pub fn edit(&mut self, id: CartEntryId, selection: CartSelection) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CareError::NotFound(format!("cart entry {}", id.0)))?;
        entry.selection = selection;
        self.revision += 1;
        Ok(())
    }

    pub fn remove(&mut self, id: CartEntryId) -> Result<CartEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CareError::NotFound(format!("cart entry {}", id.0)))?;
        self.revision += 1;
        Ok(self.entries.remove(pos))
    }
}

/// Réservation en cours d'édition : une entrée existante du panier, ou une
/// nouvelle réservation (`entry == None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditingContext {
    pub entry: Option<CartEntryId>,
    pub date: NaiveDate,
}

impl EditingContext {
    pub fn new_booking(date: NaiveDate) -> Self {
        Self { entry: None, date }
    }

    pub fn editing(entry: CartEntryId, date: NaiveDate) -> Self {
        Self {
            entry: Some(entry),
            date,
        }
    }
}

/// Intervenants déjà affectés à une autre entrée du panier le même jour.
pub fn busy_carers(cart: &Cart, ctx: &EditingContext) -> BTreeSet<CarerId> {
    cart.entries()
        .iter()
        .filter(|e| Some(e.id) != ctx.entry && e.selection.date == ctx.date)
        .filter_map(|e| e.selection.carer)
        .collect()
}

/// Marque indisponibles les candidats déjà pris le même jour dans le panier.
/// L'ordre est conservé et un candidat indisponible le reste.
pub fn filter_carers(
    cart: &Cart,
    ctx: &EditingContext,
    candidates: Vec<CarerCandidate>,
) -> Vec<CarerCandidate> {
    let busy = busy_carers(cart, ctx);
    debug!(
        date = %ctx.date,
        revision = cart.revision(),
        busy = busy.len(),
        "filtering carers against cart"
    );
    candidates
        .into_iter()
        .map(|c| CarerCandidate {
            carer: c.carer,
            is_available: c.is_available && !busy.contains(&c.carer),
        })
        .collect()
}
