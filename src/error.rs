//! Erreurs du cœur de planification.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CareError {
    /// Entrée mal formée ; `field` nomme le champ fautif pour l'affichage.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    /// Mutation en collision avec des réservations engagées.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Navigation refusée tant que des modifications ne sont pas enregistrées.
    #[error("unsaved changes: {0} pending edit(s) would be discarded")]
    UnsavedChanges(usize),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CareError {
    pub fn validation<M: Into<String>>(field: &'static str, message: M) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Champ concerné pour un message au niveau du formulaire, `None` pour
    /// un message global.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CareError>;
