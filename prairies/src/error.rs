//! Types d'erreurs pour le crate prairies

use thiserror::Error;

use crate::types::AggregationLevel;

/// Erreurs pouvant survenir lors des requêtes et des transitions de drill-down
#[derive(Debug, Error)]
pub enum PrairiesError {
    /// Le moteur de requête n'est pas encore initialisé
    #[error("query engine not ready: {0}")]
    NotReady(String),

    /// Échec d'exécution d'une requête
    #[error("query failed: {reason}")]
    Query { reason: String },

    /// Filtre de scope absent ou invalide pour le niveau demandé
    #[error("invalid scope for {level} level: {reason}")]
    InvalidScope {
        level: AggregationLevel,
        reason: String,
    },

    /// Clé sélectionnée absente du dernier jeu de résultats rendu
    #[error("unknown {level} key: {key}")]
    UnknownKey {
        level: AggregationLevel,
        key: String,
    },

    /// Aucun jeu de résultats chargé pour le niveau courant
    #[error("no {level} result set loaded")]
    NoResultSet { level: AggregationLevel },

    /// Réponse obsolète: une requête plus récente a été émise entre temps
    #[error("stale response for request {id} (latest is {latest})")]
    Superseded { id: u64, latest: u64 },

    /// Pas de niveau supérieur depuis le niveau courant
    #[error("no back target from {level} level")]
    NoBackTarget { level: AggregationLevel },

    /// Transition non définie depuis le niveau courant
    #[error("no drill transition from {level} via {trigger}")]
    InvalidTransition {
        level: AggregationLevel,
        trigger: &'static str,
    },

    /// Ligne malformée renvoyée par le moteur
    #[error("malformed record: column '{column}': {reason}")]
    Record { column: String, reason: String },
}

impl PrairiesError {
    /// Crée une erreur de requête avec contexte
    pub fn query(reason: impl Into<String>) -> Self {
        Self::Query {
            reason: reason.into(),
        }
    }

    /// Crée une erreur de ligne malformée
    pub fn record(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Record {
            column: column.into(),
            reason: reason.into(),
        }
    }
}
