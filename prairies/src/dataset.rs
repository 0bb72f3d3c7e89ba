//! Accès au jeu de données
//!
//! Le moteur SQL est traité en boîte noire: une seule capacité, exécuter
//! une requête et renvoyer des lignes sous forme d'enregistrements plats.

use crate::error::PrairiesError;
use crate::types::{AggregateRecord, RawParcelRecord, Record};

/// Exécuteur de requêtes (moteur analytique embarqué, mock de test, etc.)
pub trait Dataset {
    /// Exécute une requête SQL et renvoie les lignes
    ///
    /// # Errors
    ///
    /// - `PrairiesError::NotReady` si aucun jeu de données n'est enregistré
    /// - `PrairiesError::Query` si le moteur rejette la requête
    fn execute(&self, sql: &str) -> Result<Vec<Record>, PrairiesError>;
}

impl<D: Dataset + ?Sized> Dataset for &D {
    fn execute(&self, sql: &str) -> Result<Vec<Record>, PrairiesError> {
        (**self).execute(sql)
    }
}

/// Convertit des lignes brutes en agrégats (lignes malformées → erreur)
pub fn parse_aggregates(rows: &[Record]) -> Result<Vec<AggregateRecord>, PrairiesError> {
    rows.iter().map(AggregateRecord::from_record).collect()
}

/// Convertit des lignes brutes en parcelles individuelles
pub fn parse_raw(rows: &[Record]) -> Result<Vec<RawParcelRecord>, PrairiesError> {
    rows.iter().map(RawParcelRecord::from_record).collect()
}
