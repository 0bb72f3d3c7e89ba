//! Description du jeu de données source (colonnes et provenance)
//!
//! Les noms par défaut correspondent au fichier Parquet des prairies
//! (`reg_parc`, `dep_parc`, `com_parc`, `alt_mean`, `pente_mean`, `surf_parc`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::AggregationLevel;

/// Schéma du jeu de données interrogé par le constructeur de requêtes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Expression SQL de la source (nom de table, vue, ou `read_parquet(...)`)
    #[serde(default = "default_source")]
    pub source: String,

    /// Colonne du code région
    #[serde(default = "default_region_col")]
    pub region_col: String,

    /// Colonne du code département
    #[serde(default = "default_department_col")]
    pub department_col: String,

    /// Colonne du code commune
    #[serde(default = "default_commune_col")]
    pub commune_col: String,

    /// Colonne de l'altitude moyenne de la parcelle
    #[serde(default = "default_altitude_col")]
    pub altitude_col: String,

    /// Colonne de la pente moyenne de la parcelle
    #[serde(default = "default_slope_col")]
    pub slope_col: String,

    /// Colonne de la surface de la parcelle
    #[serde(default = "default_area_col")]
    pub area_col: String,
}

fn default_source() -> String {
    "read_parquet('data.parquet')".to_string()
}
fn default_region_col() -> String {
    "reg_parc".to_string()
}
fn default_department_col() -> String {
    "dep_parc".to_string()
}
fn default_commune_col() -> String {
    "com_parc".to_string()
}
fn default_altitude_col() -> String {
    "alt_mean".to_string()
}
fn default_slope_col() -> String {
    "pente_mean".to_string()
}
fn default_area_col() -> String {
    "surf_parc".to_string()
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self {
            source: default_source(),
            region_col: default_region_col(),
            department_col: default_department_col(),
            commune_col: default_commune_col(),
            altitude_col: default_altitude_col(),
            slope_col: default_slope_col(),
            area_col: default_area_col(),
        }
    }
}

impl DatasetSchema {
    /// Charge un schéma depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Schéma par défaut avec une autre source
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Colonne de regroupement pour un niveau agrégé (None pour le niveau brut)
    pub fn group_column(&self, level: AggregationLevel) -> Option<&str> {
        match level {
            AggregationLevel::Region => Some(&self.region_col),
            AggregationLevel::Department => Some(&self.department_col),
            AggregationLevel::Commune => Some(&self.commune_col),
            AggregationLevel::Raw => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_columns() {
        let schema = DatasetSchema::default();
        assert_eq!(schema.region_col, "reg_parc");
        assert_eq!(schema.group_column(AggregationLevel::Commune), Some("com_parc"));
        assert_eq!(schema.group_column(AggregationLevel::Raw), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let schema: DatasetSchema =
            serde_json::from_str(r#"{"source": "read_parquet('/tmp/x.parquet')"}"#).unwrap();
        assert_eq!(schema.source, "read_parquet('/tmp/x.parquet')");
        assert_eq!(schema.altitude_col, "alt_mean");
    }
}
