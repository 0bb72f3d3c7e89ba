//! Types de données pour le crate prairies

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PrairiesError;

/// Alias de colonnes produits par le constructeur de requêtes (niveaux agrégés)
pub const COL_KEY: &str = "key";
pub const COL_MEAN_ALTITUDE: &str = "mean_altitude";
pub const COL_MEAN_SLOPE: &str = "mean_slope";
pub const COL_TOTAL_AREA: &str = "total_area";
pub const COL_PARCEL_COUNT: &str = "parcel_count";

/// Alias de colonnes pour le niveau brut et le nuage de points
pub const COL_ALTITUDE: &str = "altitude";
pub const COL_SLOPE: &str = "slope";
pub const COL_REGION_CODE: &str = "region_code";

/// Niveau d'agrégation administratif
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationLevel {
    /// Région (niveau initial)
    Region,
    /// Département
    Department,
    /// Commune (vues cartographiques uniquement, hors drill-down)
    Commune,
    /// Parcelles brutes, non agrégées
    Raw,
}

impl AggregationLevel {
    /// Le résultat de ce niveau est-il un agrégat ?
    pub fn is_aggregate(self) -> bool {
        !matches!(self, AggregationLevel::Raw)
    }
}

impl fmt::Display for AggregationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregationLevel::Region => "region",
            AggregationLevel::Department => "department",
            AggregationLevel::Commune => "commune",
            AggregationLevel::Raw => "raw",
        };
        f.write_str(s)
    }
}

/// Valeur d'une cellule renvoyée par le moteur de requête
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Valeur numérique si convertible (Int ou Float)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Valeur entière si convertible sans perte
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Valeur texte si la cellule est textuelle
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Une ligne de résultat: nom de colonne → valeur
pub type Record = HashMap<String, Value>;

fn require_f64(record: &Record, column: &str) -> Result<f64, PrairiesError> {
    let value = record
        .get(column)
        .ok_or_else(|| PrairiesError::record(column, "missing column"))?;
    let n = value
        .as_f64()
        .ok_or_else(|| PrairiesError::record(column, format!("expected number, got {:?}", value)))?;
    if n.is_nan() {
        return Err(PrairiesError::record(column, "NaN after null filtering"));
    }
    Ok(n)
}

fn require_str(record: &Record, column: &str) -> Result<String, PrairiesError> {
    let value = record
        .get(column)
        .ok_or_else(|| PrairiesError::record(column, "missing column"))?;
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| PrairiesError::record(column, format!("expected text, got {:?}", value)))
}

/// Agrégat pour une unité administrative (région, département ou commune)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    /// Code de l'unité (code INSEE région/département/commune)
    pub key: String,
    /// Altitude moyenne des parcelles (m)
    pub mean_altitude: f64,
    /// Pente moyenne des parcelles (%)
    pub mean_slope: f64,
    /// Surface totale (ha)
    pub total_area: f64,
    /// Nombre de parcelles agrégées
    pub parcel_count: u64,
}

impl AggregateRecord {
    /// Construit un agrégat depuis une ligne du moteur
    ///
    /// # Errors
    ///
    /// Retourne `PrairiesError::Record` si une colonne manque, n'est pas
    /// numérique, vaut NaN, ou viole un invariant (compteur/surface négatifs).
    pub fn from_record(record: &Record) -> Result<Self, PrairiesError> {
        let key = require_str(record, COL_KEY)?;
        let mean_altitude = require_f64(record, COL_MEAN_ALTITUDE)?;
        let mean_slope = require_f64(record, COL_MEAN_SLOPE)?;
        let total_area = require_f64(record, COL_TOTAL_AREA)?;
        let parcel_count = record
            .get(COL_PARCEL_COUNT)
            .and_then(Value::as_i64)
            .ok_or_else(|| PrairiesError::record(COL_PARCEL_COUNT, "missing or non-integer"))?;

        if parcel_count < 0 {
            return Err(PrairiesError::record(COL_PARCEL_COUNT, "negative count"));
        }
        if total_area < 0.0 {
            return Err(PrairiesError::record(COL_TOTAL_AREA, "negative area"));
        }

        Ok(Self {
            key,
            mean_altitude,
            mean_slope,
            total_area,
            parcel_count: parcel_count as u64,
        })
    }
}

/// Parcelle individuelle (niveau de drill le plus profond, et nuage de points)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawParcelRecord {
    /// Altitude de la parcelle (m)
    pub altitude: f64,
    /// Pente de la parcelle (%)
    pub slope: f64,
    /// Code INSEE de la région
    pub region_code: String,
}

impl RawParcelRecord {
    /// Construit une parcelle brute depuis une ligne du moteur
    pub fn from_record(record: &Record) -> Result<Self, PrairiesError> {
        Ok(Self {
            altitude: require_f64(record, COL_ALTITUDE)?,
            slope: require_f64(record, COL_SLOPE)?,
            region_code: require_str(record, COL_REGION_CODE)?,
        })
    }
}

/// État courant du drill-down
///
/// Invariants garantis par construction:
/// - `selected_department` n'est défini qu'au niveau `Raw`
/// - `selected_region` n'est défini qu'aux niveaux `Department` et `Raw`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillState {
    level: AggregationLevel,
    selected_region: Option<String>,
    selected_department: Option<String>,
}

impl DrillState {
    /// État initial: vue région, aucune sélection
    pub fn region() -> Self {
        Self {
            level: AggregationLevel::Region,
            selected_region: None,
            selected_department: None,
        }
    }

    /// Vue département, paramétrée par la région sélectionnée
    pub fn department(region: impl Into<String>) -> Self {
        Self {
            level: AggregationLevel::Department,
            selected_region: Some(region.into()),
            selected_department: None,
        }
    }

    /// Vue brute, paramétrée par région + département
    pub fn raw(region: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            level: AggregationLevel::Raw,
            selected_region: Some(region.into()),
            selected_department: Some(department.into()),
        }
    }

    pub fn level(&self) -> AggregationLevel {
        self.level
    }

    pub fn selected_region(&self) -> Option<&str> {
        self.selected_region.as_deref()
    }

    pub fn selected_department(&self) -> Option<&str> {
        self.selected_department.as_deref()
    }
}

impl Default for DrillState {
    fn default() -> Self {
        Self::region()
    }
}
