//! Construction des requêtes d'agrégation
//!
//! Encode les trois niveaux de drill et le chaînage de leurs filtres.
//! Les codes de scope sont validés AVANT toute construction SQL: un code
//! absent ou invalide est rejeté localement, jamais transmis au moteur.

use crate::error::PrairiesError;
use crate::schema::DatasetSchema;
use crate::types::{
    AggregationLevel, COL_ALTITUDE, COL_KEY, COL_MEAN_ALTITUDE, COL_MEAN_SLOPE, COL_PARCEL_COUNT,
    COL_REGION_CODE, COL_SLOPE, COL_TOTAL_AREA,
};

/// Plafond de lignes au niveau brut (borne le coût de rendu)
pub const RAW_ROW_LIMIT: usize = 10_000;

/// Plafond de lignes pour le nuage de points altitude/pente
pub const SCATTER_ROW_LIMIT: usize = 200_000;

/// Longueur maximale d'un code INSEE (commune: 5 caractères)
const MAX_CODE_LEN: usize = 5;

/// Filtre de scope parent (codes région et/ou département)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    pub region: Option<String>,
    pub department: Option<String>,
}

impl ScopeFilter {
    pub fn region(code: impl Into<String>) -> Self {
        Self {
            region: Some(code.into()),
            department: None,
        }
    }

    pub fn department(code: impl Into<String>) -> Self {
        Self {
            region: None,
            department: Some(code.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.department.is_none()
    }
}

/// Requête d'agrégation entièrement spécifiée, prête à être exécutée
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRequest {
    /// Niveau de la requête (détermine la forme des lignes attendues)
    pub level: AggregationLevel,
    /// Texte SQL complet
    pub sql: String,
    /// Plafond de lignes appliqué (niveau brut et nuage de points)
    pub limit: Option<usize>,
}

/// Constructeur de requêtes paramétré par le schéma du jeu de données
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    schema: DatasetSchema,
}

impl QueryBuilder {
    pub fn new(schema: DatasetSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    /// Requête d'agrégation pour le chemin de drill-down
    ///
    /// Règles de scope (§ filtres chaînés):
    /// - `Region`: scope vide obligatoire
    /// - `Department`: code région obligatoire
    /// - `Commune`: code région OU code département obligatoire
    /// - `Raw`: code département obligatoire (le code région, s'il est
    ///   fourni, est ajouté au filtre)
    ///
    /// # Errors
    ///
    /// `PrairiesError::InvalidScope` si un code requis manque ou est invalide.
    pub fn aggregation(
        &self,
        level: AggregationLevel,
        scope: &ScopeFilter,
    ) -> Result<AggregationRequest, PrairiesError> {
        match level {
            AggregationLevel::Region => {
                if !scope.is_empty() {
                    return Err(PrairiesError::InvalidScope {
                        level,
                        reason: "region level takes no scope filter".to_string(),
                    });
                }
                Ok(self.grouped(level, &[]))
            }
            AggregationLevel::Department => {
                let region = require_code(level, scope.region.as_deref(), "region code")?;
                let filter = equality(&self.schema.region_col, region);
                Ok(self.grouped(level, &[filter]))
            }
            AggregationLevel::Commune => {
                // Les communes acceptent un scope région ou département (exactement un)
                let filter = match (scope.region.as_deref(), scope.department.as_deref()) {
                    (Some(r), None) => {
                        validate_code(level, r, "region code")?;
                        equality(&self.schema.region_col, r)
                    }
                    (None, Some(d)) => {
                        validate_code(level, d, "department code")?;
                        equality(&self.schema.department_col, d)
                    }
                    (None, None) => {
                        return Err(PrairiesError::InvalidScope {
                            level,
                            reason: "commune level requires a region or department code"
                                .to_string(),
                        })
                    }
                    (Some(_), Some(_)) => {
                        return Err(PrairiesError::InvalidScope {
                            level,
                            reason: "commune level takes a single scope code, not both"
                                .to_string(),
                        })
                    }
                };
                Ok(self.grouped(level, &[filter]))
            }
            AggregationLevel::Raw => {
                let department =
                    require_code(level, scope.department.as_deref(), "department code")?;
                let mut filters = vec![equality(&self.schema.department_col, department)];
                if let Some(region) = scope.region.as_deref() {
                    validate_code(level, region, "region code")?;
                    filters.push(equality(&self.schema.region_col, region));
                }
                Ok(self.raw(&filters))
            }
        }
    }

    /// Requête d'agrégation nationale (vue carte: toutes les unités soeurs
    /// d'un niveau, sans scope parent)
    ///
    /// # Errors
    ///
    /// `PrairiesError::InvalidScope` si le niveau demandé est `Raw`.
    pub fn national(&self, level: AggregationLevel) -> Result<AggregationRequest, PrairiesError> {
        if !level.is_aggregate() {
            return Err(PrairiesError::InvalidScope {
                level,
                reason: "national fetch is only defined for aggregate levels".to_string(),
            });
        }
        Ok(self.grouped(level, &[]))
    }

    /// Requête du nuage de points altitude/pente (toutes régions confondues)
    pub fn scatter(&self) -> AggregationRequest {
        let s = &self.schema;
        let sql = format!(
            "SELECT CAST({alt} AS DOUBLE) AS {c_alt}, \
             CAST({slope} AS DOUBLE) AS {c_slope}, \
             {reg} AS {c_reg} \
             FROM {source} \
             WHERE {alt} IS NOT NULL AND {slope} IS NOT NULL \
             LIMIT {limit}",
            alt = s.altitude_col,
            slope = s.slope_col,
            reg = s.region_col,
            c_alt = COL_ALTITUDE,
            c_slope = COL_SLOPE,
            c_reg = COL_REGION_CODE,
            source = s.source,
            limit = SCATTER_ROW_LIMIT,
        );
        AggregationRequest {
            level: AggregationLevel::Raw,
            sql,
            limit: Some(SCATTER_ROW_LIMIT),
        }
    }

    /// Forme commune des requêtes agrégées: moyennes, somme, comptage,
    /// groupées par la clé du niveau, clés nulles exclues
    fn grouped(&self, level: AggregationLevel, filters: &[String]) -> AggregationRequest {
        let s = &self.schema;
        let group_col = s
            .group_column(level)
            .expect("grouped() is only called for aggregate levels");

        let mut where_clause = format!("{} IS NOT NULL", group_col);
        for filter in filters {
            where_clause.push_str(" AND ");
            where_clause.push_str(filter);
        }

        let sql = format!(
            "SELECT {group_col} AS {c_key}, \
             AVG(CAST({alt} AS DOUBLE)) AS {c_malt}, \
             AVG(CAST({slope} AS DOUBLE)) AS {c_mslope}, \
             SUM(CAST({area} AS DOUBLE)) AS {c_area}, \
             COUNT(*) AS {c_count} \
             FROM {source} \
             WHERE {where_clause} \
             GROUP BY {group_col} \
             ORDER BY {c_key}",
            group_col = group_col,
            c_key = COL_KEY,
            alt = s.altitude_col,
            slope = s.slope_col,
            area = s.area_col,
            c_malt = COL_MEAN_ALTITUDE,
            c_mslope = COL_MEAN_SLOPE,
            c_area = COL_TOTAL_AREA,
            c_count = COL_PARCEL_COUNT,
            source = s.source,
            where_clause = where_clause,
        );

        AggregationRequest {
            level,
            sql,
            limit: None,
        }
    }

    /// Requête brute, plafonnée à `RAW_ROW_LIMIT` lignes
    fn raw(&self, filters: &[String]) -> AggregationRequest {
        let s = &self.schema;
        let mut where_clause = format!("{alt} IS NOT NULL AND {slope} IS NOT NULL",
            alt = s.altitude_col,
            slope = s.slope_col,
        );
        for filter in filters {
            where_clause.push_str(" AND ");
            where_clause.push_str(filter);
        }

        let sql = format!(
            "SELECT CAST({alt} AS DOUBLE) AS {c_alt}, \
             CAST({slope} AS DOUBLE) AS {c_slope}, \
             {reg} AS {c_reg} \
             FROM {source} \
             WHERE {where_clause} \
             LIMIT {limit}",
            alt = s.altitude_col,
            slope = s.slope_col,
            reg = s.region_col,
            c_alt = COL_ALTITUDE,
            c_slope = COL_SLOPE,
            c_reg = COL_REGION_CODE,
            source = s.source,
            where_clause = where_clause,
            limit = RAW_ROW_LIMIT,
        );

        AggregationRequest {
            level: AggregationLevel::Raw,
            sql,
            limit: Some(RAW_ROW_LIMIT),
        }
    }
}

/// Prédicat d'égalité sur une colonne de scope
///
/// Le code a déjà été validé (alphanumérique ASCII), l'échappement des
/// apostrophes est conservé par prudence.
fn equality(column: &str, code: &str) -> String {
    format!("{} = '{}'", column, code.replace('\'', "''"))
}

fn require_code<'a>(
    level: AggregationLevel,
    code: Option<&'a str>,
    what: &str,
) -> Result<&'a str, PrairiesError> {
    let code = code.ok_or_else(|| PrairiesError::InvalidScope {
        level,
        reason: format!("{} is required at this level", what),
    })?;
    validate_code(level, code, what)?;
    Ok(code)
}

/// Valide un code INSEE avant insertion dans une requête
///
/// Codes acceptés: 1 à 5 caractères ASCII alphanumériques (chiffres, plus
/// 2A/2B pour la Corse). Tout le reste est rejeté avant construction SQL.
fn validate_code(level: AggregationLevel, code: &str, what: &str) -> Result<(), PrairiesError> {
    if code.is_empty() {
        return Err(PrairiesError::InvalidScope {
            level,
            reason: format!("{} is empty", what),
        });
    }
    if code.len() > MAX_CODE_LEN {
        return Err(PrairiesError::InvalidScope {
            level,
            reason: format!("{} '{}' exceeds {} characters", what, code, MAX_CODE_LEN),
        });
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PrairiesError::InvalidScope {
            level,
            reason: format!("{} '{}' contains non-alphanumeric characters", what, code),
        });
    }
    Ok(())
}
