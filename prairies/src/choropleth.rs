//! Assemblage des couches choroplèthes
//!
//! Jointure entre les agrégats d'un niveau et la collection de limites
//! administratives du même niveau. La jointure est exacte sur le code
//! canonique; une unité sans agrégat reçoit un remplissage neutre au lieu
//! de faire échouer la vue.
//!
//! Format canonique des codes: blancs ASCII supprimés, lettres en
//! majuscules (2a → 2A). Les zéros de tête sont CONSERVÉS: les codes INSEE
//! sont des identifiants zéro-paddés, pas des nombres ("01" ≠ "1").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{AggregateRecord, AggregationLevel};

/// Unité administrative issue d'une collection de limites (code + nom)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryUnit {
    /// Code INSEE de l'unité
    pub code: String,
    /// Nom d'affichage
    pub name: String,
}

/// Remplissage d'une unité de la carte
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFill {
    /// Code canonique de l'unité
    pub code: String,
    pub name: String,
    /// Scalaire du choroplèthe (altitude moyenne), None → remplissage neutre
    pub value: Option<f64>,
    /// Agrégat complet pour le panneau de détails
    pub stats: Option<AggregateRecord>,
}

/// Couche choroplèthe prête à être rendue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoroplethLayer {
    pub level: AggregationLevel,
    /// Une entrée par unité de la collection de limites, dans le même ordre
    pub fills: Vec<UnitFill>,
    /// Domaine (min, max) du scalaire sur les unités appariées, pour
    /// l'échelle de couleur; None si aucune unité n'est appariée
    pub domain: Option<(f64, f64)>,
    /// Codes d'unités sans agrégat correspondant
    pub unmatched: Vec<String>,
}

impl ChoroplethLayer {
    pub fn matched_count(&self) -> usize {
        self.fills.iter().filter(|f| f.stats.is_some()).count()
    }
}

/// Forme canonique d'un code d'unité administrative
pub fn canonical_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Assemble une couche choroplèthe par jointure exacte code ↔ agrégat
///
/// Les deux côtés de la jointure sont canonisés. Un agrégat dont le code
/// n'apparaît dans aucune limite est ignoré silencieusement (l'inverse est
/// compté dans `unmatched`).
pub fn assemble(
    level: AggregationLevel,
    units: &[BoundaryUnit],
    aggregates: &[AggregateRecord],
) -> ChoroplethLayer {
    let by_code: HashMap<String, &AggregateRecord> = aggregates
        .iter()
        .map(|agg| (canonical_code(&agg.key), agg))
        .collect();

    let mut fills = Vec::with_capacity(units.len());
    let mut unmatched = Vec::new();
    let mut domain: Option<(f64, f64)> = None;

    for unit in units {
        let code = canonical_code(&unit.code);
        match by_code.get(&code) {
            Some(agg) => {
                let value = agg.mean_altitude;
                if !value.is_nan() {
                    domain = Some(match domain {
                        Some((min, max)) => (min.min(value), max.max(value)),
                        None => (value, value),
                    });
                }
                fills.push(UnitFill {
                    code,
                    name: unit.name.clone(),
                    value: Some(value),
                    stats: Some((*agg).clone()),
                });
            }
            None => {
                unmatched.push(code.clone());
                fills.push(UnitFill {
                    code,
                    name: unit.name.clone(),
                    value: None,
                    stats: None,
                });
            }
        }
    }

    debug!(
        level = %level,
        units = units.len(),
        unmatched = unmatched.len(),
        "Assembled choropleth layer"
    );

    ChoroplethLayer {
        level,
        fills,
        domain,
        unmatched,
    }
}
