//! Limites administratives GeoJSON
//!
//! Les contours des régions et départements sont chargés depuis le dépôt
//! france-geojson (ou un fichier local). Les communes n'ont pas de couche de
//! limites: leur vue est un tableau d'agrégats, pas une carte.

use std::path::Path;

use anyhow::{bail, Context, Result};
use geojson::{FeatureCollection, GeoJson};
use prairies::{AggregationLevel, BoundaryUnit};
use reqwest::Client;
use tracing::{info, warn};

pub const REGIONS_URL: &str =
    "https://raw.githubusercontent.com/gregoiredavid/france-geojson/master/regions.geojson";
pub const DEPARTMENTS_URL: &str =
    "https://raw.githubusercontent.com/gregoiredavid/france-geojson/master/departements.geojson";

/// Collection de limites et unités (code, nom) extraites de ses features
pub struct BoundarySet {
    pub collection: FeatureCollection,
    pub units: Vec<BoundaryUnit>,
}

/// URL par défaut des limites d'un niveau, None si le niveau n'a pas de carte
pub fn default_url(level: AggregationLevel) -> Option<&'static str> {
    match level {
        AggregationLevel::Region => Some(REGIONS_URL),
        AggregationLevel::Department => Some(DEPARTMENTS_URL),
        AggregationLevel::Commune | AggregationLevel::Raw => None,
    }
}

/// Charge une collection de limites depuis une URL http(s) ou un fichier
pub async fn load(client: &Client, source: &str) -> Result<BoundarySet> {
    let content = if source.starts_with("http://") || source.starts_with("https://") {
        info!(url = source, "Fetching boundaries");
        client
            .get(source)
            .send()
            .await
            .with_context(|| format!("Boundary request failed: {}", source))?
            .error_for_status()
            .with_context(|| format!("Bad status for boundaries: {}", source))?
            .text()
            .await
            .context("Failed to read boundary body")?
    } else {
        info!(path = source, "Reading boundaries from file");
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("Failed to read boundary file: {}", source))?
    };

    let geojson: GeoJson = content
        .parse()
        .with_context(|| format!("Invalid GeoJSON in {}", source))?;
    let collection = FeatureCollection::try_from(geojson)
        .with_context(|| format!("Expected a FeatureCollection in {}", source))?;

    if collection.features.is_empty() {
        bail!("Boundary collection is empty: {}", source);
    }

    let units = units_from_collection(&collection);
    info!(
        features = collection.features.len(),
        units = units.len(),
        "Boundaries loaded"
    );
    Ok(BoundarySet { collection, units })
}

/// Extrait les unités (code INSEE, nom) des propriétés des features
///
/// Une feature sans propriété `code` est ignorée avec un avertissement: elle
/// recevra un remplissage neutre au rendu.
pub fn units_from_collection(collection: &FeatureCollection) -> Vec<BoundaryUnit> {
    let mut units = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        let Some(props) = &feature.properties else {
            warn!("Boundary feature without properties, skipping");
            continue;
        };
        let Some(code) = props.get("code").and_then(|v| v.as_str()) else {
            warn!("Boundary feature without code property, skipping");
            continue;
        };
        let name = props
            .get("nom")
            .and_then(|v| v.as_str())
            .unwrap_or(code)
            .to_string();
        units.push(BoundaryUnit {
            code: code.to_string(),
            name,
        });
    }
    units
}
