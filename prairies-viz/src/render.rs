//! Rendu console et sorties GeoJSON
//!
//! Les vues cartographiques sont écrites en GeoJSON enrichi (les agrégats
//! sont fusionnés dans les propriétés des features, prêts pour un rendu
//! choroplèthe). Les vues tabulaires et le nuage de points sont rendus sur
//! la console.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geojson::{FeatureCollection, GeoJson, JsonValue};
use prairies::choropleth::canonical_code;
use prairies::{AggregateRecord, ChoroplethLayer, RawParcelRecord, UnitFill};

/// Panneau de détails d'une unité (équivalent console de l'infobulle)
pub fn show_details(name: &str, stats: &AggregateRecord) {
    println!("─── {} ({})", name, stats.key);
    println!("  Altitude moyenne : {:.1} m", stats.mean_altitude);
    println!("  Pente moyenne    : {:.2} %", stats.mean_slope);
    println!("  Surface totale   : {:.1} ha", stats.total_area);
    println!("  Parcelles        : {}", stats.parcel_count);
}

/// Tableau d'agrégats (une ligne par unité, dans l'ordre des clés)
pub fn render_aggregate_table(title: &str, records: &[AggregateRecord]) {
    println!("{}", title);
    println!(
        "{:<8} {:>12} {:>10} {:>14} {:>10}",
        "code", "alt. moy.", "pente", "surface (ha)", "parcelles"
    );
    for rec in records {
        println!(
            "{:<8} {:>12.1} {:>10.2} {:>14.1} {:>10}",
            rec.key, rec.mean_altitude, rec.mean_slope, rec.total_area, rec.parcel_count
        );
    }
    println!("({} lignes)", records.len());
}

/// Résumé du nuage de points altitude/pente
pub fn render_raw_summary(records: &[RawParcelRecord]) {
    if records.is_empty() {
        println!("Aucune parcelle.");
        return;
    }
    let (mut alt_min, mut alt_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut slope_min, mut slope_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for rec in records {
        alt_min = alt_min.min(rec.altitude);
        alt_max = alt_max.max(rec.altitude);
        slope_min = slope_min.min(rec.slope);
        slope_max = slope_max.max(rec.slope);
    }
    println!("{} parcelles", records.len());
    println!("  altitude : {:.1} .. {:.1} m", alt_min, alt_max);
    println!("  pente    : {:.2} .. {:.2} %", slope_min, slope_max);
}

/// Résumé d'une couche choroplèthe (appariement et domaine de l'échelle)
pub fn render_layer_summary(layer: &ChoroplethLayer) {
    println!(
        "Couche {}: {} unités appariées, {} sans données",
        layer.level,
        layer.matched_count(),
        layer.unmatched.len()
    );
    match layer.domain {
        Some((min, max)) => println!("  domaine altitude : {:.1} .. {:.1} m", min, max),
        None => println!("  domaine vide (aucune unité appariée)"),
    }
    if !layer.unmatched.is_empty() {
        println!("  codes sans agrégat : {}", layer.unmatched.join(", "));
    }
}

/// Fusionne une couche choroplèthe dans les propriétés de la collection
///
/// Chaque feature reçoit `fill_value` et les champs de son agrégat; une
/// feature sans agrégat reçoit `fill_value: null`. La géométrie n'est pas
/// touchée.
pub fn merge_layer_into_collection(
    layer: &ChoroplethLayer,
    mut collection: FeatureCollection,
) -> FeatureCollection {
    let fills: HashMap<&str, &UnitFill> =
        layer.fills.iter().map(|f| (f.code.as_str(), f)).collect();

    for feature in &mut collection.features {
        let Some(props) = feature.properties.as_mut() else {
            continue;
        };
        let Some(code) = props.get("code").and_then(|v| v.as_str()) else {
            continue;
        };
        let code = canonical_code(code);
        match fills.get(code.as_str()).and_then(|f| f.stats.as_ref()) {
            Some(stats) => {
                props.insert("fill_value".to_string(), json_f64(stats.mean_altitude));
                props.insert("mean_altitude".to_string(), json_f64(stats.mean_altitude));
                props.insert("mean_slope".to_string(), json_f64(stats.mean_slope));
                props.insert("total_area".to_string(), json_f64(stats.total_area));
                props.insert(
                    "parcel_count".to_string(),
                    JsonValue::from(stats.parcel_count),
                );
            }
            None => {
                props.insert("fill_value".to_string(), JsonValue::Null);
            }
        }
    }
    collection
}

/// Écrit la collection enrichie sur disque
pub fn write_choropleth_geojson(
    layer: &ChoroplethLayer,
    collection: FeatureCollection,
    path: &Path,
) -> Result<()> {
    let merged = merge_layer_into_collection(layer, collection);
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write!(writer, "{}", GeoJson::FeatureCollection(merged))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Écrit le nuage de points en JSON (une entrée par parcelle)
pub fn write_scatter_json(records: &[RawParcelRecord], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), records)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn json_f64(value: f64) -> JsonValue {
    // NaN n'est pas représentable en JSON
    if value.is_nan() {
        JsonValue::Null
    } else {
        JsonValue::from(value)
    }
}
