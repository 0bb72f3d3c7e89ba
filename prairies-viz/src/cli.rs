//! Définition et implémentation des commandes CLI
//!
//! Cinq vues:
//! - `regions` / `departments`: carte choroplèthe nationale du niveau
//! - `communes`: agrégats par commune d'une région ou d'un département
//! - `scatter`: nuage de points altitude/pente
//! - `drill`: parcours interactif région → département → parcelles

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use prairies::dataset::{parse_aggregates, parse_raw, Dataset};
use prairies::{
    choropleth, AggregationLevel, DatasetSchema, DrillDriver, DrillView, QueryBuilder, ScopeFilter,
};
use reqwest::Client;
use tracing::{info, warn};

use crate::bootstrap;
use crate::boundaries;
use crate::duck::DuckDbDataset;
use crate::render;

/// Provenance du jeu de données (communs à toutes les commandes)
#[derive(Args)]
pub struct DataArgs {
    /// Fichier Parquet complet, ou répertoire de tranches `data.parquet.*`
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// URL d'une tranche distante (répéter dans l'ordre de reconstitution)
    #[arg(long = "url", global = true)]
    pub urls: Vec<String>,

    /// Schéma des colonnes en JSON (défaut: colonnes du fichier prairies)
    #[arg(long, global = true)]
    pub schema: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Carte choroplèthe des régions (altitude moyenne)
    Regions {
        /// Limites GeoJSON (URL ou fichier, défaut: france-geojson)
        #[arg(long)]
        boundaries: Option<String>,

        /// Fichier GeoJSON enrichi à écrire
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Carte choroplèthe des départements (altitude moyenne)
    Departments {
        /// Limites GeoJSON (URL ou fichier, défaut: france-geojson)
        #[arg(long)]
        boundaries: Option<String>,

        /// Fichier GeoJSON enrichi à écrire
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Agrégats par commune d'une région ou d'un département
    Communes {
        /// Code région (exclusif avec --department)
        #[arg(long)]
        region: Option<String>,

        /// Code département (exclusif avec --region)
        #[arg(long)]
        department: Option<String>,
    },

    /// Nuage de points altitude/pente sur l'ensemble des parcelles
    Scatter {
        /// Fichier JSON à écrire (une entrée par parcelle)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parcours interactif région → département → parcelles
    Drill,
}

/// Prépare le moteur: reconstitution du Parquet, enregistrement de la source
pub async fn setup(client: &Client, args: &DataArgs) -> Result<(DuckDbDataset, DatasetSchema)> {
    let location = bootstrap::resolve_location(args.data.clone(), args.urls.clone())?;
    let parquet = bootstrap::prepare_parquet(client, location).await?;

    let dataset = DuckDbDataset::open_in_memory()?;
    let source = dataset.register_parquet(&parquet)?;

    let mut schema = match &args.schema {
        Some(path) => DatasetSchema::load(path)
            .with_context(|| format!("Failed to load schema: {}", path.display()))?,
        None => DatasetSchema::default(),
    };
    // La source vient toujours du fichier réellement enregistré
    schema.source = source;

    Ok((dataset, schema))
}

/// Commande carte: agrégats nationaux d'un niveau joints à ses limites
pub async fn cmd_map(
    client: &Client,
    dataset: &DuckDbDataset,
    schema: DatasetSchema,
    level: AggregationLevel,
    boundaries_src: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let builder = QueryBuilder::new(schema);
    let request = builder.national(level)?;
    let rows = dataset.execute(&request.sql)?;
    let aggregates = parse_aggregates(&rows)?;
    info!(level = %level, aggregates = aggregates.len(), "National aggregates computed");

    let source = match boundaries_src {
        Some(src) => src,
        None => boundaries::default_url(level)
            .context("No default boundaries for this level")?
            .to_string(),
    };
    let set = boundaries::load(client, &source).await?;

    let layer = choropleth::assemble(level, &set.units, &aggregates);
    render::render_layer_summary(&layer);
    if let Some(fill) = layer.fills.iter().find(|f| f.stats.is_some()) {
        // Panneau de détails de la première unité appariée, comme au survol
        if let Some(stats) = &fill.stats {
            render::show_details(&fill.name, stats);
        }
    }

    if let Some(path) = output {
        render::write_choropleth_geojson(&layer, set.collection, &path)?;
        info!(path = %path.display(), "Choropleth GeoJSON written");
    }
    Ok(())
}

/// Commande communes: tableau des agrégats du scope demandé
pub fn cmd_communes(
    dataset: &DuckDbDataset,
    schema: DatasetSchema,
    region: Option<String>,
    department: Option<String>,
) -> Result<()> {
    let scope = ScopeFilter { region, department };
    let builder = QueryBuilder::new(schema);
    // Le constructeur rejette un scope vide ou double
    let request = builder.aggregation(AggregationLevel::Commune, &scope)?;
    let rows = dataset.execute(&request.sql)?;
    let aggregates = parse_aggregates(&rows)?;

    if aggregates.is_empty() {
        println!("Aucune commune pour ce scope.");
        return Ok(());
    }
    render::render_aggregate_table("Agrégats par commune", &aggregates);
    Ok(())
}

/// Commande scatter: nuage altitude/pente, résumé console et JSON optionnel
pub fn cmd_scatter(
    dataset: &DuckDbDataset,
    schema: DatasetSchema,
    output: Option<PathBuf>,
) -> Result<()> {
    let builder = QueryBuilder::new(schema);
    let request = builder.scatter();
    let rows = dataset.execute(&request.sql)?;
    let records = parse_raw(&rows)?;

    render::render_raw_summary(&records);
    if let Some(path) = output {
        render::write_scatter_json(&records, &path)?;
        info!(path = %path.display(), points = records.len(), "Scatter JSON written");
    }
    Ok(())
}

/// Commande drill: boucle interactive sur l'entrée standard
///
/// Commandes: un code pour descendre, `back` pour remonter, `quit` pour
/// sortir. Une erreur de transition laisse la vue courante intacte.
pub fn cmd_drill(dataset: &DuckDbDataset, schema: DatasetSchema) -> Result<()> {
    let mut driver = DrillDriver::new(schema, dataset);

    match driver.start() {
        Ok(Some(update)) => render_update(&update.view),
        Ok(None) => {
            println!("Jeu de données vide.");
            return Ok(());
        }
        Err(e) => return Err(e).context("Initial drill load failed"),
    }

    let stdin = io::stdin();
    loop {
        print!("{}> ", driver.state().level());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let outcome = match input {
            "quit" | "q" => break,
            "back" | "b" => driver.back(),
            key => driver.select(key.strip_prefix("select ").unwrap_or(key).trim()),
        };

        match outcome {
            Ok(Some(update)) => render_update(&update.view),
            Ok(None) => println!("Aucune donnée, vue inchangée."),
            Err(e) => {
                // La machine n'a pas muté: on peut continuer
                warn!(error = %e, "Drill transition failed");
                println!("Erreur: {}", e);
            }
        }
    }
    Ok(())
}

fn render_update(view: &DrillView) {
    match view {
        DrillView::Aggregates { level, records } => {
            render::render_aggregate_table(&format!("Agrégats par {}", level), records);
        }
        DrillView::RawPoints { records } => render::render_raw_summary(records),
    }
}
