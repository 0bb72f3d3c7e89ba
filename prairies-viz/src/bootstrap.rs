//! Bootstrap du jeu de données Parquet
//!
//! Le fichier des prairies est publié en tranches binaires (`data.parquet.aa`,
//! `.ab`, ...) pour contourner les limites de taille d'hébergement. Les
//! tranches sont téléchargées en parallèle puis concaténées DANS L'ORDRE des
//! URLs: le résultat doit être octet pour octet le fichier d'origine, sinon
//! le pied de page Parquet est invalide.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use futures::future::try_join_all;
use reqwest::Client;
use tracing::{debug, info};

/// Emplacement du jeu de données
#[derive(Debug, Clone)]
pub enum DataLocation {
    /// Fichier Parquet complet sur disque
    File(PathBuf),
    /// Répertoire de tranches locales (ordre lexicographique des noms)
    ChunkDir(PathBuf),
    /// Tranches distantes, dans l'ordre de reconstitution
    Urls(Vec<String>),
}

/// Résout l'emplacement à partir des arguments de la ligne de commande
pub fn resolve_location(data: Option<PathBuf>, urls: Vec<String>) -> Result<DataLocation> {
    if !urls.is_empty() {
        if data.is_some() {
            bail!("--data and --url are mutually exclusive");
        }
        return Ok(DataLocation::Urls(urls));
    }
    match data {
        Some(path) if path.is_dir() => Ok(DataLocation::ChunkDir(path)),
        Some(path) if path.is_file() => Ok(DataLocation::File(path)),
        Some(path) => bail!("Data path does not exist: {}", path.display()),
        None => bail!("No dataset given, use --data <path> or --url <url>..."),
    }
}

/// Prépare un fichier Parquet lisible localement et renvoie son chemin
///
/// Les emplacements en tranches sont reconstitués dans un fichier temporaire
/// du répertoire système.
pub async fn prepare_parquet(client: &Client, location: DataLocation) -> Result<PathBuf> {
    match location {
        DataLocation::File(path) => {
            info!(path = %path.display(), "Using local parquet file");
            Ok(path)
        }
        DataLocation::ChunkDir(dir) => {
            let chunks = list_chunks(&dir)?;
            info!(dir = %dir.display(), chunks = chunks.len(), "Merging local chunks");
            let merged = merge_files(&chunks)?;
            write_merged(&merged)
        }
        DataLocation::Urls(urls) => {
            info!(chunks = urls.len(), "Fetching remote chunks");
            let merged = fetch_and_merge(client, &urls).await?;
            write_merged(&merged)
        }
    }
}

/// Télécharge toutes les tranches en parallèle et les concatène dans
/// l'ordre des URLs
pub async fn fetch_and_merge(client: &Client, urls: &[String]) -> Result<Vec<u8>> {
    if urls.is_empty() {
        bail!("No chunk URLs given");
    }

    let fetches = urls.iter().map(|url| fetch_chunk(client, url));
    // try_join_all préserve l'ordre des futures, donc l'ordre des tranches
    let chunks: Vec<Bytes> = try_join_all(fetches).await?;

    let total: usize = chunks.iter().map(Bytes::len).sum();
    let mut merged = Vec::with_capacity(total);
    for chunk in &chunks {
        merged.extend_from_slice(chunk);
    }
    info!(bytes = merged.len(), "Chunks merged");
    Ok(merged)
}

async fn fetch_chunk(client: &Client, url: &str) -> Result<Bytes> {
    debug!(url, "Fetching chunk");
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request failed: {}", url))?
        .error_for_status()
        .with_context(|| format!("Bad status for chunk: {}", url))?;
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read chunk body: {}", url))?;
    debug!(url, bytes = bytes.len(), "Chunk fetched");
    Ok(bytes)
}

/// Liste les tranches d'un répertoire, triées par nom
///
/// Les suffixes produits par `split` (`.aa`, `.ab`, ...) sont croissants en
/// ordre lexicographique, le tri par nom reconstitue donc l'ordre d'origine.
fn list_chunks(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut chunks: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read chunk directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    if chunks.is_empty() {
        bail!("No chunk files in {}", dir.display());
    }
    chunks.sort();
    Ok(chunks)
}

fn merge_files(paths: &[PathBuf]) -> Result<Vec<u8>> {
    let mut merged = Vec::new();
    for path in paths {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read chunk: {}", path.display()))?;
        merged.extend_from_slice(&bytes);
    }
    Ok(merged)
}

fn write_merged(bytes: &[u8]) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("prairies-{}.parquet", std::process::id()));
    fs::write(&path, bytes)
        .with_context(|| format!("Failed to write merged parquet: {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "Merged parquet written");
    Ok(path)
}
