//! Visualisation des statistiques de prairies par parcelle
//!
//! Assemble le moteur analytique embarqué (DuckDB), la reconstitution du
//! Parquet en tranches, les limites administratives GeoJSON et les vues
//! console autour de la bibliothèque `prairies`.

pub mod bootstrap;
pub mod boundaries;
pub mod cli;
pub mod duck;
pub mod render;
