//! # prairies
//!
//! Moteur d'agrégation et de drill-down pour les statistiques de prairies
//! (parcelles agricoles) françaises.
//!
//! ## Features
//!
//! - Construction de requêtes d'agrégation par région / département / commune
//! - Machine à états de drill-down (région → département → parcelles brutes)
//! - Assemblage de couches choroplèthes (jointure agrégats ↔ limites administratives)
//! - Accès aux données via un trait `Dataset` (moteur SQL traité en boîte noire)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use prairies::{DatasetSchema, DrillDriver};
//!
//! let schema = DatasetSchema::default();
//! let mut driver = DrillDriver::new(schema, dataset);
//! let view = driver.start()?;              // agrégats par région
//! let view = driver.select("11")?;         // départements de la région 11
//! let view = driver.select("75")?;         // parcelles brutes du département 75
//! let view = driver.back()?;               // retour aux départements (sans re-fetch)
//! ```

pub mod choropleth;
pub mod dataset;
pub mod drill;
pub mod error;
pub mod query;
pub mod schema;
pub mod types;

pub use choropleth::{assemble, BoundaryUnit, ChoroplethLayer, UnitFill};
pub use dataset::Dataset;
pub use drill::{DrillDriver, DrillMachine, DrillView, PendingTransition, Transition, ViewUpdate};
pub use error::PrairiesError;
pub use query::{AggregationRequest, QueryBuilder, ScopeFilter, RAW_ROW_LIMIT, SCATTER_ROW_LIMIT};
pub use schema::DatasetSchema;
pub use types::{AggregateRecord, AggregationLevel, DrillState, RawParcelRecord, Record, Value};
