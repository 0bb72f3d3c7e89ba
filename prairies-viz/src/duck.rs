//! Implémentation du trait `Dataset` sur DuckDB
//!
//! Le moteur analytique est embarqué en mémoire; le fichier Parquet des
//! prairies est enregistré après le bootstrap. Tant qu'aucune source n'est
//! enregistrée, les requêtes sont rejetées avec `NotReady` (réponse typée,
//! pas de séquence vide silencieuse).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use duckdb::types::Value as DuckValue;
use duckdb::Connection;
use prairies::{Dataset, PrairiesError, Record, Value};
use tracing::{debug, info};

/// Jeu de données adossé à une connexion DuckDB en mémoire
pub struct DuckDbDataset {
    conn: Mutex<Connection>,
    ready: AtomicBool,
}

impl DuckDbDataset {
    /// Ouvre une base DuckDB en mémoire, sans source enregistrée
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open DuckDB in memory")?;
        info!("DuckDB engine started (in-memory)");
        Ok(Self {
            conn: Mutex::new(conn),
            ready: AtomicBool::new(false),
        })
    }

    /// Enregistre un fichier Parquet comme source et renvoie l'expression
    /// SQL à utiliser comme `source` du schéma
    pub fn register_parquet(&self, path: &Path) -> Result<String> {
        let escaped = path.display().to_string().replace('\'', "''");
        let source = format!("read_parquet('{}')", escaped);
        self.register_source(&source)?;
        info!(path = %path.display(), "Parquet dataset registered");
        Ok(source)
    }

    /// Enregistre une expression source arbitraire (table, vue, read_parquet)
    ///
    /// La source est sondée avec un `LIMIT 0` pour échouer tôt si elle est
    /// illisible.
    pub fn register_source(&self, source: &str) -> Result<()> {
        let probe = format!("SELECT * FROM {} LIMIT 0", source);
        {
            let conn = self.lock()?;
            conn.prepare(&probe)
                .and_then(|mut stmt| stmt.query([]).map(|_| ()))
                .with_context(|| format!("Source is not readable: {}", source))?;
        }
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Exécute un lot SQL de préparation (création de tables, etc.)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql).context("Batch execution failed")?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("DuckDB connection mutex poisoned"))
    }
}

impl Dataset for DuckDbDataset {
    fn execute(&self, sql: &str) -> Result<Vec<Record>, PrairiesError> {
        if !self.ready.load(Ordering::Acquire) {
            return Err(PrairiesError::NotReady(
                "no dataset registered yet".to_string(),
            ));
        }

        let conn = self
            .conn
            .lock()
            .map_err(|_| PrairiesError::query("DuckDB connection mutex poisoned"))?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| PrairiesError::query(e.to_string()))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| PrairiesError::query(e.to_string()))?;

        let mut out: Vec<Record> = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| PrairiesError::query(e.to_string()))?
        {
            let stmt = row.as_ref();
            let column_count = stmt.column_count();
            let mut record = Record::with_capacity(column_count);
            for idx in 0..column_count {
                let name = stmt
                    .column_name(idx)
                    .map_err(|e| PrairiesError::query(e.to_string()))?
                    .to_string();
                let value: DuckValue = row
                    .get(idx)
                    .map_err(|e| PrairiesError::query(e.to_string()))?;
                record.insert(name, to_value(value));
            }
            out.push(record);
        }

        debug!(rows = out.len(), "Query executed");
        Ok(out)
    }
}

/// Convertit une valeur DuckDB vers le modèle de lignes plat
fn to_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i64::from(i)),
        DuckValue::SmallInt(i) => Value::Int(i64::from(i)),
        DuckValue::Int(i) => Value::Int(i64::from(i)),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::HugeInt(i) => match i64::try_from(i) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Float(i as f64),
        },
        DuckValue::UTinyInt(i) => Value::Int(i64::from(i)),
        DuckValue::USmallInt(i) => Value::Int(i64::from(i)),
        DuckValue::UInt(i) => Value::Int(i64::from(i)),
        DuckValue::UBigInt(i) => match i64::try_from(i) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Float(i as f64),
        },
        DuckValue::Float(f) => Value::Float(f64::from(f)),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => Value::Float(d.to_string().parse().unwrap_or(f64::NAN)),
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Enum(s) => Value::Text(s),
        // Types non utilisés par le schéma prairies (dates, listes, blobs...)
        other => Value::Text(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prairies::dataset::parse_aggregates;
    use prairies::{AggregationLevel, DatasetSchema, QueryBuilder, ScopeFilter};

    fn seeded_dataset() -> DuckDbDataset {
        let ds = DuckDbDataset::open_in_memory().unwrap();
        ds.execute_batch(
            "CREATE TABLE prairies_test AS SELECT * FROM (VALUES
                ('11', '75', '75056', 120.0, 2.5, 10.0),
                ('11', '75', '75057', 140.0, 3.5, 20.0),
                ('11', '92', '92002', 90.0, 1.0, 5.0),
                ('24', '45', '45234', 200.0, 6.0, 30.0),
                (NULL, '99', '99999', 10.0, 1.0, 1.0)
            ) AS t(reg_parc, dep_parc, com_parc, alt_mean, pente_mean, surf_parc)",
        )
        .unwrap();
        ds.register_source("prairies_test").unwrap();
        ds
    }

    #[test]
    fn test_not_ready_before_registration() {
        let ds = DuckDbDataset::open_in_memory().unwrap();
        let err = ds.execute("SELECT 1").unwrap_err();
        assert!(matches!(err, PrairiesError::NotReady(_)));
    }

    #[test]
    fn test_region_aggregation_over_duckdb() {
        let ds = seeded_dataset();
        let builder = QueryBuilder::new(DatasetSchema::with_source("prairies_test"));
        let req = builder
            .aggregation(AggregationLevel::Region, &ScopeFilter::default())
            .unwrap();

        let rows = ds.execute(&req.sql).unwrap();
        let aggs = parse_aggregates(&rows).unwrap();

        // La ligne à région NULL est exclue avant agrégation
        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[0].key, "11");
        assert_eq!(aggs[0].parcel_count, 3);
        assert!((aggs[0].total_area - 35.0).abs() < 1e-9);
        assert_eq!(aggs[1].key, "24");
    }

    #[test]
    fn test_scoped_department_aggregation() {
        let ds = seeded_dataset();
        let builder = QueryBuilder::new(DatasetSchema::with_source("prairies_test"));
        let req = builder
            .aggregation(AggregationLevel::Department, &ScopeFilter::region("11"))
            .unwrap();

        let rows = ds.execute(&req.sql).unwrap();
        let aggs = parse_aggregates(&rows).unwrap();
        let keys: Vec<&str> = aggs.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["75", "92"]);
    }

    #[test]
    fn test_invalid_sql_is_typed_error() {
        let ds = seeded_dataset();
        let err = ds.execute("SELECT FROM nowhere").unwrap_err();
        assert!(matches!(err, PrairiesError::Query { .. }));
    }
}
