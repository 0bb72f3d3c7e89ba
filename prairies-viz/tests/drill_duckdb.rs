//! Drill-down complet sur un moteur DuckDB réel
//!
//! Même scénario que les tests unitaires de la machine, mais les réponses
//! viennent d'une vraie table au lieu d'un mock.

use prairies::{AggregationLevel, DatasetSchema, DrillDriver, DrillView};
use prairies_viz::duck::DuckDbDataset;

fn seeded_dataset() -> DuckDbDataset {
    let ds = DuckDbDataset::open_in_memory().unwrap();
    ds.execute_batch(
        "CREATE TABLE parcelles AS SELECT * FROM (VALUES
            ('11', '75', '75056', 120.0, 2.5, 10.0),
            ('11', '75', '75057', 140.0, 3.5, 20.0),
            ('11', '92', '92002', 90.0, 1.0, 5.0),
            ('24', '45', '45234', 200.0, 6.0, 30.0)
        ) AS t(reg_parc, dep_parc, com_parc, alt_mean, pente_mean, surf_parc)",
    )
    .unwrap();
    ds.register_source("parcelles").unwrap();
    ds
}

fn keys(view: &DrillView) -> Vec<String> {
    match view {
        DrillView::Aggregates { records, .. } => records.iter().map(|r| r.key.clone()).collect(),
        other => panic!("expected aggregates, got {:?}", other),
    }
}

#[test]
fn test_drill_over_duckdb() {
    let dataset = seeded_dataset();
    let mut driver = DrillDriver::new(DatasetSchema::with_source("parcelles"), &dataset);

    let update = driver.start().unwrap().unwrap();
    assert_eq!(update.state.level(), AggregationLevel::Region);
    assert_eq!(keys(&update.view), vec!["11", "24"]);

    let update = driver.select("11").unwrap().unwrap();
    assert_eq!(update.state.level(), AggregationLevel::Department);
    assert_eq!(keys(&update.view), vec!["75", "92"]);

    let update = driver.select("75").unwrap().unwrap();
    assert_eq!(update.state.level(), AggregationLevel::Raw);
    match &update.view {
        DrillView::RawPoints { records } => {
            assert_eq!(records.len(), 2);
            assert!(records.iter().all(|r| r.region_code == "11"));
        }
        other => panic!("expected raw points, got {:?}", other),
    }

    // Retours: vues restaurées depuis le cache, identiques aux premières
    let update = driver.back().unwrap().unwrap();
    assert_eq!(keys(&update.view), vec!["75", "92"]);
    let update = driver.back().unwrap().unwrap();
    assert_eq!(keys(&update.view), vec!["11", "24"]);
}

#[test]
fn test_drill_select_unknown_region_is_rejected() {
    let dataset = seeded_dataset();
    let mut driver = DrillDriver::new(DatasetSchema::with_source("parcelles"), &dataset);
    driver.start().unwrap().unwrap();

    assert!(driver.select("99").is_err());
    assert_eq!(driver.state().level(), AggregationLevel::Region);
}
