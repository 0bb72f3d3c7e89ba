//! Scénario complet de drill-down sur un jeu de données simulé
//!
//! Régions ["11", "24"]; la région "11" contient les départements
//! ["75", "92"]. Le moteur est un mock qui rejoue des réponses préparées
//! et compte les requêtes réellement émises.

use std::cell::RefCell;

use prairies::{
    AggregationLevel, Dataset, DatasetSchema, DrillDriver, DrillView, PrairiesError, Record, Value,
};

/// Moteur simulé: rejoue des réponses dans l'ordre, enregistre le SQL reçu
struct MockDataset {
    responses: RefCell<Vec<Vec<Record>>>,
    executed: RefCell<Vec<String>>,
}

impl MockDataset {
    fn new(responses: Vec<Vec<Record>>) -> Self {
        // Les réponses sont dépilées en tête
        Self {
            responses: RefCell::new(responses),
            executed: RefCell::new(Vec::new()),
        }
    }

    fn query_count(&self) -> usize {
        self.executed.borrow().len()
    }

    fn last_sql(&self) -> String {
        self.executed.borrow().last().cloned().unwrap_or_default()
    }
}

impl Dataset for MockDataset {
    fn execute(&self, sql: &str) -> Result<Vec<Record>, PrairiesError> {
        self.executed.borrow_mut().push(sql.to_string());
        let mut responses = self.responses.borrow_mut();
        if responses.is_empty() {
            return Err(PrairiesError::query("mock has no more responses"));
        }
        Ok(responses.remove(0))
    }
}

fn aggregate_row(key: &str, altitude: f64) -> Record {
    let mut rec = Record::new();
    rec.insert("key".to_string(), Value::Text(key.to_string()));
    rec.insert("mean_altitude".to_string(), Value::Float(altitude));
    rec.insert("mean_slope".to_string(), Value::Float(3.5));
    rec.insert("total_area".to_string(), Value::Float(250.0));
    rec.insert("parcel_count".to_string(), Value::Int(12));
    rec
}

fn raw_row(altitude: f64, slope: f64, region: &str) -> Record {
    let mut rec = Record::new();
    rec.insert("altitude".to_string(), Value::Float(altitude));
    rec.insert("slope".to_string(), Value::Float(slope));
    rec.insert("region_code".to_string(), Value::Text(region.to_string()));
    rec
}

fn region_rows() -> Vec<Record> {
    vec![aggregate_row("11", 150.0), aggregate_row("24", 210.0)]
}

fn department_rows() -> Vec<Record> {
    vec![aggregate_row("75", 90.0), aggregate_row("92", 110.0)]
}

fn raw_rows() -> Vec<Record> {
    vec![
        raw_row(80.0, 1.2, "11"),
        raw_row(95.0, 2.4, "11"),
        raw_row(102.0, 0.8, "11"),
    ]
}

fn aggregate_keys(view: &DrillView) -> Vec<String> {
    match view {
        DrillView::Aggregates { records, .. } => {
            records.iter().map(|r| r.key.clone()).collect()
        }
        other => panic!("expected aggregates, got {:?}", other),
    }
}

#[test]
fn test_full_drill_scenario() {
    let dataset = MockDataset::new(vec![region_rows(), department_rows(), raw_rows()]);
    let mut driver = DrillDriver::new(DatasetSchema::default(), &dataset);

    // Chargement initial: agrégats par région
    let update = driver.start().unwrap().unwrap();
    assert_eq!(update.state.level(), AggregationLevel::Region);
    assert_eq!(aggregate_keys(&update.view), vec!["11", "24"]);
    assert_eq!(dataset.query_count(), 1);

    // Sélection de la région "11" → départements de "11", exactement deux
    let update = driver.select("11").unwrap().unwrap();
    assert_eq!(update.state.level(), AggregationLevel::Department);
    assert_eq!(update.state.selected_region(), Some("11"));
    assert_eq!(aggregate_keys(&update.view), vec!["75", "92"]);
    assert_eq!(dataset.query_count(), 2);
    assert!(dataset.last_sql().contains("reg_parc = '11'"));

    // Sélection du département "75" → parcelles brutes plafonnées
    let update = driver.select("75").unwrap().unwrap();
    assert_eq!(update.state.level(), AggregationLevel::Raw);
    assert_eq!(update.state.selected_department(), Some("75"));
    match &update.view {
        DrillView::RawPoints { records } => {
            assert!(records.len() <= prairies::RAW_ROW_LIMIT);
            assert_eq!(records.len(), 3);
        }
        other => panic!("expected raw points, got {:?}", other),
    }
    assert_eq!(dataset.query_count(), 3);
    assert!(dataset.last_sql().contains("LIMIT 10000"));
    assert!(dataset.last_sql().contains("dep_parc = '75'"));

    // Premier retour: restaure les départements de "11" SANS re-fetch
    let update = driver.back().unwrap().unwrap();
    assert_eq!(update.state.level(), AggregationLevel::Department);
    assert_eq!(aggregate_keys(&update.view), vec!["75", "92"]);
    assert_eq!(dataset.query_count(), 3);

    // Second retour: jeu de régions initial, inchangé, toujours sans re-fetch
    let update = driver.back().unwrap().unwrap();
    assert_eq!(update.state.level(), AggregationLevel::Region);
    assert!(update.state.selected_region().is_none());
    assert_eq!(aggregate_keys(&update.view), vec!["11", "24"]);
    assert_eq!(dataset.query_count(), 3);
}

#[test]
fn test_unknown_department_key_issues_no_query() {
    let dataset = MockDataset::new(vec![region_rows()]);
    let mut driver = DrillDriver::new(DatasetSchema::default(), &dataset);
    driver.start().unwrap().unwrap();

    // "75" est un code de département, pas une région du dernier jeu rendu
    let err = driver.select("75").unwrap_err();
    assert!(matches!(err, PrairiesError::UnknownKey { .. }));
    assert_eq!(dataset.query_count(), 1);
    assert_eq!(driver.state().level(), AggregationLevel::Region);
}

#[test]
fn test_query_failure_leaves_previous_view_intact() {
    // Une seule réponse préparée: la seconde requête échoue
    let dataset = MockDataset::new(vec![region_rows()]);
    let mut driver = DrillDriver::new(DatasetSchema::default(), &dataset);
    driver.start().unwrap().unwrap();

    let err = driver.select("11").unwrap_err();
    assert!(matches!(err, PrairiesError::Query { .. }));
    // L'état n'a pas bougé: la vue précédente reste valable
    assert_eq!(driver.state().level(), AggregationLevel::Region);

    // Et la machine accepte une nouvelle tentative
    let dataset2 = MockDataset::new(vec![region_rows(), department_rows()]);
    let mut driver2 = DrillDriver::new(DatasetSchema::default(), &dataset2);
    driver2.start().unwrap().unwrap();
    assert!(driver2.select("11").unwrap().is_some());
}

#[test]
fn test_empty_department_set_is_no_data_not_error() {
    let dataset = MockDataset::new(vec![region_rows(), Vec::new()]);
    let mut driver = DrillDriver::new(DatasetSchema::default(), &dataset);
    driver.start().unwrap().unwrap();

    let update = driver.select("24").unwrap();
    assert!(update.is_none());
    assert_eq!(driver.state().level(), AggregationLevel::Region);
}
