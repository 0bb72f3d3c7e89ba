//! Machine à états du drill-down
//!
//! Trois niveaux cycliques: `Region` (initial) → `Department(région)` →
//! `Raw(région, département)`, avec retours via `back`.
//!
//! La machine est sans I/O: une transition produit une requête à exécuter
//! (`PendingTransition`), et la réponse est réinjectée via [`DrillMachine::complete`].
//! Chaque transition porte un identifiant de requête strictement croissant;
//! seule la réponse de la dernière requête émise met à jour l'état visible
//! (politique last-request-wins). Les retours réutilisent le jeu de résultats
//! précédemment calculé au niveau supérieur, sans re-fetch.

use tracing::{debug, warn};

use crate::dataset::{parse_aggregates, parse_raw, Dataset};
use crate::error::PrairiesError;
use crate::query::{AggregationRequest, QueryBuilder, ScopeFilter};
use crate::schema::DatasetSchema;
use crate::types::{AggregateRecord, AggregationLevel, DrillState, RawParcelRecord};

/// Transition en attente d'une réponse du moteur
#[derive(Debug, Clone)]
pub struct PendingTransition {
    id: u64,
    target: DrillState,
    /// Requête à exécuter avant d'appeler `complete`
    pub request: AggregationRequest,
}

impl PendingTransition {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &DrillState {
        &self.target
    }
}

/// Résultat d'une demande de transition
#[derive(Debug)]
pub enum Transition {
    /// Une requête doit être exécutée, puis sa réponse passée à `complete`
    Pending(PendingTransition),
    /// Transition appliquée immédiatement depuis le cache (aucune requête)
    Applied(ViewUpdate),
}

/// Données à afficher après une transition réussie
#[derive(Debug, Clone, PartialEq)]
pub enum DrillView {
    /// Agrégats par unité administrative
    Aggregates {
        level: AggregationLevel,
        records: Vec<AggregateRecord>,
    },
    /// Parcelles individuelles (niveau le plus profond)
    RawPoints { records: Vec<RawParcelRecord> },
}

/// Nouvel état + données de la vue, renvoyés au moteur de rendu
#[derive(Debug, Clone, PartialEq)]
pub struct ViewUpdate {
    pub state: DrillState,
    pub view: DrillView,
}

/// Machine à états du drill-down, unique propriétaire du `DrillState`
#[derive(Debug)]
pub struct DrillMachine {
    builder: QueryBuilder,
    state: DrillState,
    /// Identifiant de la dernière transition émise (0 = aucune)
    latest_request: u64,
    /// Dernier jeu de résultats rendu au niveau région
    region_set: Option<Vec<AggregateRecord>>,
    /// Dernier jeu de résultats rendu au niveau département (code région, agrégats)
    department_set: Option<(String, Vec<AggregateRecord>)>,
}

impl DrillMachine {
    /// Crée une machine au niveau région, sans données chargées
    pub fn new(schema: DatasetSchema) -> Self {
        Self {
            builder: QueryBuilder::new(schema),
            state: DrillState::region(),
            latest_request: 0,
            region_set: None,
            department_set: None,
        }
    }

    pub fn state(&self) -> &DrillState {
        &self.state
    }

    /// Émet la requête du niveau courant (chargement initial, ré-entrée de vue)
    pub fn refresh(&mut self) -> Result<PendingTransition, PrairiesError> {
        let scope = match (
            self.state.selected_region(),
            self.state.selected_department(),
        ) {
            (None, None) => ScopeFilter::default(),
            (Some(r), None) => ScopeFilter::region(r),
            (r, Some(d)) => ScopeFilter {
                region: r.map(str::to_owned),
                department: Some(d.to_owned()),
            },
        };
        let request = self.builder.aggregation(self.state.level(), &scope)?;
        Ok(self.issue(self.state.clone(), request))
    }

    /// Sélection d'une clé dans le dernier jeu de résultats rendu
    ///
    /// La clé doit appartenir au jeu de résultats du niveau courant: une clé
    /// inconnue est rejetée sans qu'aucune requête ne soit émise.
    pub fn select(&mut self, key: &str) -> Result<Transition, PrairiesError> {
        match self.state.level() {
            AggregationLevel::Region => {
                let set = self.region_set.as_deref().ok_or(PrairiesError::NoResultSet {
                    level: AggregationLevel::Region,
                })?;
                ensure_known_key(AggregationLevel::Region, set, key)?;

                let request = self
                    .builder
                    .aggregation(AggregationLevel::Department, &ScopeFilter::region(key))?;
                Ok(Transition::Pending(
                    self.issue(DrillState::department(key), request),
                ))
            }
            AggregationLevel::Department => {
                let region = self
                    .state
                    .selected_region()
                    .map(str::to_owned)
                    .expect("department state always carries a region");
                let set = self
                    .department_set
                    .as_ref()
                    .filter(|(r, _)| *r == region)
                    .map(|(_, set)| set.as_slice())
                    .ok_or(PrairiesError::NoResultSet {
                        level: AggregationLevel::Department,
                    })?;
                ensure_known_key(AggregationLevel::Department, set, key)?;

                let scope = ScopeFilter {
                    region: Some(region.clone()),
                    department: Some(key.to_owned()),
                };
                let request = self.builder.aggregation(AggregationLevel::Raw, &scope)?;
                Ok(Transition::Pending(
                    self.issue(DrillState::raw(region, key), request),
                ))
            }
            level => Err(PrairiesError::InvalidTransition {
                level,
                trigger: "select",
            }),
        }
    }

    /// Retour au niveau supérieur
    ///
    /// Restaure le jeu de résultats précédemment calculé quand il est en
    /// cache (pas de dérive due à un re-fetch); sinon, ré-émet la requête
    /// du niveau cible.
    pub fn back(&mut self) -> Result<Transition, PrairiesError> {
        match self.state.level() {
            AggregationLevel::Region => Err(PrairiesError::NoBackTarget {
                level: AggregationLevel::Region,
            }),
            AggregationLevel::Department => {
                let target = DrillState::region();
                match self.region_set.clone() {
                    Some(records) => Ok(Transition::Applied(self.apply_cached(
                        target,
                        AggregationLevel::Region,
                        records,
                    ))),
                    None => {
                        let request = self
                            .builder
                            .aggregation(AggregationLevel::Region, &ScopeFilter::default())?;
                        Ok(Transition::Pending(self.issue(target, request)))
                    }
                }
            }
            AggregationLevel::Raw => {
                let region = self
                    .state
                    .selected_region()
                    .map(str::to_owned)
                    .expect("raw state always carries a region");
                let target = DrillState::department(&region);
                let cached = self
                    .department_set
                    .as_ref()
                    .filter(|(r, _)| *r == region)
                    .map(|(_, set)| set.clone());
                match cached {
                    Some(records) => Ok(Transition::Applied(self.apply_cached(
                        target,
                        AggregationLevel::Department,
                        records,
                    ))),
                    None => {
                        let request = self.builder.aggregation(
                            AggregationLevel::Department,
                            &ScopeFilter::region(&region),
                        )?;
                        Ok(Transition::Pending(self.issue(target, request)))
                    }
                }
            }
            level => Err(PrairiesError::InvalidTransition {
                level,
                trigger: "back",
            }),
        }
    }

    /// Applique la réponse d'une transition en attente
    ///
    /// Renvoie `Ok(None)` sur résultat vide: l'état et la vue précédente
    /// restent inchangés ("no data" n'est pas une erreur).
    ///
    /// # Errors
    ///
    /// `PrairiesError::Superseded` si une transition plus récente a été émise
    /// depuis: la réponse est ignorée et l'état visible n'est pas modifié.
    pub fn complete(
        &mut self,
        pending: PendingTransition,
        rows: Vec<crate::types::Record>,
    ) -> Result<Option<ViewUpdate>, PrairiesError> {
        if pending.id != self.latest_request {
            warn!(
                id = pending.id,
                latest = self.latest_request,
                "Discarding superseded drill response"
            );
            return Err(PrairiesError::Superseded {
                id: pending.id,
                latest: self.latest_request,
            });
        }

        if rows.is_empty() {
            debug!(level = %pending.target.level(), "Empty result set, keeping previous view");
            return Ok(None);
        }

        let level = pending.target.level();
        let view = if level.is_aggregate() {
            let records = parse_aggregates(&rows)?;
            self.cache(&pending.target, &records);
            DrillView::Aggregates { level, records }
        } else {
            DrillView::RawPoints {
                records: parse_raw(&rows)?,
            }
        };

        self.state = pending.target;
        Ok(Some(ViewUpdate {
            state: self.state.clone(),
            view,
        }))
    }

    /// Émet une transition: incrémente l'identifiant courant, ce qui invalide
    /// toute réponse encore en vol
    fn issue(&mut self, target: DrillState, request: AggregationRequest) -> PendingTransition {
        self.latest_request += 1;
        debug!(
            id = self.latest_request,
            level = %target.level(),
            "Issuing drill transition"
        );
        PendingTransition {
            id: self.latest_request,
            target,
            request,
        }
    }

    /// Applique immédiatement une restauration depuis le cache
    ///
    /// Incrémente aussi l'identifiant: un fetch encore en vol au moment du
    /// retour est rendu obsolète.
    fn apply_cached(
        &mut self,
        target: DrillState,
        level: AggregationLevel,
        records: Vec<AggregateRecord>,
    ) -> ViewUpdate {
        self.latest_request += 1;
        self.state = target;
        debug!(level = %level, count = records.len(), "Restored cached drill view");
        ViewUpdate {
            state: self.state.clone(),
            view: DrillView::Aggregates { level, records },
        }
    }

    fn cache(&mut self, target: &DrillState, records: &[AggregateRecord]) {
        match target.level() {
            AggregationLevel::Region => self.region_set = Some(records.to_vec()),
            AggregationLevel::Department => {
                if let Some(region) = target.selected_region() {
                    self.department_set = Some((region.to_owned(), records.to_vec()));
                }
            }
            _ => {}
        }
    }
}

fn ensure_known_key(
    level: AggregationLevel,
    set: &[AggregateRecord],
    key: &str,
) -> Result<(), PrairiesError> {
    if set.iter().any(|r| r.key == key) {
        Ok(())
    } else {
        Err(PrairiesError::UnknownKey {
            level,
            key: key.to_owned(),
        })
    }
}

/// Pilote de drill-down: enchaîne requête → exécution → application
///
/// En cas d'échec du moteur, l'erreur est propagée et l'état visible reste
/// celui d'avant la transition (la machine ne mute qu'à la complétion).
pub struct DrillDriver<D: Dataset> {
    machine: DrillMachine,
    dataset: D,
}

impl<D: Dataset> DrillDriver<D> {
    pub fn new(schema: DatasetSchema, dataset: D) -> Self {
        Self {
            machine: DrillMachine::new(schema),
            dataset,
        }
    }

    pub fn state(&self) -> &DrillState {
        self.machine.state()
    }

    /// Chargement initial (agrégats du niveau courant)
    pub fn start(&mut self) -> Result<Option<ViewUpdate>, PrairiesError> {
        let pending = self.machine.refresh()?;
        self.run(pending)
    }

    pub fn select(&mut self, key: &str) -> Result<Option<ViewUpdate>, PrairiesError> {
        match self.machine.select(key)? {
            Transition::Pending(pending) => self.run(pending),
            Transition::Applied(update) => Ok(Some(update)),
        }
    }

    pub fn back(&mut self) -> Result<Option<ViewUpdate>, PrairiesError> {
        match self.machine.back()? {
            Transition::Pending(pending) => self.run(pending),
            Transition::Applied(update) => Ok(Some(update)),
        }
    }

    fn run(&mut self, pending: PendingTransition) -> Result<Option<ViewUpdate>, PrairiesError> {
        let rows = self.dataset.execute(&pending.request.sql)?;
        self.machine.complete(pending, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Record, Value, COL_KEY, COL_MEAN_ALTITUDE, COL_MEAN_SLOPE, COL_PARCEL_COUNT,
        COL_TOTAL_AREA,
    };

    fn agg_row(key: &str) -> Record {
        let mut rec = Record::new();
        rec.insert(COL_KEY.to_string(), Value::Text(key.to_string()));
        rec.insert(COL_MEAN_ALTITUDE.to_string(), Value::Float(100.0));
        rec.insert(COL_MEAN_SLOPE.to_string(), Value::Float(5.0));
        rec.insert(COL_TOTAL_AREA.to_string(), Value::Float(10.0));
        rec.insert(COL_PARCEL_COUNT.to_string(), Value::Int(3));
        rec
    }

    fn machine_with_regions(keys: &[&str]) -> DrillMachine {
        let mut machine = DrillMachine::new(DatasetSchema::default());
        let pending = machine.refresh().unwrap();
        let rows: Vec<Record> = keys.iter().map(|k| agg_row(k)).collect();
        machine.complete(pending, rows).unwrap().unwrap();
        machine
    }

    #[test]
    fn test_select_without_result_set() {
        let mut machine = DrillMachine::new(DatasetSchema::default());
        let err = machine.select("11").unwrap_err();
        assert!(matches!(err, PrairiesError::NoResultSet { .. }));
    }

    #[test]
    fn test_unknown_key_is_rejected_without_query() {
        let mut machine = machine_with_regions(&["11", "24"]);
        let before = machine.latest_request;
        let err = machine.select("99").unwrap_err();
        assert!(matches!(err, PrairiesError::UnknownKey { .. }));
        // Aucune transition émise
        assert_eq!(machine.latest_request, before);
        assert_eq!(machine.state().level(), AggregationLevel::Region);
    }

    #[test]
    fn test_superseded_response_is_discarded() {
        let mut machine = machine_with_regions(&["11", "24"]);

        let first = match machine.select("11").unwrap() {
            Transition::Pending(p) => p,
            other => panic!("expected pending transition, got {:?}", other),
        };
        let second = match machine.select("24").unwrap() {
            Transition::Pending(p) => p,
            other => panic!("expected pending transition, got {:?}", other),
        };

        // La première réponse arrive après la seconde émission: ignorée
        let err = machine.complete(first, vec![agg_row("75")]).unwrap_err();
        assert!(matches!(err, PrairiesError::Superseded { .. }));
        assert_eq!(machine.state().level(), AggregationLevel::Region);

        // La réponse la plus récente gagne
        let update = machine.complete(second, vec![agg_row("33")]).unwrap().unwrap();
        assert_eq!(update.state.selected_region(), Some("24"));
    }

    #[test]
    fn test_empty_result_keeps_previous_state() {
        let mut machine = machine_with_regions(&["11"]);
        let pending = match machine.select("11").unwrap() {
            Transition::Pending(p) => p,
            other => panic!("expected pending transition, got {:?}", other),
        };
        let update = machine.complete(pending, Vec::new()).unwrap();
        assert!(update.is_none());
        assert_eq!(machine.state().level(), AggregationLevel::Region);
    }

    #[test]
    fn test_back_from_region_has_no_target() {
        let mut machine = machine_with_regions(&["11"]);
        let err = machine.back().unwrap_err();
        assert!(matches!(err, PrairiesError::NoBackTarget { .. }));
    }

    #[test]
    fn test_back_restores_cached_region_set() {
        let mut machine = machine_with_regions(&["11", "24"]);
        let pending = match machine.select("11").unwrap() {
            Transition::Pending(p) => p,
            other => panic!("expected pending transition, got {:?}", other),
        };
        machine
            .complete(pending, vec![agg_row("75"), agg_row("92")])
            .unwrap()
            .unwrap();

        // Retour: appliqué depuis le cache, pas de requête
        let update = match machine.back().unwrap() {
            Transition::Applied(u) => u,
            other => panic!("expected applied transition, got {:?}", other),
        };
        assert_eq!(update.state.level(), AggregationLevel::Region);
        match update.view {
            DrillView::Aggregates { ref records, .. } => {
                let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
                assert_eq!(keys, vec!["11", "24"]);
            }
            ref other => panic!("expected aggregates, got {:?}", other),
        }
    }

    #[test]
    fn test_cached_back_supersedes_inflight_fetch() {
        let mut machine = machine_with_regions(&["11", "24"]);
        let pending = match machine.select("11").unwrap() {
            Transition::Pending(p) => p,
            other => panic!("expected pending transition, got {:?}", other),
        };
        machine
            .complete(pending, vec![agg_row("75")])
            .unwrap()
            .unwrap();

        // Fetch en vol au moment du retour
        let inflight = match machine.select("75").unwrap() {
            Transition::Pending(p) => p,
            other => panic!("expected pending transition, got {:?}", other),
        };
        let _ = machine.back().unwrap();

        let err = machine.complete(inflight, vec![agg_row("x")]).unwrap_err();
        assert!(matches!(err, PrairiesError::Superseded { .. }));
    }

    #[test]
    fn test_select_at_raw_is_invalid() {
        let mut machine = machine_with_regions(&["11"]);
        let pending = match machine.select("11").unwrap() {
            Transition::Pending(p) => p,
            other => panic!("expected pending transition, got {:?}", other),
        };
        machine.complete(pending, vec![agg_row("75")]).unwrap().unwrap();

        let pending = match machine.select("75").unwrap() {
            Transition::Pending(p) => p,
            other => panic!("expected pending transition, got {:?}", other),
        };
        let mut raw_row = Record::new();
        raw_row.insert("altitude".to_string(), Value::Float(1.0));
        raw_row.insert("slope".to_string(), Value::Float(2.0));
        raw_row.insert("region_code".to_string(), Value::Text("11".to_string()));
        machine.complete(pending, vec![raw_row]).unwrap().unwrap();

        let err = machine.select("whatever").unwrap_err();
        assert!(matches!(err, PrairiesError::InvalidTransition { .. }));
    }
}
