//! Named families and the detectors derived for them.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detector::Detector;
use crate::elimination::{DeriveFailure, Derivation, EliminationEngine};
use crate::error::{CoreError, Result};
use crate::family::{ConstellationDef, FamilySpec};
use crate::groebner::BasisBackend;

pub const CATALOG_VERSION: u32 = 1;

/// Catalog configuration: the family list, as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSpec {
    #[serde(default = "default_version")]
    pub version: u32,
    pub families: Vec<FamilySpec>,
}

fn default_version() -> u32 {
    CATALOG_VERSION
}

impl CatalogSpec {
    /// Parse and validate a catalog. Family names must be unique.
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Reject catalogs that name two families alike; results are keyed by name.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for family in &self.families {
            if !seen.insert(family.name()) {
                return Err(duplicate_name(family.name()));
            }
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The six families this project ships with.
    #[must_use]
    pub fn builtin() -> Self {
        let offsets = |name: &str, offsets: &[u64]| FamilySpec::Offsets {
            name: name.to_string(),
            offsets: offsets.to_vec(),
        };
        Self {
            version: CATALOG_VERSION,
            families: vec![
                offsets("Twin", &[0, 2]),
                offsets("Trip1", &[0, 2, 6]),
                offsets("Trip2", &[0, 4, 6]),
                offsets("Quad", &[0, 2, 6, 8]),
                FamilySpec::Terms {
                    name: "Sophie".to_string(),
                    terms: vec![(1, 0), (2, 1), (4, 3)],
                    min_base: 2,
                },
                FamilySpec::Terms {
                    name: "Chernick".to_string(),
                    terms: vec![(6, 1), (12, 1), (18, 1)],
                    min_base: 1,
                },
            ],
        }
    }

    /// Keep only the family called `name`.
    #[must_use]
    pub fn select(&self, name: &str) -> Option<Self> {
        let family = self.families.iter().find(|f| f.name() == name)?.clone();
        Some(Self {
            version: self.version,
            families: vec![family],
        })
    }
}

fn duplicate_name(name: &str) -> CoreError {
    CoreError::invalid_definition(name, "duplicate family name")
}

impl Default for CatalogSpec {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Outcome of deriving one catalog family.
#[derive(Debug)]
pub enum CatalogEntry {
    Derived(Derivation),
    Failed { family: String, failure: DeriveFailure },
}

impl CatalogEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Derived(d) => d.name(),
            Self::Failed { family, .. } => family,
        }
    }
}

/// Ordered collection of derived detectors and per-family failures.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Derive every family in `spec`. A family that fails validation or yields
    /// no detector is recorded and the rest still run. A repeated name is recorded
    /// as a failure; the first family with that name keeps it.
    pub fn derive_all<B: BasisBackend>(spec: &CatalogSpec, engine: &EliminationEngine<B>) -> Self {
        Self::derive_all_with(spec, engine, |_| {})
    }

    /// [`Catalog::derive_all`], handing each entry to `observe` as soon as it is
    /// derived.
    pub fn derive_all_with<B, F>(
        spec: &CatalogSpec,
        engine: &EliminationEngine<B>,
        mut observe: F,
    ) -> Self
    where
        B: BasisBackend,
        F: FnMut(&CatalogEntry),
    {
        let mut seen = BTreeSet::new();
        let entries = spec
            .families
            .iter()
            .map(|family| {
                let outcome = if seen.insert(family.name()) {
                    family
                        .to_definition()
                        .map_err(DeriveFailure::from)
                        .and_then(|def| engine.derive(&def, "p"))
                } else {
                    Err(DeriveFailure::from(duplicate_name(family.name())))
                };
                let entry = match outcome {
                    Ok(derivation) => CatalogEntry::Derived(derivation),
                    Err(failure) => CatalogEntry::Failed {
                        family: family.name().to_string(),
                        failure,
                    },
                };
                observe(&entry);
                entry
            })
            .collect();
        Self { entries }
    }

    /// A catalog of already known detectors, skipping derivation.
    #[must_use]
    pub fn from_detectors(detectors: impl IntoIterator<Item = Detector>) -> Self {
        let entries = detectors
            .into_iter()
            .map(|detector| {
                let diagnostics = crate::elimination::Diagnostics {
                    degree_in_m: detector.degree_in_m(),
                    total_degree: detector.total_degree(),
                    factored: detector.to_string(),
                    sum_difference_form: String::new(),
                    fingerprint: detector.fingerprint(),
                };
                CatalogEntry::Derived(Derivation {
                    parameter: "p".to_string(),
                    n_expr: String::new(),
                    m1_expr: String::new(),
                    basis_size: 0,
                    detector,
                    diagnostics,
                })
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn derivations(&self) -> impl Iterator<Item = &Derivation> {
        self.entries.iter().filter_map(|e| match e {
            CatalogEntry::Derived(d) => Some(d),
            CatalogEntry::Failed { .. } => None,
        })
    }

    pub fn detectors(&self) -> impl Iterator<Item = &Detector> {
        self.derivations().map(|d| &d.detector)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &DeriveFailure)> {
        self.entries.iter().filter_map(|e| match e {
            CatalogEntry::Failed { family, failure } => Some((family.as_str(), failure)),
            CatalogEntry::Derived(_) => None,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Derivation> {
        self.derivations().find(|d| d.name() == name)
    }

    /// Definitions of every successfully derived family.
    pub fn families(&self) -> impl Iterator<Item = &ConstellationDef> {
        self.detectors().map(Detector::family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elimination::{EliminationConfig, NoDetectorReason};

    #[test]
    fn builtin_catalog_round_trips_through_json() {
        let spec = CatalogSpec::builtin();
        let json = spec.to_json().unwrap();
        assert!(json.contains("\"offsets\""));
        assert!(json.contains("\"min_base\": 1"));
        assert_eq!(CatalogSpec::from_json(&json).unwrap(), spec);
    }

    #[test]
    fn version_defaults_when_missing() {
        let spec = CatalogSpec::from_json(r#"{"families": [{"name": "Twin", "offsets": [0, 2]}]}"#)
            .unwrap();
        assert_eq!(spec.version, CATALOG_VERSION);
    }

    #[test]
    fn malformed_catalog_is_a_json_error() {
        let err = CatalogSpec::from_json("{\"families\": 3}").unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Json(_)));
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let spec = CatalogSpec::from_json(
            r#"{"version": 1, "families": [
                {"name": "Broken", "offsets": [1, 3]},
                {"name": "Twin", "offsets": [0, 2]}
            ]}"#,
        )
        .unwrap();
        let catalog = Catalog::derive_all(&spec, &EliminationEngine::new());
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.detectors().count(), 1);
        let failures: Vec<_> = catalog.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "Broken");
        assert!(catalog.get("Twin").is_some());
    }

    #[test]
    fn duplicate_names_are_rejected_on_load() {
        let err = CatalogSpec::from_json(
            r#"{"families": [
                {"name": "Twin", "offsets": [0, 2]},
                {"name": "Twin", "offsets": [0, 4]}
            ]}"#,
        )
        .unwrap_err();
        match err {
            CoreError::InvalidDefinition { name, reason } => {
                assert_eq!(name, "Twin");
                assert_eq!(reason, "duplicate family name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_keep_the_first_family() {
        let spec = CatalogSpec {
            version: CATALOG_VERSION,
            families: vec![
                FamilySpec::Offsets {
                    name: "Twin".to_string(),
                    offsets: vec![0, 2],
                },
                FamilySpec::Offsets {
                    name: "Twin".to_string(),
                    offsets: vec![0, 4],
                },
            ],
        };
        assert!(spec.validate().is_err());

        let catalog = Catalog::derive_all(&spec, &EliminationEngine::new());
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.detectors().count(), 1);
        assert_eq!(catalog.get("Twin").unwrap().detector.family().offsets(), Some(vec![0, 2]));
        let failures: Vec<_> = catalog.failures().collect();
        assert!(matches!(
            failures.as_slice(),
            [("Twin", DeriveFailure::Invalid(CoreError::InvalidDefinition { .. }))]
        ));
    }

    #[test]
    fn budget_failures_are_recorded_per_family() {
        let spec = CatalogSpec::builtin().select("Quad").unwrap();
        let engine = EliminationEngine::from_config(&EliminationConfig {
            pair_budget: Some(0),
        });
        let catalog = Catalog::derive_all(&spec, &engine);
        match catalog.entries() {
            [CatalogEntry::Failed { family, failure }] => {
                assert_eq!(family, "Quad");
                assert!(matches!(
                    failure,
                    DeriveFailure::NoDetector {
                        reason: NoDetectorReason::BudgetExhausted,
                        ..
                    }
                ));
            }
            other => panic!("unexpected entries: {other:?}"),
        }
    }

    #[test]
    fn observer_sees_entries_in_order() {
        let spec = CatalogSpec::from_json(
            r#"{"families": [
                {"name": "Twin", "offsets": [0, 2]},
                {"name": "Broken", "offsets": [1, 3]},
                {"name": "Trip1", "offsets": [0, 2, 6]}
            ]}"#,
        )
        .unwrap();
        let mut seen = Vec::new();
        let catalog = Catalog::derive_all_with(&spec, &EliminationEngine::new(), |entry| {
            seen.push((entry.name().to_string(), matches!(entry, CatalogEntry::Derived(_))));
        });
        assert_eq!(
            seen,
            [
                ("Twin".to_string(), true),
                ("Broken".to_string(), false),
                ("Trip1".to_string(), true)
            ]
        );
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn builtin_families_all_derive() {
        let catalog = Catalog::derive_all(&CatalogSpec::builtin(), &EliminationEngine::new());
        let names: Vec<&str> = catalog.detectors().map(Detector::name).collect();
        assert_eq!(
            names,
            ["Twin", "Trip1", "Trip2", "Quad", "Sophie", "Chernick"]
        );
    }
}
