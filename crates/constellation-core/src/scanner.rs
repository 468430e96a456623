//! Exhaustive verification of detectors against ground truth.
//!
//! For every `n` in `2..=limit` the scanner computes `M = sigma(n)` once and
//! evaluates every detector at `(n, M)`. A zero is a *hit*; each hit is confirmed
//! with the direct membership search, and unconfirmed hits are false positives.
//!
//! Scanning is resumable: [`Scanner::checkpoint`] captures the next `n` together
//! with everything accumulated so far, and [`Scanner::resume`] picks up from it.
//! A checkpoint records each family's definition and detector fingerprint, and
//! only resumes over a catalog that matches them exactly. Chunked and single-pass
//! scans produce identical results.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::detector::Detector;
use crate::error::{CoreError, Result};
use crate::family::FamilySpec;
use crate::membership::{direct_match_terms, enumerate_members};
use crate::oracle::sigma_u64;

/// Optional scan behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Also enumerate genuine members up to the limit and record those where the
    /// detector does not vanish.
    #[serde(default)]
    pub check_false_negatives: bool,
}

/// Per-family tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyReport {
    /// Values where the detector vanished.
    pub hits: u64,
    /// Hits confirmed by direct search.
    pub confirmed: u64,
    pub false_positives: Vec<u64>,
    /// Only populated with [`ScanOptions::check_false_negatives`].
    #[serde(default)]
    pub false_negatives: Vec<u64>,
}

impl FamilyReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.false_positives.is_empty() && self.false_negatives.is_empty()
    }
}

/// Outcome of a (possibly partial) scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub limit: u64,
    /// Largest `n` examined so far; `1` before the first value.
    pub scanned_through: u64,
    pub families: BTreeMap<String, FamilyReport>,
}

impl VerificationResult {
    /// False positives per family, the core contract of a verification run.
    #[must_use]
    pub fn false_positives(&self) -> BTreeMap<&str, &[u64]> {
        self.families
            .iter()
            .map(|(name, report)| (name.as_str(), report.false_positives.as_slice()))
            .collect()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.families.values().all(FamilyReport::is_clean)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.scanned_through >= self.limit
    }
}

/// What a checkpoint remembers about one scanned family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneIdentity {
    pub family: FamilySpec,
    /// [`Detector::fingerprint`] of the detector that was scanned.
    pub detector: String,
}

impl LaneIdentity {
    fn of(detector: &Detector) -> Self {
        Self {
            family: FamilySpec::from(detector.family()),
            detector: detector.fingerprint(),
        }
    }
}

/// Serializable scan state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub next_n: u64,
    pub limit: u64,
    #[serde(default)]
    pub options: ScanOptions,
    /// Keyed by family name.
    #[serde(default)]
    pub lanes: BTreeMap<String, LaneIdentity>,
    pub result: VerificationResult,
}

impl Checkpoint {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

struct Lane<'a> {
    detector: &'a Detector,
    /// Sorted genuine members, when false negatives are being checked.
    members: Option<Vec<u64>>,
}

/// Incremental verifier over the detectors of a catalog.
pub struct Scanner<'a> {
    lanes: Vec<Lane<'a>>,
    options: ScanOptions,
    next_n: u64,
    result: VerificationResult,
}

impl<'a> Scanner<'a> {
    pub fn new(catalog: &'a Catalog, limit: u64, options: ScanOptions) -> Result<Self> {
        if limit == 0 {
            return Err(CoreError::InvalidInput("scan limit must be positive".into()));
        }
        let families = identities(catalog)?
            .into_keys()
            .map(|name| (name, FamilyReport::default()))
            .collect();
        let result = VerificationResult {
            limit,
            scanned_through: 1,
            families,
        };
        Ok(Self::with_state(catalog, options, 2, result))
    }

    /// Continue from a checkpoint taken over the same catalog.
    pub fn resume(catalog: &'a Catalog, checkpoint: Checkpoint) -> Result<Self> {
        let Checkpoint {
            next_n,
            limit,
            options,
            lanes,
            result,
        } = checkpoint;
        if limit == 0 || result.limit != limit {
            return Err(CoreError::InvalidInput(format!(
                "checkpoint limit {limit} disagrees with its result ({})",
                result.limit
            )));
        }
        let current = identities(catalog)?;
        if lanes != current {
            let changed: BTreeSet<&str> = current
                .keys()
                .chain(lanes.keys())
                .filter(|name| current.get(*name) != lanes.get(*name))
                .map(String::as_str)
                .collect();
            return Err(CoreError::InvalidInput(format!(
                "checkpoint does not match catalog; changed families: {changed:?}"
            )));
        }
        if result.families.keys().ne(current.keys()) {
            return Err(CoreError::InvalidInput(
                "checkpoint result does not cover the recorded families".into(),
            ));
        }
        Ok(Self::with_state(catalog, options, next_n.max(2), result))
    }

    fn with_state(
        catalog: &'a Catalog,
        options: ScanOptions,
        next_n: u64,
        result: VerificationResult,
    ) -> Self {
        let limit = result.limit;
        let lanes = catalog
            .detectors()
            .map(|detector| Lane {
                detector,
                members: options.check_false_negatives.then(|| {
                    let family = detector.family();
                    enumerate_members(family.terms(), family.min_base(), limit)
                }),
            })
            .collect();
        Self {
            lanes,
            options,
            next_n,
            result,
        }
    }

    #[must_use]
    pub fn next_n(&self) -> u64 {
        self.next_n
    }

    #[must_use]
    pub fn options(&self) -> ScanOptions {
        self.options
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.next_n > self.result.limit || self.result.scanned_through >= self.result.limit
    }

    #[must_use]
    pub fn result(&self) -> &VerificationResult {
        &self.result
    }

    /// Scan every remaining `n <= min(upto, limit)`.
    ///
    /// `observe` sees each newly found false positive or false negative.
    pub fn step_to_with<F>(&mut self, upto: u64, mut observe: F) -> Result<()>
    where
        F: FnMut(Finding<'_>),
    {
        let end = upto.min(self.result.limit);
        while self.next_n <= end && !self.is_finished() {
            let n = self.next_n;
            let m = sigma_u64(n)?;
            for lane in &self.lanes {
                let name = lane.detector.name();
                let Some(report) = self.result.families.get_mut(name) else {
                    continue;
                };
                let family = lane.detector.family();
                let vanishes = lane.detector.vanishes_at(n, m);
                if vanishes {
                    report.hits += 1;
                    if direct_match_terms(&BigUint::from(n), family.terms(), family.min_base()) {
                        report.confirmed += 1;
                    } else {
                        report.false_positives.push(n);
                        observe(Finding::FalsePositive { family: name, n, m });
                    }
                } else if lane
                    .members
                    .as_ref()
                    .is_some_and(|members| members.binary_search(&n).is_ok())
                {
                    report.false_negatives.push(n);
                    observe(Finding::FalseNegative { family: name, n, m });
                }
            }
            self.result.scanned_through = n;
            match n.checked_add(1) {
                Some(next) => self.next_n = next,
                None => break,
            }
        }
        Ok(())
    }

    pub fn step_to(&mut self, upto: u64) -> Result<()> {
        self.step_to_with(upto, |_| {})
    }

    /// Scan to the limit and return the result.
    pub fn run(mut self) -> Result<VerificationResult> {
        let limit = self.result.limit;
        self.step_to(limit)?;
        Ok(self.result)
    }

    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            next_n: self.next_n,
            limit: self.result.limit,
            options: self.options,
            lanes: self
                .lanes
                .iter()
                .map(|lane| (lane.detector.name().to_string(), LaneIdentity::of(lane.detector)))
                .collect(),
            result: self.result.clone(),
        }
    }
}

/// A disagreement between a detector and direct search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finding<'a> {
    FalsePositive { family: &'a str, n: u64, m: u128 },
    FalseNegative { family: &'a str, n: u64, m: u128 },
}

/// Identity of every detector in `catalog`; a repeated name is an error since
/// results are keyed by name.
fn identities(catalog: &Catalog) -> Result<BTreeMap<String, LaneIdentity>> {
    let mut lanes = BTreeMap::new();
    for detector in catalog.detectors() {
        if lanes
            .insert(detector.name().to_string(), LaneIdentity::of(detector))
            .is_some()
        {
            return Err(CoreError::InvalidInput(format!(
                "family '{}' appears more than once in the catalog",
                detector.name()
            )));
        }
    }
    Ok(lanes)
}

/// Check every catalog detector over `2..=limit`.
pub fn verify(limit: u64, catalog: &Catalog) -> Result<VerificationResult> {
    Scanner::new(catalog, limit, ScanOptions::default())?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorTerm;
    use crate::family::{ConstellationDef, Term};
    use num_bigint::BigInt;

    fn detector(name: &str, offsets: &[u64], terms: &[(u32, u32, i64)]) -> Detector {
        let family = ConstellationDef::from_offsets(name, offsets).unwrap();
        let terms = terms
            .iter()
            .map(|&(m_exp, n_exp, c)| DetectorTerm {
                m_exp,
                n_exp,
                coeff: BigInt::from(c),
            })
            .collect();
        Detector::from_terms(family, terms).unwrap()
    }

    fn twin() -> Detector {
        detector(
            "Twin",
            &[0, 2],
            &[(2, 0, 1), (1, 1, -2), (0, 2, 1), (1, 0, -2), (0, 1, -2), (0, 0, -3)],
        )
    }

    /// `M - n - 1`, which vanishes exactly on primes.
    fn prime_detector_labelled_twin() -> Detector {
        detector("Twin", &[0, 2], &[(1, 0, 1), (0, 1, -1), (0, 0, -1)])
    }

    fn primes() -> Detector {
        detector("Primes", &[0], &[(1, 0, 1), (0, 1, -1), (0, 0, -1)])
    }

    #[test]
    fn twin_scan_confirms_every_twin_product() {
        let catalog = Catalog::from_detectors([twin()]);
        let result = verify(5_000, &catalog).unwrap();
        let report = &result.families["Twin"];
        // 15, 35, 143, 323, 899, 1763, 3599
        assert_eq!(report.confirmed, 7);
        // 8 = 2 * 4 with sigma(8) = 3 * 5 is the one coincidental zero.
        assert_eq!(report.false_positives, vec![8]);
        assert_eq!(report.hits, 8);
        assert!(result.is_complete());
    }

    #[test]
    fn wrong_detector_collects_false_positives() {
        let catalog = Catalog::from_detectors([prime_detector_labelled_twin()]);
        let result = verify(20, &catalog).unwrap();
        assert_eq!(
            result.false_positives()["Twin"],
            &[2, 3, 5, 7, 11, 13, 17, 19]
        );
        assert!(!result.is_clean());
    }

    #[test]
    fn false_negatives_are_opt_in() {
        let catalog = Catalog::from_detectors([prime_detector_labelled_twin()]);
        let plain = Scanner::new(&catalog, 200, ScanOptions::default())
            .unwrap()
            .run()
            .unwrap();
        assert!(plain.families["Twin"].false_negatives.is_empty());

        let checked = Scanner::new(
            &catalog,
            200,
            ScanOptions {
                check_false_negatives: true,
            },
        )
        .unwrap()
        .run()
        .unwrap();
        assert_eq!(checked.families["Twin"].false_negatives, vec![15, 35, 143]);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let catalog = Catalog::from_detectors([twin()]);
        assert!(matches!(
            verify(0, &catalog),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn limit_one_scans_nothing() {
        let catalog = Catalog::from_detectors([twin()]);
        let result = verify(1, &catalog).unwrap();
        assert_eq!(result.families["Twin"], FamilyReport::default());
    }

    #[test]
    fn chunked_scan_matches_single_pass() {
        let catalog = Catalog::from_detectors([twin(), primes()]);
        let single = verify(3_000, &catalog).unwrap();

        let mut scanner = Scanner::new(&catalog, 3_000, ScanOptions::default()).unwrap();
        scanner.step_to(1_000).unwrap();
        let json = scanner.checkpoint().to_json().unwrap();
        drop(scanner);

        let mut resumed = Scanner::resume(&catalog, Checkpoint::from_json(&json).unwrap()).unwrap();
        assert_eq!(resumed.next_n(), 1_001);
        resumed.step_to(2_000).unwrap();
        assert!(!resumed.is_finished());
        assert_eq!(resumed.run().unwrap(), single);
    }

    #[test]
    fn resume_rejects_foreign_checkpoint() {
        let twins = Catalog::from_detectors([twin()]);
        let prime_catalog = Catalog::from_detectors([primes()]);
        let checkpoint = Scanner::new(&twins, 100, ScanOptions::default())
            .unwrap()
            .checkpoint();
        assert!(Scanner::resume(&prime_catalog, checkpoint).is_err());
    }

    #[test]
    fn repeated_family_names_are_rejected() {
        let catalog = Catalog::from_detectors([twin(), prime_detector_labelled_twin()]);
        assert!(matches!(
            Scanner::new(&catalog, 100, ScanOptions::default()),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn resume_rejects_edited_family() {
        let original = Catalog::from_detectors([twin()]);
        let mut scanner = Scanner::new(&original, 2_000, ScanOptions::default()).unwrap();
        scanner.step_to(1_000).unwrap();
        let checkpoint = scanner.checkpoint();
        assert_eq!(
            checkpoint.lanes["Twin"].detector,
            twin().fingerprint()
        );

        // Same name, different detector.
        let edited = Catalog::from_detectors([prime_detector_labelled_twin()]);
        let err = Scanner::resume(&edited, checkpoint.clone()).err().unwrap();
        assert!(err.to_string().contains("\"Twin\""), "{err}");

        // Same detector, different ground truth.
        let family =
            ConstellationDef::from_terms("Twin", vec![Term::offset(0), Term::offset(2)], 3)
                .unwrap();
        let raised = Detector::from_terms(family, twin().terms().to_vec()).unwrap();
        let raised = Catalog::from_detectors([raised]);
        assert!(Scanner::resume(&raised, checkpoint.clone()).is_err());

        assert!(Scanner::resume(&original, checkpoint).is_ok());
    }

    #[test]
    fn scan_stops_at_the_top_of_the_range() {
        let catalog = Catalog::from_detectors([twin()]);
        let mut checkpoint = Scanner::new(&catalog, u64::MAX, ScanOptions::default())
            .unwrap()
            .checkpoint();
        checkpoint.next_n = u64::MAX;
        checkpoint.result.scanned_through = u64::MAX - 1;

        let mut scanner = Scanner::resume(&catalog, checkpoint).unwrap();
        scanner.step_to(u64::MAX).unwrap();
        assert!(scanner.is_finished());
        assert_eq!(scanner.result().scanned_through, u64::MAX);
        assert!(scanner.result().is_complete());

        // Stepping again is a no-op.
        scanner.step_to(u64::MAX).unwrap();
        assert_eq!(scanner.result().families["Twin"].hits, 0);
    }

    #[test]
    fn findings_are_reported_to_the_observer() {
        let catalog = Catalog::from_detectors([prime_detector_labelled_twin()]);
        let mut scanner = Scanner::new(&catalog, 10, ScanOptions::default()).unwrap();
        let mut seen = Vec::new();
        scanner
            .step_to_with(10, |finding| {
                if let Finding::FalsePositive { n, m, .. } = finding {
                    seen.push((n, m));
                }
            })
            .unwrap();
        assert_eq!(seen, vec![(2, 3), (3, 4), (5, 6), (7, 8)]);
    }
}
