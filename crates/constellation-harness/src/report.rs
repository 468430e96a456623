//! Report rendering for derivation and verification runs.

use serde::{Deserialize, Serialize};

use constellation_core::{Catalog, CatalogEntry, DeriveFailure, VerificationResult};

/// One family's derivation outcome, flattened for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationRow {
    pub family: String,
    pub terms: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factored: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum_difference_form: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degree_in_m: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// `NO_DETECTOR` or validation failure text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationReport {
    pub title: String,
    pub rows: Vec<DerivationRow>,
}

impl DerivationReport {
    #[must_use]
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let rows = catalog
            .entries()
            .iter()
            .map(|entry| match entry {
                CatalogEntry::Derived(d) => DerivationRow {
                    family: d.name().to_string(),
                    terms: d.detector.family().describe(&d.parameter),
                    detector: Some(d.detector.to_string()),
                    factored: Some(d.diagnostics.factored.clone()),
                    sum_difference_form: Some(d.diagnostics.sum_difference_form.clone()),
                    degree_in_m: Some(d.diagnostics.degree_in_m),
                    fingerprint: Some(d.diagnostics.fingerprint.clone()),
                    failure: None,
                },
                CatalogEntry::Failed { family, failure } => DerivationRow {
                    family: family.clone(),
                    terms: String::new(),
                    detector: None,
                    factored: None,
                    sum_difference_form: None,
                    degree_in_m: None,
                    fingerprint: None,
                    failure: Some(failure_text(failure)),
                },
            })
            .collect();
        Self {
            title: String::from("Constellation Detector Derivation"),
            rows,
        }
    }

    /// Plain-text listing, one block per family.
    #[must_use]
    pub fn to_plain(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&format!("== {} {}\n", row.family, row.terms));
            match (&row.detector, &row.failure) {
                (Some(detector), _) => {
                    out.push_str(&format!("  D(n, M) = {detector}\n"));
                    if let Some(factored) = &row.factored
                        && factored != detector
                    {
                        out.push_str(&format!("  factored: {factored} = 0\n"));
                    }
                    if let Some(form) = &row.sum_difference_form {
                        out.push_str(&format!("  s = M - n, t = M + n: {form} = 0\n"));
                    }
                    if let Some(degree) = row.degree_in_m {
                        out.push_str(&format!("  degree in M: {degree}\n"));
                    }
                }
                (None, Some(failure)) => out.push_str(&format!("  {failure}\n")),
                (None, None) => {}
            }
        }
        out
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

fn failure_text(failure: &DeriveFailure) -> String {
    match failure {
        DeriveFailure::NoDetector { reason, .. } => format!("NO_DETECTOR ({reason})"),
        DeriveFailure::Invalid(err) => format!("invalid: {err}"),
    }
}

/// Verification summary for one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub title: String,
    pub timestamp: String,
    pub false_negatives_checked: bool,
    pub result: VerificationResult,
    /// Families whose derivation failed and were therefore not scanned.
    pub skipped: Vec<String>,
}

impl VerificationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.result.is_clean()
    }

    #[must_use]
    pub fn false_positive_count(&self) -> usize {
        self.result
            .families
            .values()
            .map(|r| r.false_positives.len())
            .sum()
    }

    #[must_use]
    pub fn false_negative_count(&self) -> usize {
        self.result
            .families
            .values()
            .map(|r| r.false_negatives.len())
            .sum()
    }

    /// `None` when every scanned family is clean, otherwise a one-line summary of
    /// the exceptions.
    #[must_use]
    pub fn failure_summary(&self) -> Option<String> {
        if self.is_clean() {
            return None;
        }
        Some(format!(
            "{} false positives, {} false negatives found",
            self.false_positive_count(),
            self.false_negative_count()
        ))
    }

    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Limit: {}\n", self.result.limit));
        out.push_str(&format!("- Scanned through: {}\n", self.result.scanned_through));
        out.push_str(&format!(
            "- False negatives checked: {}\n\n",
            if self.false_negatives_checked { "yes" } else { "no" }
        ));

        out.push_str("| Family | Hits | Confirmed | False positives | False negatives | Status |\n");
        out.push_str("|--------|------|-----------|-----------------|-----------------|--------|\n");
        for (name, report) in &self.result.families {
            let status = if report.is_clean() { "CLEAN" } else { "EXCEPTIONS" };
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                name,
                report.hits,
                report.confirmed,
                list_or_dash(&report.false_positives),
                if self.false_negatives_checked {
                    list_or_dash(&report.false_negatives)
                } else {
                    String::from("n/a")
                },
                status
            ));
        }
        for name in &self.skipped {
            out.push_str(&format!("| {name} | - | - | - | - | NO_DETECTOR |\n"));
        }
        out
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

fn list_or_dash(values: &[u64]) -> String {
    if values.is_empty() {
        return String::from("-");
    }
    values
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use constellation_core::{
        CatalogSpec, ConstellationDef, Detector, DetectorTerm, EliminationConfig,
        EliminationEngine, ScanOptions, Scanner, verify,
    };
    use num_bigint::BigInt;

    #[test]
    fn derivation_report_lists_detector_and_failures() {
        let spec = CatalogSpec::from_json(
            r#"{"families": [
                {"name": "Twin", "offsets": [0, 2]},
                {"name": "Broken", "offsets": [1, 3]}
            ]}"#,
        )
        .unwrap();
        let report = DerivationReport::from_catalog(&Catalog::derive_all(
            &spec,
            &EliminationEngine::new(),
        ));

        let twin = &report.rows[0];
        assert_eq!(twin.terms, "(p, p+2)");
        assert_eq!(
            twin.detector.as_deref(),
            Some("M^2 - 2*M*n - 2*M + n^2 - 2*n - 3")
        );
        assert_eq!(twin.sum_difference_form.as_deref(), Some("s^2 - 2*t - 3"));

        let broken = &report.rows[1];
        assert!(broken.detector.is_none());
        assert!(broken.failure.as_deref().unwrap().starts_with("invalid:"));

        let plain = report.to_plain();
        assert!(plain.contains("== Twin (p, p+2)"));
        assert!(plain.contains("D(n, M) = M^2"));
        assert!(!plain.contains("factored:"));
    }

    #[test]
    fn exhausted_budget_renders_no_detector() {
        let spec = CatalogSpec::builtin().select("Quad").unwrap();
        let engine = EliminationEngine::from_config(&EliminationConfig {
            pair_budget: Some(0),
        });
        let report = DerivationReport::from_catalog(&Catalog::derive_all(&spec, &engine));
        assert_eq!(
            report.rows[0].failure.as_deref(),
            Some("NO_DETECTOR (s-pair budget exhausted)")
        );
        assert!(report.to_plain().contains("NO_DETECTOR"));
    }

    #[test]
    fn markdown_enumerates_false_positives() {
        let spec = CatalogSpec::builtin().select("Twin").unwrap();
        let catalog = Catalog::derive_all(&spec, &EliminationEngine::new());
        let report = VerificationReport {
            title: String::from("Verification"),
            timestamp: String::from("2026-10-18T00:00:00.000Z"),
            false_negatives_checked: false,
            result: verify(400, &catalog).unwrap(),
            skipped: vec![String::from("Broken")],
        };
        let md = report.to_markdown();
        assert!(md.contains("| Twin | 5 | 4 | 8 | n/a | EXCEPTIONS |"));
        assert!(md.contains("| Broken | - | - | - | - | NO_DETECTOR |"));
        assert_eq!(report.false_positive_count(), 1);
        assert!(!report.is_clean());

        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["result"]["families"]["Twin"]["false_positives"][0], 8);
    }

    #[test]
    fn false_negatives_alone_fail_the_run() {
        // `n - 15` fires only at 15, so it misses every other twin product.
        let family = ConstellationDef::from_offsets("Twin", &[0, 2]).unwrap();
        let terms = vec![
            DetectorTerm {
                m_exp: 0,
                n_exp: 1,
                coeff: BigInt::from(1),
            },
            DetectorTerm {
                m_exp: 0,
                n_exp: 0,
                coeff: BigInt::from(-15),
            },
        ];
        let catalog = Catalog::from_detectors([Detector::from_terms(family, terms).unwrap()]);
        let options = ScanOptions {
            check_false_negatives: true,
        };
        let result = Scanner::new(&catalog, 200, options).unwrap().run().unwrap();

        let report = VerificationReport {
            title: String::from("Verification"),
            timestamp: String::from("2026-10-18T00:00:00.000Z"),
            false_negatives_checked: true,
            result,
            skipped: Vec::new(),
        };
        assert_eq!(report.false_positive_count(), 0);
        assert_eq!(report.false_negative_count(), 2);
        assert_eq!(
            report.failure_summary().as_deref(),
            Some("0 false positives, 2 false negatives found")
        );
        assert!(report.to_markdown().contains("| Twin | 1 | 1 | - | 35, 143 | EXCEPTIONS |"));
    }

    #[test]
    fn clean_run_has_no_failure_summary() {
        let spec = CatalogSpec::builtin().select("Sophie").unwrap();
        let catalog = Catalog::derive_all(&spec, &EliminationEngine::new());
        let report = VerificationReport {
            title: String::from("Verification"),
            timestamp: String::from("2026-10-18T00:00:00.000Z"),
            false_negatives_checked: false,
            result: verify(2_000, &catalog).unwrap(),
            skipped: Vec::new(),
        };
        assert!(report.failure_summary().is_none());
    }
}
