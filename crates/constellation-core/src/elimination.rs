//! Parametric elimination of constellation families.
//!
//! For a family with terms `t_i(p)` the engine forms the ideal
//!
//! ```text
//! I = < n - Π t_i(p),  M - Π (t_i(p) + 1) >   in Q[p, M, n]
//! ```
//!
//! and computes a lexicographic Gröbner basis with `p > M > n`. By the elimination
//! theorem the basis elements free of `p` generate `I ∩ Q[M, n]`; the first such
//! element, in canonical integer form, is the family's detector.

use std::collections::BTreeSet;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detector::Detector;
use crate::error::CoreError;
use crate::family::ConstellationDef;
use crate::groebner::{BasisBackend, BasisError, Buchberger};
use crate::poly::{PolyRing, Polynomial};

/// Engine settings; loaded from harness configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationConfig {
    /// Maximum S-pairs per derivation; `None` runs to completion.
    #[serde(default)]
    pub pair_budget: Option<usize>,
}

/// Why a derivation produced no detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDetectorReason {
    /// The basis closed but every element still mentions the parameter.
    NoParameterFreeElement,
    /// The S-pair budget ran out first.
    BudgetExhausted,
}

impl std::fmt::Display for NoDetectorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoParameterFreeElement => "no parameter-free basis element",
            Self::BudgetExhausted => "s-pair budget exhausted",
        })
    }
}

/// Non-fatal derivation outcome; the catalog records it and moves on.
#[derive(Debug, Error)]
pub enum DeriveFailure {
    #[error("NO_DETECTOR for '{name}': {reason}")]
    NoDetector {
        name: String,
        reason: NoDetectorReason,
    },
    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// Presentation aids computed alongside the detector. Not part of the detector's
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub degree_in_m: u32,
    pub total_degree: u32,
    /// `content * monomial * (primitive)`, unit factors omitted.
    pub factored: String,
    /// The detector in `s = M - n`, `t = M + n`.
    pub sum_difference_form: String,
    pub fingerprint: String,
}

/// A successful derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Derivation {
    pub parameter: String,
    pub n_expr: String,
    pub m1_expr: String,
    pub basis_size: usize,
    pub detector: Detector,
    pub diagnostics: Diagnostics,
}

impl Derivation {
    #[must_use]
    pub fn name(&self) -> &str {
        self.detector.name()
    }
}

/// Elimination over a pluggable Gröbner backend.
#[derive(Debug, Clone, Default)]
pub struct EliminationEngine<B: BasisBackend = Buchberger> {
    backend: B,
}

impl EliminationEngine<Buchberger> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &EliminationConfig) -> Self {
        Self {
            backend: Buchberger {
                pair_budget: config.pair_budget,
            },
        }
    }
}

impl<B: BasisBackend> EliminationEngine<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Derive the detector of `family`, naming its free parameter `parameter`.
    pub fn derive(
        &self,
        family: &ConstellationDef,
        parameter: &str,
    ) -> Result<Derivation, DeriveFailure> {
        if parameter.trim().is_empty() || parameter == "M" || parameter == "n" {
            return Err(CoreError::InvalidInput(format!(
                "parameter symbol '{parameter}' collides with the detector variables"
            ))
            .into());
        }

        let ring = PolyRing::new([parameter, "M", "n"]);
        let (p, m, n) = (0, 1, 2);
        let n_expr = family.n_expr(&ring, p);
        let m1_expr = family.m1_expr(&ring, p);
        let generators = [&ring.var(n) - &n_expr, &ring.var(m) - &m1_expr];

        let basis = self.backend.basis(&generators).map_err(|err| match err {
            BasisError::PairBudgetExhausted { .. } => DeriveFailure::NoDetector {
                name: family.name().to_string(),
                reason: NoDetectorReason::BudgetExhausted,
            },
        })?;

        let parameters = BTreeSet::from([p]);
        let detector = basis
            .iter()
            .find(|g| g.is_free_of(&parameters))
            .and_then(|g| Detector::from_polynomial(family.clone(), g, m, n))
            .ok_or_else(|| DeriveFailure::NoDetector {
                name: family.name().to_string(),
                reason: NoDetectorReason::NoParameterFreeElement,
            })?;

        let diagnostics = diagnostics(&detector);
        Ok(Derivation {
            parameter: parameter.to_string(),
            n_expr: ring.display(&n_expr).to_string(),
            m1_expr: ring.display(&m1_expr).to_string(),
            basis_size: basis.len(),
            detector,
            diagnostics,
        })
    }
}

/// Derive the detector for a plain offset family with the default engine.
pub fn derive(name: &str, offsets: &[u64], parameter: &str) -> Result<Derivation, DeriveFailure> {
    let family = ConstellationDef::from_offsets(name, offsets)?;
    EliminationEngine::new().derive(&family, parameter)
}

fn diagnostics(detector: &Detector) -> Diagnostics {
    let ring = PolyRing::new(["M", "n"]);
    let poly = detector.to_polynomial();
    Diagnostics {
        degree_in_m: detector.degree_in_m(),
        total_degree: detector.total_degree(),
        factored: factored_form(&ring, &poly),
        sum_difference_form: sum_difference_form(&poly),
        fingerprint: detector.fingerprint(),
    }
}

fn factored_form(ring: &PolyRing, poly: &Polynomial) -> String {
    let (content, primitive) = poly.content_and_primitive();
    let shared = primitive.monomial_content();

    let mut cofactor = Polynomial::zero(primitive.nvars());
    for (m, c) in primitive.terms() {
        if let Some(q) = shared.quotient_of(m) {
            cofactor.add_term(q, c.clone());
        }
    }

    let mut factors = Vec::new();
    if !content.is_one() {
        factors.push(content.to_string());
    }
    if !shared.is_one() {
        let monomial = Polynomial::term(shared, BigRational::one());
        factors.push(ring.display(&monomial).to_string());
    }
    if factors.is_empty() {
        return ring.display(&cofactor).to_string();
    }
    factors.push(format!("({})", ring.display(&cofactor)));
    factors.join(" * ")
}

fn sum_difference_form(poly: &Polynomial) -> String {
    let ring = PolyRing::new(["s", "t"]);
    let half = BigRational::new(BigInt::one(), BigInt::from(2));
    let (s, t) = (ring.var(0), ring.var(1));
    // M = (s + t) / 2, n = (t - s) / 2
    let images = [(&s + &t).scale(&half), (&t - &s).scale(&half)];
    let substituted = poly.compose(&images);
    let (content, primitive) = substituted.content_and_primitive();
    if content.is_zero() {
        return "0".to_string();
    }
    ring.display(&primitive).to_string()
}
