//! # constellation-core
//!
//! Exact derivation and verification of prime-constellation detectors.
//!
//! A constellation family such as twin primes `(p, p+2)` yields, for a prime base
//! `p`, a product `n` of distinct primes whose divisor sum is `M = Π (term + 1)`.
//! Eliminating `p` from those two relations gives a polynomial `D(n, M)`, the
//! family's detector. This crate:
//!
//! - computes `sigma` and primality exactly ([`oracle`]);
//! - decides membership by direct search ([`membership`]);
//! - runs the elimination over an in-crate Gröbner basis backend
//!   ([`poly`], [`groebner`], [`elimination`]);
//! - scans a numeric range and records where detector and ground truth disagree
//!   ([`scanner`]).

#![forbid(unsafe_code)]

pub mod catalog;
pub mod detector;
pub mod elimination;
pub mod error;
pub mod family;
pub mod groebner;
pub mod membership;
pub mod oracle;
pub mod poly;
pub mod scanner;

pub use catalog::{Catalog, CatalogEntry, CatalogSpec};
pub use detector::{Detector, DetectorTerm};
pub use elimination::{
    DeriveFailure, Derivation, Diagnostics, EliminationConfig, EliminationEngine,
    NoDetectorReason, derive,
};
pub use error::{CoreError, Result};
pub use family::{ConstellationDef, FamilySpec, Term};
pub use groebner::{BasisBackend, BasisError, Buchberger};
pub use membership::{direct_match, direct_match_terms, enumerate_members};
pub use oracle::{is_prime, is_prime_u64, sigma, sigma_u64};
pub use scanner::{
    Checkpoint, FamilyReport, Finding, LaneIdentity, ScanOptions, Scanner, VerificationResult,
    verify,
};
