//! Ground-truth constellation membership by direct search.
//!
//! This is the definitional check detectors are measured against, so it stays a
//! plain brute-force scan: try every base value from the family's minimum upward,
//! stop as soon as the product of terms reaches `n`.

use std::cmp::Ordering;

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::family::Term;
use crate::oracle::is_prime;

/// True iff `n = Π (p + k)` over `offsets` for some `p >= 2` with every factor prime.
///
/// Empty `offsets` never match.
#[must_use]
pub fn direct_match(n: &BigUint, offsets: &[u64]) -> bool {
    let terms: Vec<Term> = offsets.iter().map(|&k| Term::offset(k)).collect();
    direct_match_terms(n, &terms, 2)
}

/// [`direct_match`] for affine terms, with the parameter starting at `min_base`.
///
/// Every term must have `scale >= 1`, which makes the product strictly increasing
/// in the parameter and bounds the search; other inputs never match.
#[must_use]
pub fn direct_match_terms(n: &BigUint, terms: &[Term], min_base: u64) -> bool {
    if terms.is_empty() || terms.iter().any(|t| t.scale == 0) {
        return false;
    }

    let mut candidate = BigUint::from(min_base);
    loop {
        let values: Vec<BigUint> = terms.iter().map(|t| t.eval(&candidate)).collect();
        let product: BigUint = values.iter().product();
        match product.cmp(n) {
            Ordering::Less => candidate += 1u32,
            Ordering::Equal => return values.iter().all(is_prime),
            Ordering::Greater => return false,
        }
    }
}

/// Every genuine constellation product `<= limit`, ascending.
#[must_use]
pub fn enumerate_members(terms: &[Term], min_base: u64, limit: u64) -> Vec<u64> {
    let mut members = Vec::new();
    if terms.is_empty() || terms.iter().any(|t| t.scale == 0) {
        return members;
    }

    let bound = BigUint::from(limit);
    let mut candidate = BigUint::from(min_base);
    loop {
        let values: Vec<BigUint> = terms.iter().map(|t| t.eval(&candidate)).collect();
        let product: BigUint = values.iter().product();
        if product > bound {
            break;
        }
        if values.iter().all(is_prime)
            && let Some(n) = product.to_u64()
        {
            members.push(n);
        }
        candidate += 1u32;
    }
    members
}
