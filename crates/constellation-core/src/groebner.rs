//! Gröbner basis computation under lexicographic order.
//!
//! ## Buchberger S-polynomial reduction
//!
//! For generators f, g with lcm L of leading monomials:
//!
//! ```text
//! S(f,g) = (L/LT(f))·f - (L/LT(g))·g
//! ```
//!
//! The basis is complete when every S-polynomial reduces to zero. Pairs are
//! processed smallest-lcm first (normal strategy) and pruned with Buchberger's
//! two criteria:
//! - product criterion: coprime leading monomials reduce to zero;
//! - chain criterion: `(i, j)` is redundant when some `k` has `LM(k) | lcm(i, j)`
//!   and both `(i, k)` and `(j, k)` have already been treated.
//!
//! The result is the *reduced* basis (minimal, interreduced, monic), sorted by
//! leading monomial in descending order, so it is unique for a given ideal and order.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::poly::{Monomial, Polynomial};

/// Basis computation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BasisError {
    /// The configured S-pair budget ran out before the basis closed.
    #[error("s-pair budget exhausted after {processed} pairs")]
    PairBudgetExhausted { processed: usize },
}

/// A polynomial-ideal capability: given generators, return a Gröbner basis of the
/// ideal they generate under the lexicographic order of their ring.
pub trait BasisBackend {
    fn basis(&self, generators: &[Polynomial]) -> Result<Vec<Polynomial>, BasisError>;
}

/// Buchberger's algorithm with the product and chain criteria.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buchberger {
    /// Maximum number of S-pairs to examine; `None` is unbounded.
    pub pair_budget: Option<usize>,
}

impl Buchberger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pair_budget(mut self, budget: usize) -> Self {
        self.pair_budget = Some(budget);
        self
    }
}

impl BasisBackend for Buchberger {
    fn basis(&self, generators: &[Polynomial]) -> Result<Vec<Polynomial>, BasisError> {
        let mut basis: Vec<Polynomial> = generators
            .iter()
            .filter(|g| !g.is_zero())
            .map(Polynomial::monic)
            .collect();

        let mut pending: BTreeSet<(usize, usize)> = BTreeSet::new();
        for j in 0..basis.len() {
            for i in 0..j {
                pending.insert((i, j));
            }
        }

        let mut processed = 0usize;
        while let Some((i, j)) = select_pair(&basis, &pending) {
            pending.remove(&(i, j));
            processed += 1;
            if self.pair_budget.is_some_and(|budget| processed > budget) {
                return Err(BasisError::PairBudgetExhausted { processed });
            }

            let (Some(lm_i), Some(lm_j)) = (basis[i].leading_monomial(), basis[j].leading_monomial())
            else {
                continue;
            };
            if lm_i.is_coprime(lm_j) {
                continue;
            }
            let lcm = lm_i.lcm(lm_j);
            if chain_criterion(&basis, &pending, i, j, &lcm) {
                continue;
            }

            let remainder = reduce(&s_polynomial(&basis[i], &basis[j]), &basis);
            if remainder.is_zero() {
                continue;
            }
            let next = basis.len();
            basis.push(remainder.monic());
            for k in 0..next {
                pending.insert((k, next));
            }
        }

        Ok(interreduce(basis))
    }
}

/// Normal strategy: smallest lcm by total degree, then by lex.
fn select_pair(basis: &[Polynomial], pending: &BTreeSet<(usize, usize)>) -> Option<(usize, usize)> {
    pending
        .iter()
        .filter_map(|&(i, j)| {
            let lcm = basis[i].leading_monomial()?.lcm(basis[j].leading_monomial()?);
            Some(((lcm.total_degree(), lcm), (i, j)))
        })
        .min()
        .map(|(_, pair)| pair)
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

fn chain_criterion(
    basis: &[Polynomial],
    pending: &BTreeSet<(usize, usize)>,
    i: usize,
    j: usize,
    lcm: &Monomial,
) -> bool {
    basis.iter().enumerate().any(|(k, g)| {
        k != i
            && k != j
            && g.leading_monomial().is_some_and(|lm| lm.divides(lcm))
            && !pending.contains(&ordered(i, k))
            && !pending.contains(&ordered(j, k))
    })
}

/// `S(f, g)`; both inputs must be nonzero.
#[must_use]
pub fn s_polynomial(f: &Polynomial, g: &Polynomial) -> Polynomial {
    let (Some((lm_f, lc_f)), Some((lm_g, lc_g))) = (f.leading_term(), g.leading_term()) else {
        return Polynomial::zero(f.nvars());
    };
    let lcm = lm_f.lcm(lm_g);
    let (Some(mf), Some(mg)) = (lm_f.quotient_of(&lcm), lm_g.quotient_of(&lcm)) else {
        return Polynomial::zero(f.nvars());
    };
    &f.mul_term(&mf, &lc_f.recip()) - &g.mul_term(&mg, &lc_g.recip())
}

/// Full normal form of `poly` modulo `divisors` (multivariate division remainder).
#[must_use]
pub fn reduce(poly: &Polynomial, divisors: &[Polynomial]) -> Polynomial {
    let mut work = poly.clone();
    let mut remainder = Polynomial::zero(poly.nvars());

    while let Some((monomial, coeff)) = work.pop_leading() {
        let reducer = divisors.iter().find_map(|g| {
            let (lm, lc) = g.leading_term()?;
            lm.quotient_of(&monomial).map(|q| (q, lc, g))
        });
        match reducer {
            Some((quotient, lc, g)) => {
                let factor = &coeff / lc;
                // The leading term was popped; cancel the rest of factor*quotient*g.
                let mut tail = g.clone();
                tail.pop_leading();
                work.sub_scaled(&factor, &quotient, &tail);
            }
            None => remainder.add_term(monomial, coeff),
        }
    }
    remainder
}

/// Turn any Gröbner basis into the reduced one, sorted by descending leading monomial.
#[must_use]
pub fn interreduce(basis: Vec<Polynomial>) -> Vec<Polynomial> {
    let mut candidates: Vec<Polynomial> = basis.into_iter().filter(|g| !g.is_zero()).collect();
    candidates.sort_by(|a, b| a.leading_monomial().cmp(&b.leading_monomial()));

    let mut minimal: Vec<Polynomial> = Vec::new();
    for g in candidates {
        let redundant = g.leading_monomial().is_some_and(|lm| {
            minimal
                .iter()
                .filter_map(Polynomial::leading_monomial)
                .any(|kept| kept.divides(lm))
        });
        if !redundant {
            minimal.push(g);
        }
    }

    let mut reduced = Vec::with_capacity(minimal.len());
    for (idx, g) in minimal.iter().enumerate() {
        let others: Vec<Polynomial> = minimal
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != idx)
            .map(|(_, h)| h.clone())
            .collect();
        let Some((lm, lc)) = g.leading_term() else {
            continue;
        };
        let mut tail = g.clone();
        tail.pop_leading();
        let mut out = reduce(&tail, &others);
        out.add_term(lm.clone(), lc.clone());
        reduced.push(out.monic());
    }

    reduced.sort_by(|a, b| b.leading_monomial().cmp(&a.leading_monomial()));
    reduced
}

/// Check the Buchberger criterion directly: every S-polynomial reduces to zero.
#[must_use]
pub fn is_groebner_basis(basis: &[Polynomial]) -> bool {
    for j in 0..basis.len() {
        for i in 0..j {
            if !reduce(&s_polynomial(&basis[i], &basis[j]), basis).is_zero() {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poly::PolyRing;
    use num_bigint::BigInt;
    use num_rational::BigRational;

    fn q(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    #[test]
    fn reduce_by_linear_generator() {
        let r = PolyRing::new(["x", "y"]);
        // x^2 mod (x - y) = y^2
        let f = r.var(0).pow(2);
        let g = &r.var(0) - &r.var(1);
        assert_eq!(reduce(&f, &[g]), r.var(1).pow(2));
    }

    #[test]
    fn s_polynomial_cancels_leading_terms() {
        let r = PolyRing::new(["x", "y"]);
        let f = &(&r.var(0) * &r.var(1)) - &r.integer(1);
        let g = &r.var(0).pow(2) - &r.var(1);
        let s = s_polynomial(&f, &g);
        // x*(xy - 1) - y*(x^2 - y) = y^2 - x
        assert_eq!(s, &r.var(1).pow(2) - &r.var(0));
    }

    #[test]
    fn twisted_cubic_eliminates_to_implicit_equations() {
        // <y - x^2, z - x^3>, x > y > z.
        let r = PolyRing::new(["x", "y", "z"]);
        let g1 = &r.var(1) - &r.var(0).pow(2);
        let g2 = &r.var(2) - &r.var(0).pow(3);
        let basis = Buchberger::new().basis(&[g1, g2]).unwrap();
        assert!(is_groebner_basis(&basis));

        let eliminated: Vec<&Polynomial> = basis
            .iter()
            .filter(|g| g.is_free_of(&BTreeSet::from([0])))
            .collect();
        assert_eq!(eliminated.len(), 1);
        // y^3 - z^2
        assert_eq!(*eliminated[0], &r.var(1).pow(3) - &r.var(2).pow(2));
    }

    #[test]
    fn reduced_basis_is_monic_and_sorted() {
        let r = PolyRing::new(["x", "y"]);
        let f = (&r.var(0).pow(2) - &r.var(1)).scale(&q(3));
        let g = (&(&r.var(0) * &r.var(1)) - &r.integer(1)).scale(&q(-2));
        let basis = Buchberger::new().basis(&[f, g]).unwrap();
        assert!(is_groebner_basis(&basis));
        for g in &basis {
            assert_eq!(g.leading_coefficient(), Some(&q(1)));
        }
        for pair in basis.windows(2) {
            assert!(pair[0].leading_monomial() > pair[1].leading_monomial());
        }
        // Elimination ideal of <x^2 - y, xy - 1> is <y^3 - 1>.
        assert_eq!(basis.last().unwrap(), &(&r.var(1).pow(3) - &r.integer(1)));
    }

    #[test]
    fn basis_is_independent_of_generator_order() {
        let r = PolyRing::new(["x", "y", "z"]);
        let g1 = &(&r.var(0) * &r.var(1)) - &r.var(2);
        let g2 = &r.var(0).pow(2) - &r.var(1);
        let a = Buchberger::new().basis(&[g1.clone(), g2.clone()]).unwrap();
        let b = Buchberger::new().basis(&[g2, g1]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pair_budget_is_enforced() {
        let r = PolyRing::new(["x", "y", "z"]);
        let g1 = &r.var(1) - &r.var(0).pow(2);
        let g2 = &r.var(2) - &r.var(0).pow(3);
        let err = Buchberger::new()
            .with_pair_budget(0)
            .basis(&[g1, g2])
            .unwrap_err();
        assert_eq!(err, BasisError::PairBudgetExhausted { processed: 1 });
    }

    #[test]
    fn zero_generators_are_dropped() {
        let r = PolyRing::new(["x"]);
        let basis = Buchberger::new()
            .basis(&[Polynomial::zero(1), &r.var(0) - &r.integer(2)])
            .unwrap();
        assert_eq!(basis, vec![&r.var(0) - &r.integer(2)]);
    }
}
