//! Sparse multivariate polynomials over Q.
//!
//! A polynomial is an immutable-by-convention map from exponent vectors
//! ([`Monomial`]) to nonzero [`BigRational`] coefficients. Variable `0` is the most
//! significant variable of the lexicographic order: the derived `Ord` on the exponent
//! vector *is* lex order, so the `BTreeMap` keeps terms sorted and the leading term
//! is always the last entry.
//!
//! Variable names live in [`PolyRing`]; polynomials only carry the variable count.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

/// Exponent vector, ordered lexicographically (variable 0 first).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Monomial(Vec<u32>);

impl Monomial {
    #[must_use]
    pub fn one(nvars: usize) -> Self {
        Self(vec![0; nvars])
    }

    #[must_use]
    pub fn from_exponents(exponents: Vec<u32>) -> Self {
        Self(exponents)
    }

    /// `x_var^exp`.
    #[must_use]
    pub fn var(nvars: usize, var: usize, exp: u32) -> Self {
        let mut exponents = vec![0; nvars];
        exponents[var] = exp;
        Self(exponents)
    }

    #[must_use]
    pub fn exponents(&self) -> &[u32] {
        &self.0
    }

    #[must_use]
    pub fn exponent(&self, var: usize) -> u32 {
        self.0.get(var).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_degree(&self) -> u32 {
        self.0.iter().sum()
    }

    #[must_use]
    pub fn is_one(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }

    #[must_use]
    pub fn divides(&self, other: &Self) -> bool {
        self.0.iter().zip(&other.0).all(|(a, b)| a <= b)
    }

    /// `other / self`, if `self` divides `other`.
    #[must_use]
    pub fn quotient_of(&self, other: &Self) -> Option<Self> {
        if !self.divides(other) {
            return None;
        }
        Some(Self(other.0.iter().zip(&self.0).map(|(a, b)| a - b).collect()))
    }

    #[must_use]
    pub fn lcm(&self, other: &Self) -> Self {
        Self(self.0.iter().zip(&other.0).map(|(a, b)| *a.max(b)).collect())
    }

    #[must_use]
    pub fn gcd(&self, other: &Self) -> Self {
        Self(self.0.iter().zip(&other.0).map(|(a, b)| *a.min(b)).collect())
    }

    #[must_use]
    pub fn is_coprime(&self, other: &Self) -> bool {
        self.0.iter().zip(&other.0).all(|(a, b)| *a == 0 || *b == 0)
    }

    #[must_use]
    pub fn product(&self, other: &Self) -> Self {
        Self(self.0.iter().zip(&other.0).map(|(a, b)| a + b).collect())
    }
}

/// Sparse polynomial in a fixed number of variables with rational coefficients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polynomial {
    nvars: usize,
    terms: BTreeMap<Monomial, BigRational>,
}

impl Polynomial {
    #[must_use]
    pub fn zero(nvars: usize) -> Self {
        Self {
            nvars,
            terms: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn constant(nvars: usize, value: BigRational) -> Self {
        Self::term(Monomial::one(nvars), value)
    }

    #[must_use]
    pub fn from_integer(nvars: usize, value: i64) -> Self {
        Self::constant(nvars, BigRational::from_integer(BigInt::from(value)))
    }

    #[must_use]
    pub fn variable(nvars: usize, var: usize) -> Self {
        Self::term(Monomial::var(nvars, var, 1), BigRational::one())
    }

    /// Single-term polynomial; a zero coefficient yields the zero polynomial.
    #[must_use]
    pub fn term(monomial: Monomial, coeff: BigRational) -> Self {
        let mut out = Self::zero(monomial.0.len());
        out.add_term(monomial, coeff);
        out
    }

    #[must_use]
    pub fn nvars(&self) -> usize {
        self.nvars
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in ascending monomial order.
    pub fn terms(&self) -> impl DoubleEndedIterator<Item = (&Monomial, &BigRational)> {
        self.terms.iter()
    }

    #[must_use]
    pub fn coefficient(&self, monomial: &Monomial) -> Option<&BigRational> {
        self.terms.get(monomial)
    }

    #[must_use]
    pub fn leading_term(&self) -> Option<(&Monomial, &BigRational)> {
        self.terms.last_key_value()
    }

    #[must_use]
    pub fn leading_monomial(&self) -> Option<&Monomial> {
        self.terms.last_key_value().map(|(m, _)| m)
    }

    #[must_use]
    pub fn leading_coefficient(&self) -> Option<&BigRational> {
        self.terms.last_key_value().map(|(_, c)| c)
    }

    /// Accumulate `coeff * monomial`, dropping the entry if it cancels.
    pub fn add_term(&mut self, monomial: Monomial, coeff: BigRational) {
        if coeff.is_zero() {
            return;
        }
        match self.terms.entry(monomial) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(coeff);
            }
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                *slot.get_mut() += coeff;
                if slot.get().is_zero() {
                    slot.remove();
                }
            }
        }
    }

    /// Remove and return the leading term.
    pub fn pop_leading(&mut self) -> Option<(Monomial, BigRational)> {
        self.terms.pop_last()
    }

    /// `self -= coeff * monomial * other`, in place.
    pub fn sub_scaled(&mut self, coeff: &BigRational, monomial: &Monomial, other: &Self) {
        for (m, c) in &other.terms {
            self.add_term(monomial.product(m), -(coeff * c));
        }
    }

    #[must_use]
    pub fn scale(&self, factor: &BigRational) -> Self {
        if factor.is_zero() {
            return Self::zero(self.nvars);
        }
        Self {
            nvars: self.nvars,
            terms: self
                .terms
                .iter()
                .map(|(m, c)| (m.clone(), c * factor))
                .collect(),
        }
    }

    #[must_use]
    pub fn mul_term(&self, monomial: &Monomial, coeff: &BigRational) -> Self {
        if coeff.is_zero() {
            return Self::zero(self.nvars);
        }
        Self {
            nvars: self.nvars,
            terms: self
                .terms
                .iter()
                .map(|(m, c)| (m.product(monomial), c * coeff))
                .collect(),
        }
    }

    /// Divide through by the leading coefficient.
    #[must_use]
    pub fn monic(&self) -> Self {
        match self.leading_coefficient() {
            Some(lc) if !lc.is_one() => self.scale(&lc.recip()),
            _ => self.clone(),
        }
    }

    #[must_use]
    pub fn pow(&self, exp: u32) -> Self {
        let mut acc = Self::from_integer(self.nvars, 1);
        for _ in 0..exp {
            acc = &acc * self;
        }
        acc
    }

    /// Indices of variables with a nonzero exponent somewhere in the support.
    #[must_use]
    pub fn variable_support(&self) -> BTreeSet<usize> {
        let mut vars = BTreeSet::new();
        for m in self.terms.keys() {
            for (var, &e) in m.0.iter().enumerate() {
                if e > 0 {
                    vars.insert(var);
                }
            }
        }
        vars
    }

    /// True when no term mentions any of `vars`.
    #[must_use]
    pub fn is_free_of(&self, vars: &BTreeSet<usize>) -> bool {
        self.variable_support().is_disjoint(vars)
    }

    #[must_use]
    pub fn degree_in(&self, var: usize) -> u32 {
        self.terms.keys().map(|m| m.exponent(var)).max().unwrap_or(0)
    }

    #[must_use]
    pub fn total_degree(&self) -> u32 {
        self.terms
            .keys()
            .map(Monomial::total_degree)
            .max()
            .unwrap_or(0)
    }

    /// Substitute `images[i]` for variable `i`; the images share a target ring.
    #[must_use]
    pub fn compose(&self, images: &[Self]) -> Self {
        let target_vars = images.first().map_or(0, Self::nvars);
        let mut out = Self::zero(target_vars);
        for (m, c) in &self.terms {
            let mut product = Self::constant(target_vars, c.clone());
            for (var, &e) in m.0.iter().enumerate() {
                if e > 0 {
                    product = &product * &images[var].pow(e);
                }
            }
            out = &out + &product;
        }
        out
    }

    /// Evaluate at a rational point.
    #[must_use]
    pub fn evaluate(&self, point: &[BigRational]) -> BigRational {
        let mut total = BigRational::zero();
        for (m, c) in &self.terms {
            let mut value = c.clone();
            for (var, &e) in m.0.iter().enumerate() {
                if e > 0 {
                    value *= num_traits::pow(point[var].clone(), e as usize);
                }
            }
            total += value;
        }
        total
    }

    /// Split into `content * primitive` where `primitive` has coprime integer
    /// coefficients and a positive leading coefficient.
    #[must_use]
    pub fn content_and_primitive(&self) -> (BigRational, Self) {
        use num_integer::Integer;

        if self.is_zero() {
            return (BigRational::zero(), self.clone());
        }
        let denominators = self
            .terms
            .values()
            .fold(BigInt::one(), |acc, c| acc.lcm(c.denom()));
        let numerators = self.terms.values().fold(BigInt::zero(), |acc, c| {
            acc.gcd(&(c.numer() * (&denominators / c.denom())))
        });
        let mut content = BigRational::new(numerators, denominators);
        if self.leading_coefficient().is_some_and(Signed::is_negative) {
            content = -content;
        }
        let primitive = self.scale(&content.recip());
        (content, primitive)
    }

    /// Largest monomial dividing every term.
    #[must_use]
    pub fn monomial_content(&self) -> Monomial {
        let mut keys = self.terms.keys();
        match keys.next() {
            Some(first) => keys.fold(first.clone(), |acc, m| acc.gcd(m)),
            None => Monomial::one(self.nvars),
        }
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &Polynomial) -> Polynomial {
        let mut out = self.clone();
        for (m, c) in &rhs.terms {
            out.add_term(m.clone(), c.clone());
        }
        out
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: &Polynomial) -> Polynomial {
        let mut out = self.clone();
        for (m, c) in &rhs.terms {
            out.add_term(m.clone(), -c.clone());
        }
        out
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &Polynomial) -> Polynomial {
        let mut out = Polynomial::zero(self.nvars);
        for (m, c) in &self.terms {
            for (n, d) in &rhs.terms {
                out.add_term(m.product(n), c * d);
            }
        }
        out
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        self.scale(&-BigRational::one())
    }
}

/// Named variables, most significant first. The variable order of the ring is
/// the lexicographic elimination order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyRing {
    names: Vec<String>,
}

impl PolyRing {
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn nvars(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    #[must_use]
    pub fn var(&self, index: usize) -> Polynomial {
        Polynomial::variable(self.nvars(), index)
    }

    #[must_use]
    pub fn integer(&self, value: i64) -> Polynomial {
        Polynomial::from_integer(self.nvars(), value)
    }

    /// Render `poly` with this ring's variable names, highest term first.
    #[must_use]
    pub fn display<'a>(&'a self, poly: &'a Polynomial) -> RingDisplay<'a> {
        RingDisplay { ring: self, poly }
    }
}

/// [`fmt::Display`] adapter returned by [`PolyRing::display`].
pub struct RingDisplay<'a> {
    ring: &'a PolyRing,
    poly: &'a Polynomial,
}

impl fmt::Display for RingDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.poly.is_zero() {
            return f.write_str("0");
        }
        for (i, (m, c)) in self.poly.terms().rev().enumerate() {
            let negative = c.is_negative();
            match (i, negative) {
                (0, true) => f.write_str("-")?,
                (0, false) => {}
                (_, true) => f.write_str(" - ")?,
                (_, false) => f.write_str(" + ")?,
            }
            let magnitude = c.abs();
            let factors: Vec<String> = m
                .exponents()
                .iter()
                .enumerate()
                .filter(|(_, e)| **e > 0)
                .map(|(var, e)| match e {
                    1 => self.ring.names[var].clone(),
                    _ => format!("{}^{}", self.ring.names[var], e),
                })
                .collect();
            if factors.is_empty() {
                write!(f, "{magnitude}")?;
            } else if magnitude.is_one() {
                f.write_str(&factors.join("*"))?;
            } else if magnitude.is_integer() {
                write!(f, "{}*{}", magnitude, factors.join("*"))?;
            } else {
                write!(f, "({})*{}", magnitude, factors.join("*"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn ring() -> PolyRing {
        PolyRing::new(["p", "M", "n"])
    }

    #[test]
    fn lex_order_ranks_first_variable_highest() {
        let p = Monomial::var(3, 0, 1);
        let m_cubed = Monomial::var(3, 1, 3);
        assert!(p > m_cubed);
        assert!(Monomial::var(3, 1, 1) > Monomial::var(3, 2, 7));
    }

    #[test]
    fn arithmetic_cancels_to_zero() {
        let r = ring();
        let x = &r.var(0) + &r.integer(2);
        let sq = &x * &x;
        let expanded = &(&(&r.var(0) * &r.var(0)) + &r.var(0).scale(&q(4))) + &r.integer(4);
        assert!((&sq - &expanded).is_zero());
    }

    #[test]
    fn leading_term_is_lex_maximum() {
        let r = ring();
        let poly = &(&r.var(1).pow(3) + &r.var(0)) + &r.integer(5);
        assert_eq!(poly.leading_monomial(), Some(&Monomial::var(3, 0, 1)));
    }

    #[test]
    fn variable_support_reports_used_variables() {
        let r = ring();
        let poly = &(&r.var(1) * &r.var(2)) - &r.integer(3);
        let support = poly.variable_support();
        assert_eq!(support.into_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert!(poly.is_free_of(&BTreeSet::from([0])));
        assert!(!poly.is_free_of(&BTreeSet::from([2])));
    }

    #[test]
    fn content_and_primitive_clears_denominators() {
        let r = ring();
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        let poly = &r.var(1).scale(&-half) + &r.integer(-3);
        let (content, primitive) = poly.content_and_primitive();
        assert_eq!(content, BigRational::new(BigInt::from(-1), BigInt::from(2)));
        assert_eq!(r.display(&primitive).to_string(), "M + 6");
    }

    #[test]
    fn compose_substitutes_variables() {
        // f(M, n) = M - n, M -> (s + t)/2, n -> (t - s)/2 gives s.
        let src = PolyRing::new(["M", "n"]);
        let dst = PolyRing::new(["s", "t"]);
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        let m_image = (&dst.var(0) + &dst.var(1)).scale(&half);
        let n_image = (&dst.var(1) - &dst.var(0)).scale(&half);
        let f = &src.var(0) - &src.var(1);
        assert_eq!(f.compose(&[m_image, n_image]), dst.var(0));
    }

    #[test]
    fn display_orders_terms_descending() {
        let r = PolyRing::new(["M", "n"]);
        let poly = &(&(&r.var(0).pow(2) - &(&r.var(0) * &r.var(1)).scale(&q(2))) - &r.integer(3))
            + &r.var(1);
        assert_eq!(r.display(&poly).to_string(), "M^2 - 2*M*n + n - 3");
    }

    #[test]
    fn evaluate_at_integer_point() {
        let r = ring();
        let poly = &(&r.var(1).pow(2) - &r.var(2)) + &r.integer(1);
        assert_eq!(poly.evaluate(&[q(0), q(3), q(4)]), q(6));
    }
}
