//! Detector polynomials `D(n, M)` with integer coefficients.
//!
//! A detector is stored in canonical form: coprime integer coefficients, positive
//! leading coefficient under lex `M > n`, terms listed from the leading term down.
//! Two derivations of the same family therefore compare equal term-by-term and
//! share a fingerprint.

use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::family::ConstellationDef;
use crate::poly::{Monomial, PolyRing, Polynomial};

/// One term `coeff * M^m_exp * n^n_exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorTerm {
    pub m_exp: u32,
    pub n_exp: u32,
    #[serde(with = "decimal")]
    pub coeff: BigInt,
}

/// Immutable detector polynomial bound to the family it was derived for.
#[derive(Debug, Clone, Serialize)]
pub struct Detector {
    family: ConstellationDef,
    terms: Vec<DetectorTerm>,
    #[serde(skip)]
    word_terms: Option<Vec<(u32, u32, i128)>>,
}

impl PartialEq for Detector {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family && self.terms == other.terms
    }
}

impl Eq for Detector {}

impl Detector {
    /// Build from integer terms, normalizing to canonical form.
    ///
    /// Returns `None` for the zero polynomial.
    #[must_use]
    pub fn from_terms(family: ConstellationDef, terms: Vec<DetectorTerm>) -> Option<Self> {
        let ring = PolyRing::new(["M", "n"]);
        let mut poly = Polynomial::zero(ring.nvars());
        for t in terms {
            poly.add_term(
                Monomial::from_exponents(vec![t.m_exp, t.n_exp]),
                BigRational::from_integer(t.coeff),
            );
        }
        Self::from_polynomial(family, &poly, 0, 1)
    }

    /// Project a parameter-free polynomial onto `(M, n)`, taking the exponents of
    /// variables `m_var` and `n_var`, and normalize.
    #[must_use]
    pub fn from_polynomial(
        family: ConstellationDef,
        poly: &Polynomial,
        m_var: usize,
        n_var: usize,
    ) -> Option<Self> {
        if poly.is_zero() {
            return None;
        }
        let (_, primitive) = poly.content_and_primitive();
        let mut terms: Vec<DetectorTerm> = primitive
            .terms()
            .map(|(m, c)| DetectorTerm {
                m_exp: m.exponent(m_var),
                n_exp: m.exponent(n_var),
                coeff: c.to_integer(),
            })
            .collect();
        terms.sort_by(|a, b| (b.m_exp, b.n_exp).cmp(&(a.m_exp, a.n_exp)));

        let word_terms = terms
            .iter()
            .map(|t| t.coeff.to_i128().map(|c| (t.m_exp, t.n_exp, c)))
            .collect();
        Some(Self {
            family,
            terms,
            word_terms,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.family.name()
    }

    #[must_use]
    pub fn family(&self) -> &ConstellationDef {
        &self.family
    }

    #[must_use]
    pub fn terms(&self) -> &[DetectorTerm] {
        &self.terms
    }

    #[must_use]
    pub fn degree_in_m(&self) -> u32 {
        self.terms.iter().map(|t| t.m_exp).max().unwrap_or(0)
    }

    #[must_use]
    pub fn degree_in_n(&self) -> u32 {
        self.terms.iter().map(|t| t.n_exp).max().unwrap_or(0)
    }

    #[must_use]
    pub fn total_degree(&self) -> u32 {
        self.terms
            .iter()
            .map(|t| t.m_exp + t.n_exp)
            .max()
            .unwrap_or(0)
    }

    /// Exact value `D(n, M)`.
    #[must_use]
    pub fn evaluate(&self, n: &BigInt, m: &BigInt) -> BigInt {
        let mut total = BigInt::zero();
        for t in &self.terms {
            total += &t.coeff * m.pow(t.m_exp) * n.pow(t.n_exp);
        }
        total
    }

    /// `D(n, M) == 0` for machine-word inputs.
    ///
    /// Uses checked `i128` arithmetic and falls back to [`BigInt`] on overflow, so
    /// the answer is always exact.
    #[must_use]
    pub fn vanishes_at(&self, n: u64, m: u128) -> bool {
        if let Some(value) = self.evaluate_i128(n, m) {
            return value == 0;
        }
        self.evaluate(&BigInt::from(n), &BigInt::from(m)).is_zero()
    }

    fn evaluate_i128(&self, n: u64, m: u128) -> Option<i128> {
        let word_terms = self.word_terms.as_ref()?;
        let n = i128::from(n);
        let m = i128::try_from(m).ok()?;
        let mut total: i128 = 0;
        for &(m_exp, n_exp, coeff) in word_terms {
            let term = coeff
                .checked_mul(m.checked_pow(m_exp)?)?
                .checked_mul(n.checked_pow(n_exp)?)?;
            total = total.checked_add(term)?;
        }
        Some(total)
    }

    /// The detector as a polynomial in the ring `[M, n]`.
    #[must_use]
    pub fn to_polynomial(&self) -> Polynomial {
        let mut poly = Polynomial::zero(2);
        for t in &self.terms {
            poly.add_term(
                Monomial::from_exponents(vec![t.m_exp, t.n_exp]),
                BigRational::from_integer(t.coeff.clone()),
            );
        }
        poly
    }

    /// BLAKE3 over the canonical term listing, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for t in &self.terms {
            hasher.update(format!("{}:{}:{};", t.m_exp, t.n_exp, t.coeff).as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("0");
        }
        for (i, t) in self.terms.iter().enumerate() {
            let sign = if t.coeff.is_negative() { "-" } else { "+" };
            match i {
                0 if sign == "-" => f.write_str("-")?,
                0 => {}
                _ => write!(f, " {sign} ")?,
            }
            let magnitude = t.coeff.abs();
            let mut factors = Vec::new();
            match t.m_exp {
                0 => {}
                1 => factors.push("M".to_string()),
                e => factors.push(format!("M^{e}")),
            }
            match t.n_exp {
                0 => {}
                1 => factors.push("n".to_string()),
                e => factors.push(format!("n^{e}")),
            }
            if factors.is_empty() {
                write!(f, "{magnitude}")?;
            } else if magnitude.is_one() {
                f.write_str(&factors.join("*"))?;
            } else {
                write!(f, "{magnitude}*{}", factors.join("*"))?;
            }
        }
        Ok(())
    }
}

mod decimal {
    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twin() -> Detector {
        // (M - n)^2 - 2(M + n) - 3
        let terms = [(2, 0, 1), (1, 1, -2), (0, 2, 1), (1, 0, -2), (0, 1, -2), (0, 0, -3)]
            .into_iter()
            .map(|(m_exp, n_exp, c)| DetectorTerm {
                m_exp,
                n_exp,
                coeff: BigInt::from(c),
            })
            .collect();
        Detector::from_terms(ConstellationDef::from_offsets("Twin", &[0, 2]).unwrap(), terms)
            .unwrap()
    }

    #[test]
    fn twin_vanishes_on_fifteen() {
        let d = twin();
        assert!(d.vanishes_at(15, 24));
        assert!(!d.vanishes_at(9, 13));
        assert_eq!(
            d.evaluate(&BigInt::from(9), &BigInt::from(13)),
            BigInt::from(-31)
        );
    }

    #[test]
    fn normalization_removes_content_and_sign() {
        let family = ConstellationDef::from_offsets("Twin", &[0, 2]).unwrap();
        let scaled = twin()
            .terms()
            .iter()
            .map(|t| DetectorTerm {
                coeff: &t.coeff * -6,
                ..t.clone()
            })
            .collect();
        let d = Detector::from_terms(family, scaled).unwrap();
        assert_eq!(d, twin());
        assert_eq!(d.fingerprint(), twin().fingerprint());
    }

    #[test]
    fn display_lists_leading_term_first() {
        assert_eq!(
            twin().to_string(),
            "M^2 - 2*M*n - 2*M + n^2 - 2*n - 3"
        );
    }

    #[test]
    fn overflowing_inputs_fall_back_to_bigint() {
        let d = twin();
        let n = u64::MAX - 1;
        // Far outside i128 once squared; the answer must still be exact.
        let m = u128::MAX / 2;
        let exact = d.evaluate(&BigInt::from(n), &BigInt::from(m));
        assert_eq!(d.vanishes_at(n, m), exact.is_zero());
        assert!(!exact.is_zero());
    }

    #[test]
    fn degrees() {
        let d = twin();
        assert_eq!(d.degree_in_m(), 2);
        assert_eq!(d.degree_in_n(), 2);
        assert_eq!(d.total_degree(), 2);
    }

    #[test]
    fn terms_serialize_as_decimal_strings() {
        let json = serde_json::to_value(twin().terms()).unwrap();
        assert_eq!(json[0]["coeff"], "1");
        assert_eq!(json[5]["coeff"], "-3");
        let back: Vec<DetectorTerm> = serde_json::from_value(json).unwrap();
        assert_eq!(back, twin().terms());
    }
}
