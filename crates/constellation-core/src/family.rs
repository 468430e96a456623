//! Constellation definitions.
//!
//! A family is an ordered list of affine terms `scale·p + shift` in one free
//! parameter `p`. Offset families (`p, p+2, p+6, ...`) have `scale = 1`; chains
//! built from a recurrence such as `p -> 2p+1` carry larger scales.

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::poly::{PolyRing, Polynomial};

/// One term `scale·p + shift` of a constellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term {
    pub scale: u64,
    pub shift: u64,
}

impl Term {
    #[must_use]
    pub const fn offset(shift: u64) -> Self {
        Self { scale: 1, shift }
    }

    #[must_use]
    pub fn eval(&self, base: &BigUint) -> BigUint {
        base * self.scale + self.shift
    }

    /// The term as a polynomial in variable `param` of `ring`.
    #[must_use]
    pub fn to_polynomial(&self, ring: &PolyRing, param: usize) -> Polynomial {
        let scale = BigRational::from_integer(BigInt::from(self.scale));
        let shift = BigRational::from_integer(BigInt::from(self.shift));
        &ring.var(param).scale(&scale) + &Polynomial::constant(ring.nvars(), shift)
    }
}

/// A validated constellation family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstellationDef {
    name: String,
    terms: Vec<Term>,
    min_base: u64,
}

impl ConstellationDef {
    /// Offset family with base value `p >= 2`.
    ///
    /// Offsets must start at 0 and be strictly increasing.
    pub fn from_offsets(name: impl Into<String>, offsets: &[u64]) -> Result<Self> {
        let name = name.into();
        match offsets.first() {
            None => return Err(CoreError::invalid_definition(&name, "no offsets")),
            Some(&first) if first != 0 => {
                return Err(CoreError::invalid_definition(
                    &name,
                    format!("first offset must be 0, got {first}"),
                ));
            }
            Some(_) => {}
        }
        if offsets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::invalid_definition(
                &name,
                "offsets must be strictly increasing",
            ));
        }
        Self::from_terms(name, offsets.iter().map(|&k| Term::offset(k)).collect(), 2)
    }

    /// General affine family; the parameter ranges over `min_base..`.
    pub fn from_terms(name: impl Into<String>, terms: Vec<Term>, min_base: u64) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::invalid_definition(&name, "empty name"));
        }
        if terms.is_empty() {
            return Err(CoreError::invalid_definition(&name, "no terms"));
        }
        if min_base == 0 {
            return Err(CoreError::invalid_definition(&name, "min_base must be >= 1"));
        }
        if let Some(term) = terms.iter().find(|t| t.scale == 0) {
            return Err(CoreError::invalid_definition(
                &name,
                format!("term with shift {} has zero scale", term.shift),
            ));
        }
        // Pointwise strictly increasing for every admissible parameter value.
        for w in terms.windows(2) {
            let (a, b) = (w[0], w[1]);
            let dominated = a.scale <= b.scale
                && a.shift <= b.shift
                && u128::from(a.scale) * u128::from(min_base) + u128::from(a.shift)
                    < u128::from(b.scale) * u128::from(min_base) + u128::from(b.shift);
            if !dominated {
                return Err(CoreError::invalid_definition(
                    &name,
                    format!(
                        "terms must be strictly increasing: {}p+{} then {}p+{}",
                        a.scale, a.shift, b.scale, b.shift
                    ),
                ));
            }
        }
        Ok(Self {
            name,
            terms,
            min_base,
        })
    }

    /// Chain `p, 2p+1, 2(2p+1)+1, ...` of the given length (Sophie Germain / Cunningham
    /// chains of the first kind).
    pub fn doubling_chain(name: impl Into<String>, length: u32) -> Result<Self> {
        let name = name.into();
        if length == 0 || length > 32 {
            return Err(CoreError::invalid_definition(
                &name,
                format!("chain length {length} outside 1..=32"),
            ));
        }
        let terms = (0..length)
            .map(|i| Term {
                scale: 1 << i,
                shift: (1 << i) - 1,
            })
            .collect();
        Self::from_terms(name, terms, 2)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    #[must_use]
    pub fn min_base(&self) -> u64 {
        self.min_base
    }

    /// Plain offsets when every term has unit scale.
    #[must_use]
    pub fn offsets(&self) -> Option<Vec<u64>> {
        self.terms
            .iter()
            .map(|t| (t.scale == 1).then_some(t.shift))
            .collect()
    }

    /// `n(p) = Π term(p)`.
    #[must_use]
    pub fn n_expr(&self, ring: &PolyRing, param: usize) -> Polynomial {
        self.terms
            .iter()
            .fold(ring.integer(1), |acc, t| &acc * &t.to_polynomial(ring, param))
    }

    /// `M(p) = Π (term(p) + 1)`: sigma of a product of distinct primes.
    #[must_use]
    pub fn m1_expr(&self, ring: &PolyRing, param: usize) -> Polynomial {
        self.terms.iter().fold(ring.integer(1), |acc, t| {
            &acc * &(&t.to_polynomial(ring, param) + &ring.integer(1))
        })
    }

    /// Human-readable term list, e.g. `(p, 2p+1, 4p+3)`.
    #[must_use]
    pub fn describe(&self, parameter: &str) -> String {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|t| {
                let head = if t.scale == 1 {
                    parameter.to_string()
                } else {
                    format!("{}{parameter}", t.scale)
                };
                if t.shift == 0 {
                    head
                } else {
                    format!("{head}+{}", t.shift)
                }
            })
            .collect();
        format!("({})", parts.join(", "))
    }
}

/// Serialized family description, as found in catalog files.
///
/// ```json
/// { "name": "Twin", "offsets": [0, 2] }
/// { "name": "Sophie", "terms": [[1, 0], [2, 1], [4, 3]], "min_base": 2 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FamilySpec {
    Offsets {
        name: String,
        offsets: Vec<u64>,
    },
    Terms {
        name: String,
        terms: Vec<(u64, u64)>,
        #[serde(default = "default_min_base")]
        min_base: u64,
    },
}

fn default_min_base() -> u64 {
    2
}

impl FamilySpec {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Offsets { name, .. } | Self::Terms { name, .. } => name,
        }
    }

    /// Validate into a [`ConstellationDef`].
    pub fn to_definition(&self) -> Result<ConstellationDef> {
        match self {
            Self::Offsets { name, offsets } => ConstellationDef::from_offsets(name.clone(), offsets),
            Self::Terms {
                name,
                terms,
                min_base,
            } => ConstellationDef::from_terms(
                name.clone(),
                terms
                    .iter()
                    .map(|&(scale, shift)| Term { scale, shift })
                    .collect(),
                *min_base,
            ),
        }
    }
}

impl From<&ConstellationDef> for FamilySpec {
    fn from(def: &ConstellationDef) -> Self {
        match def.offsets() {
            Some(offsets) if def.min_base == 2 && offsets.first() == Some(&0) => Self::Offsets {
                name: def.name.clone(),
                offsets,
            },
            _ => Self::Terms {
                name: def.name.clone(),
                terms: def.terms.iter().map(|t| (t.scale, t.shift)).collect(),
                min_base: def.min_base,
            },
        }
    }
}
