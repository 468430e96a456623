//! Arithmetic oracle: exact divisor sums and primality.
//!
//! Every routine here is exact. Inputs that fit in a machine word take a `u64`
//! fast path; everything else runs on [`BigUint`] with the same algorithm, so the
//! scanner can be pushed past `u64::MAX` without changing results.
//!
//! Primality:
//! - `x < 2^64`: deterministic Miller-Rabin with the first 12 prime bases.
//! - `x < 3_317_044_064_679_887_385_961_981`: deterministic Miller-Rabin with the
//!   first 13 prime bases.
//! - above that: Baillie-PSW (strong base-2 test + strong Lucas test, Selfridge
//!   parameters). No counterexample is known.

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::{CoreError, Result};

const SMALL_PRIMES: [u64; 13] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41];

/// Bound below which Miller-Rabin with [`SMALL_PRIMES`] as bases is deterministic.
const MR13_BOUND: u128 = 3_317_044_064_679_887_385_961_981;

/// Sum of all positive divisors of `n`, including 1 and `n`.
///
/// `n = 0` is a precondition violation and fails with [`CoreError::InvalidInput`].
pub fn sigma(n: &BigUint) -> Result<BigUint> {
    if let Some(small) = n.to_u64() {
        return sigma_u64(small).map(BigUint::from);
    }

    let mut remaining = n.clone();
    let mut total = BigUint::one();
    let mut p = BigUint::from(2u32);
    while &p * &p <= remaining {
        if let Some(rest) = remaining.to_u64() {
            return Ok(total * BigUint::from(sigma_u64(rest)?));
        }
        if (&remaining % &p).is_zero() {
            let mut power = BigUint::one();
            let mut term = BigUint::one();
            while (&remaining % &p).is_zero() {
                remaining /= &p;
                power *= &p;
                term += &power;
            }
            total *= term;
        }
        p += if p == BigUint::from(2u32) { 1u32 } else { 2u32 };
    }
    if !remaining.is_one() {
        total *= remaining + 1u32;
    }
    Ok(total)
}

/// Machine-word divisor sum. The result is widened to `u128` since `sigma(n)` can
/// exceed `u64::MAX` for `n` close to it.
pub fn sigma_u64(n: u64) -> Result<u128> {
    if n == 0 {
        return Err(CoreError::InvalidInput(
            "sigma is only defined for n >= 1".to_string(),
        ));
    }

    let mut remaining = n;
    let mut total: u128 = 1;
    let mut p: u64 = 2;
    while u128::from(p) * u128::from(p) <= u128::from(remaining) {
        if remaining % p == 0 {
            let mut power: u128 = 1;
            let mut term: u128 = 1;
            while remaining % p == 0 {
                remaining /= p;
                power *= u128::from(p);
                term += power;
            }
            total *= term;
        }
        p += if p == 2 { 1 } else { 2 };
    }
    if remaining > 1 {
        total *= u128::from(remaining) + 1;
    }
    Ok(total)
}

/// Exact primality test for arbitrary-precision integers.
#[must_use]
pub fn is_prime(x: &BigUint) -> bool {
    if let Some(small) = x.to_u64() {
        return is_prime_u64(small);
    }

    for p in SMALL_PRIMES {
        if (x % p).is_zero() {
            return false;
        }
    }

    if *x < BigUint::from(MR13_BOUND) {
        return SMALL_PRIMES
            .iter()
            .all(|&base| strong_probable_prime(x, &BigUint::from(base)));
    }

    strong_probable_prime(x, &BigUint::from(2u32)) && strong_lucas_probable_prime(x)
}

/// Deterministic Miller-Rabin for the full `u64` range.
#[must_use]
pub fn is_prime_u64(x: u64) -> bool {
    if x < 2 {
        return false;
    }
    for p in SMALL_PRIMES {
        if x == p {
            return true;
        }
        if x % p == 0 {
            return false;
        }
    }

    let mut d = x - 1;
    let mut s = 0u32;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'bases: for base in &SMALL_PRIMES[..12] {
        let mut y = pow_mod_u64(*base, d, x);
        if y == 1 || y == x - 1 {
            continue;
        }
        for _ in 1..s {
            y = mul_mod_u64(y, y, x);
            if y == x - 1 {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

fn mul_mod_u64(a: u64, b: u64, m: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(m)) as u64
}

fn pow_mod_u64(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod_u64(acc, base, m);
        }
        base = mul_mod_u64(base, base, m);
        exp >>= 1;
    }
    acc
}

/// Strong probable-prime test to `base`. Requires odd `n > base`.
fn strong_probable_prime(n: &BigUint, base: &BigUint) -> bool {
    let one = BigUint::one();
    let n_minus_one = n - &one;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    let mut y = base.modpow(&d, n);
    if y == one || y == n_minus_one {
        return true;
    }
    for _ in 1..s {
        y = &y * &y % n;
        if y == n_minus_one {
            return true;
        }
        if y == one {
            return false;
        }
    }
    false
}

/// Jacobi symbol `(a / n)` for odd positive `n`.
fn jacobi(a: &BigInt, n: &BigInt) -> i32 {
    let mut a = a.mod_floor(n);
    let mut n = n.clone();
    let mut result = 1;
    let three = BigInt::from(3);
    let five = BigInt::from(5);
    let eight = BigInt::from(8);
    let four = BigInt::from(4);

    while !a.is_zero() {
        while a.is_even() {
            a >>= 1u32;
            let r = n.mod_floor(&eight);
            if r == three || r == five {
                result = -result;
            }
        }
        std::mem::swap(&mut a, &mut n);
        if a.mod_floor(&four) == three && n.mod_floor(&four) == three {
            result = -result;
        }
        a = a.mod_floor(&n);
    }

    if n.is_one() { result } else { 0 }
}

fn half_mod(x: BigInt, n: &BigInt) -> BigInt {
    let x = if x.is_odd() { x + n } else { x };
    (x >> 1u32).mod_floor(n)
}

/// Strong Lucas probable-prime test with Selfridge's method A parameters.
fn strong_lucas_probable_prime(n: &BigUint) -> bool {
    let root = n.sqrt();
    if &root * &root == *n {
        return false;
    }

    let n_int = BigInt::from_biguint(Sign::Plus, n.clone());

    // D = 5, -7, 9, -11, ... until (D / n) = -1.
    let mut d_abs = 5i64;
    let mut positive = true;
    let d = loop {
        let candidate = BigInt::from(if positive { d_abs } else { -d_abs });
        match jacobi(&candidate, &n_int) {
            -1 => break candidate,
            0 if candidate.abs() != n_int => return false,
            _ => {}
        }
        d_abs += 2;
        positive = !positive;
    };

    let p = BigInt::one();
    let q = (BigInt::one() - &d) / 4u32;

    let n_plus_one = &n_int + 1u32;
    let s = n_plus_one.trailing_zeros().unwrap_or(0);
    let k = &n_plus_one >> s;

    let mut u = BigInt::one();
    let mut v = p.clone();
    let mut q_k = q.mod_floor(&n_int);
    let bits = k.bits();
    for bit in (0..bits.saturating_sub(1)).rev() {
        u = (&u * &v).mod_floor(&n_int);
        v = (&v * &v - &q_k * 2u32).mod_floor(&n_int);
        q_k = (&q_k * &q_k).mod_floor(&n_int);
        if k.bit(bit) {
            let next_u = half_mod(&p * &u + &v, &n_int);
            let next_v = half_mod(&d * &u + &p * &v, &n_int);
            u = next_u;
            v = next_v;
            q_k = (&q_k * &q).mod_floor(&n_int);
        }
    }

    if u.is_zero() || v.is_zero() {
        return true;
    }
    for _ in 1..s {
        v = (&v * &v - &q_k * 2u32).mod_floor(&n_int);
        if v.is_zero() {
            return true;
        }
        q_k = (&q_k * &q_k).mod_floor(&n_int);
    }
    false
}
