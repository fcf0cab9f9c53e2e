//! RSA private key reconstruction
//!
//! The keygen suite exports, for every generated key, the public modulus `n`,
//! the public exponent `e` and one prime factor `p`. Everything else follows:
//!
//! ```text
//! q = n / p
//! totient = (p - 1)(q - 1)
//! d = e^-1 mod totient
//! ```
//!
//! Each recovered key is checked by encrypting and decrypting a fixed message
//! before it is written back to the row.

use crate::table::Row;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use thiserror::Error;

/// Plaintext used by the decrypt-after-encrypt self-check
pub const SELF_CHECK_MESSAGE: u64 = 12345678901234567890;

/// Extended Euclidean algorithm.
///
/// Returns `(gcd, x, y)` such that `a*x + b*y = gcd`.
pub fn extended_euclidean(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut a, mut b) = (a.clone(), b.clone());
    let (mut x0, mut x1) = (BigInt::zero(), BigInt::one());
    let (mut y0, mut y1) = (BigInt::one(), BigInt::zero());

    while !a.is_zero() {
        let q = &b / &a;
        let r = &b % &a;
        b = std::mem::replace(&mut a, r);

        let y = &y0 - &q * &y1;
        y0 = std::mem::replace(&mut y1, y);
        let x = &x0 - &q * &x1;
        x0 = std::mem::replace(&mut x1, x);
    }

    (b, x0, y0)
}

/// Bezout coefficient of `e` modulo `modulus`, normalized into `[0, modulus)`.
///
/// This is the modular inverse whenever `gcd(e, modulus) == 1`; otherwise the
/// result is not an inverse and callers must verify it.
///
/// # Panics
///
/// Panics if `modulus` is zero.
pub fn mod_inverse(e: &BigUint, modulus: &BigUint) -> BigUint {
    let m = BigInt::from(modulus.clone());
    let (_, x, _) = extended_euclidean(&BigInt::from(e.clone()), &m);
    let mut r = x % &m;
    if r.sign() == Sign::Minus {
        r += &m;
    }
    r.into_parts().1
}

/// Right-to-left square-and-multiply modular exponentiation
///
/// # Panics
///
/// Panics if `modulus` is zero.
pub fn mod_exp(base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
    let mut result = BigUint::one() % modulus;
    let mut base = base % modulus;
    let mut exp = exp.clone();

    while !exp.is_zero() {
        if exp.bit(0) {
            result = result * &base % modulus;
        }
        exp >>= 1u32;
        base = &base * &base % modulus;
    }

    result
}

/// Uppercase hex without prefix or leading zeros (`0` for zero)
pub fn to_hex(value: &BigUint) -> String {
    format!("{:X}", value)
}

/// Parse an unprefixed hex string of either case
pub fn parse_hex(s: &str) -> Option<BigUint> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    BigUint::parse_bytes(s.as_bytes(), 16)
}

/// Numeric helpers the reconstructor depends on
pub trait KeyArithmetic {
    fn mod_inverse(&self, e: &BigUint, modulus: &BigUint) -> BigUint;
    fn mod_exp(&self, base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint;
}

/// Extended Euclid for inverses, square-and-multiply for powers
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclid;

impl KeyArithmetic for Euclid {
    fn mod_inverse(&self, e: &BigUint, modulus: &BigUint) -> BigUint {
        mod_inverse(e, modulus)
    }

    fn mod_exp(&self, base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
        mod_exp(base, exp, modulus)
    }
}

/// Why a row was left untouched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not hexadecimal: {value:?}")]
    InvalidHex { field: &'static str, value: String },

    #[error("p does not divide n")]
    NotAFactor,
}

/// Recovered key failed the decrypt-after-encrypt check
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("self-check failed for row {row}: expected {expected:X}, recovered {recovered:X}")]
pub struct SelfCheckFailure {
    pub row: String,
    pub expected: BigUint,
    pub recovered: BigUint,
}

/// Full private key material for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub n: BigUint,
    pub e: BigUint,
    pub p: BigUint,
    pub q: BigUint,
    pub d: BigUint,
}

impl KeyMaterial {
    pub fn totient(&self) -> BigUint {
        (&self.p - 1u32) * (&self.q - 1u32)
    }

    /// Store `q` and `d` in the row as hex
    pub fn apply(&self, row: &mut Row) {
        row.set("q", to_hex(&self.q));
        row.set("d", to_hex(&self.d));
    }
}

/// Per-row result of reconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Reconstructed(KeyMaterial),
    Skipped(SkipReason),
    Fatal(SelfCheckFailure),
}

fn field(row: &Row, name: &'static str) -> Result<BigUint, SkipReason> {
    let value = row.get(name).ok_or(SkipReason::MissingField(name))?;
    parse_hex(value).ok_or_else(|| SkipReason::InvalidHex {
        field: name,
        value: value.to_string(),
    })
}

/// Derive `q` and `d` for one row. The row itself is not modified.
pub fn reconstruct<A: KeyArithmetic + ?Sized>(row: &Row, arith: &A) -> RowOutcome {
    let parsed = field(row, "n").and_then(|n| {
        let e = field(row, "e")?;
        let p = field(row, "p")?;
        Ok((n, e, p))
    });
    let (n, e, p) = match parsed {
        Ok(values) => values,
        Err(reason) => return RowOutcome::Skipped(reason),
    };

    // p must be a proper factor, otherwise q and the totient are meaningless
    if p <= BigUint::one() || p >= n || !(&n % &p).is_zero() {
        return RowOutcome::Skipped(SkipReason::NotAFactor);
    }

    let q = &n / &p;
    let totient = (&p - 1u32) * (&q - 1u32);
    let d = arith.mod_inverse(&e, &totient);

    let message = BigUint::from(SELF_CHECK_MESSAGE) % &n;
    let ciphertext = arith.mod_exp(&message, &e, &n);
    let recovered = arith.mod_exp(&ciphertext, &d, &n);
    if recovered != message {
        return RowOutcome::Fatal(SelfCheckFailure {
            row: row.id().to_string(),
            expected: message,
            recovered,
        });
    }

    RowOutcome::Reconstructed(KeyMaterial { n, e, p, q, d })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn row(n: &str, e: &str, p: &str) -> Row {
        [("id", "1"), ("n", n), ("e", e), ("p", p)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_extended_euclidean_bezout() {
        let (a, b) = (BigInt::from(240), BigInt::from(46));
        let (g, x, y) = extended_euclidean(&a, &b);
        assert_eq!(g, BigInt::from(2));
        assert_eq!(&a * &x + &b * &y, g);
    }

    #[test]
    fn test_extended_euclidean_zero_operand() {
        let (g, x, y) = extended_euclidean(&BigInt::zero(), &BigInt::from(7));
        assert_eq!((g, x, y), (BigInt::from(7), BigInt::zero(), BigInt::one()));
    }

    #[test]
    fn test_mod_inverse_normalizes_negative_coefficient() {
        // 3 * -2 + 7 * 1 = 1, so the raw coefficient is negative
        assert_eq!(mod_inverse(&big(3), &big(7)), big(5));
        assert_eq!(mod_inverse(&big(17), &big(3120)), big(2753));
    }

    #[test]
    fn test_mod_exp_matches_modpow() {
        for (b, e, m) in [(4u64, 13u64, 497u64), (65, 17, 3233), (2, 0, 1), (0, 0, 5), (7, 1, 2)] {
            assert_eq!(
                mod_exp(&big(b), &big(e), &big(m)),
                big(b).modpow(&big(e), &big(m)),
                "{b}^{e} mod {m}"
            );
        }
    }

    #[test]
    fn test_hex_normalization() {
        assert_eq!(to_hex(&big(255)), "FF");
        assert_eq!(to_hex(&big(0)), "0");
        assert_eq!(to_hex(&big(0x0ac1)), "AC1");
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("ff"), Some(big(255)));
        assert_eq!(parse_hex("00FF"), Some(big(255)));
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("0x11"), None);
        assert_eq!(parse_hex("1_0"), None);
        assert_eq!(parse_hex("XYZ"), None);
    }

    #[test]
    fn test_textbook_key() {
        let outcome = reconstruct(&row("CA1", "11", "3D"), &Euclid);
        let key = match outcome {
            RowOutcome::Reconstructed(key) => key,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(key.q, big(53));
        assert_eq!(key.totient(), big(3120));
        assert_eq!(key.d, big(2753));

        let c = mod_exp(&big(65), &key.e, &key.n);
        assert_eq!(mod_exp(&c, &key.d, &key.n), big(65));

        let mut r = row("CA1", "11", "3D");
        key.apply(&mut r);
        assert_eq!(r.get("q"), Some("35"));
        assert_eq!(r.get("d"), Some("AC1"));
    }

    #[test]
    fn test_invalid_fields_are_skipped() {
        assert_eq!(
            reconstruct(&row("CG1", "11", "3D"), &Euclid),
            RowOutcome::Skipped(SkipReason::InvalidHex {
                field: "n",
                value: "CG1".into()
            })
        );

        let no_p: Row = [("id", "1"), ("n", "CA1"), ("e", "11")].into_iter().collect();
        assert_eq!(
            reconstruct(&no_p, &Euclid),
            RowOutcome::Skipped(SkipReason::MissingField("p"))
        );
    }

    #[test]
    fn test_non_factor_is_skipped() {
        for p in ["3C", "0", "1", "CA1"] {
            assert_eq!(
                reconstruct(&row("CA1", "11", p), &Euclid),
                RowOutcome::Skipped(SkipReason::NotAFactor),
                "p = {p}"
            );
        }
    }

    struct OffByOne;

    impl KeyArithmetic for OffByOne {
        fn mod_inverse(&self, e: &BigUint, modulus: &BigUint) -> BigUint {
            mod_inverse(e, modulus) + 1u32
        }

        fn mod_exp(&self, base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
            mod_exp(base, exp, modulus)
        }
    }

    #[test]
    fn test_wrong_private_exponent_is_fatal() {
        match reconstruct(&row("CA1", "11", "3D"), &OffByOne) {
            RowOutcome::Fatal(failure) => assert_eq!(failure.row, "1"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_non_invertible_exponent_is_fatal() {
        // gcd(3, 3120) = 3
        assert!(matches!(
            reconstruct(&row("CA1", "3", "3D"), &Euclid),
            RowOutcome::Fatal(_)
        ));
    }
}
