//! Exact rational numbers for physical constants.
//!
//! Scenario files write rationals as strings (`"1/4"`, `"0.25"`, `"-3"`) or
//! plain JSON numbers. Everything is carried as [`BigRational`] so that the
//! encodings never see a rounded float.

use std::fmt;

use num::bigint::BigInt;
use num::rational::BigRational;
use num::{One, Signed, Zero};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RationalParseError {
    #[error("empty rational literal")]
    Empty,
    #[error("malformed rational literal '{0}'")]
    Malformed(String),
    #[error("zero denominator in '{0}'")]
    ZeroDenominator(String),
}

/// Build `numer / denom` from machine integers.
///
/// Panics when `denom == 0`; callers pass literal constants.
pub fn ratio(numer: i64, denom: i64) -> BigRational {
    BigRational::new(BigInt::from(numer), BigInt::from(denom))
}

pub fn integer(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

/// Parse `"3"`, `"-3"`, `"3/5"`, `"0.25"`, `"-1.5"` or `"3.0"`.
pub fn parse_rational(text: &str) -> Result<BigRational, RationalParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RationalParseError::Empty);
    }
    if let Some((numer, denom)) = trimmed.split_once('/') {
        let numer = parse_decimal(numer.trim(), trimmed)?;
        let denom = parse_decimal(denom.trim(), trimmed)?;
        if denom.is_zero() {
            return Err(RationalParseError::ZeroDenominator(trimmed.to_string()));
        }
        return Ok(numer / denom);
    }
    parse_decimal(trimmed, trimmed)
}

fn parse_decimal(text: &str, whole: &str) -> Result<BigRational, RationalParseError> {
    let malformed = || RationalParseError::Malformed(whole.to_string());
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() {
        return Err(malformed());
    }
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(malformed());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(malformed());
    }
    let mantissa_text = format!("{int_part}{frac_part}");
    let mantissa: BigInt = if mantissa_text.is_empty() {
        BigInt::zero()
    } else {
        mantissa_text.parse().map_err(|_| malformed())?
    };
    let scale = num::pow(BigInt::from(10), frac_part.len());
    let value = BigRational::new(mantissa, scale);
    Ok(if negative { -value } else { value })
}

/// Render a rational as `"n"` or `"n/d"`.
pub fn format_rational(value: &BigRational) -> String {
    if value.denom().is_one() {
        value.numer().to_string()
    } else {
        format!("{}/{}", value.numer(), value.denom())
    }
}

/// Lossy conversion for display only.
pub fn to_f64(value: &BigRational) -> f64 {
    let numer: f64 = value.numer().to_string().parse().unwrap_or(f64::NAN);
    let denom: f64 = value.denom().to_string().parse().unwrap_or(f64::NAN);
    numer / denom
}

pub fn is_non_negative(value: &BigRational) -> bool {
    !value.is_negative()
}

/// Display wrapper printing the exact rational.
pub struct DisplayRational<'a>(pub &'a BigRational);

impl fmt::Display for DisplayRational<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_rational(self.0))
    }
}

/// `#[serde(with = "kstep_ir::rational::serde_rational")]` adapter.
pub mod serde_rational {
    use std::fmt;

    use num::rational::BigRational;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    use super::{format_rational, integer, parse_rational};

    pub fn serialize<S: Serializer>(value: &BigRational, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_rational(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigRational, D::Error> {
        deserializer.deserialize_any(RationalVisitor)
    }

    struct RationalVisitor;

    impl Visitor<'_> for RationalVisitor {
        type Value = BigRational;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a rational as a number or a string like \"1/4\" or \"0.25\"")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigRational, E> {
            Ok(integer(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigRational, E> {
            let v = i64::try_from(v).map_err(|_| E::custom(format!("integer {v} out of range")))?;
            Ok(integer(v))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<BigRational, E> {
            if !v.is_finite() {
                return Err(E::custom(format!("non-finite rational {v}")));
            }
            parse_rational(&v.to_string()).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<BigRational, E> {
            parse_rational(v).map_err(E::custom)
        }
    }
}
