//! Numeric leaf values.

use std::cmp::Ordering;
use std::fmt;

/// A JSON number.
///
/// Integers and floats are two encodings of one numeric type: they compare
/// by numeric value, so `Integer(20)` equals `Float(20.0)` and
/// `Integer(3) < Float(3.5)`. Ordering is total; the encoder rejects NaN so
/// stored documents never contain it.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// Signed 64-bit integer.
    Integer(i64),
    /// IEEE-754 double.
    Float(f64),
}

/// 2^63 as a double; the first float above every `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

impl Number {
    /// Returns the value as `f64`, rounding large integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(n) => n as f64,
            Self::Float(f) => f,
        }
    }

    /// Returns the value as `i64` if it is an integer or an integral float
    /// in range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(n),
            Self::Float(f) if f.fract() == 0.0 && f >= -I64_BOUND && f < I64_BOUND => {
                Some(f as i64)
            }
            Self::Float(_) => None,
        }
    }

    /// Returns true unless this is a NaN or infinite float.
    #[must_use]
    pub fn is_finite(self) -> bool {
        match self {
            Self::Integer(_) => true,
            Self::Float(f) => f.is_finite(),
        }
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn cmp_integer_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return Ordering::Less;
    }
    if f >= I64_BOUND {
        return Ordering::Less;
    }
    if f < -I64_BOUND {
        return Ordering::Greater;
    }
    // f is in i64 range: compare the integral part exactly, then the fraction.
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
        other => other,
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(&b),
            (Self::Float(a), Self::Float(b)) => {
                a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
            }
            (Self::Integer(a), Self::Float(b)) => cmp_integer_float(a, b),
            (Self::Float(a), Self::Integer(b)) => cmp_integer_float(b, a).reverse(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<u32> for Number {
    fn from(n: u32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}
