//! Exact rational numbers for clock frequencies and simulated time.
//!
//! Clock frequencies are multiplied along derived-clock chains and simulated
//! time advances in half periods, so both are kept as reduced fractions to
//! avoid the drift floating point would accumulate. Values can be parsed from
//! unit strings such as `"50MHz"` or `"12.5ns"`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// A reduced fraction `num / den` with a strictly positive denominator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClockRational {
    num: i128,
    den: i128,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl ClockRational {
    /// The value zero.
    pub const ZERO: ClockRational = ClockRational { num: 0, den: 1 };
    /// The value one.
    pub const ONE: ClockRational = ClockRational { num: 1, den: 1 };

    /// Creates `num / den` in lowest terms.
    ///
    /// # Panics
    ///
    /// Panics if `den` is zero.
    pub fn new(num: i128, den: i128) -> Self {
        assert!(den != 0, "rational with zero denominator");
        let (mut num, mut den) = if den < 0 { (-num, -den) } else { (num, den) };
        let g = gcd(num, den);
        if g > 1 {
            num /= g;
            den /= g;
        }
        Self { num, den }
    }

    /// Creates an integral value.
    pub fn from_integer(value: i128) -> Self {
        Self { num: value, den: 1 }
    }

    /// Returns the numerator of the reduced fraction.
    pub fn numer(&self) -> i128 {
        self.num
    }

    /// Returns the (positive) denominator of the reduced fraction.
    pub fn denom(&self) -> i128 {
        self.den
    }

    /// Returns `true` if the value is zero.
    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Returns `true` if the value is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.num > 0
    }

    /// Returns `1 / self`, or `None` for zero.
    pub fn recip(&self) -> Option<Self> {
        if self.num == 0 {
            None
        } else {
            Some(Self::new(self.den, self.num))
        }
    }

    /// Returns the value rounded towards zero.
    pub fn trunc(&self) -> i128 {
        self.num / self.den
    }

    /// Approximates the value as `f64`, for display and logging only.
    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Parses a frequency such as `"50MHz"`, `"12.5 kHz"` or a bare number of Hertz.
    pub fn parse_frequency(s: &str) -> Result<Self, ParseRationalError> {
        parse_with_units(
            s,
            &[
                ("ghz", Self::from_integer(1_000_000_000)),
                ("mhz", Self::from_integer(1_000_000)),
                ("khz", Self::from_integer(1_000)),
                ("hz", Self::ONE),
            ],
        )
    }

    /// Parses a duration in seconds such as `"10ns"`, `"2.5us"` or `"1s"`.
    pub fn parse_duration(s: &str) -> Result<Self, ParseRationalError> {
        parse_with_units(
            s,
            &[
                ("fs", Self::new(1, 1_000_000_000_000_000)),
                ("ps", Self::new(1, 1_000_000_000_000)),
                ("ns", Self::new(1, 1_000_000_000)),
                ("us", Self::new(1, 1_000_000)),
                ("ms", Self::new(1, 1_000)),
                ("s", Self::ONE),
            ],
        )
    }
}

impl Default for ClockRational {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for ClockRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClockRational({self})")
    }
}

impl fmt::Display for ClockRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl PartialOrd for ClockRational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClockRational {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num * other.den).cmp(&(other.num * self.den))
    }
}

impl Add for ClockRational {
    type Output = ClockRational;

    fn add(self, rhs: Self) -> Self {
        let g = gcd(self.den, rhs.den);
        let den = self.den / g * rhs.den;
        Self::new(self.num * (den / self.den) + rhs.num * (den / rhs.den), den)
    }
}

impl Sub for ClockRational {
    type Output = ClockRational;

    fn sub(self, rhs: Self) -> Self {
        self + Self { num: -rhs.num, den: rhs.den }
    }
}

impl Mul for ClockRational {
    type Output = ClockRational;

    fn mul(self, rhs: Self) -> Self {
        let g1 = gcd(self.num, rhs.den).max(1);
        let g2 = gcd(rhs.num, self.den).max(1);
        Self::new((self.num / g1) * (rhs.num / g2), (self.den / g2) * (rhs.den / g1))
    }
}

impl Div for ClockRational {
    type Output = ClockRational;

    /// # Panics
    ///
    /// Panics when dividing by zero.
    fn div(self, rhs: Self) -> Self {
        assert!(rhs.num != 0, "rational division by zero");
        self * Self::new(rhs.den, rhs.num)
    }
}

/// Error type for parsing rational values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rational value: '{input}'")]
pub struct ParseRationalError {
    /// The input string that failed to parse.
    pub input: String,
}

/// Parses `"num/den"`, a decimal like `"12.5"`, or an integer.
impl FromStr for ClockRational {
    type Err = ParseRationalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseRationalError {
            input: s.to_string(),
        };
        if let Some((n, d)) = s.split_once('/') {
            let n: i128 = n.trim().parse().map_err(|_| err())?;
            let d: i128 = d.trim().parse().map_err(|_| err())?;
            if d == 0 {
                return Err(err());
            }
            return Ok(Self::new(n, d));
        }
        parse_decimal(s).ok_or_else(err)
    }
}

fn parse_decimal(s: &str) -> Option<ClockRational> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut num: i128 = 0;
    for c in int_part.chars().chain(frac_part.chars()) {
        num = num.checked_mul(10)?.checked_add(i128::from(c.to_digit(10)?))?;
    }
    let den = 10i128.checked_pow(u32::try_from(frac_part.len()).ok()?)?;
    Some(ClockRational::new(if negative { -num } else { num }, den))
}

fn parse_with_units(
    s: &str,
    units: &[(&str, ClockRational)],
) -> Result<ClockRational, ParseRationalError> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    for (suffix, scale) in units {
        if let Some(num) = lower.strip_suffix(suffix) {
            let value: ClockRational = num.parse().map_err(|_| ParseRationalError {
                input: s.to_string(),
            })?;
            return Ok(value * *scale);
        }
    }
    // Bare number, interpreted in the base unit
    s.parse()
}
