use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fixed-point credit amount, stored in mUBL (1 UBL = 1000 mUBL).
///
/// All balance arithmetic is integer math on the smallest unit; division
/// floors toward zero. Serialized as a bare integer of mUBL.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct Credits(i64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    /// mUBL per whole UBL.
    pub const SCALE: i64 = 1000;

    pub const fn from_millis(millis: i64) -> Self {
        Credits(millis)
    }

    /// Whole UBL, no fractional part.
    pub const fn from_ubl(whole: i64) -> Self {
        Credits(whole * Self::SCALE)
    }

    pub const fn millis(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Credits) -> Option<Credits> {
        self.0.checked_add(other.0).map(Credits)
    }

    pub fn checked_sub(self, other: Credits) -> Option<Credits> {
        self.0.checked_sub(other.0).map(Credits)
    }

    pub fn saturating_sub(self, other: Credits) -> Credits {
        Credits(self.0.saturating_sub(other.0))
    }

    pub fn min(self, other: Credits) -> Credits {
        Credits(self.0.min(other.0))
    }

    /// Clamp negative amounts to zero.
    pub fn clamped(self) -> Credits {
        Credits(self.0.max(0))
    }

    /// `floor(self * numerator / denominator)`, widened through i128 so
    /// supply-scale amounts cannot overflow mid-multiplication.
    pub fn scaled_floor(self, numerator: i64, denominator: i64) -> Credits {
        if denominator == 0 {
            return Credits::ZERO;
        }
        let wide = (self.0 as i128) * (numerator as i128) / (denominator as i128);
        Credits(wide as i64)
    }
}

impl std::ops::Add for Credits {
    type Output = Credits;
    fn add(self, rhs: Credits) -> Credits {
        Credits(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Credits {
    type Output = Credits;
    fn sub(self, rhs: Credits) -> Credits {
        Credits(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Credits {
    type Output = Credits;
    fn neg(self) -> Credits {
        Credits(-self.0)
    }
}

impl std::iter::Sum for Credits {
    fn sum<I: Iterator<Item = Credits>>(iter: I) -> Credits {
        Credits(iter.map(|c| c.0).sum())
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{sign}{}.{:03}",
            abs / Self::SCALE as u64,
            abs % Self::SCALE as u64
        )
    }
}

impl FromStr for Credits {
    type Err = String;

    /// Parse a decimal string with at most 3 fractional digits ("99.900").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sign, body) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        let (whole, frac) = match body.split_once('.') {
            Some((w, f)) => (w, f),
            None => (body, ""),
        };
        if frac.len() > 3 {
            return Err(format!("`{s}` has more than 3 decimal places"));
        }
        let whole: i64 = whole.parse().map_err(|_| format!("bad amount `{s}`"))?;
        let mut frac_millis = 0i64;
        if !frac.is_empty() {
            let parsed: i64 = frac.parse().map_err(|_| format!("bad amount `{s}`"))?;
            frac_millis = parsed * 10i64.pow(3 - frac.len() as u32);
        }
        Ok(Credits(sign * (whole * Self::SCALE + frac_millis)))
    }
}

/// Transaction fee rate held as an integer numerator over 10 000.
///
/// Converting the configured fraction once at construction keeps every fee
/// computation in integer arithmetic, so replays cannot drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FeeRate(u32);

impl FeeRate {
    pub const DENOMINATOR: i64 = 10_000;

    /// Build from a fraction such as 0.001; the numerator is rounded.
    pub fn from_fraction(rate: f64) -> Self {
        FeeRate((rate * Self::DENOMINATOR as f64).round() as u32)
    }

    pub const fn from_basis_points(bps: u32) -> Self {
        FeeRate(bps)
    }

    pub fn basis_points(self) -> u32 {
        self.0
    }

    /// Fee on a gross amount: `floor(gross * numerator / 10000)`.
    pub fn fee_on(self, gross: Credits) -> Credits {
        gross.scaled_floor(self.0 as i64, Self::DENOMINATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_fraction() {
        assert_eq!(Credits::from_millis(99_900).to_string(), "99.900");
        assert_eq!(Credits::from_millis(-1_001).to_string(), "-1.001");
        assert_eq!(Credits::ZERO.to_string(), "0.000");
    }

    #[test]
    fn parse_round_trips() {
        for s in ["0.000", "99.900", "1000.000", "-1.001", "0.100"] {
            let c: Credits = s.parse().unwrap();
            assert_eq!(c.to_string(), s);
        }
    }

    #[test]
    fn parse_partial_fraction() {
        let c: Credits = "1.5".parse().unwrap();
        assert_eq!(c.millis(), 1_500);
    }

    #[test]
    fn rejects_excess_precision() {
        assert!("1.0001".parse::<Credits>().is_err());
    }

    #[test]
    fn fee_uses_integer_math() {
        let rate = FeeRate::from_fraction(0.001);
        assert_eq!(rate.basis_points(), 10);
        // 100 UBL gross -> 0.100 UBL fee
        assert_eq!(rate.fee_on(Credits::from_ubl(100)), Credits::from_millis(100));
    }

    #[test]
    fn scaled_floor_widens() {
        let big = Credits::from_millis(i64::MAX / 2);
        // would overflow i64 without widening
        let half = big.scaled_floor(5_000, 10_000);
        assert_eq!(half.millis(), (i64::MAX / 2) / 2);
    }
}
