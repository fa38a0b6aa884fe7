use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Money amount represented as **integer minor units** (cents).
///
/// Transaction amounts are always non-negative; the sign of a movement is
/// carried by `is_income`. Totals may go negative (`net`), so the inner value
/// stays signed.
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert_eq!(MoneyCents::new(-250).to_string(), "-2.50");
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Largest amount a single transaction may carry.
    pub const MAX_AMOUNT: MoneyCents = MoneyCents(100_000_000_000_000);

    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }

    /// Returns the amount if usable as a transaction amount.
    pub(crate) fn ensure_transaction_amount(self) -> ResultEngine<Self> {
        if self.is_negative() {
            return Err(EngineError::Validation(
                "amount must not be negative".to_string(),
            ));
        }
        if self > Self::MAX_AMOUNT {
            return Err(EngineError::Validation(format!(
                "amount must not exceed {}",
                Self::MAX_AMOUNT
            )));
        }
        Ok(self)
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

// Operators saturate: totals clamp at the i64 bounds instead of panicking.
impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        *self = *self + rhs;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, Add::add)
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses user input into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and at most two fractional
    /// digits. Signs are rejected: amounts typed by a user are magnitudes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |msg: &str| EngineError::Validation(msg.to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty amount"));
        }
        if trimmed.starts_with('-') {
            return Err(invalid("amount must not be negative"));
        }

        let normalized = trimmed.trim_start_matches('+').replace(',', ".");
        let (units, fraction) = match normalized.split_once('.') {
            Some((units, fraction)) => (units, fraction),
            None => (normalized.as_str(), ""),
        };

        if units.is_empty() || !units.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("invalid amount"));
        }
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("invalid amount"));
        }

        let units: i64 = units.parse().map_err(|_| invalid("amount too large"))?;
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid("invalid amount"))? * 10,
            2 => fraction.parse::<i64>().map_err(|_| invalid("invalid amount"))?,
            _ => return Err(invalid("too many decimals")),
        };

        units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .map(MoneyCents)
            .ok_or_else(|| invalid("amount too large"))
    }
}
