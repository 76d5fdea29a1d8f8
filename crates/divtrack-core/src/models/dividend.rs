//! Dividend model

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Amount;
use crate::error::{Error, Result};

/// A unique identifier for a dividend record.
///
/// Clients assign ids themselves, usually from the current time in
/// milliseconds, and the id doubles as the merge key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DividendId(i64);

impl DividendId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Derive a fresh id from the current Unix time in milliseconds
    #[must_use]
    pub fn from_timestamp() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for DividendId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for DividendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DividendId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// A single dividend payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dividend {
    /// Unique identifier and merge key
    pub id: DividendId,
    /// Owning user, opaque to this crate
    pub user_id: String,
    /// Payment date
    pub date: NaiveDate,
    /// Ticker or free-form symbol
    pub stock: String,
    /// Amount paid
    pub amount: Amount,
}

impl Dividend {
    #[must_use]
    pub fn new(
        id: DividendId,
        user_id: impl Into<String>,
        date: NaiveDate,
        stock: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            date,
            stock: stock.into(),
            amount,
        }
    }

    /// Check the invariants every stored record must satisfy
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "dividend {} has an empty userId",
                self.id
            )));
        }
        self.amount.to_minor_units()?;
        Ok(())
    }

    #[must_use]
    pub fn belongs_to(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
