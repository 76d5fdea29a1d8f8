//! Fixed-precision currency amount

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Number of fractional digits every amount carries
pub const AMOUNT_SCALE: u32 = 2;

/// A currency value held as a decimal with exactly two fractional digits.
///
/// Its value in cents always fits in an `i64`; anything larger is rejected
/// when the amount is built. Serializes as a JSON number. Deserializes from a
/// JSON number or a numeric string; extra precision is rounded half away from
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

fn largest_amount() -> Decimal {
    Decimal::new(i64::MAX, AMOUNT_SCALE)
}

impl Amount {
    /// Normalize a decimal to two fractional digits, rejecting values whose
    /// cents do not fit in an `i64`
    pub fn new(value: Decimal) -> Result<Self> {
        let mut value =
            value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        if value.abs() > largest_amount() {
            return Err(Error::InvalidInput(format!("amount {value} is out of range")));
        }
        value.rescale(AMOUNT_SCALE);
        Ok(Self(value))
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::from_minor_units(0)
    }

    /// Build an amount from integer cents
    #[must_use]
    pub fn from_minor_units(cents: i64) -> Self {
        Self(Decimal::new(cents, AMOUNT_SCALE))
    }

    /// Integer cents, as stored by the relational backend
    pub fn to_minor_units(self) -> Result<i64> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .ok_or_else(|| Error::InvalidInput(format!("amount {self} is out of range")))
    }

    /// Parse a decimal string such as `"12.5"` or `" 8.25 "`
    pub fn parse(value: &str) -> Result<Self> {
        Self::new(Decimal::from_str(value.trim())?)
    }

    /// `self + rhs`, or an error when the sum leaves the supported range
    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        let sum = self
            .0
            .checked_add(rhs.0)
            .ok_or_else(|| Error::InvalidInput("amount total overflowed".to_string()))?;
        Self::new(sum)
    }

    /// Add up `amounts`, failing instead of overflowing
    pub fn total<'a>(amounts: impl IntoIterator<Item = &'a Self>) -> Result<Self> {
        amounts
            .into_iter()
            .try_fold(Self::zero(), |total, amount| total.checked_add(*amount))
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Serde adapter that writes an amount as decimal text, for storage that must
/// not round-trip through a float. Reading accepts text or numbers.
pub mod as_text {
    use super::{Amount, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        Amount::deserialize(deserializer)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a decimal amount as a number or numeric string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Amount, E> {
        Amount::new(Decimal::from(value)).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Amount, E> {
        Amount::new(Decimal::from(value)).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Amount, E> {
        let value = Decimal::try_from(value)
            .map_err(|_| E::custom(format!("amount {value} is not representable")))?;
        Amount::new(value).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Amount, E> {
        Amount::parse(value).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn amounts_always_carry_two_decimals() {
        assert_eq!(Amount::parse("15").unwrap().to_string(), "15.00");
        assert_eq!(Amount::parse("8.25").unwrap().to_string(), "8.25");
        assert_eq!(Amount::parse("0.125").unwrap().to_string(), "0.13");
    }

    #[test]
    fn minor_units_roundtrip_exactly() {
        let amount = Amount::parse("1234.56").unwrap();
        assert_eq!(amount.to_minor_units().unwrap(), 123_456);
        assert_eq!(Amount::from_minor_units(123_456), amount);
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let from_float: Amount = serde_json::from_str("12.5").unwrap();
        let from_int: Amount = serde_json::from_str("12").unwrap();
        let from_text: Amount = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(from_float, Amount::from_minor_units(1250));
        assert_eq!(from_int, Amount::from_minor_units(1200));
        assert_eq!(from_text, Amount::from_minor_units(1250));
    }

    #[test]
    fn rejects_non_numeric_text() {
        assert!(serde_json::from_str::<Amount>("\"twelve\"").is_err());
        assert!(serde_json::from_str::<Amount>("true").is_err());
    }

    #[test]
    fn summing_does_not_drift() {
        let dimes = vec![Amount::parse("0.10").unwrap(); 10];
        assert_eq!(Amount::total(&dimes).unwrap(), Amount::parse("1.00").unwrap());
    }

    #[test]
    fn range_ends_at_i64_cents() {
        let largest = Amount::parse("92233720368547758.07").unwrap();
        assert_eq!(largest.to_minor_units().unwrap(), i64::MAX);
        assert_eq!(largest.to_string(), "92233720368547758.07");

        let err = Amount::parse("92233720368547758.08").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        assert!(Amount::parse("-92233720368547758.08").is_err());
    }

    #[test]
    fn huge_values_are_rejected_not_panicking() {
        let err = Amount::parse("1000000000000000000000000000").unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let from_json = serde_json::from_str::<Amount>("1e28").unwrap_err();
        assert!(from_json.to_string().contains("out of range"));
        assert!(serde_json::from_str::<Amount>("\"1000000000000000000000\"").is_err());
    }

    #[test]
    fn totals_fail_instead_of_overflowing() {
        let large = Amount::parse("50000000000000000.00").unwrap();
        assert!(large.checked_add(large).is_err());
        assert!(Amount::total(&[large, large]).is_err());
        assert_eq!(
            Amount::total(&[large]).unwrap().to_minor_units().unwrap(),
            5_000_000_000_000_000_000
        );
    }

    #[test]
    fn text_adapter_keeps_every_digit() {
        #[derive(Serialize, Deserialize)]
        struct Stored {
            #[serde(with = "as_text")]
            amount: Amount,
        }

        let amount = Amount::parse("12345678901234567.89").unwrap();
        let json = serde_json::to_string(&Stored { amount }).unwrap();
        assert_eq!(json, r#"{"amount":"12345678901234567.89"}"#);

        let back: Stored = serde_json::from_str(&json).unwrap();
        assert_eq!(back.amount, amount);
        let legacy: Stored = serde_json::from_str(r#"{"amount":12.5}"#).unwrap();
        assert_eq!(legacy.amount.to_string(), "12.50");
    }
}
