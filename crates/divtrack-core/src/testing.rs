//! Fixtures shared by unit tests

use chrono::NaiveDate;

use crate::models::{Amount, Dividend, DividendId};

pub fn dividend(id: i64, user: &str, date: &str, stock: &str, amount: &str) -> Dividend {
    Dividend::new(
        DividendId::new(id),
        user,
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        stock,
        Amount::parse(amount).unwrap(),
    )
}
