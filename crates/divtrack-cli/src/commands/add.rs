use chrono::{NaiveDate, Utc};
use divtrack_core::{Amount, Dividend, DividendId};

use crate::commands::common::Session;
use crate::error::CliError;

pub async fn run_add(
    session: &Session,
    stock: &str,
    amount: &str,
    date: Option<NaiveDate>,
    id: Option<i64>,
) -> Result<(), CliError> {
    let dividend = build_dividend(&session.user_id, stock, amount, date, id)?;
    let id = dividend.id;
    session.store.upsert(dividend).await?;

    println!("{id}");
    Ok(())
}

pub fn build_dividend(
    user_id: &str,
    stock: &str,
    amount: &str,
    date: Option<NaiveDate>,
    id: Option<i64>,
) -> Result<Dividend, CliError> {
    let stock = stock.trim().to_ascii_uppercase();
    if stock.is_empty() {
        return Err(CliError::EmptyStock);
    }
    let amount = Amount::parse(amount.trim())?;
    let id = id.map_or_else(DividendId::from_timestamp, DividendId::new);
    let date = date.unwrap_or_else(|| Utc::now().date_naive());

    let dividend = Dividend::new(id, user_id, date, stock, amount);
    dividend.validate()?;
    Ok(dividend)
}
