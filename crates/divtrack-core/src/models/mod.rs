//! Data models for divtrack

mod amount;
mod dividend;

pub(crate) use amount::as_text;
pub use amount::{Amount, AMOUNT_SCALE};
pub use dividend::{Dividend, DividendId};
