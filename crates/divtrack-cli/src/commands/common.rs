use std::env;
use std::sync::Arc;

use divtrack_core::export::totals_by_stock;
use divtrack_core::merge::sort_for_listing;
use divtrack_core::sync::{DividendsApiClient, DividendsRemote, SyncStore};
use divtrack_core::util::normalize_text_option;
use divtrack_core::{Amount, Dividend, SyncState};

use crate::error::CliError;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/api/dividends";

/// A loaded client cache for one user
pub struct Session {
    pub user_id: String,
    pub store: SyncStore,
}

impl Session {
    /// The user's dividends, newest first
    pub fn dividends(&self) -> Vec<Dividend> {
        let mut dividends = self.store.dividends();
        sort_for_listing(&mut dividends);
        dividends
    }
}

pub fn resolve_endpoint(cli_endpoint: Option<String>) -> String {
    normalize_text_option(cli_endpoint)
        .or_else(|| normalize_text_option(env::var("DIVTRACK_API_URL").ok()))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

pub fn resolve_user(cli_user: Option<String>) -> Result<String, CliError> {
    normalize_text_option(cli_user)
        .or_else(|| normalize_text_option(env::var("DIVTRACK_USER_ID").ok()))
        .ok_or(CliError::MissingUser)
}

pub async fn connect(endpoint: &str, cli_user: Option<String>) -> Result<Session, CliError> {
    let user_id = resolve_user(cli_user)?;
    let client = DividendsApiClient::new(endpoint)?;
    tracing::debug!(endpoint = client.endpoint(), "Connecting to dividends endpoint");
    open_session(Arc::new(client), user_id, endpoint).await
}

/// Load `user_id`'s dividends from `remote` into a fresh cache
pub async fn open_session(
    remote: Arc<dyn DividendsRemote>,
    user_id: String,
    source: &str,
) -> Result<Session, CliError> {
    let store = SyncStore::new(remote);
    store.set_identity(Some(user_id.clone())).await;
    if store.snapshot().state == SyncState::Error {
        return Err(CliError::LoadFailed(source.to_string()));
    }
    Ok(Session { user_id, store })
}

pub fn format_dividend_lines(dividends: &[Dividend]) -> Vec<String> {
    dividends
        .iter()
        .map(|dividend| {
            let amount = dividend.amount.to_string();
            format!(
                "{}  {:<8}  {amount:>10}  {}",
                dividend.date, dividend.stock, dividend.id
            )
        })
        .collect()
}

pub fn format_total_line(dividends: &[Dividend]) -> Result<String, CliError> {
    let total = Amount::total(dividends.iter().map(|dividend| &dividend.amount))?;
    let stocks = totals_by_stock(dividends)?.len();
    let noun = if stocks == 1 { "stock" } else { "stocks" };
    Ok(format!(
        "Total {total} across {} payments in {stocks} {noun}",
        dividends.len()
    ))
}
