use crate::commands::common::{format_dividend_lines, format_total_line, Session};
use crate::error::CliError;

pub fn run_list(session: &Session, as_json: bool) -> Result<(), CliError> {
    let dividends = session.dividends();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&dividends)?);
    } else if dividends.is_empty() {
        println!("No dividends recorded for {}", session.user_id);
    } else {
        for line in format_dividend_lines(&dividends) {
            println!("{line}");
        }
        println!("{}", format_total_line(&dividends)?);
    }

    Ok(())
}
