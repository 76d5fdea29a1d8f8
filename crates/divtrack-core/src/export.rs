//! Dividend export helpers shared by the CLI and any other client.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::Result;
use crate::models::{Amount, Dividend};

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
}

/// Sum amounts per stock, ordered by ticker. Fails if a total overflows.
pub fn totals_by_stock(dividends: &[Dividend]) -> Result<BTreeMap<String, Amount>> {
    let mut totals: BTreeMap<String, Amount> = BTreeMap::new();
    for dividend in dividends {
        let entry = totals.entry(dividend.stock.clone()).or_default();
        *entry = entry.checked_add(dividend.amount)?;
    }
    Ok(totals)
}

/// Render dividends as pretty-printed JSON, the wire shape served by the API.
pub fn render_json_export(dividends: &[Dividend]) -> Result<String> {
    Ok(serde_json::to_string_pretty(dividends)?)
}

/// Render dividends as a Markdown table followed by per-stock totals.
pub fn render_markdown_export(dividends: &[Dividend]) -> Result<String> {
    let mut output = String::new();

    let _ = writeln!(output, "| Date | Stock | Amount | Id |");
    let _ = writeln!(output, "|------|-------|-------:|----|");
    for dividend in dividends {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            dividend.date, dividend.stock, dividend.amount, dividend.id
        );
    }

    let totals = totals_by_stock(dividends)?;
    if !totals.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Totals");
        let _ = writeln!(output);
        for (stock, amount) in &totals {
            let _ = writeln!(output, "- {stock}: {amount}");
        }
        let grand_total = Amount::total(totals.values())?;
        let _ = writeln!(output, "- **All**: {grand_total}");
    }

    Ok(output)
}

/// Render dividends based on selected export format.
pub fn render_export(dividends: &[Dividend], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => render_json_export(dividends),
        ExportFormat::Markdown => render_markdown_export(dividends),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::dividend;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Dividend> {
        vec![
            dividend(2, "u1", "2024-02-01", "MSFT", "8.25"),
            dividend(1, "u1", "2024-01-01", "AAPL", "15.00"),
            dividend(3, "u1", "2024-03-01", "AAPL", "0.24"),
        ]
    }

    #[test]
    fn totals_group_by_stock() {
        let totals = totals_by_stock(&sample()).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["AAPL"].to_string(), "15.24");
        assert_eq!(totals["MSFT"].to_string(), "8.25");
    }

    #[test]
    fn render_markdown_export_includes_rows_and_totals() {
        let rendered = render_markdown_export(&sample()).unwrap();
        assert!(rendered.contains("| 2024-02-01 | MSFT | 8.25 | 2 |"));
        assert!(rendered.contains("- AAPL: 15.24"));
        assert!(rendered.contains("- **All**: 23.49"));
    }

    #[test]
    fn render_markdown_export_of_nothing_has_no_totals() {
        let rendered = render_markdown_export(&[]).unwrap();
        assert!(!rendered.contains("Totals"));
    }

    #[test]
    fn json_export_parses_back() {
        let rendered = render_export(&sample(), ExportFormat::Json).unwrap();
        let parsed: Vec<Dividend> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn overflowing_totals_are_an_error() {
        let large = vec![
            dividend(1, "u1", "2024-01-01", "BRK", "60000000000000000.00"),
            dividend(2, "u1", "2024-02-01", "BRK", "60000000000000000.00"),
        ];
        assert!(totals_by_stock(&large).is_err());
        assert!(render_export(&large, ExportFormat::Markdown).is_err());
        assert!(render_export(&large, ExportFormat::Json).is_ok());
    }
}
