use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use opanel_client::prelude::*;
use std::time::Duration;

pub const COLUMNS: [&str; 8] = [
    "Option Ticker",
    "Type",
    "Strike",
    "Expiration",
    "Open",
    "High",
    "Low",
    "Close",
];

/// Display strings for one row, in [`COLUMNS`] order; price cells are blank
/// when the contract has no previous session.
pub fn cells(row: &DisplayRow) -> [String; 8] {
    let contract = &row.contract;
    let price = |f: fn(&PriceBar) -> f64| {
        row.price
            .as_ref()
            .map(|bar| format!("{:.2}", f(bar)))
            .unwrap_or_default()
    };
    [
        contract.contract_identifier.clone(),
        contract.contract_type.to_string(),
        format!("{:.2}", contract.strike_price),
        contract.expiration_date.to_string(),
        price(|bar| bar.open),
        price(|bar| bar.high),
        price(|bar| bar.low),
        price(|bar| bar.close),
    ]
}

pub fn no_contracts_message(ticker: &str) -> String {
    format!("No active contracts found for {ticker}.")
}

pub fn prices_unavailable_message(panel: &Panel) -> String {
    format!(
        "Found {} contract(s) for {}, but no prices could be fetched.",
        panel.skipped.len(),
        panel.ticker
    )
}

pub fn failure_message(e: &PanelError) -> String {
    match e {
        PanelError::MissingCredential => {
            "API key is missing. Set the POLYGON_API_KEY env var or add polygon_api_key to the secrets file.".to_string()
        }
        PanelError::InvalidInput(reason) => format!("Invalid input: {reason}"),
        e => format!("Request failed: {e}"),
    }
}

pub fn skipped_message(skipped: &SkippedContract) -> String {
    format!(
        "{} left out: {}",
        skipped.contract_identifier, skipped.reason
    )
}

/// Spinner shown while the panel is being fetched.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("[{elapsed_precise}] {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Terminal rendering of a panel: padded columns, calls in green, puts in red.
pub fn render_table(panel: &Panel) -> String {
    let rows: Vec<[String; 8]> = panel.rows.iter().map(cells).collect();

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = COLUMNS
        .iter()
        .zip(widths)
        .map(|(name, width)| format!("{name:<width$}").bold().to_string())
        .collect();
    out.push_str(&header.join("  "));
    out.push('\n');

    for (row, source) in rows.iter().zip(&panel.rows) {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                // text left, numbers right
                let padded = if i < 2 || i == 3 {
                    format!("{cell:<width$}")
                } else {
                    format!("{cell:>width$}")
                };
                match (i, source.contract.contract_type) {
                    (1, ContractType::Call) => padded.green().to_string(),
                    (1, ContractType::Put) => padded.red().to_string(),
                    _ => padded,
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}
