//! Plain text rendering of a [`FeesResponse`].

use crate::types::{FeeRow, FeesResponse};
use itertools::Itertools;
use std::fmt::Write;

const TITLE: &str = "Gas Fee Snapshot";

/// Renders `response` as a fixed-width table, one line per chain.
pub fn render_table(response: &FeesResponse) -> String {
    let mut header = vec![
        "Chain".to_string(),
        "Gas (gwei)".to_string(),
        "Gas limit".to_string(),
        "Fee".to_string(),
    ];
    header.extend(response.meta.currencies.iter().cloned());
    header.extend(["Mode".to_string(), "Status".to_string()]);

    let rows = response.data.iter().map(|row| cells(row, &response.meta.currencies)).collect_vec();

    let widths = (0..header.len())
        .map(|column| {
            rows.iter()
                .map(|row| row[column].len())
                .chain([header[column].len()])
                .max()
                .unwrap_or_default()
        })
        .collect_vec();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    let _ = writeln!(out, "{TITLE}");
    let _ = writeln!(
        out,
        "generated_at={} precise={} cache_ttl={}s",
        response.meta.generated_at,
        response.meta.precise_requested && response.meta.precise_enabled,
        response.meta.cache_ttl_seconds
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", line(&header[..]));
    let _ = writeln!(out, "{}", widths.iter().map(|width| "-".repeat(*width)).join("  "));
    for row in &rows {
        let _ = writeln!(out, "{}", line(&row[..]));
    }
    out
}

fn cells(row: &FeeRow, currencies: &[String]) -> Vec<String> {
    let dash = || "-".to_string();

    let mut cells = vec![
        row.chain.display_name.clone(),
        row.gas_price.as_ref().map_or_else(dash, |price| price.gwei.clone()),
        row.gas_limit.map_or_else(dash, |limit| limit.to_string()),
        row.native_fee
            .as_ref()
            .map_or_else(dash, |fee| format!("{} {}", fee.formatted, row.chain.symbol)),
    ];
    cells.extend(currencies.iter().map(|currency| {
        row.fiat
            .as_ref()
            .and_then(|fiat| fiat.get(currency))
            .map_or_else(dash, |value| value.formatted.clone())
    }));
    cells.push(row.mode.map_or_else(dash, |mode| mode.to_string()));

    let status = match (&row.error, row.stale) {
        (Some(error), _) => format!("error: {error}"),
        (None, true) => "stale".to_string(),
        (None, false) => "ok".to_string(),
    };
    cells.push(status);
    cells
}
