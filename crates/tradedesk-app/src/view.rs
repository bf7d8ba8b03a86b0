//! Terminal rendering of the watchlist.

use tradedesk_core::TrackedSymbol;
use tradedesk_store::WatchlistEvent;

const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const NAME_WIDTH: usize = 24;

/// Block-character sparkline scaled to the sample range.
pub fn sparkline(samples: &[f64]) -> String {
    let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    let Some(min) = finite.iter().copied().reduce(f64::min) else {
        return String::new();
    };
    let max = finite.iter().copied().fold(min, f64::max);
    let span = max - min;

    finite
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                BLOCKS[BLOCKS.len() / 2]
            } else {
                let level = ((v - min) / span * (BLOCKS.len() - 1) as f64).round() as usize;
                BLOCKS[level.min(BLOCKS.len() - 1)]
            }
        })
        .collect()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn format_change(pct: f64) -> String {
    format!("{pct:+.2}%")
}

/// Table of all entries.
pub fn render_table(entries: &[TrackedSymbol]) -> String {
    if entries.is_empty() {
        return "(watchlist is empty)".to_string();
    }

    let mut out = format!(
        "{:<10} {:<name$} {:>12} {:>9}  {}\n",
        "SYMBOL",
        "NAME",
        "PRICE",
        "CHANGE",
        "TREND",
        name = NAME_WIDTH
    );
    for entry in entries {
        let price = if entry.current_price().is_known() {
            entry.current_price().to_string()
        } else {
            "-".to_string()
        };
        out.push_str(&format!(
            "{:<10} {:<name$} {:>12} {:>9}  {}\n",
            entry.symbol(),
            truncate(entry.display_name(), NAME_WIDTH),
            price,
            format_change(entry.percent_change()),
            sparkline(&entry.price_history().to_vec()),
            name = NAME_WIDTH
        ));
    }
    out.pop();
    out
}

/// One-line description of a store event, if it is worth printing.
pub fn render_event(event: &WatchlistEvent) -> Option<String> {
    match event {
        WatchlistEvent::Notice(notice) => Some(notice.to_string()),
        WatchlistEvent::Loaded { count } => Some(format!("loaded {count} symbol(s)")),
        WatchlistEvent::ConnectionChanged { connected: true } => {
            Some("live feed connected".to_string())
        }
        WatchlistEvent::ConnectionChanged { connected: false } => {
            Some("live feed offline".to_string())
        }
        WatchlistEvent::Cleared => Some("watchlist cleared".to_string()),
        WatchlistEvent::PriceUpdated { entry } => Some(format!(
            "{} {} ({})",
            entry.symbol(),
            entry.current_price(),
            format_change(entry.percent_change())
        )),
        WatchlistEvent::Loading | WatchlistEvent::Added { .. } | WatchlistEvent::Removed { .. } => {
            None
        }
    }
}
