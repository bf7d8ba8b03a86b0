//! Live tick reconciliation.

use tradedesk_core::{Price, TrackedSymbol};
use tradedesk_relay::FeedMessage;

/// Merge one feed message into the tracked entries.
///
/// Each entry looks up its provider symbol in the message. Entries without
/// a print are left untouched. When a frame carries several prints for one
/// symbol the last one is applied. Returns the entries that changed.
pub fn merge_ticks(entries: &mut [TrackedSymbol], message: &FeedMessage) -> Vec<TrackedSymbol> {
    if !message.has_ticks() {
        return Vec::new();
    }

    entries
        .iter_mut()
        .filter_map(|entry| {
            let price = message.latest_price(entry.provider_symbol())?;
            entry.apply_price(Price::new(price)).then(|| entry.clone())
        })
        .collect()
}
