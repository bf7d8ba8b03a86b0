//! Canonical ticker symbols.
//!
//! User input is normalised into a canonical `Symbol` before it is tracked,
//! persisted or compared. Index aliases map onto their chart-provider code,
//! and a second table translates those codes into the symbols the live
//! feed expects.

use crate::error::{CoreError, CoreResult};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Human aliases for major indices, keyed by the stripped uppercase input.
static INDEX_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("SP500", "^GSPC"),
        ("NASDAQ", "^IXIC"),
        ("NASDAQ100", "^IXIC"),
        ("DOWJONES", "^DJI"),
        ("DOWJONESINDUSTRIALAVERAGE", "^DJI"),
        ("RUSSELL2000", "^RUT"),
    ])
});

/// Canonical index codes that the live feed only carries as CFD instruments.
static PROVIDER_SYMBOLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("^GSPC", "OANDA:SPX500_USD"),
        ("^DJI", "OANDA:US30_USD"),
        ("^IXIC", "OANDA:NAS100_USD"),
        ("^RUT", "OANDA:US2000_USD"),
    ])
});

/// Canonical ticker symbol.
///
/// Two inputs that refer to the same instrument ("s&p 500", "SP500")
/// canonicalise to the same `Symbol`, which is what watchlist
/// de-duplication compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Canonicalise raw user or storage input.
    ///
    /// Input is trimmed and uppercased. For alias lookup, spaces, `-` and `&`
    /// are stripped; symbols that are not aliases keep their punctuation
    /// (`brk-b` stays `BRK-B`).
    pub fn canonicalize(raw: &str) -> CoreResult<Self> {
        let upper = raw.trim().to_uppercase();
        if upper.is_empty() {
            return Err(CoreError::InvalidSymbol(raw.to_string()));
        }

        let stripped: String = upper
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '&')
            .collect();

        match INDEX_ALIASES.get(stripped.as_str()) {
            Some(code) => Ok(Self((*code).to_string())),
            None => Ok(Self(upper)),
        }
    }

    /// Get the canonical symbol text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol the live feed uses for this instrument.
    ///
    /// Index codes are translated; everything else passes through.
    pub fn provider_symbol(&self) -> &str {
        PROVIDER_SYMBOLS
            .get(self.0.as_str())
            .copied()
            .unwrap_or(self.0.as_str())
    }

    /// Check if this symbol is one of the translated indices.
    pub fn is_index(&self) -> bool {
        PROVIDER_SYMBOLS.contains_key(self.0.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::canonicalize(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
