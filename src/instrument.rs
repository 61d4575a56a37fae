// =============================================================================
// Instruments — sanitized (symbol, name) pairs
// =============================================================================
//
// Symbols are restricted to ASCII alphanumerics plus `.`, `-` and `^` and
// capped at 20 chars. Names keep alphanumerics, spaces and a small set of
// punctuation, capped at 200 chars. A pair whose symbol or name is empty after
// sanitization is dropped by the constructors.

use serde::{Deserialize, Serialize};

use crate::types::Market;

pub const MAX_SYMBOL_LEN: usize = 20;
pub const MAX_NAME_LEN: usize = 200;

/// Leading marker the provider uses for index symbols (e.g. `^NSEI`).
pub const INDEX_PREFIX: char = '^';

const NAME_PUNCTUATION: &[char] = &['.', ',', '&', '\'', '(', ')', '-', '/', ':', '+'];

/// A symbol the provider understands plus a human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub display_name: String,
}

impl Instrument {
    /// Sanitize both fields; `None` if either comes out empty.
    pub fn new(symbol: &str, name: &str) -> Option<Self> {
        let symbol = sanitize_symbol(symbol);
        let display_name = sanitize_name(name);
        if symbol.is_empty() || display_name.is_empty() {
            return None;
        }
        Some(Self {
            symbol,
            display_name,
        })
    }

    /// Like [`Instrument::new`], but also applies the market's exchange suffix.
    pub fn for_market(symbol: &str, name: &str, market: Market) -> Option<Self> {
        let symbol = provider_symbol(&sanitize_symbol(symbol), market);
        Self::new(&symbol, name)
    }

    /// Symbol with exchange decorations removed, for presentation.
    pub fn display_symbol(&self) -> String {
        display_symbol(&self.symbol)
    }
}

pub fn sanitize_symbol(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'))
        .take(MAX_SYMBOL_LEN)
        .collect()
}

pub fn sanitize_name(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || NAME_PUNCTUATION.contains(c))
        .take(MAX_NAME_LEN)
        .collect();
    kept.trim().to_string()
}

/// Append the market's exchange suffix when it is missing.
///
/// Index symbols are left alone, and the base is shortened so the suffixed
/// symbol still fits within [`MAX_SYMBOL_LEN`].
pub fn provider_symbol(symbol: &str, market: Market) -> String {
    let Some(suffix) = market.symbol_suffix() else {
        return symbol.to_string();
    };
    if symbol.is_empty() || symbol.starts_with(INDEX_PREFIX) || symbol.ends_with(suffix) {
        return symbol.to_string();
    }
    let room = MAX_SYMBOL_LEN.saturating_sub(suffix.len());
    let base: String = symbol.chars().take(room).collect();
    format!("{base}{suffix}")
}

/// Strip known exchange suffixes and the index prefix from a provider symbol.
pub fn display_symbol(symbol: &str) -> String {
    let mut s = symbol.strip_prefix(INDEX_PREFIX).unwrap_or(symbol);
    for market in [Market::Us, Market::India] {
        if let Some(suffix) = market.symbol_suffix() {
            s = s.strip_suffix(suffix).unwrap_or(s);
        }
    }
    s.to_string()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_keeps_allowed_chars_only() {
        assert_eq!(sanitize_symbol(" brk-b "), "brk-b");
        assert_eq!(sanitize_symbol("^NSEI"), "^NSEI");
        assert_eq!(sanitize_symbol("AAPL; DROP TABLE"), "AAPLDROPTABLE");
        assert_eq!(sanitize_symbol("<script>"), "script");
        assert_eq!(sanitize_symbol("$$$"), "");
    }

    #[test]
    fn symbol_is_length_capped() {
        let long = "A".repeat(40);
        assert_eq!(sanitize_symbol(&long).len(), MAX_SYMBOL_LEN);
    }

    #[test]
    fn sanitize_symbol_is_idempotent() {
        let samples = [
            "",
            "AAPL",
            " reliance.ns ",
            "^GSPC",
            "A<B>C{D}E|F\\G",
            "ÄÖÜ-日本-123",
            "123456789012345678901234567890",
            "..--^^..",
        ];
        for raw in samples {
            let once = sanitize_symbol(raw);
            assert_eq!(sanitize_symbol(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn sanitize_name_is_idempotent() {
        let long = format!("{}  tail", "x".repeat(199));
        let samples: [&str; 5] = [
            "  Apple Inc.  ",
            "Procter & Gamble <b>",
            &long,
            "\t\n",
            "Tata Consultancy Services",
        ];
        for raw in samples {
            let once = sanitize_name(raw);
            assert_eq!(sanitize_name(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn name_strips_markup_and_caps_length() {
        assert_eq!(sanitize_name("AT&T <Inc>"), "AT&T Inc");
        assert_eq!(sanitize_name(&"n".repeat(500)).chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn new_drops_empty_fields() {
        assert!(Instrument::new("@@@", "Nothing").is_none());
        assert!(Instrument::new("AAPL", "<>").is_none());
        let ok = Instrument::new("AAPL", "Apple").unwrap();
        assert_eq!(ok.symbol, "AAPL");
        assert_eq!(ok.display_name, "Apple");
    }

    #[test]
    fn india_suffix_applied_once() {
        let a = Instrument::for_market("RELIANCE", "Reliance Industries", Market::India).unwrap();
        assert_eq!(a.symbol, "RELIANCE.NS");
        let b = Instrument::for_market("TCS.NS", "TCS", Market::India).unwrap();
        assert_eq!(b.symbol, "TCS.NS");
        let idx = Instrument::for_market("^NSEI", "NIFTY 50", Market::India).unwrap();
        assert_eq!(idx.symbol, "^NSEI");
        let us = Instrument::for_market("MSFT", "Microsoft", Market::Us).unwrap();
        assert_eq!(us.symbol, "MSFT");
    }

    #[test]
    fn suffixed_symbol_stays_within_cap() {
        let long = "B".repeat(MAX_SYMBOL_LEN);
        let inst = Instrument::for_market(&long, "Long", Market::India).unwrap();
        assert_eq!(inst.symbol.len(), MAX_SYMBOL_LEN);
        assert!(inst.symbol.ends_with(".NS"));
    }

    #[test]
    fn display_symbol_strips_decorations() {
        assert_eq!(display_symbol("RELIANCE.NS"), "RELIANCE");
        assert_eq!(display_symbol("^GSPC"), "GSPC");
        assert_eq!(display_symbol("AAPL"), "AAPL");
        assert_eq!(display_symbol("BRK.B"), "BRK.B");
    }

    #[test]
    fn only_the_market_suffix_is_recognised() {
        assert_eq!(provider_symbol("TCS.NS", Market::India), "TCS.NS");
        assert_eq!(provider_symbol("TCS.BO", Market::India), "TCS.BO.NS");
        assert_eq!(provider_symbol("^NSEI", Market::India), "^NSEI");
        assert_eq!(provider_symbol("TCS.BO", Market::Us), "TCS.BO");
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        #[test]
        fn prop_sanitize_symbol_is_idempotent(raw in any::<String>()) {
            let once = sanitize_symbol(&raw);
            prop_assert_eq!(sanitize_symbol(&once), once.clone());
            prop_assert!(once.len() <= MAX_SYMBOL_LEN);
        }

        #[test]
        fn prop_sanitize_name_is_idempotent(raw in any::<String>()) {
            let once = sanitize_name(&raw);
            prop_assert_eq!(sanitize_name(&once), once.clone());
            prop_assert!(once.chars().count() <= MAX_NAME_LEN);
        }

        #[test]
        fn prop_provider_symbol_fits_cap(raw in "[A-Z0-9.^-]{0,40}") {
            let symbol = sanitize_symbol(&raw);
            prop_assert!(provider_symbol(&symbol, Market::India).len() <= MAX_SYMBOL_LEN);
        }
    }
}
