// src/units.rs
//! Amount grammar shared by the relevance filter and the reply parser:
//! `[currency] number magnitude`, e.g. `R$ 2,3 bi`, `US$ 1.5 billion`, `300 mil`.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Currency used when the amount carries no symbol.
pub const DEFAULT_CURRENCY: &str = "$";

/// Every magnitude token the grammar accepts, with its multiplier.
/// Tokens are matched case-insensitively and compared lowercased.
pub const UNIT_TABLE: &[(&str, f64)] = &[
    ("k", 1e3),
    ("mil", 1e3),
    ("thousand", 1e3),
    ("m", 1e6),
    ("mi", 1e6),
    ("mm", 1e6),
    ("mn", 1e6),
    ("milhão", 1e6),
    ("milhao", 1e6),
    ("milhões", 1e6),
    ("milhoes", 1e6),
    ("million", 1e6),
    ("millions", 1e6),
    ("b", 1e9),
    ("bi", 1e9),
    ("bn", 1e9),
    ("bilhão", 1e9),
    ("bilhao", 1e9),
    ("bilhões", 1e9),
    ("bilhoes", 1e9),
    ("billion", 1e9),
    ("billions", 1e9),
    ("t", 1e12),
    ("tri", 1e12),
    ("trilhão", 1e12),
    ("trilhao", 1e12),
    ("trilhões", 1e12),
    ("trilhoes", 1e12),
    ("trillion", 1e12),
    ("trillions", 1e12),
];

// Longer spellings first: alternation is leftmost-first, so `mil` must not shadow `milhões`.
const AMOUNT_PATTERN: &str = r"(?i)(?P<cur>R\$|US\$|\$|€|£|¥)?\s*(?P<num>\d+(?:[.,]\d+)?)\s*(?P<unit>trilh(?:ões|oes|ão|ao)|trillions?|bilh(?:ões|oes|ão|ao)|billions?|milh(?:ões|oes|ão|ao)|millions?|thousand|tri|mil|bi|bn|mi|mm|mn|k|t|b|m)\b";

fn amount_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(AMOUNT_PATTERN).expect("amount regex"))
}

/// A matched amount, before and after magnitude expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAmount {
    pub currency: String,
    pub value: f64,
    /// Lowercased magnitude token as written (`bi`, `milhões`, `k`, ...).
    pub unit: String,
    pub numeric: f64,
}

impl ParsedAmount {
    /// Display form kept on snapshots, e.g. `R$ 2.3 BI`.
    pub fn display(&self) -> String {
        format!("{} {} {}", self.currency, self.value, self.unit.to_uppercase())
    }
}

/// Multiplier for a magnitude token; unknown tokens map to 1.
pub fn multiplier(unit: &str) -> f64 {
    let unit = unit.trim().to_lowercase();
    UNIT_TABLE
        .iter()
        .find(|(token, _)| *token == unit)
        .map(|(_, m)| *m)
        .unwrap_or(1.0)
}

/// `value × multiplier(unit)`. Total: unknown units leave the value unchanged.
pub fn normalize(value: f64, unit: &str) -> f64 {
    value * multiplier(unit)
}

/// True if `text` contains anything shaped like a currency amount with a magnitude.
pub fn contains_amount(text: &str) -> bool {
    amount_re().is_match(text)
}

/// First amount in `text`, if any. A comma is read as the decimal point.
pub fn parse_amount(text: &str) -> Option<ParsedAmount> {
    let caps = amount_re().captures(text)?;
    let currency = caps
        .name("cur")
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    let value: f64 = caps.name("num")?.as_str().replace(',', ".").parse().ok()?;
    let unit = caps.name("unit")?.as_str().to_lowercase();
    let numeric = normalize(value, &unit);
    Some(ParsedAmount {
        currency,
        value,
        unit,
        numeric,
    })
}
