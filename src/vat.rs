//! VAT normalisation helpers
//!
//! Sellers report their VAT rate either as a percentage (`21`) or a fraction
//! (`0.21`), their country as free text, and their regime with inconsistent
//! spelling. Everything downstream works on the canonical forms produced here.

/// Rate applied when a seller gives no usable VAT percentage
pub const DEFAULT_VAT_FRACTION: f64 = 0.21;

const NETHERLANDS_ALIASES: &[&str] = &[
    "netherlands",
    "thenetherlands",
    "nederland",
    "holland",
    "nl",
    "nld",
    "🇳🇱",
];

const NL_FLAG: &str = "🇳🇱";

/// Convert a percentage-or-fraction into a fraction in `[0, 1]`.
///
/// Values above 1 are percentages. Missing, non-finite or non-positive values
/// yield `None` so callers can apply their own default.
pub fn vat_fraction(raw: Option<f64>) -> Option<f64> {
    let value = raw.filter(|v| v.is_finite() && *v > 0.0)?;
    let fraction = if value > 1.0 { value / 100.0 } else { value };
    Some(fraction.clamp(0.0, 1.0))
}

/// [`vat_fraction`] falling back to `default`
pub fn vat_fraction_or(raw: Option<f64>, default: f64) -> f64 {
    vat_fraction(raw).unwrap_or(default)
}

/// Whether a free-text country names the Netherlands
pub fn is_netherlands(country: &str) -> bool {
    let compact: String = country
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if compact.is_empty() {
        return false;
    }

    NETHERLANDS_ALIASES.contains(&compact.as_str()) || compact.starts_with(NL_FLAG)
}

/// Upper-case and strip whitespace and hyphens: `"vat-21 "` -> `"VAT21"`
pub fn normalize_vat_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}
