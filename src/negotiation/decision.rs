//! Offer/confirm decision engine
//!
//! Brings the seller's asking price and the house offer onto a common VAT basis
//! and decides whether the seller is sent an offer (house pays less than asked)
//! or a confirmation request (house pays at least the asking price).

use super::types::{Decision, Display, Mode};
use crate::types::{format_money, round2, VatType};
use crate::vat::{is_netherlands, vat_fraction_or, DEFAULT_VAT_FRACTION};

/// Prices and VAT facts for one seller
#[derive(Clone, Debug, PartialEq)]
pub struct PriceInputs<'a> {
    pub seller_price: f64,
    /// House offer, VAT inclusive
    pub our_offer_incl: f64,
    /// `None` for an unrecognised regime
    pub regime: Option<VatType>,
    pub vat_pct: Option<f64>,
    pub country: &'a str,
}

/// Both prices on the basis they are compared and displayed on
struct Basis {
    seller: f64,
    ours: f64,
    vat: VatType,
}

#[derive(Clone, Debug)]
pub struct DecisionEngine {
    default_vat_fraction: f64,
    currency_symbol: String,
}

impl DecisionEngine {
    pub fn new(default_vat_fraction: f64, currency_symbol: impl Into<String>) -> Self {
        Self {
            default_vat_fraction,
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Decide mode and display amounts. Pure: equal inputs give equal output.
    pub fn decide(&self, inputs: &PriceInputs<'_>) -> Decision {
        let basis = self.basis(inputs);

        // Compare unrounded so cent rounding cannot flip the mode
        let mode = if basis.ours < basis.seller {
            Mode::Offer
        } else {
            Mode::Confirm
        };

        let tag = basis.vat.display_tag();
        let display = Display {
            your_amount: round2(basis.seller),
            our_amount: round2(basis.ours),
            vat_tag_your: tag.to_string(),
            vat_tag_our: tag.to_string(),
            your_label: format!("{} {}", format_money(&self.currency_symbol, basis.seller), tag),
            our_label: format!("{} {}", format_money(&self.currency_symbol, basis.ours), tag),
        };

        Decision {
            mode,
            display,
            confirmed_vat_type: basis.vat,
        }
    }

    fn basis(&self, inputs: &PriceInputs<'_>) -> Basis {
        let fraction = vat_fraction_or(inputs.vat_pct, self.default_vat_fraction);

        match inputs.regime {
            Some(VatType::Margin) => Basis {
                seller: inputs.seller_price,
                ours: inputs.our_offer_incl,
                vat: VatType::Margin,
            },
            // Dutch VAT0 sellers are compared and confirmed as VAT21
            Some(VatType::Vat0) if is_netherlands(inputs.country) => Basis {
                seller: inputs.seller_price * (1.0 + fraction),
                ours: inputs.our_offer_incl,
                vat: VatType::Vat21,
            },
            Some(VatType::Vat0) => Basis {
                seller: inputs.seller_price,
                ours: inputs.our_offer_incl / (1.0 + fraction),
                vat: VatType::Vat0,
            },
            Some(VatType::Vat21) | None => Basis {
                seller: inputs.seller_price,
                ours: inputs.our_offer_incl,
                vat: VatType::Vat21,
            },
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_VAT_FRACTION, "€")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(seller: f64, ours: f64, regime: Option<VatType>, country: &str) -> PriceInputs<'_> {
        PriceInputs {
            seller_price: seller,
            our_offer_incl: ours,
            regime,
            vat_pct: Some(21.0),
            country,
        }
    }

    #[test]
    fn test_vat21_offer() {
        let decision = DecisionEngine::default().decide(&inputs(100.0, 90.0, Some(VatType::Vat21), "Germany"));

        assert_eq!(decision.mode, Mode::Offer);
        assert_eq!(decision.button_price(), 90.0);
        assert_eq!(decision.confirmed_vat_type, VatType::Vat21);
        assert_eq!(decision.display.your_label, "€100.00 (VAT 21%)");
        assert_eq!(decision.display.our_label, "€90.00 (VAT 21%)");
    }

    #[test]
    fn test_vat21_confirm() {
        let decision = DecisionEngine::default().decide(&inputs(100.0, 110.0, Some(VatType::Vat21), "Germany"));

        assert_eq!(decision.mode, Mode::Confirm);
        assert_eq!(decision.button_price(), 100.0);
        assert_eq!(decision.display.our_amount, 110.0);
    }

    #[test]
    fn test_tie_confirms() {
        let decision = DecisionEngine::default().decide(&inputs(100.0, 100.0, Some(VatType::Margin), "Belgium"));
        assert_eq!(decision.mode, Mode::Confirm);
        assert_eq!(decision.button_price(), 100.0);
    }

    #[test]
    fn test_margin_uses_raw_prices_in_any_country() {
        for country in ["Netherlands", "Germany", ""] {
            let decision = DecisionEngine::default().decide(&inputs(80.0, 75.5, Some(VatType::Margin), country));
            assert_eq!(decision.confirmed_vat_type, VatType::Margin);
            assert_eq!(decision.display.your_amount, 80.0);
            assert_eq!(decision.display.our_amount, 75.5);
            assert_eq!(decision.display.vat_tag_your, "(Margin)");
            assert_eq!(decision.mode, Mode::Offer);
        }
    }

    #[test]
    fn test_vat0_dutch_seller_is_uplifted() {
        let decision = DecisionEngine::default().decide(&inputs(100.0, 125.0, Some(VatType::Vat0), "Netherlands"));

        assert_eq!(decision.mode, Mode::Confirm);
        assert_eq!(decision.display.your_amount, 121.0);
        assert_eq!(decision.display.our_amount, 125.0);
        assert_eq!(decision.button_price(), 121.0);
        assert_eq!(decision.confirmed_vat_type, VatType::Vat21);
        assert_eq!(decision.display.vat_tag_our, "(VAT 21%)");
    }

    #[test]
    fn test_vat0_dutch_seller_offer_when_uplift_exceeds_ours() {
        let decision = DecisionEngine::default().decide(&inputs(100.0, 120.0, Some(VatType::Vat0), "🇳🇱"));
        assert_eq!(decision.mode, Mode::Offer);
        assert_eq!(decision.button_price(), 120.0);
    }

    #[test]
    fn test_vat0_foreign_seller_gets_exclusive_offer() {
        let decision = DecisionEngine::default().decide(&inputs(110.0, 121.0, Some(VatType::Vat0), "Germany"));

        assert_eq!(decision.display.our_amount, 100.0);
        assert_eq!(decision.display.your_amount, 110.0);
        assert_eq!(decision.mode, Mode::Offer);
        assert_eq!(decision.confirmed_vat_type, VatType::Vat0);
        assert_eq!(decision.display.our_label, "€100.00 (VAT 0%)");
    }

    #[test]
    fn test_vat0_uses_seller_rate() {
        let mut input = inputs(90.0, 109.0, Some(VatType::Vat0), "Germany");
        input.vat_pct = Some(0.09);
        let decision = DecisionEngine::default().decide(&input);
        assert_eq!(decision.display.our_amount, 100.0);
        assert_eq!(decision.mode, Mode::Confirm);
    }

    #[test]
    fn test_vat0_missing_rate_defaults_to_21() {
        let mut input = inputs(100.0, 121.0, Some(VatType::Vat0), "Spain");
        input.vat_pct = None;
        let decision = DecisionEngine::default().decide(&input);
        assert_eq!(decision.display.our_amount, 100.0);
    }

    #[test]
    fn test_unknown_regime_behaves_like_vat21() {
        let unknown = DecisionEngine::default().decide(&inputs(100.0, 90.0, None, "Netherlands"));
        let vat21 = DecisionEngine::default().decide(&inputs(100.0, 90.0, Some(VatType::Vat21), "Netherlands"));
        assert_eq!(unknown, vat21);
    }

    #[test]
    fn test_rounding_does_not_flip_mode() {
        // 100.004 and 100.001 both display as 100.00, but ours is still lower
        let decision = DecisionEngine::default().decide(&inputs(100.004, 100.001, Some(VatType::Vat21), "Germany"));
        assert_eq!(decision.mode, Mode::Offer);
        assert_eq!(decision.display.your_amount, decision.display.our_amount);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let engine = DecisionEngine::default();
        let input = inputs(99.95, 101.3, Some(VatType::Vat0), "Belgium");
        assert_eq!(engine.decide(&input), engine.decide(&input));
    }

    #[test]
    fn test_custom_currency_symbol() {
        let engine = DecisionEngine::new(0.21, "EUR ");
        let decision = engine.decide(&inputs(50.0, 40.0, Some(VatType::Margin), ""));
        assert_eq!(decision.display.our_label, "EUR 40.00 (Margin)");
    }
}
