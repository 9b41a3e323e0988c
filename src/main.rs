//! DealDesk CLI binary

use anyhow::Context;
use clap::Parser;
use dealdesk::cli::{Cli, Commands, DealDesk};
use dealdesk::finalize::{map_invoice_vat, BuyerVatFacts};
use dealdesk::negotiation::{DecisionEngine, PriceInputs};
use dealdesk::types::{SellingVatType, VatType};
use dealdesk::DealConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DealConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Decide {
            seller_price,
            our_offer,
            vat_type,
            vat_pct,
            country,
        } => {
            let regime = VatType::parse(&vat_type);
            if regime.is_none() {
                tracing::warn!("Unknown VAT type '{}', comparing as VAT21", vat_type);
            }

            let engine = DecisionEngine::new(config.default_vat_fraction, config.currency_symbol.clone());
            let decision = engine.decide(&PriceInputs {
                seller_price,
                our_offer_incl: our_offer,
                regime,
                vat_pct,
                country: &country,
            });

            println!("{}", serde_json::to_string_pretty(&decision)?);
        }

        Commands::FanOut { request } => {
            let raw = std::fs::read_to_string(&request)
                .with_context(|| format!("reading {}", request.display()))?;
            let body: serde_json::Value = serde_json::from_str(&raw).context("parsing request body")?;

            let (desk, _store, messenger) = DealDesk::in_memory(config);
            let reply = desk.fan_out(body).await;

            for sent in messenger.sent().await {
                tracing::info!(
                    "{:?} to {} via {}: {}",
                    sent.kind,
                    sent.message.seller.display_name(),
                    sent.handle,
                    sent.message.confirm.encode()
                );
            }

            println!("{}", serde_json::to_string_pretty(&reply.body)?);
            if !reply.is_success() {
                anyhow::bail!("fan-out failed with status {}", reply.status);
            }
        }

        Commands::MapVat {
            confirmed,
            selling,
            buyer_country,
            buyer_vat_id,
        } => {
            let confirmed = match confirmed.as_deref() {
                Some(raw) => Some(
                    VatType::parse(raw).with_context(|| format!("unknown confirmed VAT type '{}'", raw))?,
                ),
                None => None,
            };
            let selling = match selling.as_deref() {
                Some(raw) => Some(
                    SellingVatType::parse(raw)
                        .with_context(|| format!("unknown selling VAT type '{}'", raw))?,
                ),
                None => None,
            };

            let buyer = BuyerVatFacts::new(buyer_country, buyer_vat_id);
            match map_invoice_vat(confirmed, selling, &buyer) {
                Ok(vat) => println!("{}", vat),
                Err(e) => anyhow::bail!("{}", e),
            }
        }
    }

    Ok(())
}
