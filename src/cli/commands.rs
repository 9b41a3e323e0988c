//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dealdesk")]
#[command(about = "DealDesk - seller offer negotiation and deal finalization", long_about = None)]
pub struct Cli {
    /// JSON configuration file (table names, default VAT rate, currency)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decide between an offer and a confirmation request for one seller
    Decide {
        /// Seller's asking price, on the basis of their VAT regime
        #[arg(short, long)]
        seller_price: f64,

        /// House offer, VAT inclusive
        #[arg(short, long)]
        our_offer: f64,

        /// Seller VAT regime (Margin, VAT21, VAT0)
        #[arg(short, long, default_value = "VAT21")]
        vat_type: String,

        /// Seller VAT rate, as a percentage or a fraction
        #[arg(short = 'p', long)]
        vat_pct: Option<f64>,

        /// Seller country
        #[arg(short = 'C', long, default_value = "")]
        country: String,
    },

    /// Fan a JSON offer request out against in-memory collaborators
    FanOut {
        /// Path to the request body
        request: PathBuf,
    },

    /// Work out the invoice VAT type for a deal
    MapVat {
        /// VAT type recorded when the seller confirmed
        #[arg(long)]
        confirmed: Option<String>,

        /// Operator's selling VAT type (VAT21, VAT0, Margin, Private)
        #[arg(long)]
        selling: Option<String>,

        /// Buyer country
        #[arg(long)]
        buyer_country: Option<String>,

        /// Buyer VAT identifier
        #[arg(long)]
        buyer_vat_id: Option<String>,
    },
}
