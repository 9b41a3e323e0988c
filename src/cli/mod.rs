//! CLI module for DealDesk

pub mod app;
pub mod commands;

pub use app::{DealDesk, EndpointReply};
pub use commands::{Cli, Commands};
