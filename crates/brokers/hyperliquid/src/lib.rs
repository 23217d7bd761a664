//! Hyperliquid perpetuals adapter.
//!
//! Implements the hypergate `TradingService` against the Hyperliquid REST API:
//! account reads through the info endpoint, market orders as signed IOC
//! limit orders through the exchange endpoint.

pub mod client;
pub mod protocol;
pub mod service;
pub mod signing;

pub use client::{HttpClient, MAINNET_API_URL, TESTNET_API_URL};
pub use service::HyperliquidService;
