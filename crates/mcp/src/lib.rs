//! MCP tool server. Each tool consults the rate limiter, then forwards to the
//! trading service and returns its result as JSON.

pub mod tools;

pub use tools::{MarketOpenParams, TradingTools};
