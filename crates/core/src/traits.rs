use crate::models::*;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Trading Service Trait
// ---------------------------------------------------------------------------

/// Errors that can occur during trading operations.
#[derive(Debug, thiserror::Error)]
pub enum TradingError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),
    #[error("Order rejected: {0}")]
    Rejected(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Signing error: {0}")]
    Signing(String),
}

/// The exchange-facing service that every tool call is forwarded to.
#[async_trait]
pub trait TradingService: Send + Sync {
    /// Current account balance and buying power.
    async fn account_balance(&self) -> Result<AccountBalance, TradingError>;

    /// All open positions with current PnL.
    async fn open_positions(&self) -> Result<Vec<PositionSummary>, TradingError>;

    /// All resting orders.
    async fn open_orders(&self) -> Result<Vec<OpenOrder>, TradingError>;

    /// Open (or reduce) a position at market.
    async fn market_open_position(
        &self,
        request: MarketOpenRequest,
    ) -> Result<OrderResult, TradingError>;
}
