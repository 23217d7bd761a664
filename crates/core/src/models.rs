use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Order / position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" | "b" => Ok(Side::Buy),
            "sell" | "short" | "a" | "s" => Ok(Side::Sell),
            other => Err(format!("invalid side '{}', expected 'buy' or 'sell'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Snapshot of the trading account's margin state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Total account value (collateral + unrealized PnL).
    pub account_value: Decimal,
    pub total_margin_used: Decimal,
    /// Sum of absolute notional across open positions.
    pub total_notional_position: Decimal,
    /// Amount that can be withdrawn / used to open new positions.
    pub withdrawable: Decimal,
    pub cross_account_value: Decimal,
}

impl AccountBalance {
    /// Buying power is what the exchange reports as withdrawable.
    pub fn buying_power(&self) -> Decimal {
        self.withdrawable
    }

    pub fn margin_utilization(&self) -> Decimal {
        if self.account_value.is_zero() {
            Decimal::ZERO
        } else {
            self.total_margin_used / self.account_value
        }
    }
}

// ---------------------------------------------------------------------------
// Positions & orders
// ---------------------------------------------------------------------------

/// A currently open perpetual position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub coin: String,
    pub side: Side,
    /// Absolute position size in coin units.
    pub size: Decimal,
    pub entry_price: Option<Decimal>,
    pub position_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub return_on_equity: Decimal,
    pub leverage: u32,
    pub liquidation_price: Option<Decimal>,
    pub margin_used: Decimal,
}

/// A resting order on the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub coin: String,
    pub side: Side,
    pub limit_price: Decimal,
    pub size: Decimal,
    pub order_id: u64,
    /// Placement time in epoch milliseconds.
    pub timestamp: u64,
    pub client_order_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Market orders
// ---------------------------------------------------------------------------

pub const DEFAULT_SLIPPAGE_TOLERANCE: f64 = 0.05;
pub const MAX_LEVERAGE: u32 = 100;

/// Parameters for opening a position at market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOpenRequest {
    /// Trading symbol (e.g. "BTC", "ETH").
    pub symbol: String,
    pub side: Side,
    /// Position size in USD notional.
    pub size_in_dollars: Decimal,
    /// Optional leverage (1-100), applied as cross leverage before the order.
    pub leverage: Option<u32>,
    pub reduce_only: bool,
    /// Maximum acceptable slippage as a fraction (0.05 = 5%).
    pub slippage_tolerance: Decimal,
}

impl MarketOpenRequest {
    pub fn new(symbol: &str, side: Side, size_in_dollars: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            size_in_dollars,
            leverage: None,
            reduce_only: false,
            slippage_tolerance: Decimal::new(5, 2),
        }
    }

    /// Exchange coins are upper-case tickers.
    pub fn coin(&self) -> String {
        self.symbol.trim().to_ascii_uppercase()
    }

    /// Check the parameters that do not depend on exchange metadata.
    pub fn validate(&self) -> Result<(), String> {
        if self.coin().is_empty() {
            return Err("symbol must not be empty".to_string());
        }
        if self.size_in_dollars <= Decimal::ZERO {
            return Err(format!(
                "size_in_dollars must be positive, got {}",
                self.size_in_dollars
            ));
        }
        if self.slippage_tolerance <= Decimal::ZERO || self.slippage_tolerance >= Decimal::ONE {
            return Err(format!(
                "slippage_tolerance must be between 0 and 1, got {}",
                self.slippage_tolerance
            ));
        }
        if let Some(leverage) = self.leverage {
            if leverage == 0 || leverage > MAX_LEVERAGE {
                return Err(format!(
                    "leverage must be between 1 and {}, got {}",
                    MAX_LEVERAGE, leverage
                ));
            }
        }
        Ok(())
    }
}

/// Outcome of a market order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOutcome {
    Filled,
    Resting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub status: OrderOutcome,
    pub coin: String,
    pub side: Side,
    pub requested_size: Decimal,
    pub filled_size: Decimal,
    pub average_price: Option<Decimal>,
    pub limit_price: Decimal,
    pub order_id: u64,
    pub client_order_id: Option<String>,
    pub reduce_only: bool,
    pub leverage: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_parsing_accepts_aliases() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("long".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" sell ".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!("short".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
    }

    #[test]
    fn test_market_request_validation() {
        let mut req = MarketOpenRequest::new("eth", Side::Buy, dec!(100));
        assert!(req.validate().is_ok());
        assert_eq!(req.coin(), "ETH");

        req.leverage = Some(101);
        assert!(req.validate().unwrap_err().contains("leverage"));

        req.leverage = Some(10);
        req.slippage_tolerance = dec!(1.5);
        assert!(req.validate().unwrap_err().contains("slippage"));

        req.slippage_tolerance = dec!(0.01);
        req.size_in_dollars = dec!(0);
        assert!(req.validate().unwrap_err().contains("size_in_dollars"));
    }

    #[test]
    fn test_margin_utilization() {
        let balance = AccountBalance {
            account_value: dec!(1000),
            total_margin_used: dec!(250),
            total_notional_position: dec!(2500),
            withdrawable: dec!(750),
            cross_account_value: dec!(1000),
        };
        assert_eq!(balance.margin_utilization(), dec!(0.25));
        assert_eq!(balance.buying_power(), dec!(750));
    }
}
