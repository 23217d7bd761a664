use hypergate_admission::{AdmissionError, RateLimiter, GLOBAL_CLIENT_ID};
use hypergate_core::{
    MarketOpenRequest, Side, TradingError, TradingService, DEFAULT_SLIPPAGE_TOLERANCE,
};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

const INSTRUCTIONS: &str = "Hyperliquid trading tools. Read the account balance, open positions \
and open orders, or open a position at market with a dollar size.";

/// Arguments for `market_open_position`.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct MarketOpenParams {
    /// Coin to trade, e.g. "BTC" or "ETH".
    pub symbol: String,
    /// "buy"/"long" or "sell"/"short".
    pub side: String,
    /// Position size in USD notional.
    pub size_in_dollars: f64,
    /// Leverage to set on the asset before the order is sent.
    #[serde(default)]
    pub leverage: Option<u32>,
    #[serde(default)]
    pub reduce_only: bool,
    /// Maximum price deviation from mid, as a fraction (0.05 = 5%).
    #[serde(default = "default_slippage")]
    pub slippage_tolerance: f64,
}

fn default_slippage() -> f64 {
    DEFAULT_SLIPPAGE_TOLERANCE
}

impl MarketOpenParams {
    pub fn into_request(self) -> Result<MarketOpenRequest, String> {
        let side = Side::from_str(&self.side)?;
        let size_in_dollars = Decimal::try_from(self.size_in_dollars)
            .map_err(|e| format!("invalid size_in_dollars {}: {}", self.size_in_dollars, e))?;
        let slippage_tolerance = Decimal::try_from(self.slippage_tolerance).map_err(|e| {
            format!(
                "invalid slippage_tolerance {}: {}",
                self.slippage_tolerance, e
            )
        })?;

        let mut request = MarketOpenRequest::new(&self.symbol, side, size_in_dollars);
        request.leverage = self.leverage;
        request.reduce_only = self.reduce_only;
        request.slippage_tolerance = slippage_tolerance;
        request.validate()?;
        Ok(request)
    }
}

/// MCP server exposing the trading tools.
///
/// Every call is checked against the rate limiter under one shared identity
/// before it reaches the trading service.
#[derive(Clone)]
pub struct TradingTools {
    service: Arc<dyn TradingService>,
    limiter: RateLimiter,
    identity: String,
    tool_router: ToolRouter<Self>,
}

impl TradingTools {
    pub fn new(service: Arc<dyn TradingService>, limiter: RateLimiter) -> Self {
        Self {
            service,
            limiter,
            identity: GLOBAL_CLIENT_ID.to_string(),
            tool_router: Self::tool_router(),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// `Some(result)` when the call must be answered with a rate-limit error.
    fn admit(&self, tool: &'static str) -> Result<Option<CallToolResult>, McpError> {
        match self.limiter.check(&self.identity) {
            Ok(()) => Ok(None),
            Err(rejection) => {
                warn!(tool, identity = %self.identity, "Rate limit exceeded");
                rate_limited(&rejection).map(Some)
            }
        }
    }
}

fn rate_limited(rejection: &AdmissionError) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::json(
        serde_json::json!({ "error": rejection.to_string() }),
    )?]))
}

fn respond<T: Serialize>(
    tool: &'static str,
    result: Result<T, TradingError>,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => Ok(CallToolResult::success(vec![Content::json(value)?])),
        Err(e) => {
            error!(tool, error = %e, "Trading service call failed");
            Err(McpError::internal_error(e.to_string(), None))
        }
    }
}

#[tool_router]
impl TradingTools {
    #[tool(description = "Get the account balance: account value, margin used and withdrawable funds")]
    async fn get_account_balance(&self) -> Result<CallToolResult, McpError> {
        if let Some(rejected) = self.admit("get_account_balance")? {
            return Ok(rejected);
        }
        respond("get_account_balance", self.service.account_balance().await)
    }

    #[tool(description = "List open perpetual positions with size, entry price and unrealized PnL")]
    async fn get_open_positions(&self) -> Result<CallToolResult, McpError> {
        if let Some(rejected) = self.admit("get_open_positions")? {
            return Ok(rejected);
        }
        respond("get_open_positions", self.service.open_positions().await)
    }

    #[tool(description = "List resting orders")]
    async fn get_open_orders(&self) -> Result<CallToolResult, McpError> {
        if let Some(rejected) = self.admit("get_open_orders")? {
            return Ok(rejected);
        }
        respond("get_open_orders", self.service.open_orders().await)
    }

    #[tool(description = "Open a position at market, sized in USD, with optional leverage and slippage tolerance")]
    async fn market_open_position(
        &self,
        Parameters(params): Parameters<MarketOpenParams>,
    ) -> Result<CallToolResult, McpError> {
        if let Some(rejected) = self.admit("market_open_position")? {
            return Ok(rejected);
        }

        let request = params
            .into_request()
            .map_err(|message| McpError::invalid_params(message, None))?;

        info!(
            symbol = %request.coin(),
            side = %request.side,
            size_in_dollars = %request.size_in_dollars,
            leverage = ?request.leverage,
            "market_open_position"
        );
        respond(
            "market_open_position",
            self.service.market_open_position(request).await,
        )
    }
}

#[tool_handler]
impl ServerHandler for TradingTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}
