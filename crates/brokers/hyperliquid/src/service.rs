use crate::client::HttpClient;
use crate::protocol::*;
use crate::signing::{action_hash, serialize_signature, sign_l1_action};
use alloy::primitives::{Address, Signature};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use chrono::Utc;
use hypergate_core::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

/// Signed request body for the exchange endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangePayload {
    action: serde_json::Value,
    nonce: u64,
    #[serde(serialize_with = "serialize_signature")]
    signature: Signature,
    vault_address: Option<Address>,
}

/// Coin name to (asset index, metadata).
#[derive(Debug, Clone)]
pub struct AssetIndex {
    assets: HashMap<String, (u32, AssetMeta)>,
}

impl AssetIndex {
    pub fn from_meta(meta: Meta) -> Self {
        let assets = meta
            .universe
            .into_iter()
            .enumerate()
            .map(|(idx, asset)| (asset.name.clone(), (idx as u32, asset)))
            .collect();
        Self { assets }
    }

    pub fn lookup(&self, coin: &str) -> Result<(u32, &AssetMeta), TradingError> {
        match self.assets.get(coin) {
            Some((_, asset)) if asset.is_delisted => {
                Err(TradingError::UnknownAsset(format!("{} is delisted", coin)))
            }
            Some((idx, asset)) => Ok((*idx, asset)),
            None => Err(TradingError::UnknownAsset(coin.to_string())),
        }
    }
}

/// Hyperliquid perpetuals adapter.
///
/// Reads go to the public info endpoint for the configured account. Orders
/// are signed locally and posted to the exchange endpoint. Perp metadata is
/// fetched on the first order and cached for the life of the process.
pub struct HyperliquidService {
    http: HttpClient,
    wallet: PrivateKeySigner,
    account: Address,
    assets: OnceCell<AssetIndex>,
}

impl fmt::Debug for HyperliquidService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperliquidService")
            .field("base_url", &self.http.base_url())
            .field("wallet", &"<redacted>")
            .field("account", &self.account)
            .finish()
    }
}

impl HyperliquidService {
    pub fn new(credentials: &TradingCredentials) -> Result<Self, TradingError> {
        Self::with_client(credentials, HttpClient::for_network(credentials.testnet))
    }

    pub fn with_client(
        credentials: &TradingCredentials,
        http: HttpClient,
    ) -> Result<Self, TradingError> {
        let wallet = PrivateKeySigner::from_str(&credentials.private_key)
            .map_err(|e| TradingError::Signing(format!("invalid private key: {}", e)))?;

        let account = match &credentials.account_address {
            Some(address) => Address::from_str(address).map_err(|e| {
                TradingError::InvalidRequest(format!("invalid account address {}: {}", address, e))
            })?,
            None => wallet.address(),
        };

        info!(
            account = %account,
            api = %http.base_url(),
            "Hyperliquid service initialized"
        );

        Ok(Self {
            http,
            wallet,
            account,
            assets: OnceCell::new(),
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    async fn info<R: serde::de::DeserializeOwned>(
        &self,
        request: &InfoRequest,
    ) -> Result<R, TradingError> {
        self.http.post("/info", request).await
    }

    async fn clearinghouse_state(&self) -> Result<ClearinghouseState, TradingError> {
        self.info(&InfoRequest::ClearinghouseState { user: self.account })
            .await
    }

    async fn asset_index(&self) -> Result<&AssetIndex, TradingError> {
        self.assets
            .get_or_try_init(|| async {
                let meta: Meta = self.info(&InfoRequest::Meta).await?;
                info!(assets = meta.universe.len(), "Loaded perp metadata");
                Ok(AssetIndex::from_meta(meta))
            })
            .await
    }

    async fn mid_price(&self, coin: &str) -> Result<Decimal, TradingError> {
        let mids: HashMap<String, String> = self.info(&InfoRequest::AllMids).await?;
        let mid = mids
            .get(coin)
            .ok_or_else(|| TradingError::UnknownAsset(format!("no mid price for {}", coin)))?;
        parse_decimal("mid", mid)
    }

    /// Sign `action` and post it, returning the exchange's response body.
    async fn execute(&self, action: ExchangeAction) -> Result<ExchangeResponse, TradingError> {
        let nonce = Utc::now().timestamp_millis() as u64;
        let connection_id = action_hash(&action, nonce, None)?;
        let signature = sign_l1_action(&self.wallet, connection_id, self.http.is_mainnet())?;

        let payload = ExchangePayload {
            action: serde_json::to_value(&action)
                .map_err(|e| TradingError::Decode(e.to_string()))?,
            nonce,
            signature,
            vault_address: None,
        };

        match self.http.post("/exchange", &payload).await? {
            ExchangeResponseStatus::Ok(response) => Ok(response),
            ExchangeResponseStatus::Err(message) => Err(TradingError::Rejected(message)),
        }
    }

    async fn update_leverage(
        &self,
        asset: u32,
        leverage: u32,
        is_cross: bool,
    ) -> Result<(), TradingError> {
        self.execute(ExchangeAction::UpdateLeverage(UpdateLeverage {
            asset,
            is_cross,
            leverage,
        }))
        .await?;
        info!(asset, leverage, is_cross, "Leverage updated");
        Ok(())
    }
}

#[async_trait]
impl TradingService for HyperliquidService {
    async fn account_balance(&self) -> Result<AccountBalance, TradingError> {
        balance_from_state(&self.clearinghouse_state().await?)
    }

    async fn open_positions(&self) -> Result<Vec<PositionSummary>, TradingError> {
        positions_from_state(&self.clearinghouse_state().await?)
    }

    async fn open_orders(&self) -> Result<Vec<OpenOrder>, TradingError> {
        let orders: Vec<OpenOrderResponse> = self
            .info(&InfoRequest::OpenOrders { user: self.account })
            .await?;
        orders.iter().map(open_order_from_response).collect()
    }

    async fn market_open_position(
        &self,
        request: MarketOpenRequest,
    ) -> Result<OrderResult, TradingError> {
        request.validate().map_err(TradingError::InvalidRequest)?;

        let coin = request.coin();
        let (asset, meta) = self.asset_index().await?.lookup(&coin)?;

        if let Some(leverage) = request.leverage {
            if leverage > meta.max_leverage {
                return Err(TradingError::InvalidRequest(format!(
                    "leverage {} exceeds the {}x maximum for {}",
                    leverage, meta.max_leverage, coin
                )));
            }
        }

        // Nothing is sent to the exchange until the order is known to be valid.
        let mid = self.mid_price(&coin).await?;
        let plan = plan_market_order(&request, mid, meta.sz_decimals)?;

        if let Some(leverage) = request.leverage {
            self.update_leverage(asset, leverage, !meta.only_isolated)
                .await?;
        }
        let cloid = format!("0x{}", Uuid::new_v4().simple());

        info!(
            coin = %coin,
            side = %request.side,
            size = %plan.size,
            limit_px = %plan.limit_price,
            reduce_only = request.reduce_only,
            "Submitting market order"
        );

        let response = self
            .execute(ExchangeAction::Order(BulkOrder {
                orders: vec![OrderWire {
                    asset,
                    is_buy: request.side.is_buy(),
                    limit_px: to_wire(plan.limit_price),
                    sz: to_wire(plan.size),
                    reduce_only: request.reduce_only,
                    order_type: OrderTypeWire::ioc(),
                    cloid: Some(cloid.clone()),
                }],
                grouping: "na".to_string(),
            }))
            .await?;

        let status = response
            .data
            .and_then(|data| data.statuses.into_iter().next())
            .ok_or_else(|| TradingError::Decode("order response had no status".to_string()))?;

        order_result_from_status(status, &request, &plan, cloid)
    }
}

// ---------------------------------------------------------------------------
// Response mapping
// ---------------------------------------------------------------------------

/// Size and aggressive limit price for a market order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrderPlan {
    pub size: Decimal,
    pub limit_price: Decimal,
}

pub fn plan_market_order(
    request: &MarketOpenRequest,
    mid: Decimal,
    sz_decimals: u32,
) -> Result<MarketOrderPlan, TradingError> {
    if mid <= Decimal::ZERO {
        return Err(TradingError::Decode(format!(
            "invalid mid price {} for {}",
            mid,
            request.coin()
        )));
    }

    let notional_size = request.size_in_dollars.checked_div(mid).ok_or_else(|| {
        TradingError::InvalidRequest(format!(
            "${} is too large to size against {} at {}",
            request.size_in_dollars,
            request.coin(),
            mid
        ))
    })?;

    let size = round_size(notional_size, sz_decimals);
    if size.is_zero() {
        return Err(TradingError::InvalidRequest(format!(
            "${} is below the minimum size for {} at {}",
            request.size_in_dollars,
            request.coin(),
            mid
        )));
    }

    let limit_price = slippage_price(
        mid,
        request.side.is_buy(),
        request.slippage_tolerance,
        sz_decimals,
    )
    .ok_or_else(|| {
        TradingError::InvalidRequest(format!(
            "slippage price for {} at {} is out of range",
            request.coin(),
            mid
        ))
    })?;

    Ok(MarketOrderPlan { size, limit_price })
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, TradingError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| TradingError::Decode(format!("{} '{}': {}", field, value, e)))
}

fn parse_optional(field: &str, value: Option<&String>) -> Result<Option<Decimal>, TradingError> {
    value.map(|v| parse_decimal(field, v)).transpose()
}

pub fn balance_from_state(state: &ClearinghouseState) -> Result<AccountBalance, TradingError> {
    Ok(AccountBalance {
        account_value: parse_decimal("accountValue", &state.margin_summary.account_value)?,
        total_margin_used: parse_decimal(
            "totalMarginUsed",
            &state.margin_summary.total_margin_used,
        )?,
        total_notional_position: parse_decimal("totalNtlPos", &state.margin_summary.total_ntl_pos)?,
        withdrawable: parse_decimal("withdrawable", &state.withdrawable)?,
        cross_account_value: parse_decimal(
            "crossAccountValue",
            &state.cross_margin_summary.account_value,
        )?,
    })
}

pub fn positions_from_state(
    state: &ClearinghouseState,
) -> Result<Vec<PositionSummary>, TradingError> {
    let mut positions = Vec::with_capacity(state.asset_positions.len());
    for asset_position in &state.asset_positions {
        let p = &asset_position.position;
        let szi = parse_decimal("szi", &p.szi)?;
        if szi.is_zero() {
            continue;
        }
        positions.push(PositionSummary {
            coin: p.coin.clone(),
            side: if szi > Decimal::ZERO { Side::Buy } else { Side::Sell },
            size: szi.abs(),
            entry_price: parse_optional("entryPx", p.entry_px.as_ref())?,
            position_value: parse_decimal("positionValue", &p.position_value)?,
            unrealized_pnl: parse_decimal("unrealizedPnl", &p.unrealized_pnl)?,
            return_on_equity: parse_decimal("returnOnEquity", &p.return_on_equity)?,
            leverage: p.leverage.value,
            liquidation_price: parse_optional("liquidationPx", p.liquidation_px.as_ref())?,
            margin_used: parse_decimal("marginUsed", &p.margin_used)?,
        });
    }
    Ok(positions)
}

pub fn open_order_from_response(order: &OpenOrderResponse) -> Result<OpenOrder, TradingError> {
    Ok(OpenOrder {
        coin: order.coin.clone(),
        side: Side::from_str(&order.side).map_err(TradingError::Decode)?,
        limit_price: parse_decimal("limitPx", &order.limit_px)?,
        size: parse_decimal("sz", &order.sz)?,
        order_id: order.oid,
        timestamp: order.timestamp,
        client_order_id: order.cloid.clone(),
    })
}

pub fn order_result_from_status(
    status: ExchangeOrderStatus,
    request: &MarketOpenRequest,
    plan: &MarketOrderPlan,
    cloid: String,
) -> Result<OrderResult, TradingError> {
    let (outcome, filled_size, average_price, order_id) = match status {
        ExchangeOrderStatus::Filled(filled) => (
            OrderOutcome::Filled,
            parse_decimal("totalSz", &filled.total_sz)?,
            Some(parse_decimal("avgPx", &filled.avg_px)?),
            filled.oid,
        ),
        ExchangeOrderStatus::Resting(resting) => {
            warn!(oid = resting.oid, "IOC market order reported as resting");
            (OrderOutcome::Resting, Decimal::ZERO, None, resting.oid)
        }
        ExchangeOrderStatus::Error(message) => return Err(TradingError::Rejected(message)),
        other => {
            return Err(TradingError::Decode(format!(
                "unexpected order status {:?}",
                other
            )))
        }
    };

    Ok(OrderResult {
        status: outcome,
        coin: request.coin(),
        side: request.side,
        requested_size: plan.size,
        filled_size,
        average_price,
        limit_price: plan.limit_price,
        order_id,
        client_order_id: Some(cloid),
        reduce_only: request.reduce_only,
        leverage: request.leverage,
    })
}
