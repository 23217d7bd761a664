use alloy::primitives::Address;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Perp prices may carry at most this many decimals minus the asset's size decimals.
pub const MAX_PERP_DECIMALS: u32 = 6;
/// Prices are limited to five significant figures.
pub const PRICE_SIG_FIGS: u32 = 5;

// ---------------------------------------------------------------------------
// Info requests (POST /info)
// ---------------------------------------------------------------------------

/// Read-only queries sent to the info endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    /// Margin summary and open positions for a user.
    ClearinghouseState { user: Address },
    /// Resting orders for a user.
    OpenOrders { user: Address },
    /// Perp universe metadata.
    Meta,
    /// Mid price for every coin.
    AllMids,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: String,
    pub total_margin_used: String,
    pub total_ntl_pos: String,
    pub total_raw_usd: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageInfo {
    #[serde(rename = "type")]
    pub type_string: String,
    pub value: u32,
    pub raw_usd: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub coin: String,
    pub entry_px: Option<String>,
    pub leverage: LeverageInfo,
    pub liquidation_px: Option<String>,
    pub margin_used: String,
    pub position_value: String,
    pub return_on_equity: String,
    /// Signed size: positive for long, negative for short.
    pub szi: String,
    pub unrealized_pnl: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: PositionData,
    #[serde(rename = "type")]
    pub type_string: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    pub asset_positions: Vec<AssetPosition>,
    pub cross_margin_summary: MarginSummary,
    pub margin_summary: MarginSummary,
    pub withdrawable: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderResponse {
    pub coin: String,
    pub limit_px: String,
    pub oid: u64,
    /// "B" for bids, "A" for asks.
    pub side: String,
    pub sz: String,
    pub timestamp: u64,
    pub cloid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    pub sz_decimals: u32,
    #[serde(default = "default_max_leverage")]
    pub max_leverage: u32,
    #[serde(default)]
    pub only_isolated: bool,
    #[serde(default)]
    pub is_delisted: bool,
}

fn default_max_leverage() -> u32 {
    hypergate_core::MAX_LEVERAGE
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

// ---------------------------------------------------------------------------
// Exchange actions (POST /exchange)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitWire {
    pub tif: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderTypeWire {
    Limit(LimitWire),
}

impl OrderTypeWire {
    /// Immediate-or-cancel: fills what it can at the limit, cancels the rest.
    pub fn ioc() -> Self {
        OrderTypeWire::Limit(LimitWire {
            tif: "Ioc".to_string(),
        })
    }
}

/// A single order in wire format. Field names are the exchange's short keys
/// and their order is part of the signed msgpack payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    #[serde(rename = "p")]
    pub limit_px: String,
    #[serde(rename = "s")]
    pub sz: String,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOrder {
    pub orders: Vec<OrderWire>,
    pub grouping: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeverage {
    pub asset: u32,
    pub is_cross: bool,
    pub leverage: u32,
}

/// L1 actions this adapter signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExchangeAction {
    Order(BulkOrder),
    UpdateLeverage(UpdateLeverage),
}

// ---------------------------------------------------------------------------
// Exchange responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", content = "response", rename_all = "camelCase")]
pub enum ExchangeResponseStatus {
    Ok(ExchangeResponse),
    Err(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    #[serde(rename = "type")]
    pub response_type: String,
    pub data: Option<ExchangeData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeData {
    pub statuses: Vec<ExchangeOrderStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledOrder {
    pub total_sz: String,
    pub avg_px: String,
    pub oid: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestingOrder {
    pub oid: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExchangeOrderStatus {
    Filled(FilledOrder),
    Resting(RestingOrder),
    Error(String),
    Success,
    WaitingForFill,
    WaitingForTrigger,
}

// ---------------------------------------------------------------------------
// Number formatting
// ---------------------------------------------------------------------------

/// Round a price to five significant figures and the asset's price decimals.
pub fn round_price(px: Decimal, sz_decimals: u32) -> Decimal {
    let max_dp = MAX_PERP_DECIMALS.saturating_sub(sz_decimals);
    px.round_sf(PRICE_SIG_FIGS)
        .unwrap_or(px)
        .round_dp(max_dp)
        .normalize()
}

/// Round a size down to the asset's size decimals.
pub fn round_size(sz: Decimal, sz_decimals: u32) -> Decimal {
    sz.round_dp_with_strategy(sz_decimals, RoundingStrategy::ToZero)
        .normalize()
}

/// Aggressive limit price for a market order: through the mid by `slippage`.
/// `None` if the price does not fit in a `Decimal`.
pub fn slippage_price(
    mid: Decimal,
    is_buy: bool,
    slippage: Decimal,
    sz_decimals: u32,
) -> Option<Decimal> {
    let factor = if is_buy {
        Decimal::ONE.checked_add(slippage)?
    } else {
        Decimal::ONE.checked_sub(slippage)?
    };
    mid.checked_mul(factor)
        .map(|px| round_price(px, sz_decimals))
}

/// Decimal string without trailing zeros, as the exchange hashes it.
pub fn to_wire(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_info_request_shapes() {
        let meta = serde_json::to_value(InfoRequest::Meta).unwrap();
        assert_eq!(meta, serde_json::json!({"type": "meta"}));

        let mids = serde_json::to_value(InfoRequest::AllMids).unwrap();
        assert_eq!(mids, serde_json::json!({"type": "allMids"}));

        let orders = serde_json::to_value(InfoRequest::OpenOrders {
            user: Address::ZERO,
        })
        .unwrap();
        assert_eq!(orders["type"], "openOrders");
        assert!(orders["user"].as_str().unwrap().starts_with("0x"));

        let state = serde_json::to_value(InfoRequest::ClearinghouseState {
            user: Address::ZERO,
        })
        .unwrap();
        assert_eq!(state["type"], "clearinghouseState");
    }

    #[test]
    fn test_order_action_wire_format() {
        let action = ExchangeAction::Order(BulkOrder {
            orders: vec![OrderWire {
                asset: 4,
                is_buy: true,
                limit_px: "1891.4".to_string(),
                sz: "0.02".to_string(),
                reduce_only: false,
                order_type: OrderTypeWire::ioc(),
                cloid: None,
            }],
            grouping: "na".to_string(),
        });

        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(
            json,
            r#"{"type":"order","orders":[{"a":4,"b":true,"p":"1891.4","s":"0.02","r":false,"t":{"limit":{"tif":"Ioc"}}}],"grouping":"na"}"#
        );
    }

    #[test]
    fn test_update_leverage_wire_format() {
        let action = ExchangeAction::UpdateLeverage(UpdateLeverage {
            asset: 0,
            is_cross: true,
            leverage: 10,
        });
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(
            json,
            r#"{"type":"updateLeverage","asset":0,"isCross":true,"leverage":10}"#
        );
    }

    #[test]
    fn test_exchange_response_parsing() {
        let filled: ExchangeResponseStatus = serde_json::from_str(
            r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"filled":{"totalSz":"0.02","avgPx":"1891.4","oid":77738308}}]}}}"#,
        )
        .unwrap();
        match filled {
            ExchangeResponseStatus::Ok(resp) => {
                let statuses = resp.data.unwrap().statuses;
                assert!(matches!(&statuses[0], ExchangeOrderStatus::Filled(f) if f.oid == 77738308));
            }
            other => panic!("Expected ok response, got {:?}", other),
        }

        let rejected: ExchangeResponseStatus =
            serde_json::from_str(r#"{"status":"err","response":"Insufficient margin"}"#).unwrap();
        assert!(matches!(rejected, ExchangeResponseStatus::Err(msg) if msg == "Insufficient margin"));

        let leverage: ExchangeResponseStatus =
            serde_json::from_str(r#"{"status":"ok","response":{"type":"default"}}"#).unwrap();
        assert!(matches!(leverage, ExchangeResponseStatus::Ok(r) if r.data.is_none()));

        let error_status: ExchangeResponseStatus = serde_json::from_str(
            r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"error":"Order could not immediately match"}]}}}"#,
        )
        .unwrap();
        match error_status {
            ExchangeResponseStatus::Ok(resp) => assert!(matches!(
                &resp.data.unwrap().statuses[0],
                ExchangeOrderStatus::Error(_)
            )),
            other => panic!("Expected ok response, got {:?}", other),
        }
    }

    #[test]
    fn test_meta_defaults() {
        let meta: Meta = serde_json::from_str(
            r#"{"universe":[{"name":"BTC","szDecimals":5,"maxLeverage":40},{"name":"XYZ","szDecimals":0}]}"#,
        )
        .unwrap();
        assert_eq!(meta.universe[0].max_leverage, 40);
        assert_eq!(meta.universe[1].max_leverage, 100);
        assert!(!meta.universe[1].only_isolated);
    }

    #[test]
    fn test_round_price() {
        assert_eq!(round_price(dec!(1891.4123), 4), dec!(1891.4));
        assert_eq!(round_price(dec!(97123.456), 5), dec!(97123));
        assert_eq!(round_price(dec!(0.000123456), 0), dec!(0.000123));
        assert_eq!(round_price(dec!(2.123456), 1), dec!(2.1235));
    }

    #[test]
    fn test_round_size_truncates() {
        assert_eq!(round_size(dec!(0.05299), 3), dec!(0.052));
        assert_eq!(round_size(dec!(12.9), 0), dec!(12));
        assert_eq!(round_size(dec!(0.0004), 3), dec!(0));
    }

    #[test]
    fn test_slippage_price() {
        assert_eq!(slippage_price(dec!(2000), true, dec!(0.05), 4), Some(dec!(2100)));
        assert_eq!(slippage_price(dec!(2000), false, dec!(0.05), 4), Some(dec!(1900)));
        assert_eq!(slippage_price(Decimal::MAX, true, dec!(0.05), 0), None);
    }

    #[test]
    fn test_to_wire_strips_trailing_zeros() {
        assert_eq!(to_wire(dec!(1.500)), "1.5");
        assert_eq!(to_wire(dec!(100)), "100");
        assert_eq!(to_wire(dec!(0.0200)), "0.02");
    }
}
