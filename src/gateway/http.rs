//! JSON bridge client for the settlement program.
//!
//! The bridge owns the signing key and the on-ledger account layout; this
//! client only speaks its `{"method", "params"}` envelope over HTTP.

use super::{
    AddressDeriver, GatewayError, LedgerGateway, LiquidationState, PoolInfo, ProfitAndLoss,
    ValuationOracle,
};
use crate::domain::{Address, Amount, Permissions, PoolName, Position, PositionKey, Side, TxId};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger gateway backed by the settlement bridge's `/rpc` endpoint.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    client: Client,
    base_url: String,
    deriver: AddressDeriver,
    retry_budget: Duration,
}

impl HttpLedgerClient {
    pub fn new(base_url: String, deriver: AddressDeriver, call_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(call_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            deriver,
            retry_budget: call_timeout,
        }
    }

    /// Read call: transient failures are retried within the call budget.
    async fn read(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_budget),
            ..Default::default()
        };

        retry(backoff, || async {
            self.post(method, &params).await.map_err(|e| {
                if e.is_transient() {
                    debug!(method, error = %e, "Transient bridge error, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }

    /// Write call: submitted exactly once.
    async fn submit(&self, method: &str, params: Value) -> Result<TxId, GatewayError> {
        let result = self.post(method, &params).await?;
        result
            .as_str()
            .map(TxId::new)
            .ok_or_else(|| GatewayError::Parse(format!("{}: expected signature string", method)))
    }

    async fn post(&self, method: &str, params: &Value) -> Result<Value, GatewayError> {
        let url = format!("{}/rpc", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "method": method, "params": params }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout {
                        after_ms: self.retry_budget.as_millis() as u64,
                    }
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = if status.is_server_error() {
                "Server error"
            } else {
                "Client error"
            };
            return Err(GatewayError::Http {
                status: status.as_u16(),
                message: message.to_string(),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        unwrap_envelope(body)
    }

    fn key_params(key: &PositionKey) -> Value {
        json!({
            "owner": key.owner,
            "pool": key.pool,
            "custody": key.custody,
            "side": key.side,
        })
    }
}

#[async_trait]
impl LedgerGateway for HttpLedgerClient {
    fn custody_address(&self, pool: &Address, mint: &Address) -> Address {
        self.deriver.custody(pool, mint)
    }

    fn position_address(&self, key: &PositionKey) -> Address {
        self.deriver.position(key)
    }

    async fn list_positions(
        &self,
        pool: &Address,
        custody: &Address,
    ) -> Result<Vec<Position>, GatewayError> {
        let response = self
            .read("listPositions", json!({ "pool": pool, "custody": custody }))
            .await?;
        parse_positions(&response)
    }

    async fn position_exists(&self, position: &Address) -> Result<bool, GatewayError> {
        let response = self
            .read("positionExists", json!({ "position": position }))
            .await?;
        response
            .as_bool()
            .ok_or_else(|| GatewayError::Parse("Expected boolean response".to_string()))
    }

    async fn get_permissions(&self) -> Result<Permissions, GatewayError> {
        let response = self.read("getPermissions", json!({})).await?;
        serde_json::from_value(response).map_err(|e| GatewayError::Parse(e.to_string()))
    }

    async fn get_pool(&self, name: &PoolName) -> Result<PoolInfo, GatewayError> {
        let response = self.read("getPool", json!({ "name": name })).await?;
        if response.is_null() {
            return Err(GatewayError::NotFound(format!("pool {}", name)));
        }
        serde_json::from_value(response).map_err(|e| GatewayError::Parse(e.to_string()))
    }

    async fn receiving_account(
        &self,
        owner: &Address,
        mint: &Address,
    ) -> Result<Address, GatewayError> {
        let response = self
            .read(
                "getOrCreateTokenAccount",
                json!({ "owner": owner, "mint": mint }),
            )
            .await?;
        parse_address(&response, "tokenAccount")
    }

    async fn liquidate(
        &self,
        key: &PositionKey,
        receiving_account: &Address,
        reward_account: &Address,
    ) -> Result<TxId, GatewayError> {
        let mut params = Self::key_params(key);
        params["receivingAccount"] = json!(receiving_account);
        params["rewardsReceivingAccount"] = json!(reward_account);
        self.submit("liquidate", params).await
    }

    async fn trigger(
        &self,
        key: &PositionKey,
        receiving_account: &Address,
        reward_account: &Address,
        price: Amount,
    ) -> Result<TxId, GatewayError> {
        let mut params = Self::key_params(key);
        params["receivingAccount"] = json!(receiving_account);
        params["rewardsReceivingAccount"] = json!(reward_account);
        params["price"] = json!(price);
        self.submit("triggerPosition", params).await
    }
}

#[async_trait]
impl ValuationOracle for HttpLedgerClient {
    async fn get_liquidation_state(
        &self,
        key: &PositionKey,
    ) -> Result<LiquidationState, GatewayError> {
        let response = self
            .read("getLiquidationState", Self::key_params(key))
            .await?;
        response
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .map(LiquidationState)
            .ok_or_else(|| GatewayError::Parse("Expected u8 liquidation state".to_string()))
    }

    async fn get_pnl(&self, key: &PositionKey) -> Result<ProfitAndLoss, GatewayError> {
        let response = self.read("getPnl", Self::key_params(key)).await?;
        Ok(ProfitAndLoss {
            profit: parse_amount_field(&response, "profit")?,
            loss: parse_amount_field(&response, "loss")?,
        })
    }

    async fn get_exit_price(&self, key: &PositionKey) -> Result<Amount, GatewayError> {
        let response = self
            .read("getExitPriceAndFee", Self::key_params(key))
            .await?;
        parse_amount_field(&response, "price")
    }
}

fn unwrap_envelope(body: Value) -> Result<Value, GatewayError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(GatewayError::Rejected { code, message });
    }
    body.get("result")
        .cloned()
        .ok_or_else(|| GatewayError::Parse("Missing result field".to_string()))
}

fn parse_address(value: &Value, field: &str) -> Result<Address, GatewayError> {
    let raw = value
        .as_str()
        .ok_or_else(|| GatewayError::Parse(format!("Missing {} field", field)))?;
    Address::parse(raw).map_err(|e| GatewayError::Parse(format!("Invalid {}: {}", field, e)))
}

/// Amounts arrive either as decimal strings or as raw integers.
fn parse_amount(value: &Value, field: &str) -> Result<Amount, GatewayError> {
    if let Some(units) = value.as_u64() {
        return Ok(Amount::from_units(units));
    }
    let raw = value
        .as_str()
        .ok_or_else(|| GatewayError::Parse(format!("Missing {} field", field)))?;
    Amount::from_str_canonical(raw)
        .map_err(|e| GatewayError::Parse(format!("Invalid {}: {}", field, e)))
}

fn parse_amount_field(obj: &Value, field: &str) -> Result<Amount, GatewayError> {
    parse_amount(obj.get(field).unwrap_or(&Value::Null), field)
}

fn parse_optional_amount(obj: &Value, field: &str) -> Result<Option<Amount>, GatewayError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_amount(v, field).map(Some),
    }
}

/// Every listed record must parse; a record the keeper cannot read would
/// otherwise vanish from the cycle counts.
fn parse_positions(response: &Value) -> Result<Vec<Position>, GatewayError> {
    let items = response
        .as_array()
        .ok_or_else(|| GatewayError::Parse("Expected array response".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            parse_position(item).map_err(|e| {
                warn!(index, error = %e, "Malformed position record");
                GatewayError::Parse(format!("position {}: {}", index, e))
            })
        })
        .collect()
}

fn parse_position(item: &Value) -> Result<Position, GatewayError> {
    let field_address = |field: &str| parse_address(item.get(field).unwrap_or(&Value::Null), field);

    let side_str = item
        .get("side")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::Parse("Missing side field".to_string()))?;
    let side = Side::parse(side_str)
        .ok_or_else(|| GatewayError::Parse(format!("Invalid side: {}", side_str)))?;

    Ok(Position {
        owner: field_address("owner")?,
        pool: field_address("pool")?,
        custody: field_address("custody")?,
        side,
        open_time: item.get("openTime").and_then(|v| v.as_i64()).unwrap_or(0),
        update_time: item.get("updateTime").and_then(|v| v.as_i64()).unwrap_or(0),
        price: parse_amount_field(item, "price")?,
        size_usd: parse_amount_field(item, "sizeUsd")?,
        collateral_usd: parse_amount_field(item, "collateralUsd")?,
        collateral_amount: parse_amount_field(item, "collateralAmount")?,
        stop_loss: parse_optional_amount(item, "stopLoss")?,
        take_profit: parse_optional_amount(item, "takeProfit")?,
    })
}
