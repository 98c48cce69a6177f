// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP LEDGER CLIENT
//
// Talks to a node's JSON API. Every response is an envelope
//   {"status": "success", ...}  or  {"status": "error", "msg": "..."}
// Read-only contract functions go through /call-readonly, token balances
// through /token/:contract/balance/:holder, submissions through
// /call-contract with their post-conditions attached.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::config::ClientConfig;
use crate::ledger::{LedgerError, StreamLedger, TxReceipt};
use async_trait::async_trait;
use serde_json::{json, Value};
use streampay_core::{CallArg, ContractCall, StreamContract, StreamId, StreamRecord};

#[derive(Debug, Clone)]
pub struct RpcLedger {
    client: reqwest::Client,
    rpc: String,
    target: StreamContract,
}

impl RpcLedger {
    pub fn new(config: &ClientConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            rpc: config.rpc_url.trim_end_matches('/').to_string(),
            target: config.stream_contract(),
        })
    }

    pub fn target(&self) -> &StreamContract {
        &self.target
    }

    async fn call_readonly(&self, function: &str, args: Vec<CallArg>) -> Result<Value, LedgerError> {
        let url = format!("{}/call-readonly", self.rpc);
        let payload = json!({
            "contract_address": self.target.contract,
            "function": function,
            "args": args,
            "sender": self.target.contract,
        });
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;
        let mut data = envelope(resp).await?;
        Ok(data["result"].take())
    }
}

fn transport(e: reqwest::Error) -> LedgerError {
    LedgerError::Transport(e.to_string())
}

/// Unwrap the node's status envelope. HTTP failures and `"status": "error"`
/// are reported as errors; the latter is handed back for the caller to map.
async fn envelope(resp: reqwest::Response) -> Result<Value, LedgerError> {
    let status = resp.status();
    if !status.is_success() && status.as_u16() != 400 {
        return Err(LedgerError::Http(status.as_u16()));
    }
    let data: Value = resp
        .json()
        .await
        .map_err(|e| LedgerError::Malformed(e.to_string()))?;
    match data["status"].as_str() {
        Some("success") => Ok(data),
        Some("error") => Err(LedgerError::rejected(
            data["msg"].as_str().unwrap_or("Unknown error"),
        )),
        _ => Err(LedgerError::Malformed(format!("missing status in {}", data))),
    }
}

/// Decode a `get-stream-stats` result. `null` (or an `{"value": null}`
/// optional wrapper) means no record under that id.
pub fn decode_stream(id: StreamId, result: Value) -> Result<Option<StreamRecord>, LedgerError> {
    let inner = match result {
        Value::Null => return Ok(None),
        Value::Object(ref map) if map.contains_key("value") && !map.contains_key("sender") => {
            map["value"].clone()
        }
        other => other,
    };
    if inner.is_null() {
        return Ok(None);
    }
    let mut record: StreamRecord = serde_json::from_value(inner)
        .map_err(|e| LedgerError::Malformed(format!("stream #{}: {}", id, e)))?;
    record.id = id;
    Ok(Some(record))
}

fn decode_u128(v: &Value) -> Option<u128> {
    match v {
        Value::String(s) => s.trim_start_matches('u').parse().ok(),
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::Object(map) => map.get("value").and_then(decode_u128),
        _ => None,
    }
}

#[async_trait]
impl StreamLedger for RpcLedger {
    async fn stream_counter(&self) -> Result<StreamId, LedgerError> {
        let result = self.call_readonly("get-stream-counter", Vec::new()).await?;
        let counter = decode_u128(&result)
            .ok_or_else(|| LedgerError::Malformed(format!("stream counter: {}", result)))?;
        StreamId::try_from(counter)
            .map_err(|_| LedgerError::Malformed(format!("stream counter too large: {}", counter)))
    }

    async fn stream(&self, id: StreamId) -> Result<Option<StreamRecord>, LedgerError> {
        let result = self
            .call_readonly("get-stream-stats", vec![CallArg::Uint(id as u128)])
            .await?;
        decode_stream(id, result)
    }

    async fn token_balance(&self, holder: &str) -> Result<u128, LedgerError> {
        let url = format!(
            "{}/token/{}/balance/{}",
            self.rpc, self.target.token.contract, holder
        );
        let resp = self.client.get(&url).send().await.map_err(transport)?;
        let data = envelope(resp).await?;
        decode_u128(&data["balance"])
            .ok_or_else(|| LedgerError::Malformed(format!("balance: {}", data["balance"])))
    }

    async fn submit(&self, call: &ContractCall) -> Result<TxReceipt, LedgerError> {
        let url = format!("{}/call-contract", self.rpc);
        let payload = json!({
            "contract_address": call.contract,
            "function": call.function,
            "args": call.args,
            "caller": call.caller,
            "post_conditions": call.post_conditions,
            "post_condition_mode": call.mode,
        });
        log::debug!("submitting {} for {}", call.function, call.caller);
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;
        let data = envelope(resp).await?;
        let txid = data["txid"]
            .as_str()
            .or_else(|| data["tx_hash"].as_str())
            .ok_or_else(|| LedgerError::Malformed("submission accepted without txid".into()))?;
        Ok(TxReceipt {
            txid: txid.to_string(),
        })
    }
}
