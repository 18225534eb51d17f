//! Minimal JSON-RPC 2.0 over HTTP (§6): one POST endpoint, dispatched by
//! `method` name onto [`RpcApi`]. Batches are not supported; each request is
//! a single `{jsonrpc, id, method, params}` object.

use crate::api::RpcApi;
use crate::error::RpcError;
use axum::extract::State as AxumState;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use blockchain_crypto::{Address, Hash};
use blockchain_storage::KvStore;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router<S: KvStore + 'static>(api: Arc<RpcApi<S>>) -> Router {
    Router::new().route("/", post(handle::<S>)).with_state(api)
}

async fn handle<S: KvStore + 'static>(AxumState(api): AxumState<Arc<RpcApi<S>>>, Json(request): Json<Value>) -> impl IntoResponse {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    tracing::debug!(method, "dispatching json-rpc request");

    match dispatch(&api, method, params) {
        Ok(result) => Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })),
        Err(err) => {
            tracing::warn!(method, code = err.code(), %err, "json-rpc request failed");
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": err.code(), "message": err.to_string() },
            }))
        }
    }
}

fn dispatch<S: KvStore>(api: &RpcApi<S>, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "chainId" => Ok(json!(api.chain_id())),
        "blockNumber" => Ok(json!(api.block_number()?)),
        "getBlockByHash" => {
            let hash = parse_hash(&params, 0)?;
            Ok(json!(api.get_block_by_hash(hash)?.hash().to_hex()))
        }
        "getBlockByNumber" => {
            let number = parse_u64(&params, 0)?;
            Ok(json!(api.get_block_by_number(number)?.hash().to_hex()))
        }
        "getBlockTransactionCountByHash" => {
            let hash = parse_hash(&params, 0)?;
            Ok(json!(api.get_block_transaction_count_by_hash(hash)?))
        }
        "getBlockTransactionCountByNumber" => {
            let number = parse_u64(&params, 0)?;
            Ok(json!(api.get_block_transaction_count_by_number(number)?))
        }
        "getBalance" => Ok(json!(api.get_balance(parse_address(&params, 0)?).to_string())),
        "getTransactionCount" => Ok(json!(api.get_transaction_count(parse_address(&params, 0)?))),
        "getCode" => Ok(json!(hex::encode(api.get_code(parse_address(&params, 0)?)))),
        "getTransactionByHash" => {
            let tx = api.get_transaction_by_hash(parse_hash(&params, 0)?)?;
            Ok(json!(tx.hash().to_hex()))
        }
        "getTransactionByBlockHashAndIndex" => {
            let hash = parse_hash(&params, 0)?;
            let index = parse_u64(&params, 1)? as u32;
            let tx = api.get_transaction_by_block_hash_and_index(hash, index)?;
            Ok(json!(tx.hash().to_hex()))
        }
        "getTransactionByBlockNumberAndIndex" => {
            let number = parse_u64(&params, 0)?;
            let index = parse_u64(&params, 1)? as u32;
            let tx = api.get_transaction_by_block_number_and_index(number, index)?;
            Ok(json!(tx.hash().to_hex()))
        }
        "getTransactionReceipt" => {
            let receipt = api.get_transaction_receipt(parse_hash(&params, 0)?)?;
            Ok(json!({
                "transactionHash": receipt.tx_hash.to_hex(),
                "blockHash": receipt.block_hash.to_hex(),
                "blockNumber": receipt.block_number,
                "transactionIndex": receipt.transaction_index,
                "from": receipt.from.to_string(),
                "to": receipt.to.to_string(),
                "status": receipt.success,
            }))
        }
        "sendRawTransaction" => {
            let raw = parse_bytes(&params, 0)?;
            Ok(json!(api.send_raw_transaction(&raw)?.to_hex()))
        }
        "call" => {
            let from = parse_address(&params, 0)?;
            let to = parse_address(&params, 1)?;
            let data = parse_bytes(&params, 2)?;
            Ok(json!(hex::encode(api.call(from, to, &data)?)))
        }
        "estimateGas" => {
            let to = parse_address(&params, 0)?;
            let data = parse_bytes(&params, 1)?;
            Ok(json!(api.estimate_gas(to, &data)?))
        }
        "gasPrice" => Ok(json!(api.gas_price().to_string())),
        "feeHistory" => {
            let count = parse_u64(&params, 0).unwrap_or(1);
            Ok(json!(api.fee_history(count).iter().map(|p| p.to_string()).collect::<Vec<_>>()))
        }
        "getLogs" => {
            let from_block = params.get(0).and_then(|v| v.get("fromBlock")).and_then(Value::as_u64);
            let to_block = params.get(0).and_then(|v| v.get("toBlock")).and_then(Value::as_u64);
            let address = params
                .get(0)
                .and_then(|v| v.get("address"))
                .and_then(Value::as_str)
                .and_then(|s| Address::from_hex(s).ok());
            let logs = api.get_logs(from_block, to_block, address);
            Ok(json!(logs
                .into_iter()
                .map(|e| json!({
                    "address": e.event.address.to_string(),
                    "blockHash": e.block_hash.to_hex(),
                    "blockNumber": e.event.block_height,
                    "transactionHash": e.event.tx_hash.to_hex(),
                    "logIndex": e.event.log_index,
                    "data": hex::encode(&e.event.data),
                }))
                .collect::<Vec<_>>()))
        }
        "syncing" => Ok(json!(api.syncing())),
        "coinbase" => Ok(json!(api.coinbase().to_string())),
        "protocolVersion" => Ok(json!(api.protocol_version())),
        "net_listening" => Ok(json!(api.net_listening())),
        "net_peerCount" => Ok(json!(api.net_peer_count())),
        other => Err(RpcError::InvalidParams(format!("unknown method {other}"))),
    }
}

fn parse_address(params: &Value, index: usize) -> Result<Address, RpcError> {
    let raw = params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::InvalidParams(format!("expected an address at position {index}")))?;
    Address::from_hex(raw).map_err(|err| RpcError::InvalidParams(err.to_string()))
}

fn parse_hash(params: &Value, index: usize) -> Result<Hash, RpcError> {
    let raw = params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::InvalidParams(format!("expected a hash at position {index}")))?;
    let bytes = hex::decode(raw.trim_start_matches("0x")).map_err(|err| RpcError::InvalidParams(err.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| RpcError::InvalidParams("hash must be 32 bytes".into()))?;
    Ok(Hash::from_bytes(arr))
}

fn parse_u64(params: &Value, index: usize) -> Result<u64, RpcError> {
    params
        .get(index)
        .and_then(Value::as_u64)
        .ok_or_else(|| RpcError::InvalidParams(format!("expected a number at position {index}")))
}

fn parse_bytes(params: &Value, index: usize) -> Result<Vec<u8>, RpcError> {
    let raw = params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::InvalidParams(format!("expected hex bytes at position {index}")))?;
    hex::decode(raw.trim_start_matches("0x")).map_err(|err| RpcError::InvalidParams(err.to_string()))
}
