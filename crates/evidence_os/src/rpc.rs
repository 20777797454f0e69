#![forbid(unsafe_code)]

//! JSON-RPC 2.0 transport to a ledger full node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use evidence_contracts::ledger::{AccountAddress, ObjectId};
use evidence_contracts::payload::SignedPayload;
use evidence_storage::endpoint::{methods, EndpointError, LedgerEndpoint, TransportKind};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::LedgerConfig;

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug)]
pub struct JsonRpcEndpoint {
    url: String,
    agent: ureq::Agent,
    next_request_id: AtomicU64,
}

impl JsonRpcEndpoint {
    pub fn new(config: &LedgerConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(config.connect_timeout_ms))
            .timeout_read(Duration::from_millis(config.request_timeout_ms))
            .timeout_write(Duration::from_millis(config.request_timeout_ms))
            .build();
        Self {
            url: config.rpc_url.clone(),
            agent,
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn call(&self, method: &'static str, params: Value) -> Result<Value, EndpointError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let body = request_body(id, method, params);
        tracing::debug!(target: "evidence_os::rpc", method, id, "rpc request");
        let resp = match self
            .agent
            .post(&self.url)
            .set("content-type", "application/json")
            .send_string(&body)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, _)) => {
                return Err(EndpointError::HttpStatus { method, status })
            }
            Err(ureq::Error::Transport(transport)) => {
                let detail = transport.to_string();
                let kind =
                    classify_transport_error_kind(&format!("{:?} {}", transport.kind(), detail));
                return Err(EndpointError::Transport {
                    method,
                    kind,
                    detail,
                });
            }
        };
        let text = resp.into_string().map_err(|err| EndpointError::Transport {
            method,
            kind: TransportKind::Transport,
            detail: format!("response body read failed: {err}"),
        })?;
        parse_rpc_response(method, &text)
    }
}

fn request_body(id: u64, method: &str, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

pub(crate) fn parse_rpc_response(method: &'static str, text: &str) -> Result<Value, EndpointError> {
    let envelope: RpcEnvelope =
        serde_json::from_str(text).map_err(|err| EndpointError::MalformedResponse {
            method,
            detail: err.to_string(),
        })?;
    if let Some(err) = envelope.error {
        return Err(EndpointError::Rpc {
            method,
            code: err.code,
            message: err.message,
        });
    }
    envelope
        .result
        .ok_or_else(|| EndpointError::MalformedResponse {
            method,
            detail: "neither result nor error present".to_string(),
        })
}

fn classify_transport_error_kind(raw: &str) -> TransportKind {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        TransportKind::Timeout
    } else if lower.contains("tls") || lower.contains("ssl") {
        TransportKind::Tls
    } else if lower.contains("dns") {
        TransportKind::Dns
    } else if lower.contains("connection") || lower.contains("connect") {
        TransportKind::Connection
    } else {
        TransportKind::Transport
    }
}

impl LedgerEndpoint for JsonRpcEndpoint {
    fn get_object(&self, object_id: ObjectId) -> Result<Value, EndpointError> {
        self.call(
            methods::GET_OBJECT,
            json!([
                object_id.to_hex_literal(),
                { "showContent": true, "showOwner": true, "showType": true }
            ]),
        )
    }

    fn get_dynamic_field_object(&self, parent: ObjectId, key: u64) -> Result<Value, EndpointError> {
        self.call(
            methods::GET_DYNAMIC_FIELD_OBJECT,
            json!([
                parent.to_hex_literal(),
                { "type": "u64", "value": key.to_string() }
            ]),
        )
    }

    fn execute_transaction(&self, signed: &SignedPayload) -> Result<Value, EndpointError> {
        let signatures: Vec<String> = signed.signatures.iter().map(|s| BASE64.encode(s)).collect();
        self.call(
            methods::EXECUTE_TRANSACTION_BLOCK,
            json!([
                BASE64.encode(&signed.tx_bytes),
                signatures,
                { "showEffects": true, "showEvents": true },
                "WaitForLocalExecution"
            ]),
        )
    }

    fn dev_inspect(&self, sender: AccountAddress, tx_kind: &[u8]) -> Result<Value, EndpointError> {
        self.call(
            methods::DEV_INSPECT_TRANSACTION_BLOCK,
            json!([sender.to_hex_literal(), BASE64.encode(tx_kind), null, null]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_is_jsonrpc_2() {
        let body: Value =
            serde_json::from_str(&request_body(7, methods::GET_OBJECT, json!([]))).unwrap();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 7);
        assert_eq!(body["method"], "sui_getObject");
    }

    #[test]
    fn rpc_error_member_wins_over_result() {
        let err = parse_rpc_response(
            methods::EXECUTE_TRANSACTION_BLOCK,
            concat!(
                r#"{"jsonrpc":"2.0","id":1,"#,
                r#""error":{"code":-32002,"message":"Transaction has non recoverable errors"}}"#,
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EndpointError::Rpc {
                method: "sui_executeTransactionBlock",
                code: -32002,
                message: "Transaction has non recoverable errors".to_string(),
            }
        );
    }

    #[test]
    fn missing_result_and_garbage_are_malformed() {
        assert!(matches!(
            parse_rpc_response(methods::GET_OBJECT, r#"{"jsonrpc":"2.0","id":1}"#),
            Err(EndpointError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_rpc_response(methods::GET_OBJECT, "<html>"),
            Err(EndpointError::MalformedResponse { .. })
        ));
        assert_eq!(
            parse_rpc_response(methods::GET_OBJECT, r#"{"result":{"data":null}}"#).unwrap(),
            json!({"data": null})
        );
    }

    #[test]
    fn transport_errors_are_classified() {
        assert_eq!(classify_transport_error_kind("Io timed out"), TransportKind::Timeout);
        assert_eq!(classify_transport_error_kind("Dns failed to lookup"), TransportKind::Dns);
        assert_eq!(
            classify_transport_error_kind("ConnectionFailed refused"),
            TransportKind::Connection
        );
        assert_eq!(classify_transport_error_kind("BadHeader"), TransportKind::Transport);
    }
}
