use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::{SDK_VERSION, SDK_VERSION_HEADER};
use crate::error::{JsonRpcError, Result};
use crate::types::RequestArguments;

/// Plain JSON-RPC reads against a chain's public endpoint.
#[async_trait]
pub trait RpcFetcher: Send + Sync {
    async fn fetch(&self, rpc_url: &str, args: &RequestArguments) -> Result<Value>;
}

#[derive(Clone, Debug, Default)]
pub struct HttpRpcClient {
    client: Client,
}

impl HttpRpcClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RpcFetcher for HttpRpcClient {
    async fn fetch(&self, rpc_url: &str, args: &RequestArguments) -> Result<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Uuid::new_v4().to_string(),
            method: &args.method,
            params: args.params.as_ref(),
        };
        debug!("rpc {} -> {rpc_url}", args.method);

        let response = self
            .client
            .post(rpc_url)
            .header(SDK_VERSION_HEADER, SDK_VERSION)
            .json(&request)
            .send()
            .await?
            .json::<JsonRpcResponse>()
            .await?;

        response.into_result()
    }
}

/// A basic JSON-RPC 2.0 request.
#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

/// A basic JSON-RPC 2.0 response with either a result or an error.
#[derive(Deserialize, Debug)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(error.into()),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_shape() {
        let args = RequestArguments::new("eth_getBalance", Some(json!(["0x1", "latest"])));
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "abc".to_string(),
            method: &args.method,
            params: args.params.as_ref(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": "abc",
                "method": "eth_getBalance",
                "params": ["0x1", "latest"]
            })
        );

        let args = RequestArguments::new("eth_blockNumber", None);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "abc".to_string(),
            method: &args.method,
            params: args.params.as_ref(),
        };
        assert!(serde_json::to_value(&request).unwrap().get("params").is_none());
    }

    #[test]
    fn test_response_result() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "result": "0x10"
        }))
        .unwrap();
        assert_eq!(response.into_result().unwrap(), json!("0x10"));

        let response: JsonRpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": "x", "result": null }))
                .unwrap();
        assert_eq!(response.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_response_error_passes_through() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "header not found", "data": "0x" }
        }))
        .unwrap();
        let err = response.into_result().unwrap_err();
        match err {
            crate::Error::JsonRpc(e) => {
                assert_eq!(e.code, -32000);
                assert_eq!(e.message, "header not found");
                assert_eq!(e.data, Some(json!("0x")));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
