/// Types
///
/// Request arguments, method routing and the decrypted payloads exchanged
/// with the wallet.
///
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, JsonRpcError, Result};

/// Arguments of an EIP-1193 `request()` call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestArguments {
    pub fn new(method: &str, params: Option<Value>) -> Self {
        Self {
            method: method.to_string(),
            params,
        }
    }
}

/// Methods this client knows how to route. Anything else goes to the public
/// RPC endpoint of the active chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "eth_requestAccounts")]
    EthRequestAccounts,
    #[serde(rename = "eth_accounts")]
    EthAccounts,
    #[serde(rename = "eth_coinbase")]
    EthCoinbase,
    #[serde(rename = "net_version")]
    NetVersion,
    #[serde(rename = "eth_chainId")]
    EthChainId,
    #[serde(rename = "wallet_getCapabilities")]
    WalletGetCapabilities,

    #[serde(rename = "wallet_switchEthereumChain")]
    WalletSwitchEthereumChain,

    #[serde(rename = "eth_ecRecover")]
    EthEcRecover,
    #[serde(rename = "personal_sign")]
    PersonalSign,
    #[serde(rename = "personal_ecRecover")]
    PersonalEcRecover,
    #[serde(rename = "eth_signTransaction")]
    EthSignTransaction,
    #[serde(rename = "eth_sendTransaction")]
    EthSendTransaction,
    #[serde(rename = "eth_signTypedData_v1")]
    EthSignTypedDataV1,
    #[serde(rename = "eth_signTypedData_v3")]
    EthSignTypedDataV3,
    #[serde(rename = "eth_signTypedData_v4")]
    EthSignTypedDataV4,
    #[serde(rename = "eth_signTypedData")]
    EthSignTypedData,
    #[serde(rename = "wallet_addEthereumChain")]
    WalletAddEthereumChain,
    #[serde(rename = "wallet_watchAsset")]
    WalletWatchAsset,
    #[serde(rename = "wallet_sendCalls")]
    WalletSendCalls,
    #[serde(rename = "wallet_showCallsStatus")]
    WalletShowCallsStatus,
    #[serde(rename = "wallet_grantPermissions")]
    WalletGrantPermissions,

    #[serde(rename = "eth_sign")]
    EthSign,
    #[serde(rename = "eth_signTypedData_v2")]
    EthSignTypedDataV2,
    #[serde(rename = "eth_subscribe")]
    EthSubscribe,
    #[serde(rename = "eth_unsubscribe")]
    EthUnsubscribe,
}

/// Where a method call is answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handling {
    /// Answered from cached session state.
    Local,
    /// Local first, then a round trip to the wallet.
    SwitchChain,
    /// Encrypted round trip to the wallet.
    Wallet,
    /// Plain JSON-RPC against the active chain's endpoint.
    PublicRpc,
    Unsupported,
}

impl Method {
    pub fn handling(self) -> Handling {
        match self {
            Self::EthRequestAccounts
            | Self::EthAccounts
            | Self::EthCoinbase
            | Self::NetVersion
            | Self::EthChainId
            | Self::WalletGetCapabilities => Handling::Local,

            Self::WalletSwitchEthereumChain => Handling::SwitchChain,

            Self::EthEcRecover
            | Self::PersonalSign
            | Self::PersonalEcRecover
            | Self::EthSignTransaction
            | Self::EthSendTransaction
            | Self::EthSignTypedDataV1
            | Self::EthSignTypedDataV3
            | Self::EthSignTypedDataV4
            | Self::EthSignTypedData
            | Self::WalletAddEthereumChain
            | Self::WalletWatchAsset
            | Self::WalletSendCalls
            | Self::WalletShowCallsStatus
            | Self::WalletGrantPermissions => Handling::Wallet,

            Self::EthSign
            | Self::EthSignTypedDataV2
            | Self::EthSubscribe
            | Self::EthUnsubscribe => Handling::Unsupported,
        }
    }

    /// Routing for an arbitrary method name.
    pub fn handling_of(method: &str) -> Handling {
        Method::from_str(method)
            .map(Method::handling)
            .unwrap_or(Handling::PublicRpc)
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_plain::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{name}")
    }
}

impl FromStr for Method {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_plain::from_str(s)
            .map_err(|e| Error::InternalError(format!("unknown method {s}: {e}")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

impl Chain {
    pub fn new(id: u64) -> Self {
        Self { id, rpc_url: None }
    }
}

/// Plaintext of an encrypted request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRequest {
    pub action: RequestArguments,
    pub chain_id: u64,
}

/// Plaintext of an encrypted response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: RpcResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcResult {
    Value(Value),
    Error(JsonRpcError),
}

impl RpcResult {
    /// Unwraps the application-level outcome.
    pub fn into_value(self) -> Result<Value> {
        match self {
            RpcResult::Value(v) => Ok(v),
            RpcResult::Error(e) => Err(Error::JsonRpc(e)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Chain id (decimal string) to RPC URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chains: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
}

impl ResponseData {
    /// Available chains ordered by id.
    pub fn available_chains(&self) -> Result<Option<Vec<Chain>>> {
        let Some(chains) = &self.chains else {
            return Ok(None);
        };
        let mut chains = chains
            .iter()
            .map(|(id, rpc_url)| {
                Ok(Chain {
                    id: id.parse()?,
                    rpc_url: Some(rpc_url.clone()),
                })
            })
            .collect::<Result<Vec<Chain>>>()?;
        chains.sort_by_key(|c| c.id);
        Ok(Some(chains))
    }
}

/// Identity of the dapp presented to the wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_logo_url: Option<String>,
    #[serde(default)]
    pub app_chain_ids: Vec<u64>,
    /// URL the wallet redirects back to, e.g. `myapp://`.
    pub app_custom_scheme: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WalletType {
    Web,
    Native,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    #[serde(rename = "type")]
    pub wallet_type: WalletType,
    pub name: String,
    /// Base URL (or app scheme) that receives request messages.
    pub scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl Wallet {
    pub fn coinbase_smart_wallet() -> Self {
        Self {
            wallet_type: WalletType::Web,
            name: "Coinbase Smart Wallet".to_string(),
            scheme: "https://keys.coinbase.com/connect".to_string(),
            icon_url: Some(
                "https://wallet.coinbase.com/assets/images/favicon.ico"
                    .to_string(),
            ),
        }
    }
}
