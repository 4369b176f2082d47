use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::Url;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::cipher::{decrypt_content, encrypt_content};
use crate::communicator::{LaunchOutcome, WalletLauncher};
use crate::encoding::{decode_request_url_params, encode_response_url_params, reassemble_segments};
use crate::error::{JsonRpcError, Result};
use crate::key_manager::{SharedSecret, derive_shared_secret, export_public_key_hex, import_public_key_hex};
use crate::message::{Content, MessageId, RequestMessage, ResponseMessage, Segment};
use crate::rpc::RpcFetcher;
use crate::types::{EncryptedRequest, RequestArguments, ResponseData, RpcResponse, RpcResult};
use crate::utils::{now_millis, random_bytes32, url_params};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_request(content: Content) -> RequestMessage {
    RequestMessage {
        id: MessageId::new(),
        sender: "dapp".to_string(),
        content,
        timestamp: now_millis(),
        sdk_version: crate::constants::SDK_VERSION.to_string(),
        callback_url: "myapp://mobile-wallet-protocol".to_string(),
        custom_scheme: None,
    }
}

/// Callback URL answering `request` with `content`.
pub fn response_url(request: &RequestMessage, content: Content) -> String {
    response_url_from("wallet", request, content)
}

fn response_url_from(sender: &str, request: &RequestMessage, content: Content) -> String {
    let response = ResponseMessage {
        id: MessageId::new(),
        sender: sender.to_string(),
        request_id: request.id.clone(),
        content,
        timestamp: now_millis(),
    };
    format!(
        "{}?{}",
        request.callback_url,
        encode_response_url_params(&response).unwrap()
    )
}

type Script = Box<dyn Fn(&RequestMessage) -> Result<LaunchOutcome> + Send + Sync>;

/// Launcher whose behaviour is a closure over the decoded request.
pub struct ScriptedLauncher {
    script: Script,
    launches: Mutex<Vec<(String, RequestMessage)>>,
    pub dismissals: AtomicUsize,
}

impl ScriptedLauncher {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&RequestMessage) -> Result<LaunchOutcome> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            launches: Mutex::new(vec![]),
            dismissals: AtomicUsize::new(0),
        })
    }

    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn requests(&self) -> Vec<RequestMessage> {
        self.launches.lock().iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl WalletLauncher for ScriptedLauncher {
    async fn launch(&self, url: Url, _return_scheme: &str) -> Result<LaunchOutcome> {
        let request = decode_request_url_params(&url_params(&url))?;
        self.launches.lock().push((url.to_string(), request.clone()));
        (self.script)(&request)
    }

    fn dismiss(&self) {
        self.dismissals.fetch_add(1, Ordering::SeqCst);
    }
}

type Handler = Box<dyn Fn(&RequestArguments) -> RpcResult + Send + Sync>;

/// Plays the wallet side of the protocol: answers handshakes, decrypts
/// requests, acks request segments and encrypts replies.
pub struct MockWallet {
    secret: StaticSecret,
    pub accounts: Vec<String>,
    chains: Mutex<BTreeMap<String, String>>,
    pub capabilities: Option<Value>,
    handler: Handler,
    shared_secret: Mutex<Option<SharedSecret>>,
    inbound_segments: Mutex<Vec<Segment>>,
    requests: Mutex<Vec<RequestMessage>>,
    decrypted: Mutex<Vec<EncryptedRequest>>,
    reject_handshake: AtomicBool,
    cancel_next: AtomicBool,
    pub dismissals: AtomicUsize,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            secret: StaticSecret::from(random_bytes32()),
            accounts: vec!["0x0000000000000000000000000000000000000abc".to_string()],
            chains: Mutex::new(BTreeMap::from([
                ("1".to_string(), "https://rpc.example.com/1".to_string()),
                ("8453".to_string(), "https://rpc.example.com/8453".to_string()),
            ])),
            capabilities: Some(json!({ "0x2105": { "atomicBatch": { "supported": true } } })),
            handler: Box::new(|args| RpcResult::Value(json!(format!("signed:{}", args.method)))),
            shared_secret: Mutex::new(None),
            inbound_segments: Mutex::new(vec![]),
            requests: Mutex::new(vec![]),
            decrypted: Mutex::new(vec![]),
            reject_handshake: AtomicBool::new(false),
            cancel_next: AtomicBool::new(false),
            dismissals: AtomicUsize::new(0),
        }
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestArguments) -> RpcResult + Send + Sync + 'static,
    {
        self.handler = Box::new(handler);
        self
    }

    pub fn with_chains(self, chains: &[(u64, &str)]) -> Self {
        *self.chains.lock() = chains
            .iter()
            .map(|(id, url)| (id.to_string(), url.to_string()))
            .collect();
        self
    }

    pub fn add_chain(&self, id: u64, rpc_url: &str) {
        self.chains.lock().insert(id.to_string(), rpc_url.to_string());
    }

    fn response_data(&self) -> ResponseData {
        ResponseData {
            chains: Some(self.chains.lock().clone()),
            capabilities: self.capabilities.clone(),
        }
    }

    pub fn public_key_hex(&self) -> String {
        export_public_key_hex(&PublicKey::from(&self.secret))
    }

    pub fn reject_handshake(&self) {
        self.reject_handshake.store(true, Ordering::SeqCst);
    }

    pub fn cancel_next(&self) {
        self.cancel_next.store(true, Ordering::SeqCst);
    }

    /// Every message launched so far, segments included.
    pub fn requests(&self) -> Vec<RequestMessage> {
        self.requests.lock().clone()
    }

    /// Decrypted payloads of completed encrypted requests.
    pub fn decrypted(&self) -> Vec<EncryptedRequest> {
        self.decrypted.lock().clone()
    }

    fn reply(&self, request: &RequestMessage, content: Content) -> LaunchOutcome {
        LaunchOutcome::Success {
            return_url: Some(response_url_from(&self.public_key_hex(), request, content)),
        }
    }

    fn encrypted_reply(
        &self,
        request: &RequestMessage,
        response: &RpcResponse,
    ) -> Result<LaunchOutcome> {
        let secret = self
            .shared_secret
            .lock()
            .clone()
            .ok_or("mock wallet has no session")?;
        Ok(self.reply(request, Content::Encrypted(encrypt_content(response, &secret)?)))
    }

    fn answer(&self, request: &RequestMessage, encrypted: &crate::message::EncryptedData) -> Result<LaunchOutcome> {
        let secret = self
            .shared_secret
            .lock()
            .clone()
            .ok_or("mock wallet has no session")?;
        let payload: EncryptedRequest = decrypt_content(encrypted, &secret)?;
        let result = (self.handler)(&payload.action);
        self.decrypted.lock().push(payload);
        self.encrypted_reply(
            request,
            &RpcResponse {
                result,
                data: Some(self.response_data()),
            },
        )
    }
}

#[async_trait]
impl WalletLauncher for MockWallet {
    async fn launch(&self, url: Url, _return_scheme: &str) -> Result<LaunchOutcome> {
        let request = decode_request_url_params(&url_params(&url))?;
        self.requests.lock().push(request.clone());

        if self.cancel_next.swap(false, Ordering::SeqCst) {
            return Ok(LaunchOutcome::Cancel);
        }

        match &request.content {
            Content::Handshake(_) => {
                if self.reject_handshake.load(Ordering::SeqCst) {
                    return Ok(self.reply(
                        &request,
                        Content::Failure(JsonRpcError::new(
                            4001,
                            "User rejected the handshake",
                            None,
                        )),
                    ));
                }
                let peer = import_public_key_hex(&request.sender)?;
                *self.shared_secret.lock() = Some(derive_shared_secret(&self.secret, &peer)?);
                self.encrypted_reply(
                    &request,
                    &RpcResponse {
                        result: RpcResult::Value(json!(self.accounts)),
                        data: Some(self.response_data()),
                    },
                )
            }
            Content::Encrypted(encrypted) => self.answer(&request, encrypted),
            Content::Segment(part @ Segment::Data { total_size, index, .. }) => {
                let complete = {
                    let mut parts = self.inbound_segments.lock();
                    parts.push(part.clone());
                    let received = parts
                        .iter()
                        .map(|p| match p {
                            Segment::Data { data, .. } => data.len(),
                            Segment::Ack { .. } => 0,
                        })
                        .sum::<usize>();
                    if received < *total_size {
                        None
                    } else {
                        Some(std::mem::take(&mut *parts))
                    }
                };
                match complete {
                    None => Ok(self.reply(
                        &request,
                        Content::Segment(Segment::Ack {
                            ack: true,
                            index: *index,
                        }),
                    )),
                    Some(parts) => {
                        let encrypted = reassemble_segments(&parts)?;
                        self.answer(&request, &encrypted)
                    }
                }
            }
            Content::Segment(Segment::Ack { .. }) | Content::Failure(_) => {
                Err("unexpected content sent to wallet".into())
            }
        }
    }

    fn dismiss(&self) {
        self.dismissals.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records direct RPC calls and answers with a fixed value.
pub struct MockRpc {
    pub result: Value,
    calls: Mutex<Vec<(String, RequestArguments)>>,
}

impl MockRpc {
    pub fn new(result: Value) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: Mutex::new(vec![]),
        })
    }

    pub fn calls(&self) -> Vec<(String, RequestArguments)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RpcFetcher for MockRpc {
    async fn fetch(&self, rpc_url: &str, args: &RequestArguments) -> Result<Value> {
        self.calls.lock().push((rpc_url.to_string(), args.clone()));
        Ok(self.result.clone())
    }
}
