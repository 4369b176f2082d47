/// Protocol client
///
/// Entry point for dapps. Runs the handshake, routes `request()` calls to
/// local session state, the wallet, or the chain's public RPC endpoint, and
/// resets the session.
///
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::cipher::{decrypt_content, encrypt_content};
use crate::communicator::{Communicator, WalletLauncher};
use crate::config::ClientConfig;
use crate::constants::{
    CLIENT_NAMESPACE, DEFAULT_APP_NAME, DEFAULT_CHAIN_ID, KEY_MANAGER_NAMESPACE, SDK_VERSION,
};
use crate::error::{Error, Result};
use crate::key_manager::{KeyManager, SharedSecret, import_public_key_hex};
use crate::message::{Content, HandshakeAction, MessageId, RequestMessage, ResponseMessage};
use crate::rpc::{HttpRpcClient, RpcFetcher};
use crate::session::SessionState;
use crate::storage::{ScopedStorage, Storage};
use crate::types::{
    AppMetadata, Chain, EncryptedRequest, Handling, Method, RequestArguments, RpcResponse,
    Wallet, WalletType,
};
use crate::utils::{
    append_mwp_response_path, check_error_for_invalid_request_args, hex_string_from_number,
    is_mwp_response_url, now_millis, parse_chain_id,
};

pub struct MwpClient {
    metadata: AppMetadata,
    wallet: Wallet,
    key_manager: Mutex<KeyManager>,
    session: Mutex<SessionState>,
    handshake_lock: Mutex<()>,
    communicator: Arc<Communicator>,
    rpc: Arc<dyn RpcFetcher>,
}

impl MwpClient {
    /// Builds a client and restores any persisted session from `storage`.
    pub async fn create_instance(
        config: ClientConfig,
        launcher: Arc<dyn WalletLauncher>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        if config.wallet.wallet_type == WalletType::Native {
            return Err(Error::NativeWalletUnsupported);
        }

        let mut metadata = config.metadata.clone();
        if metadata.app_name.is_empty() {
            metadata.app_name = DEFAULT_APP_NAME.to_string();
        }
        metadata.app_custom_scheme = append_mwp_response_path(&metadata.app_custom_scheme)?;
        let default_chain_id = metadata
            .app_chain_ids
            .first()
            .copied()
            .unwrap_or(DEFAULT_CHAIN_ID);

        let wallet = config.wallet.clone();
        let key_manager = KeyManager::new(ScopedStorage::new(
            storage.clone(),
            &wallet.name,
            KEY_MANAGER_NAMESPACE,
        ));
        let session = SessionState::load(
            ScopedStorage::new(storage, &wallet.name, CLIENT_NAMESPACE),
            default_chain_id,
        )
        .await?;
        let communicator = Communicator::new(
            launcher,
            config.response_timeout(),
            config.segment_dismiss_delay(),
        );

        info!(
            "mwp client for {} using wallet {} ({})",
            metadata.app_name, wallet.name, wallet.scheme
        );
        Ok(Self {
            metadata,
            wallet,
            key_manager: Mutex::new(key_manager),
            session: Mutex::new(session),
            handshake_lock: Mutex::new(()),
            communicator: Arc::new(communicator),
            rpc: Arc::new(HttpRpcClient::new()),
        })
    }

    pub fn with_rpc_fetcher(mut self, rpc: Arc<dyn RpcFetcher>) -> Self {
        self.rpc = rpc;
        self
    }

    pub fn metadata(&self) -> &AppMetadata {
        &self.metadata
    }

    pub fn communicator(&self) -> &Arc<Communicator> {
        &self.communicator
    }

    pub async fn accounts(&self) -> Vec<String> {
        self.session.lock().await.accounts().to_vec()
    }

    pub async fn chain(&self) -> Chain {
        self.session.lock().await.chain().clone()
    }

    /// Requests accounts from the wallet, establishing the shared secret.
    /// Returns the cached accounts when already connected.
    pub async fn handshake(&self) -> Result<Vec<String>> {
        let _handshake = self.handshake_lock.lock().await;
        {
            let session = self.session.lock().await;
            if session.is_authorized() {
                return Ok(session.accounts().to_vec());
            }
        }

        let message = self
            .create_request_message(Content::Handshake(HandshakeAction::request_accounts(
                &self.metadata.app_name,
                self.metadata.app_logo_url.clone(),
            )))
            .await?;
        let response = self.post_request_to_wallet(message).await?;

        if let Content::Failure(failure) = &response.content {
            return Err(failure.clone().into());
        }
        let peer_public_key = import_public_key_hex(&response.sender)?;
        self.key_manager
            .lock()
            .await
            .set_peer_public_key(peer_public_key)
            .await?;

        let decrypted = self.decrypt_response_message(&response).await?;
        let accounts: Vec<String> = serde_json::from_value(decrypted.result.into_value()?)?;
        self.session
            .lock()
            .await
            .set_accounts(accounts.clone())
            .await?;

        info!("handshake complete, {} account(s)", accounts.len());
        Ok(accounts)
    }

    /// EIP-1193 `request()`.
    pub async fn request(&self, args: RequestArguments) -> Result<Value> {
        let method = Method::from_str(&args.method).ok();
        {
            let session = self.session.lock().await;
            if !session.is_authorized() {
                if method == Some(Method::EthAccounts) {
                    return Ok(json!(session.accounts()));
                }
                return Err(Error::unauthorized(None));
            }
        }

        check_error_for_invalid_request_args(&args)?;
        debug!("request {}", args.method);

        match method {
            Some(Method::EthRequestAccounts | Method::EthAccounts) => {
                Ok(json!(self.session.lock().await.accounts()))
            }
            Some(Method::EthCoinbase) => Ok(json!(
                self.session.lock().await.accounts().first()
            )),
            Some(Method::NetVersion) => Ok(json!(self.session.lock().await.chain().id)),
            Some(Method::EthChainId) => Ok(json!(hex_string_from_number(
                self.session.lock().await.chain().id
            ))),
            Some(Method::WalletGetCapabilities) => Ok(self
                .session
                .lock()
                .await
                .capabilities()
                .await?
                .unwrap_or(Value::Null)),
            Some(Method::WalletSwitchEthereumChain) => {
                self.handle_switch_chain_request(&args).await
            }
            Some(method) if method.handling() == Handling::Wallet => {
                self.send_request_to_popup(&args).await
            }
            Some(_) => Err(Error::unsupported_method()),
            None => self.fetch_rpc_request(&args).await,
        }
    }

    /// Drops the session: persisted state, keys, and cached accounts.
    pub async fn reset(&self) -> Result<()> {
        self.session.lock().await.reset().await?;
        self.key_manager.lock().await.clear().await?;
        info!("session reset");
        Ok(())
    }

    /// Delivers a deep-link callback. URLs outside the protocol path are
    /// not handled.
    pub fn handle_response(&self, url: &str) -> bool {
        if !is_mwp_response_url(url) {
            return false;
        }
        self.communicator.handle_response(url)
    }

    /// Returns `null` when the switch succeeded.
    async fn handle_switch_chain_request(&self, args: &RequestArguments) -> Result<Value> {
        let chain_id = args
            .params
            .as_ref()
            .and_then(|params| params.get(0))
            .and_then(|param| param.get("chainId"))
            .ok_or_else(|| Error::invalid_params("Missing chainId", args.params.clone()))?;
        let chain_id = parse_chain_id(chain_id)?;

        if self.session.lock().await.update_chain(chain_id, None).await? {
            return Ok(Value::Null);
        }

        let result = self.send_request_to_popup(args).await?;
        if result.is_null() {
            self.session.lock().await.update_chain(chain_id, None).await?;
        }
        Ok(result)
    }

    async fn send_request_to_popup(&self, args: &RequestArguments) -> Result<Value> {
        let response = self.send_encrypted_request(args).await?;
        let decrypted = self.decrypt_response_message(&response).await?;
        decrypted.result.into_value()
    }

    async fn send_encrypted_request(&self, args: &RequestArguments) -> Result<ResponseMessage> {
        let secret = self.shared_secret().await?.ok_or_else(|| {
            Error::unauthorized(Some(
                "No valid session found, try requestAccounts before other methods",
            ))
        })?;
        let chain_id = self.session.lock().await.chain().id;
        let encrypted = encrypt_content(
            &EncryptedRequest {
                action: args.clone(),
                chain_id,
            },
            &secret,
        )?;
        let message = self
            .create_request_message(Content::Encrypted(encrypted))
            .await?;
        self.post_request_to_wallet(message).await
    }

    async fn fetch_rpc_request(&self, args: &RequestArguments) -> Result<Value> {
        let rpc_url = self
            .session
            .lock()
            .await
            .chain()
            .rpc_url
            .clone()
            .ok_or_else(|| Error::internal("No RPC URL set for chain"))?;
        self.rpc.fetch(&rpc_url, args).await
    }

    async fn shared_secret(&self) -> Result<Option<SharedSecret>> {
        self.key_manager.lock().await.get_shared_secret().await
    }

    async fn create_request_message(&self, content: Content) -> Result<RequestMessage> {
        let sender = self
            .key_manager
            .lock()
            .await
            .get_own_public_key_hex()
            .await?;
        Ok(RequestMessage {
            id: MessageId::new(),
            sender,
            content,
            timestamp: now_millis(),
            sdk_version: SDK_VERSION.to_string(),
            callback_url: self.metadata.app_custom_scheme.clone(),
            custom_scheme: None,
        })
    }

    async fn post_request_to_wallet(&self, message: RequestMessage) -> Result<ResponseMessage> {
        self.communicator
            .post_request_and_wait_for_response(message, &self.wallet.scheme)
            .await
    }

    /// Decrypts a wallet response and records any chains or capabilities it
    /// carries. `failure` content becomes an error.
    async fn decrypt_response_message(&self, response: &ResponseMessage) -> Result<RpcResponse> {
        let encrypted = match &response.content {
            Content::Encrypted(encrypted) => encrypted,
            Content::Failure(failure) => return Err(failure.clone().into()),
            other => return Err(Error::UnexpectedContent(other.kind())),
        };
        let secret = self
            .shared_secret()
            .await?
            .ok_or_else(|| Error::unauthorized(Some("Invalid session")))?;

        let decrypted: RpcResponse = decrypt_content(encrypted, &secret)?;
        if let Some(data) = &decrypted.data {
            self.session.lock().await.apply_response_data(data).await?;
        }
        Ok(decrypted)
    }
}
