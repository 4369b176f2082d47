//! # mwp-sdk
//!
//! A Rust client for the Mobile Wallet Protocol: an encrypted dapp to wallet
//! session carried over deep links and browser redirects.
//!
//! ## Features
//! - X25519 handshake, AES-256-GCM encrypted requests
//! - URL query wire format with segmentation of oversized payloads
//! - Local, wallet and public RPC routing of EIP-1193 requests
//! - Persisted sessions (in memory or on disk)
//!
//! ## Example
//! The host provides a [`WalletLauncher`] that opens the wallet URL in a
//! browser or app and hands the callback URL back.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use mwp_sdk::communicator::{LaunchOutcome, WalletLauncher};
//! use mwp_sdk::config::ClientConfig;
//! use mwp_sdk::storage::FileStorage;
//! use mwp_sdk::types::{AppMetadata, RequestArguments, Wallet};
//! use mwp_sdk::MwpClient;
//! use serde_json::json;
//! use url::Url;
//!
//! struct SystemBrowser;
//!
//! #[async_trait]
//! impl WalletLauncher for SystemBrowser {
//!     async fn launch(&self, url: Url, _return_scheme: &str) -> mwp_sdk::Result<LaunchOutcome> {
//!         println!("open {url}");
//!         // The app's deep-link handler later calls `client.handle_response(url)`.
//!         Ok(LaunchOutcome::Success { return_url: None })
//!     }
//!
//!     fn dismiss(&self) {}
//! }
//!
//! # async fn run() -> mwp_sdk::Result<()> {
//! let config = ClientConfig::new(
//!     AppMetadata {
//!         app_name: "My Dapp".to_string(),
//!         app_logo_url: None,
//!         app_chain_ids: vec![8453],
//!         app_custom_scheme: "myapp://".to_string(),
//!     },
//!     Wallet::coinbase_smart_wallet(),
//! );
//!
//! let client = MwpClient::create_instance(
//!     config,
//!     Arc::new(SystemBrowser),
//!     Arc::new(FileStorage::new("mwp-session.json")),
//! )
//! .await?;
//!
//! let accounts = client.handshake().await?;
//! let signature = client
//!     .request(RequestArguments::new(
//!         "personal_sign",
//!         Some(json!(["0x68656c6c6f", accounts[0]])),
//!     ))
//!     .await?;
//! println!("signature: {signature}");
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//! MIT OR Apache-2.0

pub mod cipher;
pub mod client;
pub mod communicator;
pub mod config;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod key_manager;
pub mod message;
pub mod rpc;
pub mod session;
pub mod storage;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

/// Exposed for easy access
pub use client::MwpClient;
pub use communicator::{LaunchOutcome, WalletLauncher};
pub use error::{Error, Result};
