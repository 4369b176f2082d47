use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_RESPONSE_TIMEOUT_SECS, DEFAULT_SEGMENT_DISMISS_DELAY_MS};
use crate::error::Result;
use crate::types::{AppMetadata, Wallet};

/// Client configuration. Deserializes from camelCase JSON; the timing fields
/// are optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub metadata: AppMetadata,
    pub wallet: Wallet,
    /// Upper bound on one wallet round trip. `null` waits forever.
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: Option<u64>,
    #[serde(default = "default_segment_dismiss_delay_ms")]
    pub segment_dismiss_delay_ms: u64,
}

fn default_response_timeout_secs() -> Option<u64> {
    Some(DEFAULT_RESPONSE_TIMEOUT_SECS)
}

fn default_segment_dismiss_delay_ms() -> u64 {
    DEFAULT_SEGMENT_DISMISS_DELAY_MS
}

impl ClientConfig {
    pub fn new(metadata: AppMetadata, wallet: Wallet) -> Self {
        Self {
            metadata,
            wallet,
            response_timeout_secs: default_response_timeout_secs(),
            segment_dismiss_delay_ms: default_segment_dismiss_delay_ms(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_secs.map(Duration::from_secs)
    }

    pub fn segment_dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.segment_dismiss_delay_ms)
    }
}
