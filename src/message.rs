use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::JsonRpcError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of a protocol message. Exactly one kind per message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Content {
    /// Plaintext account request; the only content sent before a shared
    /// secret exists.
    Handshake(HandshakeAction),
    Encrypted(EncryptedData),
    /// Protocol-level error returned by the wallet instead of a payload.
    Failure(JsonRpcError),
    Segment(Segment),
}

impl Content {
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Handshake(_) => "handshake",
            Content::Encrypted(_) => "encrypted",
            Content::Failure(_) => "failure",
            Content::Segment(_) => "segment",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandshakeAction {
    pub method: String,
    pub params: HandshakeParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeParams {
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_logo_url: Option<String>,
}

impl HandshakeAction {
    pub fn request_accounts(app_name: &str, app_logo_url: Option<String>) -> Self {
        Self {
            method: "eth_requestAccounts".to_string(),
            params: HandshakeParams {
                app_name: app_name.to_string(),
                app_logo_url,
            },
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedData {
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub cipher_text: Vec<u8>,
}

impl fmt::Debug for EncryptedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedData")
            .field("iv", &self.iv.len())
            .field("cipher_text", &self.cipher_text.len())
            .finish()
    }
}

/// One slice of an oversized encrypted message, or the wallet's receipt for
/// one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    #[serde(rename_all = "camelCase")]
    Data {
        total_size: usize,
        index: usize,
        data: String,
    },
    Ack { ack: bool, index: usize },
}

impl Segment {
    pub fn index(&self) -> usize {
        match self {
            Segment::Data { index, .. } | Segment::Ack { index, .. } => *index,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Segment::Ack { ack: true, .. })
    }
}

/// Message sent from the dapp to the wallet.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestMessage {
    pub id: MessageId,
    /// Hex encoded public key of the sender.
    pub sender: String,
    pub content: Content,
    pub timestamp: OffsetDateTime,
    pub sdk_version: String,
    pub callback_url: String,
    pub custom_scheme: Option<String>,
}

/// Message delivered back to the dapp through the callback URL.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseMessage {
    pub id: MessageId,
    pub sender: String,
    /// Id of the request (or request segment) this answers.
    pub request_id: MessageId,
    pub content: Content,
    pub timestamp: OffsetDateTime,
}

mod base64_bytes {
    use base64ct::{Base64, Encoding};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&Base64::encode_string(bytes.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Base64::decode_vec(&encoded).map_err(serde::de::Error::custom)
    }
}
