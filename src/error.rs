use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Standard EIP-1193 and JSON-RPC error codes.
pub mod codes {
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL: i64 = -32603;
    pub const USER_REJECTED_REQUEST: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
}

#[derive(Debug)]
pub enum Error {
    /// An EIP-1193 / JSON-RPC error, either raised locally or returned by the
    /// wallet or an RPC node.
    JsonRpc(JsonRpcError),
    MissingParameter(&'static str),
    InvalidPublicKey(usize),
    InvalidIvLength(usize),
    UnexpectedContent(&'static str),
    NativeWalletUnsupported,
    RequestTimeout,
    InternalError(String),
    ParseInt(std::num::ParseIntError),
    UrlParse(url::ParseError),
    Reqwest(reqwest::Error),
    SerdeJsonError(serde_json::Error),
    FromHexError(alloy::hex::FromHexError),
    Base64Error(base64ct::Error),
    AesError(aes_gcm::Error),
    HkdfError(hkdf::InvalidLength),
    FromUtf8Error(std::string::FromUtf8Error),
    Io(std::io::Error),
    TimeFormat(time::error::Format),
    TimeParse(time::error::Parse),
}

impl Error {
    pub fn invalid_params(message: impl Into<String>, data: Option<Value>) -> Self {
        JsonRpcError::new(codes::INVALID_PARAMS, message, data).into()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        JsonRpcError::new(codes::INTERNAL, message, None).into()
    }

    pub fn user_rejected_request() -> Self {
        JsonRpcError::new(
            codes::USER_REJECTED_REQUEST,
            "User rejected the request.",
            None,
        )
        .into()
    }

    pub fn unauthorized(message: Option<&str>) -> Self {
        JsonRpcError::new(
            codes::UNAUTHORIZED,
            message.unwrap_or(
                "The requested account and/or method has not been authorized by the user.",
            ),
            None,
        )
        .into()
    }

    pub fn unsupported_method() -> Self {
        JsonRpcError::new(
            codes::UNSUPPORTED_METHOD,
            "The requested method is not supported by this Ethereum provider.",
            None,
        )
        .into()
    }

    /// JSON-RPC code when this is an RPC-level error.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Error::JsonRpc(e) => Some(e.code),
            _ => None,
        }
    }
}

/// A JSON-RPC error object (code, message, and optional data).
///
/// Fields other than `code`, `message` and `data` are preserved so a
/// serialized wallet error passes through unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
            extra: Map::new(),
        }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::JsonRpc(e) => write!(f, "{e}"),
            Error::MissingParameter(p) => write!(f, "missing parameter: {p}"),
            Error::InvalidPublicKey(len) => {
                write!(f, "invalid public key length: {len}")
            }
            Error::InvalidIvLength(len) => write!(f, "invalid iv length: {len}"),
            Error::UnexpectedContent(what) => {
                write!(f, "unexpected message content: {what}")
            }
            Error::NativeWalletUnsupported => {
                write!(f, "native wallet not supported yet")
            }
            Error::RequestTimeout => {
                write!(f, "timed out waiting for the wallet to respond")
            }
            Error::InternalError(e) => write!(f, "{e}"),
            Error::ParseInt(e) => write!(f, "{e}"),
            Error::UrlParse(e) => write!(f, "{e}"),
            Error::Reqwest(e) => write!(f, "{e}"),
            Error::SerdeJsonError(e) => write!(f, "{e}"),
            Error::FromHexError(e) => write!(f, "{e}"),
            Error::Base64Error(e) => write!(f, "{e}"),
            Error::AesError(e) => write!(f, "{e}"),
            Error::HkdfError(e) => write!(f, "{e}"),
            Error::FromUtf8Error(e) => write!(f, "{e}"),
            Error::Io(e) => write!(f, "{e}"),
            Error::TimeFormat(e) => write!(f, "{e}"),
            Error::TimeParse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::InternalError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::InternalError(e)
    }
}

impl From<JsonRpcError> for Error {
    fn from(e: JsonRpcError) -> Self {
        Error::JsonRpc(e)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Error::ParseInt(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::UrlParse(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Reqwest(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerdeJsonError(e)
    }
}

impl From<alloy::hex::FromHexError> for Error {
    fn from(e: alloy::hex::FromHexError) -> Self {
        Error::FromHexError(e)
    }
}

impl From<base64ct::Error> for Error {
    fn from(e: base64ct::Error) -> Self {
        Error::Base64Error(e)
    }
}

impl From<aes_gcm::Error> for Error {
    fn from(e: aes_gcm::Error) -> Self {
        Error::AesError(e)
    }
}

impl From<hkdf::InvalidLength> for Error {
    fn from(e: hkdf::InvalidLength) -> Self {
        Error::HkdfError(e)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::FromUtf8Error(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<time::error::Format> for Error {
    fn from(e: time::error::Format) -> Self {
        Error::TimeFormat(e)
    }
}

impl From<time::error::Parse> for Error {
    fn from(e: time::error::Parse) -> Self {
        Error::TimeParse(e)
    }
}
