/// Encoding
///
/// Protocol messages travel as URL query strings. Every field is JSON encoded
/// into its own query parameter, binary fields are base64. Encrypted payloads
/// too long for a single URL are split into segments.
///
use base64ct::{Base64, Encoding};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::{Url, form_urlencoded};

use crate::constants::{MAX_ENCRYPTED_PAYLOAD_LENGTH, SEGMENT_DELIMITER, SEGMENT_SIZE};
use crate::error::{Error, Result};
use crate::message::{Content, EncryptedData, MessageId, RequestMessage, ResponseMessage, Segment};
use crate::utils::{UrlParams, format_timestamp, parse_timestamp};

struct ParamWriter {
    serializer: form_urlencoded::Serializer<'static, String>,
}

impl ParamWriter {
    fn new() -> Self {
        Self {
            serializer: form_urlencoded::Serializer::new(String::new()),
        }
    }

    fn append<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<&mut Self> {
        self.serializer.append_pair(key, &serde_json::to_string(value)?);
        Ok(self)
    }

    fn append_opt<T: Serialize>(&mut self, key: &str, value: Option<&T>) -> Result<&mut Self> {
        if let Some(value) = value {
            self.append(key, value)?;
        }
        Ok(self)
    }

    fn finish(mut self) -> String {
        self.serializer.finish()
    }
}

fn required<T: DeserializeOwned>(params: &UrlParams, key: &'static str) -> Result<T> {
    let raw = params.get(key).ok_or(Error::MissingParameter(key))?;
    Ok(serde_json::from_str(raw)?)
}

fn optional<T: DeserializeOwned>(params: &UrlParams, key: &'static str) -> Result<Option<T>> {
    params
        .get(key)
        .map(|raw| serde_json::from_str(raw).map_err(Error::from))
        .transpose()
}

fn required_timestamp(params: &UrlParams) -> Result<time::OffsetDateTime> {
    parse_timestamp(&required::<String>(params, "timestamp")?)
}

pub fn encode_request_url_params(request: &RequestMessage) -> Result<String> {
    let mut writer = ParamWriter::new();
    writer
        .append("id", &request.id)?
        .append("sender", &request.sender)?
        .append("sdkVersion", &request.sdk_version)?
        .append("callbackUrl", &request.callback_url)?
        .append_opt("customScheme", request.custom_scheme.as_ref())?
        .append("timestamp", &format_timestamp(&request.timestamp)?)?
        .append("content", &request.content)?;
    Ok(writer.finish())
}

pub fn decode_request_url_params(params: &UrlParams) -> Result<RequestMessage> {
    Ok(RequestMessage {
        id: required(params, "id")?,
        sender: required(params, "sender")?,
        content: required(params, "content")?,
        timestamp: required_timestamp(params)?,
        sdk_version: required(params, "sdkVersion")?,
        callback_url: required(params, "callbackUrl")?,
        custom_scheme: optional(params, "customScheme")?,
    })
}

pub fn encode_response_url_params(response: &ResponseMessage) -> Result<String> {
    let mut writer = ParamWriter::new();
    writer
        .append("id", &response.id)?
        .append("sender", &response.sender)?
        .append("requestId", &response.request_id)?
        .append("timestamp", &format_timestamp(&response.timestamp)?)?
        .append("content", &response.content)?;
    Ok(writer.finish())
}

pub fn decode_response_url_params(params: &UrlParams) -> Result<ResponseMessage> {
    Ok(ResponseMessage {
        id: required(params, "id")?,
        sender: required(params, "sender")?,
        request_id: required(params, "requestId")?,
        content: required(params, "content")?,
        timestamp: required_timestamp(params)?,
    })
}

/// Full URL that opens the wallet surface with `request`.
pub fn request_url(wallet_url: &str, request: &RequestMessage) -> Result<Url> {
    let mut url = Url::parse(wallet_url)?;
    url.set_query(Some(&encode_request_url_params(request)?));
    Ok(url)
}

fn segment_payload(encrypted: &EncryptedData) -> Option<String> {
    let iv = Base64::encode_string(&encrypted.iv);
    let cipher_text = Base64::encode_string(&encrypted.cipher_text);
    if iv.len() + cipher_text.len() <= MAX_ENCRYPTED_PAYLOAD_LENGTH {
        return None;
    }
    Some(format!("{iv}{SEGMENT_DELIMITER}{cipher_text}"))
}

/// Splits an oversized encrypted request into segment messages, in send
/// order. Anything else comes back as a single message.
pub fn segment_request(request: &RequestMessage) -> Result<Vec<RequestMessage>> {
    let payload = match &request.content {
        Content::Encrypted(encrypted) => segment_payload(encrypted),
        Content::Handshake(_) | Content::Failure(_) | Content::Segment(_) => None,
    };
    let Some(payload) = payload else {
        return Ok(vec![request.clone()]);
    };

    let total_size = payload.len();
    payload
        .as_bytes()
        .chunks(SEGMENT_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            Ok(RequestMessage {
                id: MessageId::new(),
                content: Content::Segment(Segment::Data {
                    total_size,
                    index,
                    data: String::from_utf8(chunk.to_vec())?,
                }),
                ..request.clone()
            })
        })
        .collect()
}

/// Rebuilds the encrypted payload from its segments. Parts may arrive in any
/// order but must cover every index exactly once.
pub fn reassemble_segments(parts: &[Segment]) -> Result<EncryptedData> {
    let mut data_parts = parts
        .iter()
        .map(|part| match part {
            Segment::Data {
                total_size,
                index,
                data,
            } => Ok((*index, *total_size, data.as_str())),
            Segment::Ack { .. } => Err(Error::UnexpectedContent("segment ack")),
        })
        .collect::<Result<Vec<_>>>()?;
    data_parts.sort_by_key(|(index, _, _)| *index);

    let total_size = data_parts
        .first()
        .map(|(_, total_size, _)| *total_size)
        .ok_or(Error::MissingParameter("segment"))?;

    let mut payload = String::with_capacity(total_size);
    for (expected, (index, size, data)) in data_parts.iter().enumerate() {
        if *index != expected || *size != total_size {
            return Err(format!(
                "segment {index} out of sequence (expected {expected}, total {size}/{total_size})"
            )
            .into());
        }
        payload.push_str(data);
    }
    if payload.len() != total_size {
        return Err(format!(
            "incomplete segments: {} of {total_size} characters",
            payload.len()
        )
        .into());
    }

    let (iv, cipher_text) = payload
        .split_once(SEGMENT_DELIMITER)
        .ok_or("segment payload missing delimiter")?;
    Ok(EncryptedData {
        iv: Base64::decode_vec(iv)?,
        cipher_text: Base64::decode_vec(cipher_text)?,
    })
}
