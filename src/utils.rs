use std::collections::HashMap;

use rand::{RngCore, rngs::OsRng};
use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use url::{Url, form_urlencoded};

use crate::constants::MWP_RESPONSE_PATH;
use crate::error::{Error, Result};
use crate::types::{Handling, Method, RequestArguments};

pub type UrlParams = HashMap<String, String>;

pub fn random_bytes32() -> [u8; 32] {
    let mut random_value = [0u8; 32];
    OsRng.fill_bytes(&mut random_value);
    random_value
}

/// Current UTC time truncated to milliseconds, the precision of the wire
/// format.
pub fn now_millis() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_millisecond(now.millisecond()).unwrap_or(now)
}

pub fn format_timestamp(timestamp: &OffsetDateTime) -> Result<String> {
    Ok(timestamp.to_offset(UtcOffset::UTC).format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))?)
}

pub fn parse_timestamp(timestamp: &str) -> Result<OffsetDateTime> {
    Ok(OffsetDateTime::parse(timestamp, &Rfc3339)?)
}

pub fn parse_query(query: &str) -> UrlParams {
    let mut params = HashMap::new();
    for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        params.insert(key.into(), value.into());
    }
    params
}

pub fn url_params(url: &Url) -> UrlParams {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Appends the protocol response path to the dapp's callback URL.
pub fn append_mwp_response_path(url: &str) -> Result<String> {
    let mut url = Url::parse(url)?;
    let path = if url.path().ends_with('/') {
        format!("{}{MWP_RESPONSE_PATH}", url.path())
    } else {
        format!("{}/{MWP_RESPONSE_PATH}", url.path())
    };
    url.set_path(&path);
    Ok(url.to_string())
}

pub fn is_mwp_response_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.path().contains(MWP_RESPONSE_PATH))
        .unwrap_or(false)
}

/// Accepts `"0x2"`, `"2"` or `2`.
pub fn parse_chain_id(value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| Error::invalid_params("chain id out of range", Some(value.clone()))),
        Value::String(s) => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse(),
        }
        .map_err(|e| Error::invalid_params(format!("invalid chain id: {e}"), Some(value.clone()))),
        _ => Err(Error::invalid_params(
            "chain id must be a hex string or number",
            Some(value.clone()),
        )),
    }
}

pub fn hex_string_from_number(n: u64) -> String {
    format!("{n:#x}")
}

/// Validates `request()` arguments per EIP-1193 and rejects methods this
/// client does not support.
pub fn check_error_for_invalid_request_args(args: &RequestArguments) -> Result<()> {
    let data = || Some(json!({ "method": args.method, "params": args.params }));

    if args.method.is_empty() {
        return Err(Error::invalid_params(
            "'args.method' must be a non-empty string.",
            data(),
        ));
    }

    if let Some(params) = &args.params {
        if !params.is_array() && !params.is_object() {
            return Err(Error::invalid_params(
                "'args.params' must be an object or array if provided.",
                data(),
            ));
        }
    }

    if Method::handling_of(&args.method) == Handling::Unsupported {
        return Err(Error::unsupported_method());
    }

    Ok(())
}
