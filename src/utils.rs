//! Header names and small helpers shared by the gate, the tower layer and the demos.

use crate::errors::{Result, X402Error};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use http::{HeaderMap, Uri};
use serde_json::Value;
use url::Url;

/// Request header carrying the proof of payment (`X-PAYMENT`).
///
/// Lowercase so it can be used directly as a static [`http::HeaderName`].
pub const PAYMENT_HEADER: &str = "x-payment";

/// Response header carrying the settlement receipt (`X-PAYMENT-RESPONSE`).
pub const PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

/// Turns a facilitator receipt into an `X-PAYMENT-RESPONSE` header value.
///
/// String receipts are passed through verbatim. Any other JSON value is
/// serialized and Base64 encoded.
///
/// # Examples
///
/// ```
/// use x402_gate::utils::encode_receipt;
/// use serde_json::json;
///
/// assert_eq!(encode_receipt(&json!("R1")).unwrap(), "R1");
/// assert_ne!(encode_receipt(&json!({"txHash": "0xabc"})).unwrap(), "");
/// ```
pub fn encode_receipt(receipt: &Value) -> Result<String> {
    match receipt {
        Value::String(opaque) => Ok(opaque.clone()),
        structured => {
            let json = serde_json::to_string(structured)?;
            Ok(BASE64.encode(json.as_bytes()))
        }
    }
}

/// Reverses [`encode_receipt`] for structured receipts.
///
/// Returns `None` when the header is an opaque string rather than Base64 JSON.
pub fn decode_receipt(header: &str) -> Option<Value> {
    let bytes = BASE64.decode(header.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Builds the absolute `resource` URL for a request.
///
/// `base_url` fixes the scheme and host when configured, and its path is kept
/// as a prefix: `https://api.example.com/v1` serves `/weather` as
/// `https://api.example.com/v1/weather`. Otherwise scheme and host come from the
/// request URI, then the `Host` header, then `http://localhost`.
/// The query string and fragment are always dropped.
///
/// # Examples
///
/// ```
/// use x402_gate::utils::resource_url;
/// use http::{HeaderMap, Uri};
///
/// let uri: Uri = "/weather?city=paris".parse().unwrap();
/// let mut headers = HeaderMap::new();
/// headers.insert("host", "api.example.com".parse().unwrap());
///
/// let url = resource_url(None, &uri, &headers).unwrap();
/// assert_eq!(url.as_str(), "http://api.example.com/weather");
/// ```
pub fn resource_url(base_url: Option<&Url>, uri: &Uri, headers: &HeaderMap) -> Result<Url> {
    let (mut url, prefix) = match base_url {
        Some(base) => (base.clone(), base.path().trim_end_matches('/').to_string()),
        None => {
            let scheme = uri.scheme_str().unwrap_or("http");
            let host = match uri.authority() {
                Some(authority) => authority.as_str().to_string(),
                None => match headers.get(http::header::HOST) {
                    Some(value) => value
                        .to_str()
                        .map_err(|e| X402Error::InvalidHost(e.to_string()))?
                        .to_string(),
                    None => "localhost".to_string(),
                },
            };
            (Url::parse(&format!("{scheme}://{host}"))?, String::new())
        }
    };
    url.set_path(&format!("{prefix}{}", uri.path()));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
