//! Data-URL codec used to carry file content inside JSON envelopes.
//!
//! Content travels as `data:<mime>;base64,<payload>`. The payload always
//! starts after the last comma because the base64 alphabet has none, which
//! keeps MIME types with parameters (even quoted commas) unambiguous.

use base64::{Engine as _, engine::general_purpose};
use thiserror::Error;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("content is not a data URL")]
    MissingScheme,
    #[error("data URL has no payload separator")]
    MissingPayload,
    #[error("data URL is not base64 encoded")]
    NotBase64,
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

/// A decoded data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Content as a viewer wants it for previews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedContent {
    Text(String),
    Binary(Vec<u8>),
}

impl DecodedContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            DecodedContent::Text(text) => text.as_bytes(),
            DecodedContent::Binary(bytes) => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Encode raw bytes and their MIME type into a single data URL.
pub fn encode(bytes: &[u8], mime_type: &str) -> String {
    let payload = general_purpose::STANDARD.encode(bytes);
    format!("{SCHEME}{mime_type}{BASE64_MARKER},{payload}")
}

/// Recover the MIME type and original bytes from a data URL.
pub fn decode(data_url: &str) -> Result<DataUrl, TransferError> {
    let rest = data_url
        .strip_prefix(SCHEME)
        .ok_or(TransferError::MissingScheme)?;
    let (header, payload) = rest.rsplit_once(',').ok_or(TransferError::MissingPayload)?;
    let mime_type = header
        .strip_suffix(BASE64_MARKER)
        .ok_or(TransferError::NotBase64)?;

    let bytes = general_purpose::STANDARD.decode(payload)?;
    Ok(DataUrl {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

/// Decode a data URL for in-page preview.
///
/// Text-typed content becomes a `String` when it is valid UTF-8; anything
/// else stays as bytes.
pub fn decode_preview(data_url: &str) -> Result<DecodedContent, TransferError> {
    let DataUrl { mime_type, bytes } = decode(data_url)?;
    if !is_text_mime(&mime_type) {
        return Ok(DecodedContent::Binary(bytes));
    }

    match String::from_utf8(bytes) {
        Ok(text) => Ok(DecodedContent::Text(text)),
        Err(err) => Ok(DecodedContent::Binary(err.into_bytes())),
    }
}

/// Whether a MIME type should be eagerly decoded to text.
pub fn is_text_mime(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.starts_with("text/")
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
        || matches!(
            essence.as_str(),
            "application/json" | "application/xml" | "application/javascript"
        )
}
