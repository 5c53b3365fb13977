//! Normalization of external tool output into UTF-8 text.
//!
//! Command-line tools running under a Chinese Windows locale write their
//! output in the GBK code page. Every consumer of tool output runs the raw
//! bytes through [`normalize`] before doing any string matching.

use encoding_rs::GBK;

use crate::error::{NetConfigError, Result};

/// Converts raw bytes to text.
///
/// Valid UTF-8 is returned unchanged. Anything else is decoded as GBK; bytes
/// that are valid in neither encoding produce [`NetConfigError::Decode`].
pub fn normalize(bytes: &[u8]) -> Result<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    GBK.decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            NetConfigError::Decode(format!(
                "{} bytes are neither valid UTF-8 nor GBK",
                bytes.len()
            ))
        })
}

/// Like [`normalize`], but never fails: undecodable bytes are replaced.
/// Used for diagnostic text that only ends up in logs or error messages.
pub fn normalize_lossy(bytes: &[u8]) -> String {
    normalize(bytes).unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
}
