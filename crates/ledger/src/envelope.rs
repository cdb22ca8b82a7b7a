//! Signed claim envelope shared by transaction tokens and terminal credentials.
//!
//! Wire shape: `<prefix>.<base64url(json claims)>.<hex(hmac-sha256)>`. The MAC
//! covers the prefix and the encoded payload, so every field of the claim set
//! is committed to by the signature. The whole string stays well under a QR
//! payload's few hundred bytes.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors from envelope encoding or verification.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The string is not a well-formed envelope, or the claims don't parse.
    #[error("malformed envelope: {0}")]
    Malformed(String),
    /// The MAC does not match the payload.
    #[error("envelope signature mismatch")]
    SignatureMismatch,
}

fn mac_for(prefix: &str, payload: &str, secret: &SecretString) -> Result<HmacSha256, EnvelopeError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
    mac.update(prefix.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Serialize and sign a claim set.
pub fn encode<T: Serialize>(
    prefix: &str,
    claims: &T,
    secret: &SecretString,
) -> Result<String, EnvelopeError> {
    let json = serde_json::to_vec(claims)
        .map_err(|e| EnvelopeError::Malformed(format!("could not serialize claims: {e}")))?;
    let payload = URL_SAFE_NO_PAD.encode(json);
    let mac = mac_for(prefix, &payload, secret)?;
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{prefix}.{payload}.{signature}"))
}

/// Verify the signature and deserialize the claim set.
///
/// The MAC is checked (in constant time) before the payload is decoded, so
/// nothing inside an unsigned payload is ever interpreted.
pub fn decode<T: DeserializeOwned>(
    prefix: &str,
    encoded: &str,
    secret: &SecretString,
) -> Result<T, EnvelopeError> {
    let mut parts = encoded.splitn(3, '.');
    let (Some(version), Some(payload), Some(signature)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(EnvelopeError::Malformed(
            "expected three dot-separated segments".to_owned(),
        ));
    };
    if version != prefix {
        return Err(EnvelopeError::Malformed(format!(
            "unknown envelope version {version:?}"
        )));
    }
    let signature_bytes = hex::decode(signature)
        .map_err(|_| EnvelopeError::Malformed("signature is not hex".to_owned()))?;

    let mac = mac_for(prefix, payload, secret)?;
    mac.verify_slice(&signature_bytes)
        .map_err(|_| EnvelopeError::SignatureMismatch)?;

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| EnvelopeError::Malformed(format!("payload is not base64url: {e}")))?;
    serde_json::from_slice(&json)
        .map_err(|e| EnvelopeError::Malformed(format!("claims do not parse: {e}")))
}
