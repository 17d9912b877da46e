use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use bincode::Options;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::clock::expiry_after;
use crate::error::CodecError;

/// Upper bound on the inflated envelope; larger input is treated as corrupt.
const MAX_ENVELOPE_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Serialize, Deserialize)]
struct Envelope {
    exp: i64,
    data: Vec<u8>,
}

/// Result of opening a payload token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The carried bytes; `None` when the token is expired or unreadable.
    pub data: Option<Vec<u8>>,
    /// Expiry as unix seconds; `None` only when the token is unreadable.
    pub exp: Option<i64>,
}

impl Decoded {
    fn invalid() -> Self {
        Decoded {
            data: None,
            exp: None,
        }
    }
}

/// Pack `data` and an expiry `ttl_minutes` from now into a URL-safe token.
///
/// # Arguments
/// * `data` - The bytes to carry, usually a finished CSV file
/// * `ttl_minutes` - How long the token stays readable
///
/// # Returns
/// The token (zlib-compressed envelope in unpadded URL-safe base64), or
/// [`CodecError::Lifetime`] when `ttl_minutes` is not positive or too large.
///
/// # Examples
/// ```
/// use tasksheet::payload::{decode, encode};
///
/// let token = encode(b"a,b\n", 10).unwrap();
/// assert_eq!(decode(&token).data.as_deref(), Some(&b"a,b\n"[..]));
/// assert!(encode(b"a,b\n", i64::MAX).is_err());
/// ```
pub fn encode(data: &[u8], ttl_minutes: i64) -> Result<String, CodecError> {
    encode_at(data, ttl_minutes, Utc::now())
}

/// [`encode`] against an explicit clock reading.
pub fn encode_at(data: &[u8], ttl_minutes: i64, now: DateTime<Utc>) -> Result<String, CodecError> {
    let exp = expiry_after(now, ttl_minutes)
        .ok_or(CodecError::Lifetime(ttl_minutes))?
        .timestamp();
    let envelope = Envelope {
        exp,
        data: data.to_vec(),
    };

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    bincode_options().serialize_into(&mut encoder, &envelope)?;
    encoder.flush()?;
    let compressed = encoder.finish()?;

    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Open a token made by [`encode`].
///
/// # Arguments
/// * `token` - The `?payload=` value, with or without base64 padding
///
/// # Returns
/// Never fails: a token that cannot be read yields `data: None, exp: None`; an
/// expired one yields `data: None, exp: Some(exp)` so the two cases can be told apart.
///
/// # Examples
/// ```
/// use tasksheet::payload::decode;
///
/// let decoded = decode("not a token");
/// assert_eq!((decoded.data, decoded.exp), (None, None));
/// ```
pub fn decode(token: &str) -> Decoded {
    decode_at(token, Utc::now())
}

/// [`decode`] against an explicit clock reading.
pub fn decode_at(token: &str, now: DateTime<Utc>) -> Decoded {
    let envelope = match open_envelope(token.trim()) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::debug!("payload token rejected: {}", e);
            return Decoded::invalid();
        }
    };

    if envelope.exp <= now.timestamp() {
        return Decoded {
            data: None,
            exp: Some(envelope.exp),
        };
    }

    Decoded {
        data: Some(envelope.data),
        exp: Some(envelope.exp),
    }
}

fn open_envelope(token: &str) -> Result<Envelope, CodecError> {
    let pad = (4 - token.len() % 4) % 4;
    let padded = format!("{}{}", token, "=".repeat(pad));
    let compressed = URL_SAFE.decode(padded.as_bytes())?;

    let decoder = ZlibDecoder::new(compressed.as_slice());
    let mut raw = Vec::new();
    decoder.take(MAX_ENVELOPE_BYTES + 1).read_to_end(&mut raw)?;
    if raw.len() as u64 > MAX_ENVELOPE_BYTES {
        return Err(CodecError::TooLarge);
    }

    Ok(bincode_options().deserialize(&raw)?)
}

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_ENVELOPE_BYTES)
}
