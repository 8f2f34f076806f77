//! Envelope wire format
//!
//! Format:
//!   tag[1] || b64(field_0) || "]" || b64(field_1) [ || "]" || b64(field_2) ]
//!
//! | tag | mode             | fields                     |
//! |-----|------------------|----------------------------|
//! | `0` | AES_KEYSTORE     | iv, ciphertext             |
//! | `1` | RSA_KEYSTORE     | wrapped key, iv, ciphertext|
//! | `2` | PASSWORD_DERIVED | salt, iv, ciphertext       |
//!
//! Base64 is the standard padded alphabet, which never produces `]` or a
//! line break, so splitting is unambiguous and the whole envelope is a
//! single ASCII line.
//!
//! Decoding is strict: padding must be canonical and the unused low bits of
//! the last symbol must be zero. Altering the final symbol before `==`
//! padding (say `AA==` to `AB==`) is therefore reported as a `Format` error
//! by the codec, before any MAC is checked, rather than as `Crypto`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{EncryptionError, Result};
use crate::tier::Mode;

pub const FIELD_SEPARATOR: char = ']';

/// Shortest text that can possibly be an envelope: the tag plus one byte.
pub const MIN_ENVELOPE_CHARS: usize = 2;

/// Decoded envelope: mode plus raw (base64-decoded) fields in wire order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub mode: Mode,
    pub fields: Vec<Vec<u8>>,
}

impl Envelope {
    pub fn new(mode: Mode, fields: Vec<Vec<u8>>) -> Self {
        Self { mode, fields }
    }

    /// Field `index`, or a format error if the envelope is short.
    pub fn field(&self, index: usize) -> Result<&[u8]> {
        self.fields.get(index).map(Vec::as_slice).ok_or_else(|| {
            EncryptionError::format(format!("{} envelope has no field {}", self.mode, index))
        })
    }
}

/// Metadata about an envelope without decrypting it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeInfo {
    pub mode: Mode,
    pub field_lengths: Vec<usize>,
}

pub fn encode(envelope: &Envelope) -> Result<String> {
    if envelope.fields.len() != envelope.mode.arity() {
        return Err(EncryptionError::format(format!(
            "{} needs {} fields, got {}",
            envelope.mode,
            envelope.mode.arity(),
            envelope.fields.len()
        )));
    }

    let mut out = String::new();
    out.push(envelope.mode.tag());
    for (i, field) in envelope.fields.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        STANDARD.encode_string(field, &mut out);
    }
    Ok(out)
}

pub fn decode(text: &str) -> Result<Envelope> {
    if text.len() < MIN_ENVELOPE_CHARS {
        return Err(EncryptionError::format("envelope too short"));
    }

    let mut chars = text.chars();
    let tag = chars
        .next()
        .ok_or_else(|| EncryptionError::format("envelope too short"))?;
    let mode = Mode::from_tag(tag)
        .ok_or_else(|| EncryptionError::format(format!("unknown mode tag {:?}", tag)))?;

    let body = chars.as_str();
    let segments: Vec<&str> = body.split(FIELD_SEPARATOR).collect();
    if segments.len() != mode.arity() {
        return Err(EncryptionError::format(format!(
            "{} needs {} fields, found {}",
            mode,
            mode.arity(),
            segments.len()
        )));
    }

    let fields = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            STANDARD
                .decode(segment)
                .map_err(|e| EncryptionError::format(format!("field {}: {}", i, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Envelope { mode, fields })
}

/// Parse `text` and report its mode and field sizes.
pub fn inspect(text: &str) -> Result<EnvelopeInfo> {
    let envelope = decode(text)?;
    Ok(EnvelopeInfo {
        mode: envelope.mode,
        field_lengths: envelope.fields.iter().map(Vec::len).collect(),
    })
}
