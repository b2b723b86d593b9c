//! Decoding of integer and byte-string literals of the assembly format.

use core::fmt;

use base64::Engine;
use sha2::{Digest, Sha512_256};
use std::str::FromStr;

use crate::field::{OnComplete, TxnType};

/// A literal that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError(pub(crate) String);

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for LiteralError {}

fn err<T>(msg: impl Into<String>) -> Result<T, LiteralError> {
    Err(LiteralError(msg.into()))
}

/// Parse an integer literal: decimal, `0x` hexadecimal, or a recognized
/// named constant (transaction types and on-completion actions).
pub fn parse_uint(token: &str) -> Result<u64, LiteralError> {
    if let Some(hexdigits) = token.strip_prefix("0x") {
        return u64::from_str_radix(hexdigits, 16)
            .map_err(|e| LiteralError(format!("invalid hex integer `{token}`: {e}")));
    }
    if token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return token
            .parse::<u64>()
            .map_err(|e| LiteralError(format!("invalid integer `{token}`: {e}")));
    }
    if let Ok(ty) = TxnType::from_str(token) {
        return Ok(ty.value());
    }
    if let Ok(oc) = OnComplete::from_str(token) {
        return Ok(oc.value());
    }
    err(format!("unrecognized integer constant `{token}`"))
}

/// Parse a byte literal spelled as one or two operand tokens.
///
/// Accepted forms: `base64 X` / `b64 X` / `base64(X)` / `b64(X)`, the
/// base32 equivalents, `base16 X` / `0xABCD`, and a double-quoted string
/// with `\n \t \r \\ \" \xNN` escapes. Returns the decoded bytes and the
/// number of tokens consumed.
pub fn parse_byte_literal(tokens: &[&str]) -> Result<(Vec<u8>, usize), LiteralError> {
    let first = match tokens.first() {
        Some(t) => *t,
        None => return err("missing byte literal"),
    };

    if first.starts_with('"') {
        return Ok((unescape_string(first)?, 1));
    }
    if let Some(hexdigits) = first.strip_prefix("0x") {
        let bytes = hex::decode(hexdigits)
            .map_err(|e| LiteralError(format!("invalid base16 literal `{first}`: {e}")))?;
        return Ok((bytes, 1));
    }

    let decoders: [(&str, fn(&str) -> Result<Vec<u8>, LiteralError>); 5] = [
        ("base64", decode_base64),
        ("b64", decode_base64),
        ("base32", decode_base32),
        ("b32", decode_base32),
        ("base16", decode_base16),
    ];
    for (prefix, decode) in decoders {
        if first == prefix {
            let payload = match tokens.get(1) {
                Some(t) => *t,
                None => return err(format!("`{prefix}` literal is missing its payload")),
            };
            return Ok((decode(payload)?, 2));
        }
        if let Some(rest) = first.strip_prefix(prefix) {
            if let Some(payload) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
                return Ok((decode(payload)?, 1));
            }
        }
    }

    err(format!("unrecognized byte literal `{first}`"))
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, LiteralError> {
    let trimmed = payload.trim_end_matches('=');
    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(trimmed)
        .map_err(|e| LiteralError(format!("invalid base64 literal `{payload}`: {e}")))
}

fn decode_base16(payload: &str) -> Result<Vec<u8>, LiteralError> {
    let digits = payload.strip_prefix("0x").unwrap_or(payload);
    hex::decode(digits).map_err(|e| LiteralError(format!("invalid base16 literal `{payload}`: {e}")))
}

const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

// RFC 4648 without padding. No crate in the dependency stack covers base32,
// so the decoder lives here.
fn decode_base32(payload: &str) -> Result<Vec<u8>, LiteralError> {
    let trimmed = payload.trim_end_matches('=');
    let mut bits = 0u32;
    let mut nbits = 0u8;
    let mut out = Vec::with_capacity(trimmed.len() * 5 / 8);
    for c in trimmed.bytes() {
        let value = BASE32_ALPHABET
            .iter()
            .position(|&a| a == c.to_ascii_uppercase())
            .ok_or_else(|| LiteralError(format!("invalid base32 character `{}`", c as char)))?;
        bits = (bits << 5) | value as u32;
        nbits += 5;
        if nbits >= 8 {
            nbits -= 8;
            out.push((bits >> nbits) as u8);
        }
    }
    Ok(out)
}

fn unescape_string(token: &str) -> Result<Vec<u8>, LiteralError> {
    let inner = token
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| LiteralError(format!("unterminated string literal {token}")))?;
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('r') => out.push(b'\r'),
            Some('\\') => out.push(b'\\'),
            Some('"') => out.push(b'"'),
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16).map_err(|_| {
                            LiteralError(format!("invalid \\x escape in {token}"))
                        })?;
                        out.push(byte);
                    }
                    _ => return err(format!("truncated \\x escape in {token}")),
                }
            }
            other => return err(format!("unsupported escape `\\{:?}` in {token}", other)),
        }
    }
    Ok(out)
}

/// Decode a checksummed 58-character address into its 32-byte public key.
pub fn decode_address(address: &str) -> Result<[u8; 32], LiteralError> {
    if address.len() != 58 {
        return err(format!(
            "address `{address}` must be 58 characters, got {}",
            address.len()
        ));
    }
    let raw = decode_base32(address)?;
    if raw.len() < 36 {
        return err(format!("address `{address}` decodes to {} bytes", raw.len()));
    }
    let (key, checksum) = raw.split_at(32);
    let digest = Sha512_256::digest(key);
    if &digest[28..32] != &checksum[..4] {
        return err(format!("address `{address}` has a bad checksum"));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(key);
    Ok(out)
}

/// Derive the 4-byte selector of an ABI method signature.
pub fn method_selector(signature: &str) -> [u8; 4] {
    let digest = Sha512_256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}
