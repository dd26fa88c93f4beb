//! Hex and base64url codecs for cookie envelopes and configured keys.
//!
//! These functions know nothing about HTTP or cryptography. Every byte they
//! see may be attacker controlled, so each decoder either returns the full
//! decoded value or fails; there is no partial output.
//!
//! The base64url alphabet is the URL and filename safe one from RFC 4648
//! section 5. Padding is never emitted and never accepted.

use std::fmt;

const BASE64URL_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Marks bytes outside the base64url alphabet in [`BASE64URL_SEXTETS`].
const NOT_BASE64URL: u8 = 0xFF;

/// Reverse lookup from an input byte to its 6-bit value.
const BASE64URL_SEXTETS: [u8; 256] = {
    let mut table = [NOT_BASE64URL; 256];
    let mut i = 0;
    while i < BASE64URL_ALPHABET.len() {
        table[BASE64URL_ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Error returned when encoded input cannot be decoded.
///
/// Deliberately carries no position or offending byte: decoded values are
/// cookie envelopes and keys, and neither should leak through error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Odd length, or a character outside `0-9a-fA-F`.
    MalformedHex,
    /// A byte outside the base64url alphabet, or a length that no byte string encodes to.
    MalformedBase64,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::MalformedHex => write!(f, "malformed hex input"),
            CodecError::MalformedBase64 => write!(f, "malformed base64url input"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Encodes bytes as two lowercase hex digits per byte.
///
/// # Examples
///
/// ```
/// use token_handler::codec::hex_encode;
///
/// assert_eq!(hex_encode(&[0x00, 0xab, 0xff]), "00abff");
/// ```
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}

/// Decodes hex text, accepting upper and lower case digits.
///
/// Each pair is read as `16 * first + second`: the digit at the even index
/// seeds the byte and the digit at the following odd index is added to it.
///
/// # Errors
///
/// Returns [`CodecError::MalformedHex`] for odd-length input or any non-hex
/// character.
///
/// # Examples
///
/// ```
/// use token_handler::codec::hex_decode;
///
/// assert_eq!(hex_decode(b"00AbfF").unwrap(), vec![0x00, 0xab, 0xff]);
/// assert!(hex_decode(b"abc").is_err());
/// assert!(hex_decode(b"zz").is_err());
/// ```
pub fn hex_decode(hex: &[u8]) -> Result<Vec<u8>, CodecError> {
    if hex.len() % 2 != 0 {
        return Err(CodecError::MalformedHex);
    }

    let mut out = vec![0u8; hex.len() / 2];
    decode_hex_pairs(hex, &mut out)?;
    Ok(out)
}

/// Decodes hex text into a fixed-size array without heap allocation.
///
/// Used for key material so the decoded bytes never live in a growable
/// buffer that could be reallocated and left behind.
///
/// # Errors
///
/// Returns [`CodecError::MalformedHex`] unless `hex` is exactly `2 * N`
/// valid hex digits.
pub fn hex_decode_array<const N: usize>(hex: &[u8]) -> Result<[u8; N], CodecError> {
    if hex.len() != N * 2 {
        return Err(CodecError::MalformedHex);
    }

    let mut out = [0u8; N];
    decode_hex_pairs(hex, &mut out)?;
    Ok(out)
}

fn decode_hex_pairs(hex: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
    for (i, &c) in hex.iter().enumerate() {
        let digit = hex_value(c).ok_or(CodecError::MalformedHex)?;
        if i % 2 == 0 {
            out[i / 2] = 16 * digit;
        } else {
            out[i / 2] += digit;
        }
    }
    Ok(())
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(10 + (c - b'a')),
        b'A'..=b'F' => Some(10 + (c - b'A')),
        _ => None,
    }
}

/// Returns the decoded byte length for `symbols` base64url characters.
///
/// Full groups of four symbols carry three bytes; a trailing group of two or
/// three symbols carries one or two bytes. A trailing group of one symbol
/// cannot be produced by any input and yields `None`.
pub fn base64url_decoded_len(symbols: usize) -> Option<usize> {
    let full = (symbols / 4) * 3;
    match symbols % 4 {
        0 => Some(full),
        2 => Some(full + 1),
        3 => Some(full + 2),
        _ => None,
    }
}

/// Encodes bytes as unpadded base64url.
///
/// # Examples
///
/// ```
/// use token_handler::codec::base64url_encode;
///
/// assert_eq!(base64url_encode(b"\xfb\xff"), "-_8");
/// assert_eq!(base64url_encode(b"abc"), "YWJj");
/// ```
pub fn base64url_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for group in bytes.chunks(3) {
        let b0 = group[0];
        let b1 = group.get(1).copied().unwrap_or(0);
        let b2 = group.get(2).copied().unwrap_or(0);

        out.push(symbol(b0 >> 2));
        out.push(symbol(((b0 & 0x03) << 4) | (b1 >> 4)));
        if group.len() > 1 {
            out.push(symbol(((b1 & 0x0F) << 2) | (b2 >> 6)));
        }
        if group.len() > 2 {
            out.push(symbol(b2 & 0x3F));
        }
    }
    out
}

fn symbol(sextet: u8) -> char {
    BASE64URL_ALPHABET[(sextet & 0x3F) as usize] as char
}

/// Decodes unpadded base64url text.
///
/// Every input byte must belong to the alphabet; `=` padding, whitespace and
/// standard base64 `+`/`/` are all rejected. Trailing bits in a final partial
/// group are discarded.
///
/// # Errors
///
/// Returns [`CodecError::MalformedBase64`] for any byte outside the alphabet
/// or when the input length modulo 4 is 1.
///
/// # Examples
///
/// ```
/// use token_handler::codec::base64url_decode;
///
/// assert_eq!(base64url_decode(b"YWJjZA").unwrap(), b"abcd".to_vec());
/// assert!(base64url_decode(b"YWJjZA==").is_err());
/// assert!(base64url_decode(b"YWJjZ").is_err());
/// ```
pub fn base64url_decode(text: &[u8]) -> Result<Vec<u8>, CodecError> {
    let decoded_len = base64url_decoded_len(text.len()).ok_or(CodecError::MalformedBase64)?;
    let mut out = Vec::with_capacity(decoded_len);

    for group in text.chunks(4) {
        let mut sextets = [0u8; 4];
        for (slot, &c) in sextets.iter_mut().zip(group) {
            *slot = sextet(c)?;
        }

        out.push((sextets[0] << 2) | (sextets[1] >> 4));
        if group.len() > 2 {
            out.push((sextets[1] << 4) | (sextets[2] >> 2));
        }
        if group.len() > 3 {
            out.push((sextets[2] << 6) | sextets[3]);
        }
    }

    debug_assert_eq!(out.len(), decoded_len);
    Ok(out)
}

fn sextet(c: u8) -> Result<u8, CodecError> {
    match BASE64URL_SEXTETS[c as usize] {
        NOT_BASE64URL => Err(CodecError::MalformedBase64),
        value => Ok(value),
    }
}
