//! AES-256-GCM cookie envelopes.
//!
//! A cookie value is an encoded envelope holding the GCM nonce, the
//! ciphertext and the 16-byte tag. Two layouts exist:
//!
//! ```text
//! Base64UrlV1 (canonical):  base64url( version(1) || iv(12) || ciphertext || tag(16) )
//! LegacyHex:                hex(                    iv(12) || ciphertext || tag(16) )
//! ```
//!
//! A route accepts exactly one layout. The ciphertext must be at least one
//! byte long, and the version byte must equal [`CURRENT_VERSION`].
//!
//! The cipher is built and dropped inside each call; nothing derived from the
//! key or the plaintext outlives the call except the returned [`Secret`].

use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::codec::{base64url_decode, base64url_encode, hex_decode, hex_encode, CodecError};
use crate::error::EnvelopeError;
use crate::Secret;

/// The only envelope version this crate reads or writes.
pub const CURRENT_VERSION: u8 = 1;
/// Length of the version prefix in a [`EnvelopeScheme::Base64UrlV1`] envelope.
pub const VERSION_SIZE: usize = 1;
/// Length of the GCM nonce.
pub const GCM_IV_SIZE: usize = 12;
/// Length of the GCM authentication tag.
pub const GCM_TAG_SIZE: usize = 16;
/// Length of an AES-256 key.
pub const KEY_SIZE: usize = 32;

/// Wire layout of cookie envelopes on a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum EnvelopeScheme {
    /// Versioned base64url envelope.
    #[default]
    #[serde(rename = "base64url-v1")]
    Base64UrlV1,
    /// Unversioned hex envelope, for deployments that still issue hex cookies.
    #[serde(rename = "hex")]
    LegacyHex,
}

impl EnvelopeScheme {
    /// Bytes in front of the ciphertext.
    fn header_size(self) -> usize {
        match self {
            EnvelopeScheme::Base64UrlV1 => VERSION_SIZE + GCM_IV_SIZE,
            EnvelopeScheme::LegacyHex => GCM_IV_SIZE,
        }
    }

    /// Fixed bytes around the ciphertext.
    fn overhead(self) -> usize {
        self.header_size() + GCM_TAG_SIZE
    }

    fn decode(self, text: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            EnvelopeScheme::Base64UrlV1 => base64url_decode(text),
            EnvelopeScheme::LegacyHex => hex_decode(text),
        }
    }

    fn encode(self, bytes: &[u8]) -> String {
        match self {
            EnvelopeScheme::Base64UrlV1 => base64url_encode(bytes),
            EnvelopeScheme::LegacyHex => hex_encode(bytes),
        }
    }

    /// Upper bound on decoded size for text of `len` bytes.
    fn decoded_len_hint(self, len: usize) -> usize {
        match self {
            EnvelopeScheme::Base64UrlV1 => len / 4 * 3 + 2,
            EnvelopeScheme::LegacyHex => len / 2,
        }
    }
}

/// Borrowed view of a decoded envelope.
struct Envelope<'a> {
    iv: &'a [u8],
    ciphertext: &'a [u8],
    tag: &'a [u8],
}

impl<'a> Envelope<'a> {
    fn parse(scheme: EnvelopeScheme, bytes: &'a [u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() <= scheme.overhead() {
            return Err(EnvelopeError::FormatInvalid);
        }

        let body = match scheme {
            EnvelopeScheme::Base64UrlV1 => {
                if bytes[0] != CURRENT_VERSION {
                    return Err(EnvelopeError::FormatInvalid);
                }
                &bytes[VERSION_SIZE..]
            }
            EnvelopeScheme::LegacyHex => bytes,
        };

        let (iv, rest) = body.split_at(GCM_IV_SIZE);
        let (ciphertext, tag) = rest.split_at(rest.len() - GCM_TAG_SIZE);
        Ok(Self {
            iv,
            ciphertext,
            tag,
        })
    }
}

/// Decrypts a cookie envelope.
///
/// Decoding, length and version failures return
/// [`EnvelopeError::FormatInvalid`]; a tag mismatch returns
/// [`EnvelopeError::AuthFailed`]. Callers must report both the same way.
///
/// When the format checks fail, one GCM open still runs over a zeroed dummy
/// buffer of about the same size, so both failure paths cost one pass of the
/// cipher. The attacker's bytes never reach the cipher in that case.
///
/// # Errors
///
/// See above; [`EnvelopeError::CipherUnavailable`] if the cipher cannot be
/// constructed.
///
/// # Examples
///
/// ```
/// use token_handler::envelope::{decrypt, seal, EnvelopeScheme};
///
/// let key = [0x42u8; 32];
/// let iv = [7u8; 12];
/// let cookie = seal(&key, &iv, b"tok123", EnvelopeScheme::Base64UrlV1).unwrap();
///
/// let plaintext = decrypt(&key, cookie.as_bytes(), EnvelopeScheme::Base64UrlV1).unwrap();
/// assert_eq!(plaintext.expose_secret().as_slice(), b"tok123");
///
/// assert!(decrypt(&[0u8; 32], cookie.as_bytes(), EnvelopeScheme::Base64UrlV1).is_err());
/// ```
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    envelope_text: &[u8],
    scheme: EnvelopeScheme,
) -> Result<Secret<Vec<u8>>, EnvelopeError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::CipherUnavailable)?;

    let decoded = match scheme.decode(envelope_text) {
        Ok(decoded) => decoded,
        Err(_) => {
            equalize(&cipher, scheme.decoded_len_hint(envelope_text.len()), scheme);
            return Err(EnvelopeError::FormatInvalid);
        }
    };

    match Envelope::parse(scheme, &decoded) {
        Ok(envelope) => open(&cipher, &envelope),
        Err(e) => {
            equalize(&cipher, decoded.len(), scheme);
            Err(e)
        }
    }
}

fn open(cipher: &Aes256Gcm, envelope: &Envelope<'_>) -> Result<Secret<Vec<u8>>, EnvelopeError> {
    let mut buffer = Zeroizing::new(envelope.ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(envelope.iv),
            b"",
            buffer.as_mut_slice(),
            Tag::from_slice(envelope.tag),
        )
        .map_err(|_| EnvelopeError::AuthFailed)?;

    Ok(Secret::new(std::mem::take(&mut *buffer)))
}

/// Runs one GCM open over zeroes in place of a malformed envelope.
fn equalize(cipher: &Aes256Gcm, decoded_len: usize, scheme: EnvelopeScheme) {
    let mut dummy = vec![0u8; decoded_len.saturating_sub(scheme.overhead()).max(1)];
    let nonce = [0u8; GCM_IV_SIZE];
    let tag = [0u8; GCM_TAG_SIZE];
    let _ = cipher.decrypt_in_place_detached(
        Nonce::from_slice(&nonce),
        b"",
        &mut dummy,
        Tag::from_slice(&tag),
    );
}

/// Encrypts `plaintext` into an envelope with a caller-chosen nonce.
///
/// This is the inverse of [`decrypt`], for tests and deployment tooling. A
/// nonce must never be reused with the same key; prefer [`seal_random`].
///
/// # Errors
///
/// Returns [`EnvelopeError::FormatInvalid`] for empty plaintext, which no
/// route would accept, and [`EnvelopeError::CipherUnavailable`] if the
/// cipher cannot be constructed or encryption fails.
pub fn seal(
    key: &[u8; KEY_SIZE],
    iv: &[u8; GCM_IV_SIZE],
    plaintext: &[u8],
    scheme: EnvelopeScheme,
) -> Result<String, EnvelopeError> {
    if plaintext.is_empty() {
        return Err(EnvelopeError::FormatInvalid);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EnvelopeError::CipherUnavailable)?;
    let mut buffer = Zeroizing::new(plaintext.to_vec());
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(iv), b"", buffer.as_mut_slice())
        .map_err(|_| EnvelopeError::CipherUnavailable)?;

    let mut bytes = Vec::with_capacity(scheme.overhead() + buffer.len());
    if scheme == EnvelopeScheme::Base64UrlV1 {
        bytes.push(CURRENT_VERSION);
    }
    bytes.extend_from_slice(iv);
    bytes.extend_from_slice(&buffer);
    bytes.extend_from_slice(tag.as_slice());

    Ok(scheme.encode(&bytes))
}

/// Encrypts `plaintext` into an envelope with a fresh random nonce.
///
/// # Errors
///
/// Same as [`seal`].
pub fn seal_random(
    key: &[u8; KEY_SIZE],
    plaintext: &[u8],
    scheme: EnvelopeScheme,
) -> Result<String, EnvelopeError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut iv = [0u8; GCM_IV_SIZE];
    iv.copy_from_slice(nonce.as_slice());
    seal(key, &iv, plaintext, scheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::base64url_decode;

    const KEY: [u8; KEY_SIZE] = [0x11; KEY_SIZE];
    const IV: [u8; GCM_IV_SIZE] = [0x22; GCM_IV_SIZE];

    fn open_text(text: &str, scheme: EnvelopeScheme) -> Result<Vec<u8>, EnvelopeError> {
        decrypt(&KEY, text.as_bytes(), scheme).map(|p| p.expose_secret().clone())
    }

    #[test]
    fn gcm_known_answer() {
        // AES-256-GCM test case 14 from the GCM specification:
        // zero key, zero IV, 16 zero plaintext bytes.
        let key = [0u8; KEY_SIZE];
        let iv = [0u8; GCM_IV_SIZE];
        let cookie = seal(&key, &iv, &[0u8; 16], EnvelopeScheme::LegacyHex).unwrap();

        assert_eq!(
            cookie,
            concat!(
                "000000000000000000000000",
                "cea7403d4d606b6e074ec5d3baf39d18",
                "d0d1c8a799996bf0265b98b5d48ab919",
            )
        );
        let plaintext = decrypt(&key, cookie.as_bytes(), EnvelopeScheme::LegacyHex).unwrap();
        assert_eq!(plaintext.expose_secret().as_slice(), &[0u8; 16]);
    }

    #[test]
    fn base64url_envelope_layout() {
        let cookie = seal(&KEY, &IV, b"tok123", EnvelopeScheme::Base64UrlV1).unwrap();
        let bytes = base64url_decode(cookie.as_bytes()).unwrap();

        assert_eq!(bytes.len(), VERSION_SIZE + GCM_IV_SIZE + 6 + GCM_TAG_SIZE);
        assert_eq!(bytes[0], CURRENT_VERSION);
        assert_eq!(&bytes[1..13], &IV);
        assert!(!cookie.contains('='));
    }

    #[test]
    fn round_trip_both_schemes() {
        for scheme in [EnvelopeScheme::Base64UrlV1, EnvelopeScheme::LegacyHex] {
            let cookie = seal(&KEY, &IV, b"access-token-value", scheme).unwrap();
            assert_eq!(open_text(&cookie, scheme).unwrap(), b"access-token-value");
        }
    }

    #[test]
    fn plaintext_length_equals_ciphertext_length() {
        let cookie = seal(&KEY, &IV, b"x", EnvelopeScheme::Base64UrlV1).unwrap();
        assert_eq!(open_text(&cookie, EnvelopeScheme::Base64UrlV1).unwrap().len(), 1);
    }

    #[test]
    fn wrong_key_is_auth_failure() {
        let cookie = seal(&KEY, &IV, b"tok123", EnvelopeScheme::Base64UrlV1).unwrap();
        let other_key = [0x12; KEY_SIZE];

        let result = decrypt(&other_key, cookie.as_bytes(), EnvelopeScheme::Base64UrlV1);
        assert_eq!(result.unwrap_err(), EnvelopeError::AuthFailed);
    }

    #[test]
    fn unsupported_version_is_format_failure() {
        let cookie = seal(&KEY, &IV, b"tok123", EnvelopeScheme::Base64UrlV1).unwrap();
        let mut bytes = base64url_decode(cookie.as_bytes()).unwrap();
        bytes[0] = 2;
        let forged = base64url_encode(&bytes);

        assert_eq!(
            open_text(&forged, EnvelopeScheme::Base64UrlV1),
            Err(EnvelopeError::FormatInvalid)
        );
    }

    #[test]
    fn envelope_without_ciphertext_is_format_failure() {
        let mut bytes = vec![CURRENT_VERSION];
        bytes.extend_from_slice(&IV);
        bytes.extend_from_slice(&[0u8; GCM_TAG_SIZE]);
        let text = base64url_encode(&bytes);

        assert_eq!(
            open_text(&text, EnvelopeScheme::Base64UrlV1),
            Err(EnvelopeError::FormatInvalid)
        );
        assert_eq!(open_text("", EnvelopeScheme::Base64UrlV1), Err(EnvelopeError::FormatInvalid));
        assert_eq!(open_text("", EnvelopeScheme::LegacyHex), Err(EnvelopeError::FormatInvalid));
    }

    #[test]
    fn undecodable_text_is_format_failure() {
        assert_eq!(
            open_text("not base64url!", EnvelopeScheme::Base64UrlV1),
            Err(EnvelopeError::FormatInvalid)
        );
        assert_eq!(
            open_text("xyz", EnvelopeScheme::LegacyHex),
            Err(EnvelopeError::FormatInvalid)
        );
    }

    #[test]
    fn route_accepts_only_its_own_scheme() {
        let hex_cookie = seal(&KEY, &IV, b"tok123", EnvelopeScheme::LegacyHex).unwrap();
        let b64_cookie = seal(&KEY, &IV, b"tok123", EnvelopeScheme::Base64UrlV1).unwrap();

        assert!(open_text(&hex_cookie, EnvelopeScheme::Base64UrlV1).is_err());
        assert!(open_text(&b64_cookie, EnvelopeScheme::LegacyHex).is_err());
    }

    #[test]
    fn tampered_tag_is_auth_failure() {
        let cookie = seal(&KEY, &IV, b"tok123", EnvelopeScheme::Base64UrlV1).unwrap();
        let mut bytes = base64url_decode(cookie.as_bytes()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert_eq!(
            open_text(&base64url_encode(&bytes), EnvelopeScheme::Base64UrlV1),
            Err(EnvelopeError::AuthFailed)
        );
    }

    #[test]
    fn seal_rejects_empty_plaintext() {
        assert_eq!(
            seal(&KEY, &IV, b"", EnvelopeScheme::Base64UrlV1),
            Err(EnvelopeError::FormatInvalid)
        );
    }

    #[test]
    fn seal_random_uses_fresh_nonces() {
        let a = seal_random(&KEY, b"same", EnvelopeScheme::Base64UrlV1).unwrap();
        let b = seal_random(&KEY, b"same", EnvelopeScheme::Base64UrlV1).unwrap();

        assert_ne!(a, b);
        assert_eq!(open_text(&a, EnvelopeScheme::Base64UrlV1).unwrap(), b"same");
        assert_eq!(open_text(&b, EnvelopeScheme::Base64UrlV1).unwrap(), b"same");
    }

    #[test]
    fn scheme_deserializes_from_config_names() {
        let scheme: EnvelopeScheme = serde_json::from_str("\"base64url-v1\"").unwrap();
        assert_eq!(scheme, EnvelopeScheme::Base64UrlV1);
        let scheme: EnvelopeScheme = serde_json::from_str("\"hex\"").unwrap();
        assert_eq!(scheme, EnvelopeScheme::LegacyHex);
        assert!(serde_json::from_str::<EnvelopeScheme>("\"rot13\"").is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_scheme() -> impl Strategy<Value = EnvelopeScheme> {
            prop_oneof![
                Just(EnvelopeScheme::Base64UrlV1),
                Just(EnvelopeScheme::LegacyHex),
            ]
        }

        proptest! {
            #[test]
            fn proptest_aead_round_trip(
                key in prop::array::uniform32(any::<u8>()),
                iv in prop::array::uniform12(any::<u8>()),
                plaintext in prop::collection::vec(any::<u8>(), 1..256),
                scheme in arb_scheme(),
            ) {
                let cookie = seal(&key, &iv, &plaintext, scheme).unwrap();
                let opened = decrypt(&key, cookie.as_bytes(), scheme).unwrap();
                prop_assert_eq!(opened.expose_secret(), &plaintext);
            }

            /// Property: flipping any single bit of the IV, ciphertext or tag fails authentication
            #[test]
            fn proptest_single_bit_tamper_fails_auth(
                plaintext in prop::collection::vec(any::<u8>(), 1..64),
                scheme in arb_scheme(),
                position in any::<prop::sample::Index>(),
                bit in 0u8..8,
            ) {
                let cookie = seal(&KEY, &IV, &plaintext, scheme).unwrap();
                let mut bytes = scheme.decode(cookie.as_bytes()).unwrap();

                let start = scheme.header_size() - GCM_IV_SIZE;
                let target = start + position.index(bytes.len() - start);
                bytes[target] ^= 1 << bit;

                let result = decrypt(&KEY, scheme.encode(&bytes).as_bytes(), scheme);
                prop_assert_eq!(result.unwrap_err(), EnvelopeError::AuthFailed);
            }

            /// Property: arbitrary cookie text never decrypts and never panics
            #[test]
            fn proptest_garbage_never_opens(text in "[A-Za-z0-9_-]{0,200}", scheme in arb_scheme()) {
                prop_assert!(decrypt(&KEY, text.as_bytes(), scheme).is_err());
            }
        }
    }
}
