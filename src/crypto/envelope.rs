//! AES-256-CBC envelope codec.
//!
//! Every call to [`EnvelopeCodec::encrypt`] draws a fresh 16-byte IV from the
//! OS random source. The IV is returned next to the ciphertext and is never
//! embedded in it: the caller stores it in the file record and hands it back
//! at decrypt time.
//!
//! The scheme is confidentiality-only. There is no authentication tag, so a
//! tampered ciphertext either fails padding validation or decrypts to garbage.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use super::{Iv, IV_SIZE, KEY_SIZE};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size; ciphertext length is always a multiple of it.
pub const BLOCK_SIZE: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("encryption secret must be at least 32 bytes, got {0}")]
    KeyTooShort(usize),

    #[error("decryption failed: {0}")]
    Decryption(&'static str),
}

/// Ciphertext plus the IV needed to recover it.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub ciphertext: Vec<u8>,
    pub iv: Iv,
}

/// Symmetric codec holding the process-wide key.
pub struct EnvelopeCodec {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl EnvelopeCodec {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Build a codec from a configured secret.
    ///
    /// The secret is truncated to its first 32 bytes, not hashed. Shorter
    /// secrets are rejected.
    pub fn from_secret(secret: &str) -> Result<Self, CodecError> {
        let bytes = secret.as_bytes();
        if bytes.len() < KEY_SIZE {
            return Err(CodecError::KeyTooShort(bytes.len()));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes[..KEY_SIZE]);
        Ok(Self::new(key))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Envelope {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);
        self.encrypt_with_iv(plaintext, Iv::from(iv))
    }

    fn encrypt_with_iv(&self, plaintext: &[u8], iv: Iv) -> Envelope {
        let key: &[u8; KEY_SIZE] = &self.key;
        let ciphertext = Aes256CbcEnc::new(key.into(), iv.as_bytes().into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        Envelope { ciphertext, iv }
    }

    /// Decrypt `ciphertext` with a raw IV slice.
    ///
    /// Fails when the IV is not 16 bytes, when the ciphertext is empty or not
    /// block aligned, or when PKCS#7 padding does not validate.
    pub fn decrypt(&self, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, CodecError> {
        if iv.len() != IV_SIZE {
            return Err(CodecError::Decryption("iv must be 16 bytes"));
        }
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CodecError::Decryption(
                "ciphertext length is not a multiple of the block size",
            ));
        }

        Aes256CbcDec::new_from_slices(&self.key[..], iv)
            .map_err(|_| CodecError::Decryption("invalid key or iv length"))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CodecError::Decryption("bad padding"))
    }
}

impl std::fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef-extra";

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::from_secret(SECRET).unwrap()
    }

    #[test]
    fn test_hello_img_scenario() {
        let codec = codec();
        let envelope = codec.encrypt(b"hello-img!");

        assert_eq!(envelope.ciphertext.len(), 16);
        assert_eq!(envelope.iv.as_bytes().len(), 16);

        let plaintext = codec
            .decrypt(&envelope.ciphertext, envelope.iv.as_bytes())
            .unwrap();
        assert_eq!(plaintext, b"hello-img!");
    }

    #[test]
    fn test_empty_roundtrip() {
        let codec = codec();
        let envelope = codec.encrypt(b"");

        // PKCS#7 always pads, so empty input still produces a full block
        assert_eq!(envelope.ciphertext.len(), BLOCK_SIZE);
        assert_eq!(
            codec.decrypt(&envelope.ciphertext, envelope.iv.as_bytes()).unwrap(),
            b""
        );
    }

    #[test]
    fn test_block_aligned_plaintext_gets_extra_block() {
        let codec = codec();
        let envelope = codec.encrypt(&[7u8; 32]);
        assert_eq!(envelope.ciphertext.len(), 48);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let codec = codec();
        let a = codec.encrypt(b"same image bytes");
        let b = codec.encrypt(b"same image bytes");

        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_fixed_iv_is_deterministic() {
        let codec = codec();
        let iv = Iv::from([9u8; IV_SIZE]);
        let a = codec.encrypt_with_iv(b"abc", iv);
        let b = codec.encrypt_with_iv(b"abc", iv);
        assert_eq!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_single_byte_flip_never_returns_original() {
        let codec = codec();
        let plaintext = b"a somewhat longer image payload spanning blocks".to_vec();
        let envelope = codec.encrypt(&plaintext);

        for i in 0..envelope.ciphertext.len() {
            let mut tampered = envelope.ciphertext.clone();
            tampered[i] ^= 0x01;
            match codec.decrypt(&tampered, envelope.iv.as_bytes()) {
                Ok(out) => assert_ne!(out, plaintext, "flip at {i} returned original"),
                Err(e) => assert!(matches!(e, CodecError::Decryption(_))),
            }
        }
    }

    #[test]
    fn test_short_iv_rejected() {
        let codec = codec();
        let envelope = codec.encrypt(b"hello-img!");

        let err = codec.decrypt(&envelope.ciphertext, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, CodecError::Decryption(_)));
    }

    #[test]
    fn test_unaligned_ciphertext_rejected() {
        let codec = codec();
        let envelope = codec.encrypt(b"hello-img!");

        let err = codec
            .decrypt(&envelope.ciphertext[..15], envelope.iv.as_bytes())
            .unwrap_err();
        assert!(matches!(err, CodecError::Decryption(_)));

        let err = codec.decrypt(&[], envelope.iv.as_bytes()).unwrap_err();
        assert!(matches!(err, CodecError::Decryption(_)));
    }

    #[test]
    fn test_wrong_key_does_not_recover_plaintext() {
        let a = codec();
        let b = EnvelopeCodec::new([0x42; KEY_SIZE]);
        let envelope = a.encrypt(b"secret pixels");

        if let Ok(out) = b.decrypt(&envelope.ciphertext, envelope.iv.as_bytes()) {
            assert_ne!(out, b"secret pixels");
        }
    }

    #[test]
    fn test_secret_is_truncated_not_hashed() {
        let long = EnvelopeCodec::from_secret(SECRET).unwrap();
        let exact = EnvelopeCodec::new(*b"0123456789abcdef0123456789abcdef");

        let envelope = long.encrypt(b"truncation");
        assert_eq!(
            exact.decrypt(&envelope.ciphertext, envelope.iv.as_bytes()).unwrap(),
            b"truncation"
        );
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = EnvelopeCodec::from_secret("too-short").unwrap_err();
        assert_eq!(err, CodecError::KeyTooShort(9));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let codec = codec();
            let envelope = codec.encrypt(&plaintext);
            prop_assert_eq!(envelope.ciphertext.len() % BLOCK_SIZE, 0);
            let out = codec.decrypt(&envelope.ciphertext, envelope.iv.as_bytes()).unwrap();
            prop_assert_eq!(out, plaintext);
        }
    }
}
