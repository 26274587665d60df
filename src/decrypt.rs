//! Track decryption while streaming.
//!
//! Decrypts chunks as they arrive from the network, so the encrypted
//! payload never touches the disk:
//! * Blowfish CBC with striping for legacy tracks
//! * AES-CTR for tracks that carry their own key material
//! * Passthrough for unencrypted streams such as podcast episodes
//!
//! # Encryption Format
//!
//! The Blowfish stripe pattern:
//! * Content is divided into 2KB blocks
//! * Every third block is encrypted, starting with the first
//! * Only full blocks are encrypted; a trailing partial block is plain
//! * Each block is decrypted with a fresh cipher and a fixed IV
//!
//! # Security
//!
//! No decryption keys are included in this code. The Blowfish salt is
//! provided through [`Secrets`](crate::config::Secrets).

use std::{ops::Deref, str::FromStr};

use aes::Aes128;
use base64::Engine as _;
use blowfish::{
    cipher::{BlockDecryptMut, KeyIvInit, StreamCipher},
    Blowfish,
};
use cbc::cipher::block_padding::NoPadding;
use md5::{Digest, Md5};

use crate::{
    error::{Error, Result},
    track::{Encryption, EncryptionType, TrackId},
};

/// Length of decryption keys in bytes.
pub const KEY_LENGTH: usize = 16;

/// Raw key bytes.
pub type RawKey = [u8; KEY_LENGTH];

/// Validated 16-byte key.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Key(RawKey);

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key(..)")
    }
}

impl FromStr for Key {
    type Err = Error;

    /// Parses a key from a string of exactly 16 bytes.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let len = s.len();
        if len != KEY_LENGTH {
            return Err(Error::invalid_argument(format!(
                "key length is {len} but should be {KEY_LENGTH}",
            )));
        }

        let mut key = [0; KEY_LENGTH];
        key.copy_from_slice(s.as_bytes());

        Ok(Self(key))
    }
}

impl Deref for Key {
    type Target = RawKey;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

enum Cipher {
    None,
    Blowfish(Key),
    Aes(Box<Aes128Ctr>),
}

/// Stateful decryptor for one track.
///
/// Feed network chunks of any size through [`update`](Self::update) and
/// call [`finish`](Self::finish) once the stream ends.
pub struct Decryptor {
    cipher: Cipher,

    /// Bytes of the current, not yet complete, stripe block.
    pending: Vec<u8>,

    /// Index of the next stripe block.
    block: u64,
}

impl Decryptor {
    /// Fixed IV for CBC decryption.
    const CBC_BF_IV: &[u8; 8] = b"\x00\x01\x02\x03\x04\x05\x06\x07";

    /// Size of each stripe block in bytes (2KB).
    pub const CBC_BLOCK_SIZE: usize = 2 * 1024;

    /// Every third block is encrypted.
    const CBC_STRIPE_COUNT: u64 = 3;

    /// Creates a decryptor for a track.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if Blowfish is required but no salt is configured
    /// * `InvalidArgument` if the AES key material cannot be decoded
    pub fn new(track_id: TrackId, encryption: &Encryption, salt: Option<&Key>) -> Result<Self> {
        let cipher = match encryption {
            Encryption::None => Cipher::None,
            Encryption::Blowfish { .. } => {
                let salt = salt.ok_or_else(|| {
                    Error::invalid_argument("no blowfish secret configured for decryption")
                })?;
                Cipher::Blowfish(Self::key_for_track_id(track_id, salt))
            }
            Encryption::Aes { key, nonce } => {
                let key = decode_material(key)?;
                let nonce = decode_material(nonce)?;
                if nonce.len() > 16 {
                    return Err(Error::invalid_argument(format!(
                        "nonce length is {} but should be at most 16",
                        nonce.len()
                    )));
                }
                let mut iv = [0; 16];
                iv[..nonce.len()].copy_from_slice(&nonce);
                let cipher = Aes128Ctr::new_from_slices(&key, &iv)
                    .map_err(|e| Error::invalid_argument(format!("aes key: {e}")))?;
                Cipher::Aes(Box::new(cipher))
            }
        };

        Ok(Self {
            cipher,
            pending: Vec::with_capacity(Self::CBC_BLOCK_SIZE),
            block: 0,
        })
    }

    /// Creates a decryptor that copies bytes unchanged.
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            cipher: Cipher::None,
            pending: Vec::new(),
            block: 0,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EncryptionType {
        match self.cipher {
            Cipher::None => EncryptionType::None,
            Cipher::Blowfish(_) => EncryptionType::Blowfish,
            Cipher::Aes(_) => EncryptionType::Aes,
        }
    }

    /// Calculates the track-specific Blowfish key.
    ///
    /// The MD5 hex digest of the track id is folded in halves and XOR-ed
    /// with the salt.
    #[must_use]
    pub fn key_for_track_id(track_id: TrackId, salt: &Key) -> Key {
        let track_hash = format!("{:x}", Md5::digest(track_id.to_string()));
        let track_hash = track_hash.as_bytes();

        let mut key = RawKey::default();
        for i in 0..KEY_LENGTH {
            key[i] = track_hash[i] ^ track_hash[i + KEY_LENGTH] ^ salt[i];
        }
        Key(key)
    }

    /// Decrypts `chunk`, appending whatever is ready to `out`.
    ///
    /// Blowfish output lags behind input by up to one stripe block.
    ///
    /// # Errors
    ///
    /// Returns `DecryptionFailed` if a block cannot be decrypted.
    pub fn update(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> Result<()> {
        match &mut self.cipher {
            Cipher::None => out.extend_from_slice(chunk),
            Cipher::Aes(cipher) => {
                let start = out.len();
                out.extend_from_slice(chunk);
                cipher
                    .try_apply_keystream(&mut out[start..])
                    .map_err(|e| Error::decryption_failed(e.to_string()))?;
            }
            Cipher::Blowfish(key) => {
                let key = *key;
                self.pending.extend_from_slice(chunk);

                let mut offset = 0;
                while self.pending.len() - offset >= Self::CBC_BLOCK_SIZE {
                    let start = out.len();
                    out.extend_from_slice(&self.pending[offset..offset + Self::CBC_BLOCK_SIZE]);
                    if self.block % Self::CBC_STRIPE_COUNT == 0 {
                        Self::decrypt_block(&key, &mut out[start..])?;
                    }
                    self.block += 1;
                    offset += Self::CBC_BLOCK_SIZE;
                }
                self.pending.drain(..offset);
            }
        }

        Ok(())
    }

    /// Flushes the trailing partial block, which is never encrypted.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        out.append(&mut self.pending);
    }

    fn decrypt_block(key: &Key, block: &mut [u8]) -> Result<()> {
        // The state of the cipher is reset on each block.
        let cipher = cbc::Decryptor::<Blowfish>::new_from_slices(&**key, Self::CBC_BF_IV)
            .map_err(|e| Error::decryption_failed(e.to_string()))?;

        // Full stripe blocks are a multiple of the cipher block size.
        cipher
            .decrypt_padded_mut::<NoPadding>(block)
            .map_err(|e| Error::decryption_failed(e.to_string()))?;

        Ok(())
    }
}

/// Decodes key material given as hex or base64.
fn decode_material(value: &str) -> Result<Vec<u8>> {
    let value = value.trim();
    if value.len() % 2 == 0 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(hex::decode(value)?);
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blowfish::cipher::BlockEncryptMut;

    const SALT: &str = "0123456789abcdef";

    fn encrypt_stripes(track_id: TrackId, plain: &[u8]) -> Vec<u8> {
        let key = Decryptor::key_for_track_id(track_id, &SALT.parse().unwrap());
        let mut data = plain.to_vec();
        for (index, block) in data.chunks_mut(Decryptor::CBC_BLOCK_SIZE).enumerate() {
            if index % 3 == 0 && block.len() == Decryptor::CBC_BLOCK_SIZE {
                let cipher =
                    cbc::Encryptor::<Blowfish>::new_from_slices(&*key, Decryptor::CBC_BF_IV)
                        .unwrap();
                let len = block.len();
                cipher.encrypt_padded_mut::<NoPadding>(block, len).unwrap();
            }
        }
        data
    }

    #[test]
    fn key_length_is_validated() {
        assert!("1234567890123456".parse::<Key>().is_ok());
        assert!("12345".parse::<Key>().is_err());
        assert!("12345678901234567".parse::<Key>().is_err());
    }

    #[test]
    fn blowfish_stripes_decrypt_across_uneven_chunks() {
        let track_id = 3_135_556;
        let plain: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let encrypted = encrypt_stripes(track_id, &plain);
        assert_ne!(encrypted[..2048], plain[..2048]);
        assert_eq!(encrypted[2048..6144], plain[2048..6144]);

        let encryption = Encryption::Blowfish {
            md5_origin: String::new(),
            media_version: 1,
        };
        let salt: Key = SALT.parse().unwrap();
        let mut decryptor = Decryptor::new(track_id, &encryption, Some(&salt)).unwrap();

        let mut out = Vec::new();
        for chunk in encrypted.chunks(777) {
            decryptor.update(chunk, &mut out).unwrap();
        }
        decryptor.finish(&mut out);

        assert_eq!(out, plain);
    }

    #[test]
    fn blowfish_requires_salt() {
        let encryption = Encryption::Blowfish {
            md5_origin: String::new(),
            media_version: 1,
        };
        assert!(Decryptor::new(1, &encryption, None).is_err());
    }

    #[test]
    fn aes_ctr_is_symmetric() {
        let encryption = Encryption::Aes {
            key: "000102030405060708090a0b0c0d0e0f".to_owned(),
            nonce: "0001020304050607".to_owned(),
        };
        let plain = b"the quick brown fox jumps over the lazy dog".repeat(100);

        let mut encrypted = Vec::new();
        let mut encryptor = Decryptor::new(1, &encryption, None).unwrap();
        encryptor.update(&plain, &mut encrypted).unwrap();

        let mut out = Vec::new();
        let mut decryptor = Decryptor::new(1, &encryption, None).unwrap();
        for chunk in encrypted.chunks(100) {
            decryptor.update(chunk, &mut out).unwrap();
        }
        decryptor.finish(&mut out);

        assert_ne!(encrypted, plain);
        assert_eq!(out, plain);
        assert_eq!(decryptor.kind(), EncryptionType::Aes);
    }

    #[test]
    fn material_accepts_hex_and_base64() {
        assert_eq!(decode_material("00ff").unwrap(), vec![0x00, 0xff]);
        assert_eq!(decode_material("AP8=").unwrap(), vec![0x00, 0xff]);
    }
}
