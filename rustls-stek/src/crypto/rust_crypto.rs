//! A [`TicketCryptoProvider`] built on the RustCrypto crates:
//! AES-128-CBC with PKCS#7 padding, HMAC over SHA-2, and the OS RNG.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::{Sha256, Sha384, Sha512};

use super::{
    HashAlgorithm, MacContext, SecureRandom, TicketCipher, TicketCryptoProvider, TicketDecrypter,
    TicketEncrypter, TicketMac,
};
use crate::error::{CipherInitError, GetRandomFailed, MacInitError};

/// AES-128 key length.
pub const AES_128_KEY_LEN: usize = 16;

/// IV length of AES in CBC mode.
pub const AES_CBC_IV_LEN: usize = 16;

const AES_BLOCK_LEN: usize = 16;

/// The default provider: AES-128-CBC, HMAC-SHA2 and `OsRng`.
pub static DEFAULT_PROVIDER: TicketCryptoProvider = TicketCryptoProvider {
    cipher: &Aes128Cbc,
    mac: &HmacSha2,
    secure_random: &OsRandom,
};

/// Return a copy of [`DEFAULT_PROVIDER`].
pub fn provider() -> TicketCryptoProvider {
    DEFAULT_PROVIDER
}

/// AES-128 in CBC mode with PKCS#7 padding.
#[derive(Debug)]
pub struct Aes128Cbc;

impl TicketCipher for Aes128Cbc {
    fn key_len(&self) -> usize {
        AES_128_KEY_LEN
    }

    fn iv_len(&self) -> usize {
        AES_CBC_IV_LEN
    }

    fn encrypter(
        &self,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn TicketEncrypter>, CipherInitError> {
        let inner = cbc::Encryptor::<Aes128>::new_from_slices(key, iv).map_err(|_| CipherInitError)?;
        Ok(Box::new(Aes128CbcEncrypter(inner)))
    }

    fn decrypter(
        &self,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn TicketDecrypter>, CipherInitError> {
        let inner = cbc::Decryptor::<Aes128>::new_from_slices(key, iv).map_err(|_| CipherInitError)?;
        Ok(Box::new(Aes128CbcDecrypter(inner)))
    }
}

struct Aes128CbcEncrypter(cbc::Encryptor<Aes128>);

impl TicketEncrypter for Aes128CbcEncrypter {
    fn encrypt(self: Box<Self>, plain: &[u8]) -> Vec<u8> {
        let Self(inner) = *self;
        inner.encrypt_padded_vec_mut::<Pkcs7>(plain)
    }
}

struct Aes128CbcDecrypter(cbc::Decryptor<Aes128>);

impl TicketDecrypter for Aes128CbcDecrypter {
    fn decrypt(self: Box<Self>, ciphertext: &[u8]) -> Option<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_LEN != 0 {
            return None;
        }

        let Self(inner) = *self;
        inner
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .ok()
    }
}

/// HMAC over the SHA-2 family.
#[derive(Debug)]
pub struct HmacSha2;

impl TicketMac for HmacSha2 {
    fn init(
        &self,
        key: &[u8],
        digest: HashAlgorithm,
    ) -> Result<Box<dyn MacContext>, MacInitError> {
        if key.is_empty() {
            return Err(MacInitError);
        }

        let context = match digest {
            HashAlgorithm::SHA256 => HmacSha2Context::Sha256(
                <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|_| MacInitError)?,
            ),
            HashAlgorithm::SHA384 => HmacSha2Context::Sha384(
                <Hmac<Sha384> as Mac>::new_from_slice(key).map_err(|_| MacInitError)?,
            ),
            HashAlgorithm::SHA512 => HmacSha2Context::Sha512(
                <Hmac<Sha512> as Mac>::new_from_slice(key).map_err(|_| MacInitError)?,
            ),
            _ => return Err(MacInitError),
        };

        Ok(Box::new(context))
    }
}

enum HmacSha2Context {
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
}

impl MacContext for HmacSha2Context {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(mac) => mac.update(data),
            Self::Sha384(mac) => mac.update(data),
            Self::Sha512(mac) => mac.update(data),
        }
    }

    fn tag_len(&self) -> usize {
        match self {
            Self::Sha256(_) => HashAlgorithm::SHA256.output_len(),
            Self::Sha384(_) => HashAlgorithm::SHA384.output_len(),
            Self::Sha512(_) => HashAlgorithm::SHA512.output_len(),
        }
    }

    fn sign(self: Box<Self>) -> Vec<u8> {
        match *self {
            Self::Sha256(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Sha384(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Sha512(mac) => mac.finalize().into_bytes().to_vec(),
        }
    }

    fn verify(self: Box<Self>, tag: &[u8]) -> bool {
        match *self {
            Self::Sha256(mac) => mac.verify_slice(tag).is_ok(),
            Self::Sha384(mac) => mac.verify_slice(tag).is_ok(),
            Self::Sha512(mac) => mac.verify_slice(tag).is_ok(),
        }
    }
}

/// Random bytes from the operating system.
#[derive(Debug)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|_| GetRandomFailed)
    }
}
