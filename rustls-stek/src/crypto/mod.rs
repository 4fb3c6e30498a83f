//! Cryptographic capabilities used to seal and open tickets.
//!
//! The ticket machinery never calls a cryptography library directly.  It is
//! handed a [`TicketCryptoProvider`], a bundle of three capabilities:
//! initializing a block cipher with a key and IV, initializing a MAC with a
//! key and digest, and filling buffers with secure random bytes.  The
//! [`rust_crypto`] module supplies the implementation used by default.

use core::fmt::Debug;

use crate::error::{CipherInitError, GetRandomFailed, MacInitError};

pub mod rust_crypto;

/// Controls core cryptography used by the ticket dispatcher.
///
/// All fields are `&'static` references to trait objects, so a provider is
/// cheap to copy and can be built as a `const` or `static`.
#[derive(Clone, Copy, Debug)]
pub struct TicketCryptoProvider {
    /// Cipher used to encrypt ticket state.
    pub cipher: &'static dyn TicketCipher,

    /// MAC used to authenticate tickets.
    pub mac: &'static dyn TicketMac,

    /// Source of cryptographically secure random numbers, used for IVs.
    pub secure_random: &'static dyn SecureRandom,
}

/// A source of cryptographically secure randomness.
pub trait SecureRandom: Send + Sync + Debug {
    /// Fill the given buffer with random bytes.
    ///
    /// Implementations must fail rather than produce weak output.
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed>;
}

/// A block cipher which can be keyed for one encryption or decryption.
pub trait TicketCipher: Send + Sync + Debug {
    /// Length of key this cipher expects.
    fn key_len(&self) -> usize;

    /// Length of IV this cipher expects.
    fn iv_len(&self) -> usize;

    /// Initialize for encryption under `key` and `iv`.
    fn encrypter(
        &self,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn TicketEncrypter>, CipherInitError>;

    /// Initialize for decryption under `key` and `iv`.
    fn decrypter(
        &self,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn TicketDecrypter>, CipherInitError>;
}

/// Cipher state initialized for encrypting one ticket.
pub trait TicketEncrypter: Send + Sync {
    /// Pad and encrypt `plain`, consuming the state.
    fn encrypt(self: Box<Self>, plain: &[u8]) -> Vec<u8>;
}

/// Cipher state initialized for decrypting one ticket.
pub trait TicketDecrypter: Send + Sync {
    /// Decrypt and unpad `ciphertext`, consuming the state.
    ///
    /// Returns `None` if the ciphertext is not a whole number of blocks or
    /// the padding is invalid.
    fn decrypt(self: Box<Self>, ciphertext: &[u8]) -> Option<Vec<u8>>;
}

/// A keyed MAC, parameterised by digest at initialization time.
pub trait TicketMac: Send + Sync + Debug {
    /// Prepare to authenticate data with `key` using `digest`.
    fn init(
        &self,
        key: &[u8],
        digest: HashAlgorithm,
    ) -> Result<Box<dyn MacContext>, MacInitError>;
}

/// MAC state initialized for authenticating one ticket.
pub trait MacContext: Send + Sync {
    /// Add `data` to the authenticated input.
    fn update(&mut self, data: &[u8]);

    /// Length of the tag this context produces.
    fn tag_len(&self) -> usize;

    /// Compute the tag over everything passed to `update`.
    fn sign(self: Box<Self>) -> Vec<u8>;

    /// Check `tag` against everything passed to `update`, in constant time.
    fn verify(self: Box<Self>, tag: &[u8]) -> bool;
}

/// Digests a [`TicketMac`] can be asked to use.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-1.  Not supported by the default provider.
    SHA1,
    /// SHA-256, the default ticket digest.
    SHA256,
    /// SHA-384.
    SHA384,
    /// SHA-512.
    SHA512,
}

impl HashAlgorithm {
    /// The digest's conventional lower-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SHA1 => "sha1",
            Self::SHA256 => "sha256",
            Self::SHA384 => "sha384",
            Self::SHA512 => "sha512",
        }
    }

    /// Output length of the digest in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::SHA1 => 20,
            Self::SHA256 => 32,
            Self::SHA384 => 48,
            Self::SHA512 => 64,
        }
    }
}
