use core::fmt;
use std::fs::File;
use std::io::Read;
use std::mem;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::crypto::SecureRandom;
use crate::error::{GetRandomFailed, StekError, StekField};
#[cfg(feature = "logging")]
use crate::log::{debug, trace};

/// Length of each STEK field.
pub const STEK_FIELD_LEN: usize = 16;

/// Length of a serialized STEK: name, AES key and HMAC key back to back.
pub const STEK_LEN: usize = 3 * STEK_FIELD_LEN;

/// A session ticket encryption key.
///
/// A STEK never changes once built.  Rotation replaces the whole value
/// in a [`StekStore`].
#[derive(Clone, PartialEq, Eq)]
pub struct Stek {
    name: [u8; STEK_FIELD_LEN],
    aes_key: [u8; STEK_FIELD_LEN],
    hmac_key: [u8; STEK_FIELD_LEN],
}

impl Stek {
    /// Make a STEK from its parts.
    pub fn new(
        name: [u8; STEK_FIELD_LEN],
        aes_key: [u8; STEK_FIELD_LEN],
        hmac_key: [u8; STEK_FIELD_LEN],
    ) -> Self {
        Self {
            name,
            aes_key,
            hmac_key,
        }
    }

    /// Parse the 48-byte STEK layout: name, then AES key, then HMAC key.
    ///
    /// Input of any other length is rejected; no partial STEK is ever
    /// returned.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StekError> {
        let mut rest = bytes;
        let name = take_field(&mut rest, StekField::Name)?;
        let aes_key = take_field(&mut rest, StekField::AesKey)?;
        let hmac_key = take_field(&mut rest, StekField::HmacKey)?;

        if !rest.is_empty() {
            return Err(StekError::TrailingData { len: bytes.len() });
        }

        Ok(Self::new(name, aes_key, hmac_key))
    }

    /// Read a STEK from the file at `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, StekError> {
        let path = path.as_ref();

        // One byte more than needed, so over-long files are detected
        // without reading them in full.
        let mut bytes = Vec::with_capacity(STEK_LEN + 1);
        File::open(path)?
            .take(STEK_LEN as u64 + 1)
            .read_to_end(&mut bytes)?;

        let stek = Self::from_bytes(&bytes)?;
        debug!("loaded STEK {:02x?} from {}", stek.name, path.display());
        Ok(stek)
    }

    /// Make a STEK with every field drawn from `secure_random`.
    pub fn generate(secure_random: &dyn SecureRandom) -> Result<Self, GetRandomFailed> {
        let mut stek = Self::new([0; STEK_FIELD_LEN], [0; STEK_FIELD_LEN], [0; STEK_FIELD_LEN]);
        secure_random.fill(&mut stek.name)?;
        secure_random.fill(&mut stek.aes_key)?;
        secure_random.fill(&mut stek.hmac_key)?;
        Ok(stek)
    }

    /// The key name, which every ticket sealed under this STEK carries.
    pub fn name(&self) -> &[u8; STEK_FIELD_LEN] {
        &self.name
    }

    /// The AES-128 key.
    pub fn aes_key(&self) -> &[u8; STEK_FIELD_LEN] {
        &self.aes_key
    }

    /// The HMAC key.
    pub fn hmac_key(&self) -> &[u8; STEK_FIELD_LEN] {
        &self.hmac_key
    }

    /// Serialize in the on-disk layout accepted by [`Stek::from_bytes`].
    pub fn to_bytes(&self) -> [u8; STEK_LEN] {
        let mut out = [0u8; STEK_LEN];
        out[..STEK_FIELD_LEN].copy_from_slice(&self.name);
        out[STEK_FIELD_LEN..2 * STEK_FIELD_LEN].copy_from_slice(&self.aes_key);
        out[2 * STEK_FIELD_LEN..].copy_from_slice(&self.hmac_key);
        out
    }
}

fn take_field(rest: &mut &[u8], field: StekField) -> Result<[u8; STEK_FIELD_LEN], StekError> {
    if rest.len() < STEK_FIELD_LEN {
        return Err(StekError::Truncated {
            field,
            read: rest.len(),
        });
    }

    let (head, tail) = rest.split_at(STEK_FIELD_LEN);
    *rest = tail;

    let mut out = [0u8; STEK_FIELD_LEN];
    out.copy_from_slice(head);
    Ok(out)
}

impl fmt::Debug for Stek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Note: we deliberately omit keys from the debug output.
        f.debug_struct("Stek")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Holds the active STEK.
///
/// Readers take an `Arc` snapshot with [`StekStore::current`] and keep
/// using it for the whole of one ticket operation, so a concurrent
/// [`StekStore::replace`] never mixes fields from two keys.
#[derive(Debug)]
pub struct StekStore {
    current: RwLock<Arc<Stek>>,
}

impl StekStore {
    /// Make a store holding `stek`.
    pub fn new(stek: Stek) -> Self {
        Self {
            current: RwLock::new(Arc::new(stek)),
        }
    }

    /// Make a store holding the STEK read from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StekError> {
        Ok(Self::new(Stek::read(path)?))
    }

    /// The active STEK.
    pub fn current(&self) -> Arc<Stek> {
        // The lock only guards a pointer swap, so a poisoned lock
        // still holds a complete key.
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Make `stek` the active STEK, returning the one it replaces.
    ///
    /// Tickets sealed under the previous key are no longer recognized.
    pub fn replace(&self, stek: Stek) -> Arc<Stek> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        trace!("replacing STEK {:02x?} with {:02x?}", guard.name, stek.name);
        mem::replace(&mut *guard, Arc::new(stek))
    }

    /// Read the STEK at `path` and make it active.
    ///
    /// On failure the active STEK is left unchanged.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<Arc<Stek>, StekError> {
        let stek = Stek::read(path)?;
        Ok(self.replace(stek))
    }
}
