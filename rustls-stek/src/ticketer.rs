use core::fmt;
use core::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

use rustls::server::ProducesTickets;
use rustls::ProtocolVersion;

use crate::dispatch::TicketDispatcher;
use crate::error::{OpenError, StekError};
#[cfg(feature = "logging")]
use crate::log::{debug, trace, warn};
use crate::stek::StekStore;
use crate::ticket::TicketSealer;

/// How long clients are told they may keep a ticket, in seconds.
pub const DEFAULT_TICKET_LIFETIME: u32 = 2 * 60 * 60;

/// A [`ProducesTickets`] implementation that seals tickets under the STEK
/// held in a [`StekStore`].
///
/// Every server sharing the same STEK file accepts every other server's
/// tickets, and tickets stay valid across restarts until the key changes.
pub struct StekTicketer {
    sealer: TicketSealer,
    lifetime: u32,
    version: ProtocolVersion,
}

impl StekTicketer {
    /// Make a ticketer over the keys in `store`.
    pub fn new(store: Arc<StekStore>) -> Self {
        Self::from_sealer(TicketSealer::new(TicketDispatcher::new(store)))
    }

    /// Make a ticketer using the STEK in the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StekError> {
        Ok(Self::new(Arc::new(StekStore::load(path)?)))
    }

    /// Make a ticketer from a configured sealer.
    pub fn from_sealer(sealer: TicketSealer) -> Self {
        Self {
            sealer,
            lifetime: DEFAULT_TICKET_LIFETIME,
            version: ProtocolVersion::TLSv1_3,
        }
    }

    /// Advertise `lifetime` seconds as the ticket lifetime.
    pub fn with_lifetime(mut self, lifetime: u32) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Treat presented tickets as arriving on `version` connections.
    ///
    /// rustls does not tell a ticketer which version a connection
    /// negotiated, so this should be the highest version the server
    /// enables.  It only decides whether a replacement ticket is reported
    /// as due: rustls itself re-issues tickets on every TLS 1.3 resumption.
    ///
    /// With both TLS 1.2 and TLS 1.3 enabled, [`Opened::renew`] is therefore
    /// approximate: a TLS 1.2 resumption is reported as due for renewal
    /// when this is TLS 1.3.  Use [`TicketDispatcher::decrypt`] directly
    /// where the negotiated version is known.
    ///
    /// [`Opened::renew`]: crate::Opened::renew
    pub fn with_protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    /// The sealer tickets are built with.
    pub fn sealer(&self) -> &TicketSealer {
        &self.sealer
    }

    /// The key store tickets are sealed under.
    pub fn store(&self) -> &Arc<StekStore> {
        self.sealer.dispatcher().store()
    }
}

impl ProducesTickets for StekTicketer {
    fn enabled(&self) -> bool {
        true
    }

    fn lifetime(&self) -> u32 {
        self.lifetime
    }

    /// Encrypt `message` and return the ciphertext.
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn encrypt(&self, message: &[u8]) -> Option<Vec<u8>> {
        self.sealer
            .seal(message)
            .inspect_err(|err| warn!("not issuing ticket: {err}"))
            .ok()
    }

    /// Decrypt `ciphertext` and recover the original message.
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn decrypt(&self, ciphertext: &[u8]) -> Option<Vec<u8>> {
        match self.sealer.open(ciphertext, self.version) {
            Ok(opened) => {
                if opened.renew {
                    trace!("ticket accepted; replacement due");
                }
                Some(opened.plaintext)
            }
            // already logged by the dispatcher
            Err(OpenError::UnknownKey) => None,
            Err(err) => {
                debug!("rejected ticket: {err}");
                None
            }
        }
    }
}

impl Debug for StekTicketer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Note: we deliberately omit keys from the debug output.
        f.debug_struct("StekTicketer")
            .field("lifetime", &self.lifetime)
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::stek::Stek;

    fn ticketer() -> StekTicketer {
        StekTicketer::new(Arc::new(StekStore::new(Stek::new(
            [1; 16], [2; 16], [3; 16],
        ))))
    }

    #[test]
    fn basic_pairwise_test() {
        let t = ticketer();
        assert!(t.enabled());
        let cipher = t.encrypt(b"hello world").unwrap();
        let plain = t.decrypt(&cipher).unwrap();
        assert_eq!(plain, b"hello world");
    }

    #[test]
    fn refuses_garbage() {
        let t = ticketer();
        assert_eq!(t.decrypt(b"hello"), None);
        assert_eq!(t.decrypt(&[0u8; 100]), None);

        let mut cipher = t.encrypt(b"hello world").unwrap();
        cipher.push(0);
        assert_eq!(t.decrypt(&cipher), None);
    }

    #[test]
    fn refuses_tickets_from_other_keys() {
        let cipher = ticketer()
            .encrypt(b"hello world")
            .unwrap();
        let other = StekTicketer::new(Arc::new(StekStore::new(Stek::new(
            [4; 16], [2; 16], [3; 16],
        ))));
        assert_eq!(other.decrypt(&cipher), None);
    }

    #[test]
    fn version_only_affects_renewal() {
        let t = ticketer().with_protocol_version(ProtocolVersion::TLSv1_2);
        let cipher = t.encrypt(b"hello world").unwrap();
        assert_eq!(t.decrypt(&cipher).unwrap(), b"hello world");
    }

    #[test]
    fn renewal_follows_configured_version() {
        let t = ticketer();
        let cipher = t.encrypt(b"hello world").unwrap();
        assert!(t
            .sealer()
            .open(&cipher, t.version)
            .unwrap()
            .renew);

        // the same ticket, as a TLS1.2-only server sees it
        let t = ticketer().with_protocol_version(ProtocolVersion::TLSv1_2);
        assert!(!t
            .sealer()
            .open(&cipher, t.version)
            .unwrap()
            .renew);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&Stek::new([1; 16], [2; 16], [3; 16]).to_bytes())
            .unwrap();

        let loaded = StekTicketer::load(file.path()).unwrap();
        let cipher = ticketer()
            .encrypt(b"shared key")
            .unwrap();
        assert_eq!(loaded.decrypt(&cipher).unwrap(), b"shared key");
    }

    #[test]
    fn stek_ticketer_is_debug_and_producestickets() {
        let t = ticketer().with_lifetime(3600);

        assert_eq!(
            format!("{t:?}"),
            "StekTicketer { lifetime: 3600, version: TLSv1_3 }"
        );
        assert!(t.enabled());
        assert_eq!(t.lifetime(), 3600);
        assert_eq!(ticketer().lifetime(), DEFAULT_TICKET_LIFETIME);
    }
}
