use core::fmt;
use std::sync::Arc;

use rustls::ProtocolVersion;
use subtle::ConstantTimeEq;

use crate::crypto::{MacContext, TicketDecrypter, TicketEncrypter};
use crate::engine::TicketEngine;
use crate::error::TicketError;
#[cfg(feature = "logging")]
use crate::log::{debug, trace, warn};
use crate::stek::{Stek, StekStore, STEK_FIELD_LEN};

/// Callback result: the operation succeeded.
pub const TICKET_SUCCESS: i32 = 1;

/// Callback result: the presented key name is not ours.
pub const TICKET_UNKNOWN_KEY: i32 = 0;

/// Callback result: the ticket decrypts, but a replacement must be issued.
pub const TICKET_RENEW: i32 = 2;

/// A request from the TLS layer to seal or open a ticket.
#[derive(Clone, Copy, Debug)]
pub enum TicketRequest<'a> {
    /// Seal a new ticket under the active STEK.
    Encrypt,
    /// Open a ticket a client presented.
    Decrypt {
        /// Key name carried in the ticket.
        key_name: &'a [u8; STEK_FIELD_LEN],
        /// IV carried in the ticket.
        iv: &'a [u8],
        /// Protocol version negotiated on the connection.
        version: ProtocolVersion,
    },
}

/// The dispatcher's answer to a [`TicketRequest`].
#[derive(Debug)]
pub enum TicketResponse {
    /// State for sealing a new ticket.
    Encrypt(SealingState),
    /// Outcome of examining a presented ticket.
    Decrypt(Decrypted),
    /// The operation failed; no ticket can be sealed or opened.
    Failed(TicketError),
}

impl TicketResponse {
    /// The integer result code of this response.
    ///
    /// `1` success, `0` unknown key, `2` success with renewal, negative
    /// for failures.
    pub fn code(&self) -> i32 {
        match self {
            Self::Encrypt(_) => TICKET_SUCCESS,
            Self::Decrypt(decrypted) => decrypted.code(),
            Self::Failed(err) => err.code(),
        }
    }
}

/// Everything needed to seal one ticket.
pub struct SealingState {
    /// Name of the STEK the ticket is sealed under.
    pub key_name: [u8; STEK_FIELD_LEN],
    /// Freshly generated IV.
    pub iv: Vec<u8>,
    /// Cipher initialized for encryption under `iv`.
    pub cipher: Box<dyn TicketEncrypter>,
    /// MAC initialized with the STEK's HMAC key.
    pub mac: Box<dyn MacContext>,
}

impl fmt::Debug for SealingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealingState")
            .field("key_name", &self.key_name)
            .field("iv", &self.iv)
            .finish_non_exhaustive()
    }
}

/// Everything needed to open one ticket.
pub struct OpeningState {
    /// Cipher initialized for decryption under the presented IV.
    pub cipher: Box<dyn TicketDecrypter>,
    /// MAC initialized with the STEK's HMAC key.
    pub mac: Box<dyn MacContext>,
}

impl fmt::Debug for OpeningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpeningState")
            .finish_non_exhaustive()
    }
}

/// The outcome of the decrypt path.
#[derive(Debug)]
pub enum Decrypted {
    /// The ticket names a key we do not hold.  Not an error: the TLS layer
    /// falls back to a full handshake and issues a fresh ticket.
    UnknownKey,
    /// The ticket can be opened.
    Accepted(OpeningState),
    /// The ticket can be opened, and a replacement must be issued.
    Renew(OpeningState),
}

impl Decrypted {
    /// The integer result code of this outcome.
    pub fn code(&self) -> i32 {
        match self {
            Self::UnknownKey => TICKET_UNKNOWN_KEY,
            Self::Accepted(_) => TICKET_SUCCESS,
            Self::Renew(_) => TICKET_RENEW,
        }
    }

    /// Take the opening state, if the key was recognized.
    pub fn into_state(self) -> Option<OpeningState> {
        match self {
            Self::UnknownKey => None,
            Self::Accepted(state) | Self::Renew(state) => Some(state),
        }
    }
}

/// The entry point the TLS layer calls for every ticket seal or open.
///
/// Each call takes one snapshot of the active STEK from the store and uses
/// it throughout, so the dispatcher can be shared freely between threads.
#[derive(Clone, Debug)]
pub struct TicketDispatcher {
    store: Arc<StekStore>,
    engine: TicketEngine,
}

impl TicketDispatcher {
    /// Make a dispatcher for the keys in `store`, using the default engine.
    pub fn new(store: Arc<StekStore>) -> Self {
        Self::with_engine(store, TicketEngine::default())
    }

    /// Make a dispatcher with a specific engine.
    pub fn with_engine(store: Arc<StekStore>, engine: TicketEngine) -> Self {
        Self { store, engine }
    }

    /// The store this dispatcher reads keys from.
    pub fn store(&self) -> &Arc<StekStore> {
        &self.store
    }

    /// The engine used to initialize cipher and MAC state.
    pub fn engine(&self) -> &TicketEngine {
        &self.engine
    }

    /// Serve `request`.
    pub fn dispatch(&self, request: TicketRequest<'_>) -> TicketResponse {
        let response = match request {
            TicketRequest::Encrypt => self
                .encrypt()
                .map(TicketResponse::Encrypt),
            TicketRequest::Decrypt {
                key_name,
                iv,
                version,
            } => self
                .decrypt(key_name, iv, version)
                .map(TicketResponse::Decrypt),
        };

        response.unwrap_or_else(TicketResponse::Failed)
    }

    /// The encrypt path: name the active key, draw an IV, and initialize
    /// the cipher and MAC.
    pub fn encrypt(&self) -> Result<SealingState, TicketError> {
        let stek = self.store.current();

        let iv = self
            .engine
            .generate_iv()
            .inspect_err(|_| warn!("cannot generate ticket IV"))?;

        let cipher = self
            .engine
            .init_encrypt(&stek, &iv)
            .inspect_err(|_| warn!("cannot initialize ticket cipher for encryption"))?;

        let mac = self
            .engine
            .init_mac(&stek)
            .inspect_err(|_| {
                warn!(
                    "cannot initialize ticket MAC with {}",
                    self.engine.digest().name()
                )
            })?;

        trace!("sealing ticket under STEK {:02x?}", stek.name());
        Ok(SealingState {
            key_name: *stek.name(),
            iv,
            cipher,
            mac,
        })
    }

    /// The decrypt path: check the key name, then initialize the cipher
    /// and MAC for the presented IV.
    ///
    /// No cipher or MAC state is built for an unrecognized key name.
    pub fn decrypt(
        &self,
        key_name: &[u8; STEK_FIELD_LEN],
        iv: &[u8],
        version: ProtocolVersion,
    ) -> Result<Decrypted, TicketError> {
        let stek = self.store.current();

        if !key_name_matches(&stek, key_name) {
            debug!("ticket key name {key_name:02x?} not recognized");
            return Ok(Decrypted::UnknownKey);
        }

        let cipher = self
            .engine
            .init_decrypt(&stek, iv)
            .inspect_err(|_| warn!("cannot initialize ticket cipher for decryption"))?;

        let mac = self
            .engine
            .init_mac(&stek)
            .inspect_err(|_| {
                warn!(
                    "cannot initialize ticket MAC with {}",
                    self.engine.digest().name()
                )
            })?;

        let state = OpeningState { cipher, mac };
        if renews_tickets(version) {
            trace!("accepting ticket; {version:?} requires a replacement");
            Ok(Decrypted::Renew(state))
        } else {
            Ok(Decrypted::Accepted(state))
        }
    }
}

fn key_name_matches(stek: &Stek, key_name: &[u8; STEK_FIELD_LEN]) -> bool {
    stek.name()[..]
        .ct_eq(&key_name[..])
        .into()
}

/// Whether resumption at `version` always issues a new ticket.
///
/// TLS 1.3 does, for forward secrecy; so would any later TLS version.
fn renews_tickets(version: ProtocolVersion) -> bool {
    match version {
        ProtocolVersion::TLSv1_3 => true,
        ProtocolVersion::Unknown(v) => (0x0305..=0x03ff).contains(&v),
        _ => false,
    }
}
