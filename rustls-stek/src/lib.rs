//! # rustls-stek - session tickets sealed under a key from disk
//!
//! rustls' built-in ticketers generate random keys at startup, so tickets
//! die with the process and cannot be shared between servers.  This crate
//! instead seals tickets under a *session ticket encryption key* (STEK)
//! read from a 48-byte file:
//!
//! | bytes   | contents           |
//! |---------|--------------------|
//! | 0..16   | key name           |
//! | 16..32  | AES-128 key        |
//! | 32..48  | HMAC-SHA256 key    |
//!
//! Tickets use the [RFC 5077] recommended construction: AES-128-CBC
//! encryption of the session state, then HMAC-SHA256 over the key name,
//! IV and ciphertext.
//!
//! The pieces, from the bottom up:
//!
//! * [`StekStore`] holds the active [`Stek`] and swaps it atomically.
//! * [`TicketEngine`] initializes cipher and MAC state from a STEK, through
//!   the capabilities in a [`crypto::TicketCryptoProvider`].
//! * [`TicketDispatcher`] answers the TLS layer's encrypt and decrypt
//!   requests with initialized state, or a result code saying why not.
//! * [`TicketSealer`] does the bulk work of building and checking tickets.
//! * [`StekTicketer`] plugs all of this into a rustls `ServerConfig`.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! # fn config(mut config: rustls::ServerConfig) -> Result<(), rustls_stek::StekError> {
//! config.ticketer = Arc::new(rustls_stek::StekTicketer::load("/etc/tls/stek.key")?);
//! config.send_tls13_tickets = 1;
//! # Ok(())
//! # }
//! ```
//!
//! [RFC 5077]: https://www.rfc-editor.org/rfc/rfc5077#section-4

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::use_self)]

// log for logging (optional).
#[cfg(feature = "logging")]
use log;

#[cfg(not(feature = "logging"))]
#[macro_use]
mod log {
    macro_rules! trace    ( ($($tt:tt)*) => {{}} );
    macro_rules! debug    ( ($($tt:tt)*) => {{}} );
    macro_rules! warn     ( ($($tt:tt)*) => {{}} );
}

pub mod crypto;
mod dispatch;
mod engine;
mod error;
mod stek;
mod ticket;
mod ticketer;

pub use crate::dispatch::{
    Decrypted, OpeningState, SealingState, TicketDispatcher, TicketRequest, TicketResponse,
    TICKET_RENEW, TICKET_SUCCESS, TICKET_UNKNOWN_KEY,
};
pub use crate::engine::TicketEngine;
pub use crate::error::{
    CipherInitError, GetRandomFailed, MacInitError, OpenError, SealError, StekError, StekField,
    TicketError,
};
pub use crate::stek::{Stek, StekStore, STEK_FIELD_LEN, STEK_LEN};
pub use crate::ticket::{Opened, TicketSealer};
pub use crate::ticketer::{StekTicketer, DEFAULT_TICKET_LIFETIME};
