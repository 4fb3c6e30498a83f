use core::fmt;
use std::error::Error as StdError;
use std::io;

/// A STEK could not be loaded.
///
/// This is always fatal at startup: a server must not issue or accept
/// tickets without complete key material.
#[non_exhaustive]
#[derive(Debug)]
pub enum StekError {
    /// The key file could not be opened or read.
    Io(io::Error),

    /// The input ended before `field` was read in full.
    ///
    /// `read` is how many bytes of that field were available.
    Truncated {
        /// The field that could not be read.
        field: StekField,
        /// Bytes of `field` present in the input.
        read: usize,
    },

    /// The input is longer than a STEK.  `len` is the total input length.
    TrailingData {
        /// Length of the offending input.
        len: usize,
    },
}

/// The fields of a STEK, in file order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StekField {
    /// The 16-byte key name.
    Name,
    /// The AES-128 key.
    AesKey,
    /// The HMAC-SHA256 key.
    HmacKey,
}

impl fmt::Display for StekField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("STEK name"),
            Self::AesKey => f.write_str("STEK AES key"),
            Self::HmacKey => f.write_str("STEK HMAC key"),
        }
    }
}

impl fmt::Display for StekError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "unable to read STEK file: {err}"),
            Self::Truncated { field, read } => write!(
                f,
                "unable to read {field}: only {read} of {} bytes present",
                crate::stek::STEK_FIELD_LEN
            ),
            Self::TrailingData { len } => write!(
                f,
                "STEK file is {len} bytes, expected exactly {}",
                crate::stek::STEK_LEN
            ),
        }
    }
}

impl StdError for StekError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StekError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<StekError> for rustls::Error {
    fn from(err: StekError) -> Self {
        Self::General(err.to_string())
    }
}

/// Random material generation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetRandomFailed;

impl fmt::Display for GetRandomFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to get random bytes")
    }
}

impl StdError for GetRandomFailed {}

/// The cipher rejected the key/IV combination it was initialized with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CipherInitError;

impl fmt::Display for CipherInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ticket cipher initialization failed")
    }
}

impl StdError for CipherInitError {}

/// The MAC rejected its key or digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacInitError;

impl fmt::Display for MacInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ticket MAC initialization failed")
    }
}

impl StdError for MacInitError {}

/// A ticket operation failed before any ticket data was processed.
///
/// Each variant is fatal for the single operation it occurred in; the
/// connection continues without ticket support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketError {
    /// No IV could be generated.
    GetRandomFailed,
    /// The cipher could not be initialized.
    CipherInit,
    /// The MAC could not be initialized.
    MacInit,
}

impl TicketError {
    /// The callback result code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            Self::GetRandomFailed => -1,
            Self::CipherInit => -2,
            Self::MacInit => -3,
        }
    }
}

impl fmt::Display for TicketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetRandomFailed => fmt::Display::fmt(&GetRandomFailed, f),
            Self::CipherInit => fmt::Display::fmt(&CipherInitError, f),
            Self::MacInit => fmt::Display::fmt(&MacInitError, f),
        }
    }
}

impl StdError for TicketError {}

impl From<GetRandomFailed> for TicketError {
    fn from(_: GetRandomFailed) -> Self {
        Self::GetRandomFailed
    }
}

impl From<CipherInitError> for TicketError {
    fn from(_: CipherInitError) -> Self {
        Self::CipherInit
    }
}

impl From<MacInitError> for TicketError {
    fn from(_: MacInitError) -> Self {
        Self::MacInit
    }
}

/// A ticket could not be sealed.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SealError {
    /// The encrypt path of the dispatcher failed.
    Ticket(TicketError),
    /// The session state is too large to be length-prefixed in a ticket.
    TooLarge,
}

impl fmt::Display for SealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket(err) => write!(f, "cannot seal ticket: {err}"),
            Self::TooLarge => f.write_str("cannot seal ticket: session state too large"),
        }
    }
}

impl StdError for SealError {}

impl From<TicketError> for SealError {
    fn from(err: TicketError) -> Self {
        Self::Ticket(err)
    }
}

/// A presented ticket could not be opened.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenError {
    /// The ticket is too short to contain a key name, IV and tag.
    Malformed,
    /// The ticket is longer than any ticket this server has sealed.
    TooLarge,
    /// The ticket was sealed under a key name this server does not hold.
    UnknownKey,
    /// The decrypt path of the dispatcher failed.
    Ticket(TicketError),
    /// The MAC tag did not verify.
    BadMac,
    /// The decrypted state had invalid padding.
    BadPadding,
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("malformed ticket"),
            Self::TooLarge => f.write_str("rejected over-length ticket"),
            Self::UnknownKey => f.write_str("ticket key name not recognized"),
            Self::Ticket(err) => write!(f, "cannot open ticket: {err}"),
            Self::BadMac => f.write_str("ticket MAC verification failed"),
            Self::BadPadding => f.write_str("ticket has invalid padding"),
        }
    }
}

impl StdError for OpenError {}

impl From<TicketError> for OpenError {
    fn from(err: TicketError) -> Self {
        Self::Ticket(err)
    }
}
