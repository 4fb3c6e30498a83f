use rustls::ProtocolVersion;

use crate::crypto::MacContext;
use crate::dispatch::{Decrypted, OpeningState, SealingState, TicketDispatcher};
use crate::error::{OpenError, SealError};
#[cfg(feature = "logging")]
use crate::log::trace;
use crate::stek::STEK_FIELD_LEN;

/// Seals session state into tickets and opens them again, using the
/// cipher and MAC state a [`TicketDispatcher`] initializes.
///
/// Tickets follow the [RFC 5077 §4] "Recommended Ticket Construction":
///
/// ```text
///   key_name: [u8; 16]
///   iv: [u8; 16]
///   encrypted_state: [u8, _]
///   mac tag: [u8; 32]
/// ```
///
/// [RFC 5077 §4]: https://www.rfc-editor.org/rfc/rfc5077#section-4
#[derive(Clone, Debug)]
pub struct TicketSealer {
    dispatcher: TicketDispatcher,
}

/// A successfully opened ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Opened {
    /// The session state sealed in the ticket.
    pub plaintext: Vec<u8>,
    /// Whether a replacement ticket must be issued.
    pub renew: bool,
}

impl TicketSealer {
    /// Make a sealer driven by `dispatcher`.
    pub fn new(dispatcher: TicketDispatcher) -> Self {
        Self { dispatcher }
    }

    /// The dispatcher this sealer calls.
    pub fn dispatcher(&self) -> &TicketDispatcher {
        &self.dispatcher
    }

    /// Encrypt and authenticate `plain`, returning the ticket.
    pub fn seal(&self, plain: &[u8]) -> Result<Vec<u8>, SealError> {
        let SealingState {
            key_name,
            iv,
            cipher,
            mut mac,
        } = self.dispatcher.encrypt()?;

        let encrypted_state = cipher.encrypt(plain);
        authenticate(&mut *mac, &key_name, &iv, &encrypted_state).ok_or(SealError::TooLarge)?;
        let tag = mac.sign();

        let mut ticket =
            Vec::with_capacity(key_name.len() + iv.len() + encrypted_state.len() + tag.len());
        ticket.extend(key_name);
        ticket.extend(iv);
        ticket.extend(encrypted_state);
        ticket.extend(tag);

        trace!("sealed {} byte ticket", ticket.len());
        Ok(ticket)
    }

    /// Verify and decrypt `ticket`, presented on a connection that
    /// negotiated `version`.
    ///
    /// The tag is checked before anything is decrypted.
    pub fn open(&self, ticket: &[u8], version: ProtocolVersion) -> Result<Opened, OpenError> {
        // Split off the key name from the remaining ciphertext.
        let (key_name, rest) = ticket
            .split_at_checked(STEK_FIELD_LEN)
            .ok_or(OpenError::Malformed)?;
        let key_name: &[u8; STEK_FIELD_LEN] = key_name
            .try_into()
            .map_err(|_| OpenError::Malformed)?;

        // Split off the IV from the remaining ciphertext.
        let (iv, rest) = rest
            .split_at_checked(self.dispatcher.engine().iv_len())
            .ok_or(OpenError::Malformed)?;

        // Enough room for the tag must remain before we ask for keys.
        if rest.len() < self.dispatcher.engine().digest().output_len() {
            return Err(OpenError::Malformed);
        }
        if rest.len() > usize::from(u16::MAX) + self.dispatcher.engine().digest().output_len() {
            return Err(OpenError::TooLarge);
        }

        let decrypted = self
            .dispatcher
            .decrypt(key_name, iv, version)?;
        let renew = matches!(decrypted, Decrypted::Renew(_));
        let OpeningState { cipher, mut mac } = decrypted
            .into_state()
            .ok_or(OpenError::UnknownKey)?;

        // And finally, split the encrypted state from the tag.
        let state_len = rest
            .len()
            .checked_sub(mac.tag_len())
            .ok_or(OpenError::Malformed)?;
        let (encrypted_state, tag) = rest.split_at(state_len);

        authenticate(&mut *mac, key_name, iv, encrypted_state).ok_or(OpenError::TooLarge)?;
        if !mac.verify(tag) {
            return Err(OpenError::BadMac);
        }

        let plaintext = cipher
            .decrypt(encrypted_state)
            .ok_or(OpenError::BadPadding)?;

        Ok(Opened { plaintext, renew })
    }
}

/// Feed the MAC its input: key name, IV, the length of the encrypted
/// state as two big-endian bytes, then the encrypted state.
///
/// Returns `None` if the encrypted state is too long for its length prefix.
fn authenticate(
    mac: &mut dyn MacContext,
    key_name: &[u8],
    iv: &[u8],
    encrypted_state: &[u8],
) -> Option<()> {
    let len = u16::try_from(encrypted_state.len()).ok()?;
    mac.update(key_name);
    mac.update(iv);
    mac.update(&len.to_be_bytes());
    mac.update(encrypted_state);
    Some(())
}
