use crate::crypto::{
    rust_crypto, HashAlgorithm, MacContext, TicketCryptoProvider, TicketDecrypter, TicketEncrypter,
};
use crate::error::{CipherInitError, GetRandomFailed, MacInitError};
use crate::stek::Stek;

/// Initializes ticket cipher and MAC state from STEK material.
///
/// The engine only sets state up; bulk encryption and tagging are done by
/// whoever receives the returned contexts.
#[derive(Clone, Copy, Debug)]
pub struct TicketEngine {
    provider: TicketCryptoProvider,
    digest: HashAlgorithm,
}

impl TicketEngine {
    /// Make an engine using `provider`, with HMAC-SHA256.
    pub fn new(provider: TicketCryptoProvider) -> Self {
        Self {
            provider,
            digest: HashAlgorithm::SHA256,
        }
    }

    /// Use `digest` for ticket MACs instead of SHA-256.
    pub fn with_digest(mut self, digest: HashAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// The configured MAC digest.
    pub fn digest(&self) -> HashAlgorithm {
        self.digest
    }

    /// IV length required by the cipher.
    pub fn iv_len(&self) -> usize {
        self.provider.cipher.iv_len()
    }

    /// Draw a fresh IV from the provider's secure random source.
    pub fn generate_iv(&self) -> Result<Vec<u8>, GetRandomFailed> {
        let mut iv = vec![0u8; self.iv_len()];
        self.provider
            .secure_random
            .fill(&mut iv)?;
        Ok(iv)
    }

    /// Initialize the cipher for encryption with the STEK's AES key.
    pub fn init_encrypt(
        &self,
        stek: &Stek,
        iv: &[u8],
    ) -> Result<Box<dyn TicketEncrypter>, CipherInitError> {
        self.provider
            .cipher
            .encrypter(self.cipher_key(stek)?, iv)
    }

    /// Initialize the cipher for decryption with the STEK's AES key.
    pub fn init_decrypt(
        &self,
        stek: &Stek,
        iv: &[u8],
    ) -> Result<Box<dyn TicketDecrypter>, CipherInitError> {
        self.provider
            .cipher
            .decrypter(self.cipher_key(stek)?, iv)
    }

    /// The STEK's AES key, if it fits the provider's cipher.
    fn cipher_key<'a>(&self, stek: &'a Stek) -> Result<&'a [u8], CipherInitError> {
        let key = stek.aes_key();
        if key.len() != self.provider.cipher.key_len() {
            return Err(CipherInitError);
        }
        Ok(key)
    }

    /// Initialize the MAC with the STEK's HMAC key and the configured digest.
    pub fn init_mac(&self, stek: &Stek) -> Result<Box<dyn MacContext>, MacInitError> {
        self.provider
            .mac
            .init(stek.hmac_key(), self.digest)
    }
}

impl Default for TicketEngine {
    fn default() -> Self {
        Self::new(rust_crypto::provider())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TicketCipher;

    fn stek() -> Stek {
        Stek::new([1; 16], [2; 16], [3; 16])
    }

    #[test]
    fn default_engine_is_aes_cbc_hmac_sha256() {
        let engine = TicketEngine::default();
        assert_eq!(engine.digest(), HashAlgorithm::SHA256);
        assert_eq!(engine.iv_len(), 16);
        assert_eq!(
            engine
                .init_mac(&stek())
                .unwrap()
                .tag_len(),
            32
        );
    }

    #[test]
    fn generated_ivs_have_cipher_length() {
        let engine = TicketEngine::default();
        let iv = engine.generate_iv().unwrap();
        assert_eq!(iv.len(), engine.iv_len());
        assert_ne!(iv, engine.generate_iv().unwrap());
    }

    #[test]
    fn encrypt_and_decrypt_contexts_agree() {
        let engine = TicketEngine::default();
        let iv = engine.generate_iv().unwrap();
        let ciphertext = engine
            .init_encrypt(&stek(), &iv)
            .unwrap()
            .encrypt(b"state");
        let plain = engine
            .init_decrypt(&stek(), &iv)
            .unwrap()
            .decrypt(&ciphertext);
        assert_eq!(plain.as_deref(), Some(&b"state"[..]));
    }

    #[test]
    fn malformed_iv_is_a_cipher_init_error() {
        let engine = TicketEngine::default();
        assert!(matches!(
            engine.init_encrypt(&stek(), &[0u8; 5]),
            Err(CipherInitError)
        ));
        assert!(matches!(
            engine.init_decrypt(&stek(), &[0u8; 17]),
            Err(CipherInitError)
        ));
    }

    /// AES-256-CBC: wants a key twice the size a STEK carries.
    #[derive(Debug)]
    struct WideKeyCipher;

    impl TicketCipher for WideKeyCipher {
        fn key_len(&self) -> usize {
            32
        }

        fn iv_len(&self) -> usize {
            16
        }

        fn encrypter(
            &self,
            _key: &[u8],
            _iv: &[u8],
        ) -> Result<Box<dyn TicketEncrypter>, CipherInitError> {
            unreachable!("called with a short key")
        }

        fn decrypter(
            &self,
            _key: &[u8],
            _iv: &[u8],
        ) -> Result<Box<dyn TicketDecrypter>, CipherInitError> {
            unreachable!("called with a short key")
        }
    }

    #[test]
    fn cipher_key_length_must_match_stek() {
        let engine = TicketEngine::new(TicketCryptoProvider {
            cipher: &WideKeyCipher,
            ..rust_crypto::provider()
        });
        assert!(matches!(
            engine.init_encrypt(&stek(), &[0u8; 16]),
            Err(CipherInitError)
        ));
        assert!(matches!(
            engine.init_decrypt(&stek(), &[0u8; 16]),
            Err(CipherInitError)
        ));
    }

    #[test]
    fn digest_is_configurable() {
        let engine = TicketEngine::default().with_digest(HashAlgorithm::SHA384);
        assert_eq!(engine.digest().name(), "sha384");
        assert_eq!(
            engine
                .init_mac(&stek())
                .unwrap()
                .tag_len(),
            48
        );

        let engine = engine.with_digest(HashAlgorithm::SHA1);
        assert!(matches!(engine.init_mac(&stek()), Err(MacInitError)));
    }
}
