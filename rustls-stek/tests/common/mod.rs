#![allow(dead_code)]

use std::ops::{Deref, DerefMut};
pub use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use rustls::server::{NoServerSessionStorage, ProducesTickets};
use rustls::{
    ClientConfig, ClientConnection, ConnectionCommon, RootCertStore, ServerConfig,
    ServerConnection, SideData, SupportedProtocolVersion,
};
use rustls_stek::{Stek, StekStore, StekTicketer};

pub struct TestPki {
    cert: CertificateDer<'static>,
    key: Vec<u8>,
}

impl TestPki {
    pub fn new() -> Self {
        let _ = env_logger::builder()
            .is_test(true)
            .try_init();
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        Self {
            cert: cert.der().clone(),
            key: key_pair.serialize_der(),
        }
    }

    pub fn server_config(&self, ticketer: Arc<dyn ProducesTickets>) -> Arc<ServerConfig> {
        let mut config = ServerConfig::builder_with_provider(provider())
            .with_protocol_versions(rustls::ALL_VERSIONS)
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(
                vec![self.cert.clone()],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key.clone())),
            )
            .unwrap();
        config.session_storage = Arc::new(NoServerSessionStorage {});
        config.ticketer = ticketer;
        config.send_tls13_tickets = 1;
        Arc::new(config)
    }

    pub fn client_config(&self, version: &'static SupportedProtocolVersion) -> Arc<ClientConfig> {
        let mut roots = RootCertStore::empty();
        roots.add(self.cert.clone()).unwrap();
        Arc::new(
            ClientConfig::builder_with_provider(provider())
                .with_protocol_versions(&[version])
                .unwrap()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        )
    }
}

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

pub fn stek(seed: u8) -> Stek {
    Stek::new([seed; 16], [seed ^ 0x5a; 16], [seed ^ 0xa5; 16])
}

pub fn ticketer_for(stek: Stek) -> Arc<StekTicketer> {
    Arc::new(StekTicketer::new(Arc::new(StekStore::new(stek))))
}

/// Run a complete handshake between a fresh client and server, including
/// delivery of any post-handshake tickets.
pub fn connect(
    client_config: &Arc<ClientConfig>,
    server_config: &Arc<ServerConfig>,
) -> (ClientConnection, ServerConnection) {
    let mut client = ClientConnection::new(
        Arc::clone(client_config),
        ServerName::try_from("localhost").unwrap(),
    )
    .unwrap();
    let mut server = ServerConnection::new(Arc::clone(server_config)).unwrap();

    do_handshake(&mut client, &mut server);
    transfer(&mut server, &mut client);
    (client, server)
}

pub fn do_handshake(client: &mut ClientConnection, server: &mut ServerConnection) {
    while server.is_handshaking() || client.is_handshaking() {
        transfer(client, server);
        transfer(server, client);
    }
}

pub fn transfer<L, R, LS, RS>(left: &mut L, right: &mut R) -> usize
where
    L: DerefMut + Deref<Target = ConnectionCommon<LS>>,
    R: DerefMut + Deref<Target = ConnectionCommon<RS>>,
    LS: SideData,
    RS: SideData,
{
    let mut buf = Vec::new();
    while left.wants_write() {
        let written = left.write_tls(&mut buf).unwrap();
        if written == 0 {
            break;
        }
    }

    let mut offs = 0;
    while offs < buf.len() {
        offs += right
            .read_tls(&mut &buf[offs..])
            .unwrap();
        right.process_new_packets().unwrap();
    }

    buf.len()
}
