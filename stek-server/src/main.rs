//! A TLS server whose session tickets are sealed under a STEK read from disk.
//!
//! It accepts one connection at a time, completes the handshake, writes a
//! fixed reply and closes the connection.  Restarting the server with the
//! same STEK file, or running several servers with it, lets clients resume
//! sessions across all of them.
//!
//! Usage: stek-server <PORT> <STEK> <CERT> <KEY>
//!
//! A STEK is 48 random bytes, for example from
//! `head -c 48 /dev/urandom > stek.key`.

use core::error::Error as StdError;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use log::{debug, error, info};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::NoServerSessionStorage;
use rustls::version::TLS12;
use rustls::{ProtocolVersion, ServerConfig, ServerConnection, SupportedProtocolVersion};
use rustls_stek::StekTicketer;

/// Serves TLS connections, resuming sessions from tickets sealed under a
/// STEK file.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Listen on port.
    port: u16,
    /// Read the 48-byte session ticket encryption key from this file.
    stek: PathBuf,
    /// Read server certificates from the given file. This should contain PEM-format certificates
    /// in the right order (the first certificate should certify the end entity, matching the
    /// private key).
    cert: PathBuf,
    /// Read private key from the given file. This should be a private key in PEM format.
    key: PathBuf,
    /// Listen on this address.
    #[clap(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    address: IpAddr,
    /// Only offer TLS1.2.
    #[clap(long)]
    tls12_only: bool,
    /// Send this to every client once the handshake completes.
    #[clap(long, default_value = "Glory to mankind!\n")]
    reply: String,
    /// Emit log output.
    #[clap(short, long)]
    verbose: bool,
}

static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&TLS12];

impl Args {
    fn versions(&self) -> &'static [&'static SupportedProtocolVersion] {
        if self.tls12_only {
            TLS12_ONLY
        } else {
            rustls::DEFAULT_VERSIONS
        }
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, Box<dyn StdError>> {
    let certs = CertificateDer::pem_file_iter(path)?.collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(format!("no certificates found in {}", path.display()).into());
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, Box<dyn StdError>> {
    Ok(PrivateKeyDer::from_pem_file(path)?)
}

fn make_config(args: &Args) -> Result<Arc<ServerConfig>, Box<dyn StdError>> {
    let newest = if args.tls12_only {
        ProtocolVersion::TLSv1_2
    } else {
        ProtocolVersion::TLSv1_3
    };
    let ticketer = StekTicketer::load(&args.stek)?.with_protocol_version(newest);
    info!("loaded STEK {:?}", ticketer.store().current());

    let mut config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(args.versions())?
    .with_no_client_auth()
    .with_single_cert(load_certs(&args.cert)?, load_private_key(&args.key)?)?;

    // resume from tickets only, never from a per-process session cache
    config.session_storage = Arc::new(NoServerSessionStorage {});
    config.ticketer = Arc::new(ticketer);
    config.send_tls13_tickets = 1;
    Ok(Arc::new(config))
}

/// Complete one connection: handshake, reply, close_notify.
fn handle(
    config: &Arc<ServerConfig>,
    sock: &mut TcpStream,
    reply: &[u8],
) -> Result<(), Box<dyn StdError>> {
    let mut conn = ServerConnection::new(Arc::clone(config))?;
    while conn.is_handshaking() {
        conn.complete_io(sock)?;
    }
    debug!(
        "handshake complete: {:?} {:?}",
        conn.protocol_version(),
        conn.handshake_kind()
    );

    conn.writer().write_all(reply)?;
    conn.send_close_notify();
    while conn.wants_write() {
        conn.write_tls(sock)?;
    }
    sock.flush()?;
    Ok(())
}

fn serve(listener: &TcpListener, config: &Arc<ServerConfig>, reply: &[u8]) -> std::io::Result<()> {
    loop {
        let (mut sock, peer) = listener.accept()?;
        debug!("accepted connection from {peer}");
        if let Err(err) = handle(config, &mut sock, reply) {
            error!("connection from {peer} failed: {err}");
        }
    }
}

fn main() -> Result<(), Box<dyn StdError>> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.parse_filters("trace");
    }
    logger.init();

    let config = make_config(&args)?;

    let addr = SocketAddr::new(args.address, args.port);
    let listener = TcpListener::bind(addr)?;
    info!("listening on {addr}");

    serve(&listener, &config, args.reply.as_bytes())?;
    Ok(())
}
