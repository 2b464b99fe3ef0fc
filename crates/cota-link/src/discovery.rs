//! Local subnet scan for listening transmitters.
//!
//! The scan derives the local IPv4 address, enumerates the other hosts of its
//! /24, and attempts a bounded TCP connect to the transmitter port on every
//! candidate concurrently. Hosts that accept are returned in address order.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, UdpSocket};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

const DISCOVERY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::discovery");

/// Non-routable address used only to select the outbound interface.
const ROUTE_PROBE: (Ipv4Addr, u16) = (Ipv4Addr::new(10, 255, 255, 255), 1);

/// Errors raised while preparing a scan.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The local address could not be determined.
    #[error("failed to determine local address: {source}")]
    LocalAddress {
        #[source]
        source: io::Error,
    },
    /// The selected interface has no IPv4 address.
    #[error("local address {address} is not IPv4")]
    NotIpv4 { address: IpAddr },
}

/// Scans for hosts accepting connections on the transmitter port.
#[derive(Debug, Clone, Copy)]
pub struct SubnetScanner {
    port: u16,
    timeout: Duration,
}

impl SubnetScanner {
    /// Creates a scanner probing `port` with a per-host `timeout`.
    #[must_use]
    pub const fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    /// Port probed on each candidate.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the address of the interface that routes outbound traffic.
    pub fn local_address() -> Result<Ipv4Addr, DiscoveryError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .map_err(|source| DiscoveryError::LocalAddress { source })?;
        socket
            .connect(ROUTE_PROBE)
            .map_err(|source| DiscoveryError::LocalAddress { source })?;
        match socket
            .local_addr()
            .map_err(|source| DiscoveryError::LocalAddress { source })?
            .ip()
        {
            IpAddr::V4(address) => Ok(address),
            address @ IpAddr::V6(_) => Err(DiscoveryError::NotIpv4 { address }),
        }
    }

    /// Hosts `.1` to `.254` of the /24 containing `local`.
    #[must_use]
    pub fn subnet_hosts(local: Ipv4Addr) -> Vec<Ipv4Addr> {
        let [a, b, c, _] = local.octets();
        (1..=254).map(|host| Ipv4Addr::new(a, b, c, host)).collect()
    }

    /// Scans the local /24.
    pub fn scan_local_subnet(&self) -> Result<Vec<Ipv4Addr>, DiscoveryError> {
        let local = Self::local_address()?;
        info!(target: DISCOVERY_TARGET, %local, port = self.port, "scanning local subnet");
        Ok(self.scan(&Self::subnet_hosts(local)))
    }

    /// Probes every candidate concurrently and returns those that accepted,
    /// sorted by address.
    #[must_use]
    pub fn scan(&self, candidates: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
        let (found_tx, found_rx) = mpsc::channel();
        thread::scope(|scope| {
            for &candidate in candidates {
                let found = found_tx.clone();
                let probe = thread::Builder::new()
                    .name(format!("cota-scan-{candidate}"))
                    .spawn_scoped(scope, move || {
                        if self.accepts(candidate) {
                            let _ = found.send(candidate);
                        }
                    });
                if let Err(error) = probe {
                    warn!(target: DISCOVERY_TARGET, %candidate, %error, "could not spawn probe");
                }
            }
        });
        drop(found_tx);

        let mut hosts: Vec<Ipv4Addr> = found_rx.into_iter().collect();
        hosts.sort_unstable();
        info!(target: DISCOVERY_TARGET, found = hosts.len(), "scan complete");
        hosts
    }

    fn accepts(&self, candidate: Ipv4Addr) -> bool {
        let address = SocketAddr::from((candidate, self.port));
        match TcpStream::connect_timeout(&address, self.timeout) {
            Ok(_) => {
                debug!(target: DISCOVERY_TARGET, %address, "transmitter port open");
                true
            }
            Err(_) => false,
        }
    }
}
