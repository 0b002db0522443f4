//! Outbound address detection for published stream URLs.
//!
//! Consumers on other machines need an address they can route to, not the
//! wildcard the server is bound on. [`RouteResolver`] asks the OS which local
//! interface it would use toward a public destination; when no route exists
//! URLs fall back to [`FALLBACK_HOST`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

/// Host used when no outbound address can be determined.
pub const FALLBACK_HOST: &str = "localhost";

/// Public destination whose route selects the outbound interface. Connecting
/// a UDP socket sends no packets.
const DEFAULT_PROBE: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80);

/// Source of the host part of published URLs.
pub trait AddressResolver: Send + Sync {
    /// The local address remote consumers should use, if one can be found.
    fn outbound_ip(&self) -> Option<IpAddr>;

    /// Host component for a URL: the outbound IP (bracketed for IPv6) or
    /// [`FALLBACK_HOST`].
    fn host(&self) -> String {
        match self.outbound_ip() {
            Some(IpAddr::V4(ip)) => ip.to_string(),
            Some(IpAddr::V6(ip)) => format!("[{ip}]"),
            None => FALLBACK_HOST.to_string(),
        }
    }
}

/// Resolves the outbound interface from the routing table.
#[derive(Debug, Clone, Copy)]
pub struct RouteResolver {
    probe: SocketAddr,
}

impl RouteResolver {
    pub fn new(probe: SocketAddr) -> Self {
        Self { probe }
    }
}

impl Default for RouteResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE)
    }
}

impl AddressResolver for RouteResolver {
    fn outbound_ip(&self) -> Option<IpAddr> {
        let bind: SocketAddr = match self.probe {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind).ok()?;
        if let Err(e) = socket.connect(self.probe) {
            tracing::debug!(probe = %self.probe, "No outbound route: {e}");
            return None;
        }
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_unspecified()).then_some(ip)
    }
}

/// Always answers with a fixed address (or none).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedResolver(Option<IpAddr>);

impl FixedResolver {
    pub fn new(ip: IpAddr) -> Self {
        Self(Some(ip))
    }

    /// A resolver that never finds a route.
    pub fn unroutable() -> Self {
        Self(None)
    }
}

impl AddressResolver for FixedResolver {
    fn outbound_ip(&self) -> Option<IpAddr> {
        self.0
    }
}
