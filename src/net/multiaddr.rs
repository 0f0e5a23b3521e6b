//! Multiaddr subset used for listen and coordinator addresses.
//!
//! Only `/ip4/<addr>/tcp/<port>` and `/ip6/<addr>/tcp/<port>` are understood.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MultiaddrError {
    #[error("expected /ip4|ip6/<addr>/tcp/<port>")]
    Shape,

    #[error("unsupported protocol '{0}'")]
    Protocol(String),

    #[error("invalid ip address '{0}'")]
    Ip(String),

    #[error("invalid port '{0}'")]
    Port(String),
}

/// A TCP multiaddr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Multiaddr(SocketAddr);

impl Multiaddr {
    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Multiaddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl FromStr for Multiaddr {
    type Err = MultiaddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let [leading, family, host, transport, port] = parts.as_slice() else {
            return Err(MultiaddrError::Shape);
        };
        if !leading.is_empty() {
            return Err(MultiaddrError::Shape);
        }

        let ip: IpAddr = match *family {
            "ip4" => host
                .parse::<std::net::Ipv4Addr>()
                .map(IpAddr::V4)
                .map_err(|_| MultiaddrError::Ip(host.to_string()))?,
            "ip6" => host
                .parse::<std::net::Ipv6Addr>()
                .map(IpAddr::V6)
                .map_err(|_| MultiaddrError::Ip(host.to_string()))?,
            other => return Err(MultiaddrError::Protocol(other.to_string())),
        };
        if *transport != "tcp" {
            return Err(MultiaddrError::Protocol(transport.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| MultiaddrError::Port(port.to_string()))?;

        Ok(Self(SocketAddr::new(ip, port)))
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = if self.0.is_ipv4() { "ip4" } else { "ip6" };
        write!(f, "/{}/{}/tcp/{}", family, self.0.ip(), self.0.port())
    }
}
