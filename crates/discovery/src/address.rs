//! Parsing of `host:port` endpoints and seed lists.

use std::fmt;

use thiserror::Error;

/// Errors raised while splitting an endpoint into host and port.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AddressError {
    /// The string is not a `host:port` pair.
    #[error("failed to parse '{addr}' into host and port: {reason}")]
    HostPort {
        /// The offending address.
        addr: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The port part is not a valid port number.
    #[error("failed to parse port '{port}' of address '{addr}'")]
    Port {
        /// The offending address.
        addr: String,
        /// The port text that failed to parse.
        port: String,
    },
}

/// A host and port pair.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct HostPort {
    /// Host name or IP literal, without brackets.
    pub host: String,
    /// Port number.
    pub port: u16,
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Split `addr` into host and port.
///
/// Accepts `host:port`, `:port` and `[ipv6]:port`. A bare IPv6 address
/// without brackets is rejected because its port cannot be told apart.
///
/// # Errors
///
/// Returns [`AddressError::HostPort`] when the string is not a host/port
/// pair and [`AddressError::Port`] when the port is not a number in range.
pub fn split_host_port(addr: &str) -> Result<HostPort, AddressError> {
    let malformed = |reason| AddressError::HostPort {
        addr: addr.to_string(),
        reason,
    };

    let Some(colon) = addr.rfind(':') else {
        return Err(malformed("missing port"));
    };

    let (host, port) = if addr.starts_with('[') {
        let Some(end) = addr.find(']') else {
            return Err(malformed("missing ']'"));
        };
        if end + 1 != colon {
            return Err(malformed(if end + 1 == addr.len() {
                "missing port"
            } else {
                "unexpected characters after ']'"
            }));
        }
        (&addr[1..end], &addr[colon + 1..])
    } else {
        let host = &addr[..colon];
        if host.contains(':') {
            return Err(malformed("too many colons"));
        }
        (host, &addr[colon + 1..])
    };

    if host.contains('[') || host.contains(']') || port.contains('[') || port.contains(']') {
        return Err(malformed("unexpected brackets"));
    }

    let port = port.parse::<u16>().map_err(|_| AddressError::Port {
        addr: addr.to_string(),
        port: port.to_string(),
    })?;

    Ok(HostPort {
        host: host.to_string(),
        port,
    })
}

/// Split a comma separated list of router seeds.
#[must_use]
pub fn split_seeds(routers: &str) -> Vec<String> {
    routers
        .split(',')
        .map(str::trim)
        .filter(|seed| !seed.is_empty())
        .map(ToString::to_string)
        .collect()
}
