//! Transport addresses for bind and connect.
//!
//! The reactor hands address strings to the transport untouched; this type
//! only validates the shape early (devices parse both of their addresses
//! before binding anything) and renders them back.

use std::fmt;
use std::str::FromStr;

/// Parsed transport address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Stream transport: `tcp://host:port`. Host may be `*` when binding.
    Tcp { host: String, port: Port },
    /// Local socket: `ipc://path`
    Ipc(String),
    /// Reliable multicast: `pgm://interface;group:port`
    Pgm { host: String, port: Port },
    /// Encapsulated multicast: `epgm://interface;group:port`
    Epgm { host: String, port: Port },
    /// In-process transport: `inproc://name`
    Inproc(String),
}

impl Address {
    /// Parse an address from a string.
    ///
    /// ```
    /// use zmreactor_core::address::Address;
    ///
    /// let addr = Address::parse("tcp://*:5555").unwrap();
    /// assert_eq!(addr.port(), Some(5555));
    ///
    /// let addr = Address::parse("inproc://bus").unwrap();
    /// assert!(addr.is_inproc());
    /// ```
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        s.parse()
    }

    /// Build a TCP address.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port: Port::Fixed(port),
        }
    }

    /// Build an in-process address.
    pub fn inproc(name: impl Into<String>) -> Self {
        Self::Inproc(name.into())
    }

    /// URI scheme without the `://` separator.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "tcp",
            Self::Ipc(_) => "ipc",
            Self::Pgm { .. } => "pgm",
            Self::Epgm { .. } => "epgm",
            Self::Inproc(_) => "inproc",
        }
    }

    /// Host part for network transports.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Tcp { host, .. } | Self::Pgm { host, .. } | Self::Epgm { host, .. } => {
                Some(host)
            }
            Self::Ipc(_) | Self::Inproc(_) => None,
        }
    }

    /// Port number for network transports, when it is a fixed one.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        match self.port_form()? {
            Port::Fixed(port) => Some(*port),
            Port::Wildcard | Port::Ephemeral(_) => None,
        }
    }

    /// Port as written, including the transport's ephemeral forms.
    #[must_use]
    pub fn port_form(&self) -> Option<&Port> {
        match self {
            Self::Tcp { port, .. } | Self::Pgm { port, .. } | Self::Epgm { port, .. } => {
                Some(port)
            }
            Self::Ipc(_) | Self::Inproc(_) => None,
        }
    }

    /// Returns true if this is a TCP address.
    pub fn is_tcp(&self) -> bool {
        matches!(self, Self::Tcp { .. })
    }

    /// Returns true if this is an in-process address.
    pub fn is_inproc(&self) -> bool {
        matches!(self, Self::Inproc(_))
    }
}

/// Port of a network address.
///
/// Besides a fixed number, a bind address may leave the choice to the
/// transport: `*` and `!` pick any free port, `![lo-hi]` one in a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Fixed(u16),
    /// `*`
    Wildcard,
    /// `!` or `![lo-hi]`
    Ephemeral(Option<(u16, u16)>),
}

impl FromStr for Port {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressError::InvalidPort(s.to_string());
        match s {
            "*" => Ok(Self::Wildcard),
            "!" => Ok(Self::Ephemeral(None)),
            _ => {
                if let Some(range) = s.strip_prefix("![").and_then(|r| r.strip_suffix(']')) {
                    let (lo, hi) = range.split_once('-').ok_or_else(invalid)?;
                    let lo = lo.parse::<u16>().map_err(|_| invalid())?;
                    let hi = hi.parse::<u16>().map_err(|_| invalid())?;
                    if lo > hi {
                        return Err(invalid());
                    }
                    Ok(Self::Ephemeral(Some((lo, hi))))
                } else {
                    s.parse::<u16>().map(Self::Fixed).map_err(|_| invalid())
                }
            }
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(port) => write!(f, "{port}"),
            Self::Wildcard => f.write_str("*"),
            Self::Ephemeral(None) => f.write_str("!"),
            Self::Ephemeral(Some((lo, hi))) => write!(f, "![{lo}-{hi}]"),
        }
    }
}

fn split_host_port(scheme: &'static str, rest: &str) -> Result<(String, Port), AddressError> {
    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| AddressError::MissingPort(format!("{scheme}://{rest}")))?;
    if host.is_empty() {
        return Err(AddressError::MissingHost(format!("{scheme}://{rest}")));
    }
    Ok((host.to_string(), port.parse()?))
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| AddressError::InvalidScheme(s.to_string()))?;

        match scheme {
            "tcp" => {
                let (host, port) = split_host_port("tcp", rest)?;
                Ok(Self::Tcp { host, port })
            }
            "pgm" => {
                let (host, port) = split_host_port("pgm", rest)?;
                Ok(Self::Pgm { host, port })
            }
            "epgm" => {
                let (host, port) = split_host_port("epgm", rest)?;
                Ok(Self::Epgm { host, port })
            }
            "ipc" if rest.is_empty() => Err(AddressError::EmptyName(s.to_string())),
            "ipc" => Ok(Self::Ipc(rest.to_string())),
            "inproc" if rest.is_empty() => Err(AddressError::EmptyName(s.to_string())),
            "inproc" => Ok(Self::Inproc(rest.to_string())),
            _ => Err(AddressError::InvalidScheme(s.to_string())),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Pgm { host, port } => write!(f, "pgm://{host}:{port}"),
            Self::Epgm { host, port } => write!(f, "epgm://{host}:{port}"),
            Self::Ipc(path) => write!(f, "ipc://{path}"),
            Self::Inproc(name) => write!(f, "inproc://{name}"),
        }
    }
}

/// Errors that can occur when parsing addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid scheme in address: {0} (expected tcp://, ipc://, pgm://, epgm:// or inproc://)")]
    InvalidScheme(String),

    #[error("Missing port in address: {0}")]
    MissingPort(String),

    #[error("Missing host in address: {0}")]
    MissingHost(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Empty name in address: {0}")]
    EmptyName(String),
}
