use std::{
    collections::VecDeque,
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    sync::{Mutex, PoisonError},
};

use thiserror::Error;

use super::addr::{AddrFamily, format_addr, parse_addr_spec};

const OPAQUE_ID_LEN: usize = 64;

/// A relay client address advertised through the facilitator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Registration {
    /// A numeric TCP endpoint.
    Tcp { host: IpAddr, port: u16 },
    /// A 64 hex digit peer identifier for transports without a TCP address.
    Opaque { id: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("bad host or port: {host:?} {port}")]
    BadHost { host: String, port: u16 },
    #[error("bad spec format: {0:?}")]
    BadSpec(String),
}

impl Registration {
    /// Parses a client-supplied spec. A bare port registers `default_host`.
    pub fn parse(spec: &str, default_host: Option<&str>) -> Result<Self, RegistrationError> {
        if let Ok(addr) = parse_addr_spec(spec, default_host, None) {
            let bad_host = || RegistrationError::BadHost {
                host: addr.host.clone(),
                port: addr.port,
            };
            let host = match addr.family {
                AddrFamily::Any => addr.host.parse::<IpAddr>().map_err(|_| bad_host())?,
                AddrFamily::V4 => IpAddr::V4(
                    addr.host
                        .parse::<Ipv4Addr>()
                        .map_err(|_| bad_host())?,
                ),
                AddrFamily::V6 => IpAddr::V6(
                    addr.host
                        .parse::<Ipv6Addr>()
                        .map_err(|_| bad_host())?,
                ),
            };
            return Ok(Self::Tcp {
                host,
                port: addr.port,
            });
        }

        if spec.len() == OPAQUE_ID_LEN && spec.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(Self::Opaque { id: spec.to_owned() });
        }

        Err(RegistrationError::BadSpec(spec.to_owned()))
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => f.write_str(&format_addr(&host.to_string(), *port)),
            Self::Opaque { id } => f.write_str(id),
        }
    }
}

/// Deduplicating FIFO of pending registrations, shared by request handlers.
#[derive(Debug, Default)]
pub struct RegistrationSet {
    regs: Mutex<VecDeque<Registration>>,
}

impl RegistrationSet {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Queues `reg` unless an equal registration is already waiting.
    /// Returns whether it was inserted.
    pub fn add(&self, reg: Registration) -> bool {
        let mut regs = self.lock();
        if regs.contains(&reg) {
            return false;
        }
        regs.push_back(reg);
        true
    }

    /// Takes the oldest registration, never waiting for one to arrive.
    pub fn fetch(&self) -> Option<Registration> { self.lock().pop_front() }

    #[must_use]
    pub fn len(&self) -> usize { self.lock().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Registration>> {
        self.regs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
