use std::net::Ipv6Addr;

use thiserror::Error;

/// Address family a spec's syntax commits it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
    Any,
    V4,
    V6,
}

/// A parsed `host:port` specification. The host is not resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrSpec {
    pub family: AddrFamily,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddrSpecError {
    #[error("bad address specification {0:?}")]
    Incomplete(String),
    #[error("bad port in address specification {0:?}")]
    BadPort(String),
}

fn is_port(s: &str) -> bool { !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) }

// Splits a spec into (family, host, port) by syntax alone
fn split_spec(spec: &str) -> (AddrFamily, Option<&str>, Option<&str>) {
    if let Some(rest) = spec.strip_prefix('[') {
        // [host]:port
        if let Some((host, port)) = rest.rsplit_once("]:")
            && !host.is_empty()
            && is_port(port)
        {
            return (AddrFamily::V6, Some(host), Some(port));
        }
        // [host] or [host]:
        let rest = rest.strip_suffix(':').unwrap_or(rest);
        if let Some(host) = rest.strip_suffix(']')
            && !host.is_empty()
        {
            return (AddrFamily::V6, Some(host), None);
        }
    }
    // host:port
    if let Some((host, port)) = spec.rsplit_once(':')
        && !host.is_empty()
        && is_port(port)
    {
        return (AddrFamily::V4, Some(host), Some(port));
    }
    // port or :port
    let port = spec.strip_prefix(':').unwrap_or(spec);
    if is_port(port) {
        return (AddrFamily::Any, None, Some(port));
    }
    (AddrFamily::Any, Some(spec), None)
}

/// Parses `[v6]:port`, `[v6]`, `host:port`, `port`, `:port` or a bare
/// `host`, filling whatever is missing from the defaults.
pub fn parse_addr_spec(
    spec: &str,
    default_host: Option<&str>,
    default_port: Option<u16>,
) -> Result<AddrSpec, AddrSpecError> {
    let (family, host, port) = split_spec(spec);

    let host = host.filter(|h| !h.is_empty()).or(default_host);
    let port = match port {
        Some(p) => Some(
            p.parse::<u16>()
                .map_err(|_| AddrSpecError::BadPort(spec.to_owned()))?,
        ),
        None => default_port,
    };

    match (host, port) {
        (Some(host), Some(port)) if !host.is_empty() => Ok(AddrSpec {
            family,
            host: host.to_owned(),
            port,
        }),
        _ => Err(AddrSpecError::Incomplete(spec.to_owned())),
    }
}

/// Renders a host and port, bracketing numeric IPv6 hosts.
#[must_use]
pub fn format_addr(host: &str, port: u16) -> String {
    if host.is_empty() {
        format!(":{port}")
    } else if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
