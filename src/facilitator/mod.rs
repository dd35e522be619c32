//! Rendezvous server that hands registered relay client addresses to
//! browser proxies.

mod addr;
mod config;
mod reg;
mod server;

pub use addr::{AddrFamily, AddrSpec, AddrSpecError, format_addr, parse_addr_spec};
pub use config::{
    ConfigError, DEFAULT_ADDRESS, DEFAULT_LOG_FILENAME, DEFAULT_PORT, FacilitatorConfig, LogTarget,
};
pub use reg::{Registration, RegistrationError, RegistrationSet};
pub use server::{Facilitator, RequestError};
