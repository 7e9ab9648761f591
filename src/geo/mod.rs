//! IP to region resolution
//!
//! Lookups are best-effort: any failure resolves to an empty [`Location`],
//! which matches no area pattern.

pub mod geoip;

pub use geoip::GeoIpService;

use serde::Serialize;
use std::net::IpAddr;

/// Resolved origin of a client address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    /// ISO country code (e.g. "US"), empty when unknown
    pub country: String,
    /// First-level subdivision name, empty when unknown
    pub region: String,
}

pub trait GeoLocator: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Location;
}
