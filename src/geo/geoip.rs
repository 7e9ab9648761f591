//! GeoIP lookup service using MaxMind GeoLite2/GeoIP2 MMDB
//!
//! The database is memory-mapped once at startup and shared read-only by
//! every request.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

use super::{GeoLocator, Location};

#[derive(Clone)]
pub struct GeoIpService {
    reader: Option<Arc<Reader<Mmap>>>,
}

impl GeoIpService {
    /// Open a City or Country database
    pub fn new(path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(path) }
            .with_context(|| format!("Failed to open GeoIP database at {}", path))?;
        Ok(Self {
            reader: Some(Arc::new(reader)),
        })
    }

    /// Service without a database; every lookup is empty
    pub fn disabled() -> Self {
        Self { reader: None }
    }
}

impl GeoLocator for GeoIpService {
    fn lookup(&self, ip: IpAddr) -> Location {
        let mut location = Location::default();

        let Some(ref reader) = self.reader else {
            return location;
        };

        let Ok(result) = reader.lookup(ip) else {
            return location;
        };

        // City data carries country and subdivisions; fall back to Country
        // for country-only databases
        if let Ok(Some(city)) = result.decode::<geoip2::City>() {
            location.country = city.country.iso_code.unwrap_or_default().to_string();
            if let Some(subdivision) = city.subdivisions.first() {
                location.region = subdivision.names.english.unwrap_or_default().to_string();
            }
        } else if let Ok(Some(country)) = result.decode::<geoip2::Country>() {
            location.country = country.country.iso_code.unwrap_or_default().to_string();
        }

        location
    }
}
