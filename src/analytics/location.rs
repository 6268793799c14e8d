//! Visitor location resolution
//!
//! Real geolocation is out of scope; the shipped resolver reports every
//! visitor as `Unknown`. Alternative resolvers plug in through the trait.

use std::net::IpAddr;

use crate::models::Location;

pub trait LocationResolver: Send + Sync {
    fn resolve(&self, ip: Option<IpAddr>) -> Location;
}

/// Resolver that never knows where anyone is.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownLocation;

impl LocationResolver for UnknownLocation {
    fn resolve(&self, _ip: Option<IpAddr>) -> Location {
        Location::default()
    }
}
