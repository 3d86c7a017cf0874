//! `_raop._tcp` service advertisement

pub mod advertiser;

#[cfg(test)]
mod tests;

pub use advertiser::{AdvertiserError, RaopAdvertiser, TxtRecordBuilder, format_mac_for_service, get_device_mac};

/// RAOP service type
pub const RAOP_SERVICE_TYPE: &str = "_raop._tcp.local.";
