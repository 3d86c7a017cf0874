//! RAOP service advertisement
//!
//! Senders find the receiver through a `_raop._tcp` service named
//! `<MAC>@<friendly name>` whose TXT record describes the accepted
//! audio formats and encryption.

use std::collections::BTreeMap;

use mdns_sd::{Error as MdnsError, ServiceDaemon, ServiceInfo};

use super::RAOP_SERVICE_TYPE;

/// Errors from service advertisement
#[derive(Debug, thiserror::Error)]
pub enum AdvertiserError {
    /// Failed to retrieve MAC address
    #[error("Failed to retrieve MAC address: {0}")]
    MacRetrievalFailed(String),

    /// mDNS error
    #[error("mDNS error: {0}")]
    Mdns(#[from] MdnsError),

    /// Service not registered
    #[error("Service not registered")]
    NotRegistered,

    /// Service already registered
    #[error("Service already registered")]
    AlreadyRegistered,
}

/// MAC address identifying this receiver
///
/// Uses the first real interface on Linux and otherwise derives a stable,
/// locally administered address from the machine id or host name.
#[must_use]
pub fn get_device_mac() -> [u8; 6] {
    #[cfg(target_os = "linux")]
    {
        match get_mac_linux() {
            Ok(mac) => return mac,
            Err(e) => tracing::debug!(error = %e, "falling back to derived MAC"),
        }
    }

    generate_stable_mac()
}

#[cfg(target_os = "linux")]
/// Interfaces that never carry the machine's own address
const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &["lo", "veth", "docker", "br-", "virbr"];

#[cfg(target_os = "linux")]
fn get_mac_linux() -> Result<[u8; 6], AdvertiserError> {
    let entries = std::fs::read_dir("/sys/class/net")
        .map_err(|e| AdvertiserError::MacRetrievalFailed(e.to_string()))?;

    let mut names: Vec<_> = entries
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| {
            !VIRTUAL_INTERFACE_PREFIXES
                .iter()
                .any(|prefix| name.starts_with(prefix))
        })
        .collect();
    names.sort();

    names
        .iter()
        .filter_map(|name| std::fs::read_to_string(format!("/sys/class/net/{name}/address")).ok())
        .filter_map(|address| parse_mac_string(address.trim()).ok())
        .find(|mac| *mac != [0; 6])
        .ok_or_else(|| AdvertiserError::MacRetrievalFailed("no hardware interface".into()))
}

/// Parse `aa:bb:cc:dd:ee:ff`
///
/// # Errors
///
/// Returns `AdvertiserError::MacRetrievalFailed` on malformed input.
pub fn parse_mac_string(mac: &str) -> Result<[u8; 6], AdvertiserError> {
    let invalid = || AdvertiserError::MacRetrievalFailed(format!("invalid MAC: {mac}"));

    let mut bytes = [0u8; 6];
    let mut parts = mac.split(':');
    for byte in &mut bytes {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 {
            return Err(invalid());
        }
        *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(bytes)
}

#[allow(clippy::cast_possible_truncation)]
fn generate_stable_mac() -> [u8; 6] {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let seed = std::fs::read_to_string("/etc/machine-id").unwrap_or_else(|_| {
        hostname::get().map_or_else(
            |_| "raop-receiver".to_string(),
            |h| h.to_string_lossy().into_owned(),
        )
    });

    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    let hash = hasher.finish();

    let mut mac = [0u8; 6];
    for (i, byte) in mac.iter_mut().enumerate() {
        *byte = (hash >> (40 - 8 * i)) as u8;
    }
    mac[0] |= 0x02;
    mac
}

/// Format MAC address for the service name (uppercase, no colons)
#[must_use]
pub fn format_mac_for_service(mac: &[u8; 6]) -> String {
    mac.iter().map(|b| format!("{b:02X}")).collect()
}

/// TXT record of a RAOP receiver
#[derive(Debug, Clone)]
pub struct TxtRecordBuilder {
    records: BTreeMap<String, String>,
}

impl TxtRecordBuilder {
    /// Record set for a 16-bit stereo receiver at `sample_rate`
    ///
    /// Accepts PCM, ALAC and AAC (`cn`), clear or RSA/AES streams (`et`)
    /// and text, artwork and progress metadata (`md`).
    #[must_use]
    pub fn raop(sample_rate: u32) -> Self {
        let mut builder = Self {
            records: BTreeMap::new(),
        };
        builder
            .add("am", "airesp32")
            .add("tp", "UDP")
            .add("sm", "false")
            .add("sv", "false")
            .add("ek", "1")
            .add("et", "0,1")
            .add("md", "0,1,2")
            .add("cn", "0,1")
            .add("ch", "2")
            .add("ss", "16")
            .add("sr", &sample_rate.to_string())
            .add("vn", "3")
            .add("txtvers", "1");
        builder
    }

    /// Add or replace a key
    pub fn add(&mut self, key: &str, value: &str) -> &mut Self {
        self.records.insert(key.to_string(), value.to_string());
        self
    }

    /// Value of `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.records.get(key).map(String::as_str)
    }

    /// `key=value` strings, sorted by key
    #[must_use]
    pub fn build(&self) -> Vec<String> {
        self.records.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    fn into_properties(self) -> std::collections::HashMap<String, String> {
        self.records.into_iter().collect()
    }
}

/// RAOP service advertiser
///
/// Registers on creation through [`RaopAdvertiser::register`] and
/// unregisters when dropped.
pub struct RaopAdvertiser {
    daemon: ServiceDaemon,
    name: String,
    port: u16,
    mac: [u8; 6],
    sample_rate: u32,
    service_fullname: Option<String>,
}

impl RaopAdvertiser {
    /// Create an advertiser for `name` on the RTSP `port`
    ///
    /// # Errors
    ///
    /// Returns error if the mDNS daemon cannot be started.
    pub fn new(
        name: impl Into<String>,
        port: u16,
        mac: [u8; 6],
        sample_rate: u32,
    ) -> Result<Self, AdvertiserError> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            name: name.into(),
            port,
            mac,
            sample_rate,
            service_fullname: None,
        })
    }

    /// Instance name: `<MAC>@<name>`
    #[must_use]
    pub fn service_name(&self) -> String {
        format!("{}@{}", format_mac_for_service(&self.mac), self.name)
    }

    /// Register the service on the network
    ///
    /// # Errors
    ///
    /// Returns error if already registered or mDNS registration fails.
    pub fn register(&mut self) -> Result<(), AdvertiserError> {
        if self.service_fullname.is_some() {
            return Err(AdvertiserError::AlreadyRegistered);
        }

        let service_name = self.service_name();
        let host = hostname::get().map_or_else(
            |_| "raop-receiver.local.".to_string(),
            |h| format!("{}.local.", h.to_string_lossy()),
        );

        let service_info = ServiceInfo::new(
            RAOP_SERVICE_TYPE,
            &service_name,
            &host,
            "",
            self.port,
            TxtRecordBuilder::raop(self.sample_rate).into_properties(),
        )?
        .enable_addr_auto();

        let fullname = service_info.get_fullname().to_string();
        self.daemon.register(service_info)?;
        self.service_fullname = Some(fullname);

        tracing::info!(name = %service_name, port = self.port, "RAOP service registered");
        Ok(())
    }

    /// Unregister the service
    ///
    /// # Errors
    ///
    /// Returns error if not registered or mDNS unregistration fails.
    pub fn unregister(&mut self) -> Result<(), AdvertiserError> {
        let fullname = self
            .service_fullname
            .take()
            .ok_or(AdvertiserError::NotRegistered)?;

        self.daemon.unregister(&fullname)?;
        tracing::info!(name = %fullname, "RAOP service unregistered");
        Ok(())
    }
}

impl Drop for RaopAdvertiser {
    fn drop(&mut self) {
        if self.service_fullname.is_some() {
            let _ = self.unregister();
        }
        let _ = self.daemon.shutdown();
    }
}
