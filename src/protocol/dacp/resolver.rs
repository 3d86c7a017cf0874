use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent};

use super::{DACP_SERVICE_TYPE, DacpError};

/// Lookup of the sender's remote control endpoint
///
/// Implementations block for at most `timeout` and are run off the async
/// runtime by the caller.
pub trait DacpResolver: Send + Sync + 'static {
    /// Find the endpoint advertised for `dacp_id`
    ///
    /// Returns `Ok(None)` when nothing matched within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `DacpError` when the lookup itself failed.
    fn resolve(&self, dacp_id: &str, timeout: Duration) -> Result<Option<SocketAddr>, DacpError>;
}

/// Whether a `_dacp._tcp` instance name belongs to `dacp_id`
///
/// Senders advertise `iTunes_Ctrl_<DACP-ID>`; the comparison ignores case.
#[must_use]
pub fn matches_dacp_id(instance: &str, dacp_id: &str) -> bool {
    !dacp_id.is_empty()
        && instance
            .to_ascii_lowercase()
            .contains(&dacp_id.to_ascii_lowercase())
}

/// Number of lookups sharing the daemon's single `_dacp._tcp` browse
///
/// A cancelled lookup keeps running on the blocking pool; when it ends it
/// must not stop the browse a newer lookup is using.
#[derive(Debug, Default)]
pub(crate) struct BrowseUsers(Mutex<usize>);

impl BrowseUsers {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `start` and count one more user if it succeeds
    pub(crate) fn enter<T, E>(&self, start: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let mut users = self.lock();
        let started = start()?;
        *users += 1;
        Ok(started)
    }

    /// Drop one user; `stop` runs when it was the last
    pub(crate) fn leave(&self, stop: impl FnOnce()) {
        let mut users = self.lock();
        *users = users.saturating_sub(1);
        if *users == 0 {
            stop();
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> usize {
        *self.lock()
    }
}

/// Resolver browsing `_dacp._tcp` with mdns-sd
pub struct MdnsResolver {
    mdns: ServiceDaemon,
    users: BrowseUsers,
}

impl MdnsResolver {
    /// Start an mDNS daemon for lookups
    ///
    /// # Errors
    ///
    /// Returns `DacpError::Mdns` if the daemon cannot start.
    pub fn new() -> Result<Self, DacpError> {
        let mdns = ServiceDaemon::new().map_err(|e| DacpError::Mdns(e.to_string()))?;
        Ok(Self {
            mdns,
            users: BrowseUsers::default(),
        })
    }
}

impl DacpResolver for MdnsResolver {
    fn resolve(&self, dacp_id: &str, timeout: Duration) -> Result<Option<SocketAddr>, DacpError> {
        let receiver = self.users.enter(|| {
            self.mdns
                .browse(DACP_SERVICE_TYPE)
                .map_err(|e| DacpError::Mdns(e.to_string()))
        })?;
        let deadline = Instant::now() + timeout;

        let mut found = None;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            let Ok(event) = receiver.recv_timeout(remaining) else {
                break;
            };
            let ServiceEvent::ServiceResolved(info) = event else {
                continue;
            };
            if !matches_dacp_id(info.get_fullname(), dacp_id) {
                continue;
            }
            let v4 = info.get_addresses().iter().find_map(|ip| match ip {
                IpAddr::V4(v4) => Some(*v4),
                IpAddr::V6(_) => None,
            });
            if let Some(ip) = v4 {
                found = Some(SocketAddr::new(IpAddr::V4(ip), info.get_port()));
                break;
            }
        }

        self.users.leave(|| {
            let _ = self.mdns.stop_browse(DACP_SERVICE_TYPE);
        });
        Ok(found)
    }
}

impl Drop for MdnsResolver {
    fn drop(&mut self) {
        let _ = self.mdns.shutdown();
    }
}
