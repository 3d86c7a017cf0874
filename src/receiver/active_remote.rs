//! Background lookup of the sender's remote control endpoint

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::protocol::dacp::{DacpResolver, RemoteTarget};
use crate::protocol::rtsp::{Headers, headers::raop};

/// Slot holding the discovered remote, shared with the receiver handle
pub type RemoteSlot = Arc<RwLock<Option<RemoteTarget>>>;

/// `DACP-ID` and `Active-Remote` announced by the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    /// Identifier embedded in the `_dacp._tcp` instance name
    pub dacp_id: String,
    /// Token echoed in every remote control request
    pub active_remote: String,
}

impl RemoteIdentity {
    /// Identity from ANNOUNCE headers; both headers are required
    #[must_use]
    pub fn from_headers(headers: &Headers) -> Option<Self> {
        let dacp_id = headers.get(raop::DACP_ID)?.trim();
        let active_remote = headers.get(raop::ACTIVE_REMOTE)?.trim();
        if dacp_id.is_empty() {
            return None;
        }
        Some(Self {
            dacp_id: dacp_id.to_string(),
            active_remote: active_remote.to_string(),
        })
    }
}

/// Running lookup; stopped and joined before its session is released
#[derive(Debug)]
pub struct ActiveRemote {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    slot: RemoteSlot,
}

impl ActiveRemote {
    /// Start looking up `identity`, storing the result in `slot`
    ///
    /// Each round blocks for at most `timeout`; rounds repeat until the
    /// remote is found or the lookup is stopped.
    #[must_use]
    pub fn spawn(
        resolver: Arc<dyn DacpResolver>,
        identity: RemoteIdentity,
        timeout: Duration,
        slot: RemoteSlot,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(search(
            resolver,
            identity,
            timeout,
            slot.clone(),
            cancel.clone(),
        ));
        Self {
            cancel,
            task: Some(task),
            slot,
        }
    }

    /// Cancel the lookup, wait for it and forget the remote
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "remote lookup task failed");
            }
        }
        *self.slot.write().await = None;
        tracing::debug!("remote lookup stopped");
    }
}

impl Drop for ActiveRemote {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn search(
    resolver: Arc<dyn DacpResolver>,
    identity: RemoteIdentity,
    timeout: Duration,
    slot: RemoteSlot,
    cancel: CancellationToken,
) {
    tracing::debug!(dacp_id = %identity.dacp_id, "looking up remote control");

    loop {
        let lookup = {
            let resolver = resolver.clone();
            let dacp_id = identity.dacp_id.clone();
            tokio::task::spawn_blocking(move || resolver.resolve(&dacp_id, timeout))
        };

        // an in-flight query is left to finish on the blocking pool
        let joined = tokio::select! {
            () = cancel.cancelled() => return,
            joined = lookup => joined,
        };

        match joined {
            Ok(Ok(Some(addr))) => {
                tracing::info!(dacp_id = %identity.dacp_id, %addr, "found active remote");
                *slot.write().await =
                    Some(RemoteTarget::new(addr, identity.active_remote.clone()));
                return;
            }
            Ok(Ok(None)) => {
                tracing::trace!(dacp_id = %identity.dacp_id, "remote not found yet");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "remote lookup failed, retrying");
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(timeout) => {}
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "remote lookup panicked");
                return;
            }
        }
    }
}
