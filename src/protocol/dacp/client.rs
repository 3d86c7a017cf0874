use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{DacpError, RemoteCommand};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Where remote commands go: the resolved `_dacp._tcp` endpoint and the
/// session's `Active-Remote` token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Remote HTTP endpoint
    pub addr: SocketAddr,
    /// `Active-Remote` header value from ANNOUNCE
    pub active_remote: String,
}

impl RemoteTarget {
    /// Create a target
    #[must_use]
    pub fn new(addr: SocketAddr, active_remote: impl Into<String>) -> Self {
        Self {
            addr,
            active_remote: active_remote.into(),
        }
    }

    /// Raw HTTP request for `command`
    #[must_use]
    pub fn request(&self, command: RemoteCommand) -> String {
        format!(
            "GET /ctrl-int/1/{} HTTP/1.0\r\nActive-Remote: {}\r\nConnection: close\r\n\r\n",
            command.path(),
            self.active_remote
        )
    }

    /// Send `command` and wait for the status line
    ///
    /// # Errors
    ///
    /// Returns `DacpError` on connection failure, timeout, a malformed
    /// answer or a non-2xx status.
    pub async fn send(&self, command: RemoteCommand) -> Result<(), DacpError> {
        tokio::time::timeout(REQUEST_TIMEOUT, self.exchange(command))
            .await
            .map_err(|_| DacpError::Timeout)?
    }

    async fn exchange(&self, command: RemoteCommand) -> Result<(), DacpError> {
        let mut stream = TcpStream::connect(self.addr).await?;
        stream.write_all(self.request(command).as_bytes()).await?;

        let mut response = Vec::with_capacity(256);
        stream.read_to_end(&mut response).await?;

        let status = parse_status(&response).ok_or(DacpError::InvalidResponse)?;
        tracing::debug!(remote = %self.addr, command = %command.path(), status, "remote command sent");
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(DacpError::Rejected(status))
        }
    }
}

fn parse_status(response: &[u8]) -> Option<u16> {
    let line_end = response.iter().position(|&b| b == b'\r' || b == b'\n')?;
    let line = std::str::from_utf8(&response[..line_end]).ok()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}
