// # Router Client Trait
//
// Defines the interface to the router's management protocol.
//
// ## Implementations
//
// - TR-064 (AVM FRITZ!Box and compatible): `linewatch-tr064` crate
// - Tests: scripted clients in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use linewatch_core::RouterClient;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* RouterClient implementation */;
//
//     let status = client.poll_status().await?;
//     println!("connected: {}", status.connected);
//
//     for line in client.fetch_device_log().await? {
//         println!("{:?} {:?}", line.timestamp, line.message);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::model::RawLogLine;

/// Live connectivity as reported by the router
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouterStatus {
    /// Whether the WAN connection is up
    pub connected: bool,
    /// Router detail fields (external IP, link status, uptime, ...)
    pub details: Map<String, Value>,
}

impl RouterStatus {
    pub fn new(connected: bool) -> Self {
        Self {
            connected,
            details: Map::new(),
        }
    }

    /// Attach a detail field
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Trait for router client implementations
///
/// Clients are observers only. They fetch and parse; they do not decide
/// whether anything is persisted, they do not retry, and they do not spawn
/// background tasks. Scheduling and failure handling belong to the
/// `ConnectionTracker`.
///
/// No timeout is imposed by the core on these calls. A client that can hang
/// should bound its own requests.
#[async_trait]
pub trait RouterClient: Send + Sync {
    /// Query the live WAN connection status
    ///
    /// # Returns
    ///
    /// - `Ok(RouterStatus)`: The connected flag plus router detail fields
    /// - `Err(Error)`: Router unreachable or protocol failure
    async fn poll_status(&self) -> Result<RouterStatus, crate::Error>;

    /// Fetch the full device event log
    ///
    /// Lines are returned in the router's order, already split by the
    /// fixed `DD.MM.YY HH:MM:SS message` grammar (see [`crate::log_line`]).
    async fn fetch_device_log(&self) -> Result<Vec<RawLogLine>, crate::Error>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
