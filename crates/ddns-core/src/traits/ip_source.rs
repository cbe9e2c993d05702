// # IP Source Trait
//
// Defines one strategy for discovering the host's public address.
//
// ## Implementations
//
// - Operator command: `ddns-ip-command` crate
// - DNS lookup against a pinned resolver: `ddns-ip-dns` crate
// - Public HTTP echo services: `ddns-ip-http` crate
//
// Strategies are chained in priority order by `IpDetector`.

use crate::config::RecordType;
use async_trait::async_trait;

/// Trait for address detection strategies
///
/// # Trust
///
/// Whatever a strategy returns is untrusted text. It may come from a
/// third-party web service, a DNS answer, or an arbitrary shell command.
/// `IpDetector` validates it as an address of the requested family before
/// anything else sees it, so strategies return the raw text rather than a
/// parsed address.
///
/// # Timeouts
///
/// Each implementation bounds its own I/O. A strategy that hangs past its
/// timeout must return `Error::Detection`.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Discover the public address for `record_type`'s family
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: Raw, trimmed answer text
    /// - `Err(Error)`: If this strategy could not produce an answer
    async fn detect(&self, record_type: RecordType) -> Result<String, crate::Error>;

    /// Strategy name (for logging)
    fn name(&self) -> &'static str;
}
