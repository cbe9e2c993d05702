// # DNS Provider Trait
//
// Typed access to a managed DNS provider's zone and record API.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
// use ddns_core::config::RecordType;
//
// let zone = provider.resolve_zone("example.com").await?;
// let records = provider
//     .list_records(&zone, "home.example.com", RecordType::A)
//     .await?;
// ```

use crate::config::RecordType;
use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

/// Provider-side identifier of a zone
///
/// Never cached across runs: the name to id mapping belongs to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record as currently stored by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    /// The record ID (provider-specific)
    pub id: String,
    pub record_type: RecordType,
    pub name: String,
    /// Stored address text, as the provider returned it
    pub content: String,
    pub proxied: bool,
}

/// Trait for DNS provider implementations
///
/// Every method performs exactly one authenticated HTTP call and either
/// decodes a typed result or classifies the failure:
///
/// - 401/403 → `Error::Authentication`
/// - 5xx, timeouts, transport failures → `Error::Transient`
/// - any other 4xx or `success: false` → `Error::Request`
///
/// Implementations do not retry. Retries are applied uniformly by
/// [`RetryingProvider`](crate::retry::RetryingProvider).
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Check that the configured credential is accepted
    async fn verify_credentials(&self) -> Result<(), crate::Error>;

    /// Resolve a zone name to its id
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: no zone has this name
    /// - `Err(Error::Ambiguous)`: more than one zone has this name
    async fn resolve_zone(&self, name: &str) -> Result<ZoneId, crate::Error>;

    /// List records matching `name` and `record_type`
    ///
    /// May return zero, one or several records; duplicates are possible.
    async fn list_records(
        &self,
        zone: &ZoneId,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<ProviderRecord>, crate::Error>;

    /// Create a new record
    async fn create_record(
        &self,
        zone: &ZoneId,
        name: &str,
        record_type: RecordType,
        content: IpAddr,
        proxied: bool,
    ) -> Result<ProviderRecord, crate::Error>;

    /// Overwrite the content and proxied flag of an existing record
    async fn update_record(
        &self,
        zone: &ZoneId,
        record_id: &str,
        content: IpAddr,
        proxied: bool,
    ) -> Result<ProviderRecord, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
