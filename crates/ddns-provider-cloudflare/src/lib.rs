// # Cloudflare DNS Provider
//
// Typed client for the subset of the Cloudflare API v4 the updater needs.
//
// Each method is exactly one HTTP request. No retries, no caching: retry
// policy is applied by `RetryingProvider` in ddns-core, and zone/record ids
// are looked up fresh on every run.
//
// ## Error classification
//
// - 401/403 → `Error::Authentication` (fatal, never retried)
// - 5xx, timeouts, connection failures → `Error::Transient` (retried)
// - other 4xx, `"success": false`, undecodable body → `Error::Request`
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
//
// ## API Reference
//
// - Verify token: GET `/user/tokens/verify` (or GET `/user` for global keys)
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::{Credential, RecordType};
use ddns_core::traits::{DnsProvider, ProviderRecord, ZoneId};
use ddns_core::{Error, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// TTL value meaning "automatic"
const AUTO_TTL: u32 = 1;

/// Longest slice of an error body kept in messages
const MAX_BODY_IN_ERROR: usize = 256;

/// Response envelope shared by every Cloudflare endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    #[serde(default)]
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct CreateRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    proxied: bool,
    ttl: u32,
}

#[derive(Debug, Serialize)]
struct PatchRecord {
    content: String,
    proxied: bool,
}

impl TryFrom<DnsRecord> for ProviderRecord {
    type Error = Error;

    fn try_from(record: DnsRecord) -> Result<Self> {
        Ok(ProviderRecord {
            record_type: record.record_type.parse().map_err(|_| {
                Error::request(format!(
                    "record {} has unexpected type {}",
                    record.id, record.record_type
                ))
            })?,
            id: record.id,
            name: record.name,
            content: record.content,
            proxied: record.proxied,
        })
    }
}

/// Cloudflare DNS provider
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the credential.
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    credential: Credential,

    /// API base URL without trailing slash
    api_base: String,

    /// HTTP client with a per-request timeout
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credential", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `credential`: API token with Zone:Read and DNS:Edit permissions, or a global key
    /// - `api_base`: API base URL, normally [`CLOUDFLARE_API_BASE`]
    /// - `timeout`: bound applied to every request
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: if the secret is empty or the client cannot be built
    pub fn new(credential: Credential, api_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let secret_empty = match &credential {
            Credential::Bearer(token) => token.is_empty(),
            Credential::GlobalKey { email, key } => email.is_empty() || key.is_empty(),
        };
        if secret_empty {
            return Err(Error::config("Cloudflare API credential cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ddnsd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credential,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Credential::Bearer(token) => request.bearer_auth(token),
            Credential::GlobalKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    /// Send one authenticated request and decode the envelope's `result`
    async fn call<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T> {
        tracing::debug!("Cloudflare API call: {}", what);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| transport_error(what, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(what, e))?;

        if !status.is_success() {
            return Err(classify_status(what, status, &body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(Error::request(format!(
                "{} rejected: {}",
                what,
                describe(&envelope.errors)
            )));
        }

        envelope
            .result
            .ok_or_else(|| Error::request(format!("{}: response has no result", what)))
    }
}

/// Map a reqwest failure to the error taxonomy
fn transport_error(what: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::transient(format!("{} timed out: {}", what, err))
    } else if err.is_decode() {
        Error::request(format!("{}: failed to read response: {}", what, err))
    } else {
        Error::transient(format!("{}: HTTP request failed: {}", what, err))
    }
}

/// Map a non-2xx status to the error taxonomy
fn classify_status(what: &str, status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .ok()
        .filter(|e| !e.errors.is_empty())
        .map(|e| describe(&e.errors))
        .unwrap_or_else(|| body.chars().take(MAX_BODY_IN_ERROR).collect());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API token or insufficient permissions. Status: {} - {}",
            what, status, detail
        )),
        500..=599 => Error::transient(format!(
            "{}: Cloudflare server error: {} - {}",
            what, status, detail
        )),
        _ => Error::request(format!("{} failed: {} - {}", what, status, detail)),
    }
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn verify_credentials(&self) -> Result<()> {
        match &self.credential {
            Credential::Bearer(_) => {
                let token: TokenStatus = self
                    .call("verify token", self.client.get(self.url("/user/tokens/verify")))
                    .await?;
                if token.status != "active" {
                    return Err(Error::auth(format!("API token status is '{}'", token.status)));
                }
            }
            Credential::GlobalKey { .. } => {
                let _: serde_json::Value = self
                    .call("verify global key", self.client.get(self.url("/user")))
                    .await?;
            }
        }
        tracing::debug!("Cloudflare credential verified");
        Ok(())
    }

    async fn resolve_zone(&self, name: &str) -> Result<ZoneId> {
        let zones: Vec<Zone> = self
            .call(
                "zone lookup",
                self.client.get(self.url("/zones")).query(&[("name", name)]),
            )
            .await?;

        match zones.as_slice() {
            [] => Err(Error::not_found(format!("Zone not found: {}", name))),
            [zone] => {
                tracing::debug!("Found zone ID: {}", zone.id);
                Ok(ZoneId::new(zone.id.clone()))
            }
            many => Err(Error::ambiguous(format!(
                "{} zones named {}",
                many.len(),
                name
            ))),
        }
    }

    async fn list_records(
        &self,
        zone: &ZoneId,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<ProviderRecord>> {
        let records: Vec<DnsRecord> = self
            .call(
                "record lookup",
                self.client
                    .get(self.url(&format!("/zones/{}/dns_records", zone)))
                    .query(&[("name", name), ("type", record_type.as_str())]),
            )
            .await?;

        tracing::debug!("Found {} {} record(s) named {}", records.len(), record_type, name);
        records.into_iter().map(ProviderRecord::try_from).collect()
    }

    async fn create_record(
        &self,
        zone: &ZoneId,
        name: &str,
        record_type: RecordType,
        content: IpAddr,
        proxied: bool,
    ) -> Result<ProviderRecord> {
        let payload = CreateRecord {
            record_type: record_type.as_str(),
            name,
            content: content.to_string(),
            proxied,
            ttl: AUTO_TTL,
        };

        let record: DnsRecord = self
            .call(
                "record create",
                self.client
                    .post(self.url(&format!("/zones/{}/dns_records", zone)))
                    .json(&payload),
            )
            .await?;

        tracing::info!("Created DNS record {} ({})", record.name, record.id);
        record.try_into()
    }

    async fn update_record(
        &self,
        zone: &ZoneId,
        record_id: &str,
        content: IpAddr,
        proxied: bool,
    ) -> Result<ProviderRecord> {
        let payload = PatchRecord {
            content: content.to_string(),
            proxied,
        };

        let record: DnsRecord = self
            .call(
                "record update",
                self.client
                    .patch(self.url(&format!("/zones/{}/dns_records/{}", zone, record_id)))
                    .json(&payload),
            )
            .await?;

        tracing::info!("DNS record updated successfully: {} -> {}", record.name, record.content);
        record.try_into()
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}
