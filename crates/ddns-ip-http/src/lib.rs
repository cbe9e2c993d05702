// # HTTP IP Source
//
// Detects the public address by asking public echo services, which answer a
// plain GET with the caller's address as the body.
//
// ## Fallbacks
//
// Each address family has its own ordered list of services. They are tried
// in order and the first one returning an address of the right family wins,
// so a single service being down or returning an HTML error page does not
// fail detection.

use async_trait::async_trait;
use ddns_core::config::RecordType;
use ddns_core::traits::IpSource;
use ddns_core::{Error, Result, parse_address};
use std::time::Duration;

/// IPv4 echo services, in priority order
pub const DEFAULT_V4_SERVICES: &[&str] = &[
    "https://api.ipify.org",
    "https://ipv4.icanhazip.com",
    "https://checkip.amazonaws.com",
];

/// IPv6 echo services, in priority order
pub const DEFAULT_V6_SERVICES: &[&str] = &[
    "https://api6.ipify.org",
    "https://ipv6.icanhazip.com",
    "https://ifconfig.co/ip",
];

/// HTTP echo-service IP source
pub struct HttpIpSource {
    v4_services: Vec<String>,
    v6_services: Vec<String>,
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a source using the default service lists
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_services(
            DEFAULT_V4_SERVICES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_V6_SERVICES.iter().map(|s| s.to_string()).collect(),
            timeout,
        )
    }

    /// Create a source with custom service lists
    pub fn with_services(
        v4_services: Vec<String>,
        v6_services: Vec<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            v4_services,
            v6_services,
            client,
        })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::detection(format!("{}: request failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::detection(format!(
                "{}: HTTP error: {}",
                url,
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::detection(format!("{}: failed to read response: {}", url, e)))?;

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl IpSource for HttpIpSource {
    async fn detect(&self, record_type: RecordType) -> Result<String> {
        let services = match record_type {
            RecordType::A => &self.v4_services,
            RecordType::Aaaa => &self.v6_services,
        };

        let mut failures = Vec::new();
        // A well-formed address of the other family points at a setup
        // problem, not at a flaky service, and is reported as such
        let mut family_mismatch = None;

        for url in services {
            match self.fetch(url).await {
                Ok(text) => match parse_address(&text, record_type) {
                    Ok(_) => {
                        tracing::debug!("Got {} address from {}", record_type.family(), url);
                        return Ok(text);
                    }
                    Err(e) => {
                        tracing::warn!("HTTP fallback {} returned unusable answer: {}", url, e);
                        failures.push(format!("{}: {}", url, e));
                        if matches!(e, Error::Config(_)) && family_mismatch.is_none() {
                            family_mismatch = Some(e);
                        }
                    }
                },
                Err(e) => {
                    tracing::warn!("HTTP fallback {} failed: {}", url, e);
                    failures.push(e.to_string());
                }
            }
        }

        if let Some(e) = family_mismatch {
            return Err(e);
        }
        if failures.is_empty() {
            return Err(Error::detection(format!(
                "no {} echo service configured",
                record_type.family()
            )));
        }
        Err(Error::detection(format!(
            "all {} echo services failed: {}",
            record_type.family(),
            failures.join("; ")
        )))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
