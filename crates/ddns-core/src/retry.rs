//! Bounded exponential backoff for provider calls
//!
//! [`RetryPolicy`] retries an operation only while it fails with a transient
//! error. [`RetryingProvider`] applies one policy to every call of a
//! [`DnsProvider`], so no call site carries its own retry loop.

use crate::config::RecordType;
use crate::error::Result;
use crate::traits::{DnsProvider, ProviderRecord, ZoneId};
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tracing::warn;

/// Upper bound for a single backoff sleep
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Retry policy: max attempts, base delay, optional jitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a policy with jitter enabled
    ///
    /// `max_attempts` counts the first call; it is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter: true,
        }
    }

    /// A policy that retries without sleeping (tests)
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO).with_jitter(false)
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::immediate(1)
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep before attempt `attempt + 1`, given `attempt` already failed
    ///
    /// `base * 2^(attempt-1)`, capped at 30s. With jitter the result is drawn
    /// uniformly from the upper half of that window.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(MAX_DELAY);

        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let millis = delay.as_millis() as u64;
        let half = millis / 2;
        Duration::from_millis(half + rand::thread_rng().gen_range(0..=millis - half))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// Only errors for which [`Error::is_transient`](crate::Error::is_transient)
    /// holds are retried. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} attempt {}/{} failed, retrying in {:?}: {}",
                        what, attempt, self.max_attempts, delay, e
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Wraps a provider so every call goes through one [`RetryPolicy`]
pub struct RetryingProvider {
    inner: Box<dyn DnsProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Box<dyn DnsProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl DnsProvider for RetryingProvider {
    async fn verify_credentials(&self) -> Result<()> {
        let inner = &self.inner;
        self.policy
            .run("verify_credentials", move || inner.verify_credentials())
            .await
    }

    async fn resolve_zone(&self, name: &str) -> Result<ZoneId> {
        let inner = &self.inner;
        self.policy
            .run("resolve_zone", move || inner.resolve_zone(name))
            .await
    }

    async fn list_records(
        &self,
        zone: &ZoneId,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<ProviderRecord>> {
        let inner = &self.inner;
        self.policy
            .run("list_records", move || inner.list_records(zone, name, record_type))
            .await
    }

    async fn create_record(
        &self,
        zone: &ZoneId,
        name: &str,
        record_type: RecordType,
        content: IpAddr,
        proxied: bool,
    ) -> Result<ProviderRecord> {
        let inner = &self.inner;
        self.policy
            .run("create_record", move || {
                inner.create_record(zone, name, record_type, content, proxied)
            })
            .await
    }

    async fn update_record(
        &self,
        zone: &ZoneId,
        record_id: &str,
        content: IpAddr,
        proxied: bool,
    ) -> Result<ProviderRecord> {
        let inner = &self.inner;
        self.policy
            .run("update_record", move || {
                inner.update_record(zone, record_id, content, proxied)
            })
            .await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}
