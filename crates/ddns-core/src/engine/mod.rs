//! Single-shot DDNS engine (the run controller)
//!
//! The DdnsEngine is responsible for:
//! - Detecting the public address once per address family
//! - Verifying the provider credential
//! - Reconciling every configured target
//! - Aggregating per-target outcomes into one [`RunReport`]
//!
//! ## Flow
//!
//! ```text
//! ┌────────────┐  IpAddr per family  ┌────────────┐
//! │ IpDetector │────────────────────▶│ DdnsEngine │
//! └────────────┘                     └────────────┘
//!                                          │ one Target at a time
//!                                          ▼
//!                                   ┌────────────┐     ┌──────────────────┐
//!                                   │ Reconciler │────▶│ RetryingProvider │──▶ provider API
//!                                   └────────────┘     └──────────────────┘
//! ```
//!
//! The engine does not loop or schedule; an external scheduler invokes it
//! once per cycle and must not overlap runs.

mod reconciler;

pub use reconciler::{ReconcileOutcome, Reconciler};

use crate::config::{RecordType, Target};
use crate::detector::IpDetector;
use crate::error::{Error, FailureReason, Result};
use crate::retry::{RetryPolicy, RetryingProvider};
use crate::traits::DnsProvider;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{error, info};

/// Outcome of one target within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub fqdn: String,
    pub record_type: RecordType,
    pub outcome: ReconcileOutcome,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    /// True when no target failed
    pub fn is_success(&self) -> bool {
        !self.targets.iter().any(|t| t.outcome.is_failure())
    }

    pub fn failed_count(&self) -> usize {
        self.targets.iter().filter(|t| t.outcome.is_failure()).count()
    }

    /// One human-readable line per target
    pub fn summary(&self) -> Vec<String> {
        self.targets
            .iter()
            .map(|t| format!("{} {}: {}", t.fqdn, t.record_type, t.outcome))
            .collect()
    }
}

/// Single-shot DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Call [`DdnsEngine::run_once()`] once per scheduler tick
/// 3. Map [`RunReport::is_success()`] to the process exit status
pub struct DdnsEngine {
    /// Provider wrapped in the retry policy
    provider: RetryingProvider,

    /// Address detection chain
    detector: IpDetector,

    /// DNS records to manage
    targets: Vec<Target>,
}

impl DdnsEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: if no targets are configured
    pub fn new(
        provider: Box<dyn DnsProvider>,
        detector: IpDetector,
        targets: Vec<Target>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::config("No records configured"));
        }

        Ok(Self {
            provider: RetryingProvider::new(provider, retry),
            detector,
            targets,
        })
    }

    /// Run one reconciliation pass over every target
    ///
    /// A failing target never stops its siblings. Detection runs before any
    /// provider call, once per record type in use.
    pub async fn run_once(&self) -> RunReport {
        info!(
            "Starting run: {} target(s), provider {}, detection via {}",
            self.targets.len(),
            self.provider.provider_name(),
            self.detector.strategies().join(" > ")
        );

        let addresses = self.detect_addresses().await;

        // Nothing to reconcile if every family failed detection
        let credential_error = if addresses.values().any(|a| a.is_ok()) {
            self.provider.verify_credentials().await.err()
        } else {
            None
        };
        if let Some(e) = &credential_error {
            error!("Credential check failed: {}", e);
        }

        let reconciler = Reconciler::new(&self.provider);
        let mut report = RunReport::default();

        for target in &self.targets {
            let outcome = match (&credential_error, addresses.get(&target.record_type)) {
                (_, Some(Err((reason, message)))) => ReconcileOutcome::failed(*reason, message.clone()),
                (Some(e), _) => ReconcileOutcome::failed(e.failure_reason(), e.to_string()),
                (None, Some(Ok(address))) => reconciler.reconcile(target, *address).await,
                (None, None) => ReconcileOutcome::failed(FailureReason::Detection, "no address detected"),
            };

            if outcome.is_failure() {
                error!("{} {}: {}", target.fqdn(), target.record_type, outcome);
            } else {
                info!("{} {}: {}", target.fqdn(), target.record_type, outcome);
            }
            report.targets.push(TargetReport {
                fqdn: target.fqdn(),
                record_type: target.record_type,
                outcome,
            });
        }

        info!(
            "Run finished: {} target(s), {} failed",
            report.targets.len(),
            report.failed_count()
        );
        report
    }

    async fn detect_addresses(
        &self,
    ) -> HashMap<RecordType, std::result::Result<IpAddr, (FailureReason, String)>> {
        let mut addresses = HashMap::new();
        for target in &self.targets {
            if addresses.contains_key(&target.record_type) {
                continue;
            }
            let result = self
                .detector
                .detect(target.record_type)
                .await
                .map_err(|e| {
                    error!("Could not detect {} address: {}", target.record_type.family(), e);
                    (e.failure_reason(), e.to_string())
                });
            addresses.insert(target.record_type, result);
        }
        addresses
    }
}
