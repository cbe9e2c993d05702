//! Compare-then-write reconciliation of a single target

use crate::config::Target;
use crate::error::{FailureReason, Result};
use crate::traits::DnsProvider;
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, error, info};

/// Result of reconciling one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Record already had the desired content and proxied flag (no write)
    Unchanged,
    /// Existing record was rewritten
    Updated {
        /// Content stored before the update
        previous: String,
    },
    /// Record did not exist and was created
    Created,
    /// Reconciliation failed; nothing further was attempted for this target
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl ReconcileOutcome {
    pub fn failed(reason: FailureReason, message: impl Into<String>) -> Self {
        Self::Failed {
            reason,
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("unchanged"),
            Self::Updated { previous } => write!(f, "updated (was {})", previous),
            Self::Created => f.write_str("created"),
            Self::Failed { reason, message } => write!(f, "failed({}): {}", reason, message),
        }
    }
}

/// Reconciles targets against a provider
///
/// Holds no state of its own: zone id and current record are fetched fresh
/// on every call.
pub struct Reconciler<'a> {
    provider: &'a dyn DnsProvider,
}

impl<'a> Reconciler<'a> {
    pub fn new(provider: &'a dyn DnsProvider) -> Self {
        Self { provider }
    }

    /// Bring `target` in line with `address`
    ///
    /// Never returns an error: failures become [`ReconcileOutcome::Failed`].
    pub async fn reconcile(&self, target: &Target, address: IpAddr) -> ReconcileOutcome {
        match self.try_reconcile(target, address).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to reconcile {} ({}): {}", target.fqdn(), target.record_type, e);
                ReconcileOutcome::failed(e.failure_reason(), e.to_string())
            }
        }
    }

    async fn try_reconcile(&self, target: &Target, address: IpAddr) -> Result<ReconcileOutcome> {
        let fqdn = target.fqdn();

        // Step 1: Resolve zone id
        let zone = self.provider.resolve_zone(&target.zone).await?;
        debug!("Zone {} resolved to {}", target.zone, zone);

        // Step 2: List matching records
        let mut records = self
            .provider
            .list_records(&zone, &fqdn, target.record_type)
            .await?;

        // Step 3: Create, compare, or refuse to guess
        let current = match records.len() {
            0 => {
                info!("Creating {} record {} -> {}", target.record_type, fqdn, address);
                let created = self
                    .provider
                    .create_record(&zone, &fqdn, target.record_type, address, target.proxied)
                    .await?;
                debug!("Created record id {}", created.id);
                return Ok(ReconcileOutcome::Created);
            }
            1 => records.remove(0),
            n => {
                let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
                return Err(crate::Error::ambiguous(format!(
                    "{} {} records named {} (ids: {}); remove the duplicates manually",
                    n,
                    target.record_type,
                    fqdn,
                    ids.join(", ")
                )));
            }
        };

        // Compare parsed addresses so equivalent IPv6 spellings match
        let content_matches = current
            .content
            .trim()
            .parse::<IpAddr>()
            .is_ok_and(|stored| stored == address);

        if content_matches && current.proxied == target.proxied {
            info!("No update needed for {} ({})", fqdn, address);
            return Ok(ReconcileOutcome::Unchanged);
        }

        info!(
            "Updating {} record {} from {} to {} (proxied: {} -> {})",
            target.record_type, fqdn, current.content, address, current.proxied, target.proxied
        );
        self.provider
            .update_record(&zone, &current.id, address, target.proxied)
            .await?;

        Ok(ReconcileOutcome::Updated {
            previous: current.content,
        })
    }
}
