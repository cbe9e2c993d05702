// # ddns-core
//
// Core library for the single-shot Cloudflare dynamic DNS updater.
//
// ## Architecture Overview
//
// - **RunConfig**: Environment (and `_FILE` secret) resolution and validation
// - **IpSource**: Trait for one address detection strategy
// - **IpDetector**: Priority-ordered chain of `IpSource` strategies
// - **DnsProvider**: Trait for the provider's zone/record API
// - **RetryPolicy**: Bounded exponential backoff applied to every provider call
// - **Reconciler**: Compare-then-write for one target
// - **DdnsEngine**: One pass over all targets, aggregated into a `RunReport`
//
// ## Design Principles
//
// 1. **Provider is the source of truth**: nothing is persisted between runs
// 2. **Idempotency**: a run with no address change issues no writes
// 3. **Explicit credentials**: passed by value from `RunConfig`, never read ambiently
// 4. **Library-First**: the `ddnsd` binary is a thin wrapper

pub mod traits;
pub mod engine;
pub mod detector;
pub mod retry;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider, ProviderRecord, ZoneId};
pub use engine::{DdnsEngine, ReconcileOutcome, Reconciler, RunReport, TargetReport};
pub use detector::{IpDetector, parse_address};
pub use retry::{RetryPolicy, RetryingProvider};
pub use config::{Credential, DetectionConfig, DetectionMethod, EnvSource, ProcessEnv, RecordType, RunConfig, Target};
pub use error::{Error, FailureReason, Result};
