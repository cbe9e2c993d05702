// # ddnsd - Cloudflare DDNS updater
//
// This binary is a THIN integration layer:
// 1. Resolve configuration from the environment
// 2. Assemble the detection chain and the Cloudflare provider
// 3. Run the engine once and print one summary line per target
// 4. Map the outcome to an exit status
//
// All DDNS logic lives in ddns-core. Scheduling is the caller's job (cron,
// a systemd timer, a container restart policy); runs must not overlap.
//
// ## Configuration
//
// Every variable can also be read from a file via `<NAME>_FILE`, which takes
// precedence over the plain variable.
//
// ### Credential and records
// - `API_KEY`: API token (or global API key when `EMAIL` is set)
// - `EMAIL`: Account email for legacy global-key auth
// - `ZONE`: Zone apex, e.g. `example.com`
// - `SUBDOMAIN`: Comma-separated labels under the zone; unset manages the apex
// - `RRTYPE`: Comma-separated record types, `A` and/or `AAAA` (default `A`)
// - `PROXIED`: Proxy flag for managed records (default false)
//
// ### Detection
// - `DETECTION_METHOD`: `auto`, `dns` or `http` (default `auto`)
// - `DNS_SERVER`: Cloudflare or OpenDNS resolver used by DNS detection
//   (default: Cloudflare, then OpenDNS, per address family)
// - `CUSTOM_LOOKUP_CMD`: Shell command printing the address; replaces the built-in chain
//
// ### Runtime
// - `CF_API`: API base URL
// - `MAX_ATTEMPTS`, `RETRY_DELAY_MS`: Retry policy for provider calls
// - `HTTP_TIMEOUT_SECS`: Per-request timeout
// - `LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export API_KEY_FILE=/run/secrets/cf_token
// export ZONE=example.com
// export SUBDOMAIN=home,vpn
// export RRTYPE=A,AAAA
//
// ddnsd
// ```

use anyhow::{Context, Result};
use ddns_core::config::{self, DetectionMethod, ProcessEnv, RunConfig};
use ddns_core::{DdnsEngine, IpDetector, IpSource, RunReport};
use ddns_ip_command::CommandIpSource;
use ddns_ip_dns::DnsIpSource;
use ddns_ip_http::HttpIpSource;
use ddns_provider_cloudflare::CloudflareProvider;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the single run
///
/// - 0: Every target unchanged, updated or created
/// - 1: Configuration or startup error, nothing was attempted
/// - 2: At least one target failed
/// - 3: Runtime could not be created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    Success = 0,
    ConfigError = 1,
    TargetFailed = 2,
    RuntimeError = 3,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<&RunReport> for DdnsExitCode {
    fn from(report: &RunReport) -> Self {
        if report.is_success() {
            DdnsExitCode::Success
        } else {
            DdnsExitCode::TargetFailed
        }
    }
}

fn main() -> ExitCode {
    let env = ProcessEnv;

    // Initialize tracing first so configuration errors are logged too
    let log_level = match config::lookup(&env, "LOG_LEVEL")
        .map_err(anyhow::Error::from)
        .and_then(|level| parse_log_level(level.as_deref()))
    {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let config = match RunConfig::resolve(&env) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!(
        "Configuration loaded: {} target(s), detection {:?}",
        config.targets.len(),
        config.detection.method
    );

    let engine = match build_engine(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let report = rt.block_on(engine.run_once());

    for line in report.summary() {
        println!("{}", line);
    }

    DdnsExitCode::from(&report).into()
}

fn parse_log_level(raw: Option<&str>) -> Result<Level> {
    let Some(raw) = raw else {
        return Ok(Level::INFO);
    };

    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

/// Wire the configured strategies and provider into an engine
fn build_engine(config: RunConfig) -> Result<DdnsEngine> {
    let detector = build_detector(&config)?;

    let provider = CloudflareProvider::new(config.credential, config.api_base, config.timeout)
        .context("Failed to create Cloudflare provider")?;

    DdnsEngine::new(Box::new(provider), detector, config.targets, config.retry)
        .context("Failed to create DDNS engine")
}

/// A custom command replaces the built-in chain; otherwise `auto` tries DNS
/// before the HTTP echo services.
fn build_detector(config: &RunConfig) -> Result<IpDetector> {
    let detection = &config.detection;

    if let Some(command) = &detection.custom_command {
        return Ok(IpDetector::new(vec![Box::new(CommandIpSource::new(
            command.clone(),
            config.timeout,
        ))]));
    }

    let dns = || -> Result<Box<dyn IpSource>> {
        let source = DnsIpSource::new(detection.dns_server, config.timeout)
            .context("Failed to create DNS IP source")?;
        Ok(Box::new(source))
    };
    let http = || -> Result<Box<dyn IpSource>> {
        let source = HttpIpSource::new(config.timeout).context("Failed to create HTTP IP source")?;
        Ok(Box::new(source))
    };

    let sources = match detection.method {
        DetectionMethod::Auto => vec![dns()?, http()?],
        DetectionMethod::Dns => vec![dns()?],
        DetectionMethod::Http => vec![http()?],
    };

    Ok(IpDetector::new(sources))
}
