//! Priority-ordered address detection
//!
//! [`IpDetector`] holds a list of [`IpSource`] strategies and asks them in
//! order; the first one that yields a well-formed address of the requested
//! family wins. Every answer passes through [`parse_address`] first.

use crate::config::RecordType;
use crate::error::{Error, Result};
use crate::traits::IpSource;
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Longest answer echoed back in an error message
const MAX_ECHOED_LEN: usize = 64;

/// Validate untrusted strategy output as an address for `record_type`
///
/// Surrounding whitespace and double quotes (as found in TXT answers) are
/// stripped. Text that is not an IP address is a detection error; an address
/// of the wrong family is a configuration error, since it means the operator
/// pointed an A record at an IPv6-only source or vice versa.
pub fn parse_address(raw: &str, record_type: RecordType) -> Result<IpAddr> {
    let text = raw.trim().trim_matches('"').trim();

    let ip: IpAddr = text.parse().map_err(|_| {
        let mut shown: String = text.chars().take(MAX_ECHOED_LEN).collect();
        if text.chars().count() > MAX_ECHOED_LEN {
            shown.push_str("...");
        }
        Error::detection(format!("not an IP address: '{}'", shown))
    })?;

    if !record_type.matches(&ip) {
        return Err(Error::config(format!(
            "{} record needs an {} address, detected {}",
            record_type,
            record_type.family(),
            ip
        )));
    }

    Ok(ip)
}

/// Ordered chain of detection strategies
pub struct IpDetector {
    sources: Vec<Box<dyn IpSource>>,
}

impl IpDetector {
    /// Create a detector; `sources` are tried front to back
    pub fn new(sources: Vec<Box<dyn IpSource>>) -> Self {
        Self { sources }
    }

    /// Names of the configured strategies, in priority order
    pub fn strategies(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Detect the public address for `record_type`
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: validated address from the first successful strategy
    /// - `Err(Error)`: the last strategy's error when all of them failed
    pub async fn detect(&self, record_type: RecordType) -> Result<IpAddr> {
        let mut last_error = None;

        for source in &self.sources {
            debug!("Detecting {} address via {}", record_type.family(), source.name());

            let result = source
                .detect(record_type)
                .await
                .and_then(|raw| parse_address(&raw, record_type));

            match result {
                Ok(ip) => {
                    info!("Detected {} address {} via {}", record_type.family(), ip, source.name());
                    return Ok(ip);
                }
                Err(e) => {
                    warn!("Detection via {} failed: {}", source.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::config("No address detection strategy configured")))
    }
}
