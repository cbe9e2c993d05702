//! Configuration types and the environment resolver
//!
//! A run is described entirely by a [`RunConfig`], built by [`RunConfig::resolve`]
//! from an [`EnvSource`]. Every variable may be given directly (`ZONE=...`) or
//! through a file (`ZONE_FILE=/run/secrets/zone`); the file always wins.
//!
//! All validation happens here, before anything touches the network.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Cloudflare API base URL
pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default timeout applied to every network call and to the lookup command
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Source of raw configuration values
///
/// Production reads the process environment; tests hand in a map.
pub trait EnvSource {
    /// Look up a variable, `None` if unset
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// DNS address record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Whether `ip` belongs to the address family of this record type
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            RecordType::A => ip.is_ipv4(),
            RecordType::Aaaa => ip.is_ipv6(),
        }
    }

    /// Human name of the address family
    pub fn family(&self) -> &'static str {
        match self {
            RecordType::A => "IPv4",
            RecordType::Aaaa => "IPv6",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(Error::config(format!(
                "Unsupported record type '{}'. Supported types: A, AAAA",
                other
            ))),
        }
    }
}

/// Provider credential
///
/// The Debug implementation never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Scoped API token sent as `Authorization: Bearer`
    Bearer(String),
    /// Legacy global API key sent as `X-Auth-Email` / `X-Auth-Key`
    GlobalKey { email: String, key: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Bearer(_) => f.debug_tuple("Bearer").field(&"<REDACTED>").finish(),
            Credential::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("email", email)
                .field("key", &"<REDACTED>")
                .finish(),
        }
    }
}

/// One DNS record to keep in sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub zone: String,
    pub subdomain: Option<String>,
    pub record_type: RecordType,
    pub proxied: bool,
}

impl Target {
    pub fn new(zone: impl Into<String>, subdomain: Option<String>, record_type: RecordType) -> Self {
        Self {
            zone: zone.into(),
            subdomain,
            record_type,
            proxied: false,
        }
    }

    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Fully-qualified record name
    pub fn fqdn(&self) -> String {
        match &self.subdomain {
            Some(sub) => format!("{}.{}", sub, self.zone),
            None => self.zone.clone(),
        }
    }
}

/// Which detection strategies to chain when no custom command is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMethod {
    /// DNS lookup first, HTTP echo services as fallback
    #[default]
    Auto,
    Dns,
    Http,
}

impl FromStr for DetectionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DetectionMethod::Auto),
            "dns" => Ok(DetectionMethod::Dns),
            "http" => Ok(DetectionMethod::Http),
            other => Err(Error::config(format!(
                "DETECTION_METHOD '{}' is not supported. Supported methods: auto, dns, http",
                other
            ))),
        }
    }
}

/// Address detection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionConfig {
    pub method: DetectionMethod,
    /// Resolver for DNS detection; `None` uses the per-family default
    pub dns_server: Option<IpAddr>,
    /// Operator command; when set it is the only strategy
    pub custom_command: Option<String>,
}

/// Everything one invocation needs
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub credential: Credential,
    pub targets: Vec<Target>,
    pub detection: DetectionConfig,
    pub api_base: String,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl RunConfig {
    /// Resolve and validate a run configuration
    ///
    /// Fails with [`Error::Config`] on any missing or malformed value.
    pub fn resolve(env: &dyn EnvSource) -> Result<Self> {
        let secret = required(env, "API_KEY")?;
        let credential = match lookup(env, "EMAIL")? {
            Some(email) => Credential::GlobalKey { email, key: secret },
            None => Credential::Bearer(secret),
        };

        let zone = required(env, "ZONE")?.trim_end_matches('.').to_ascii_lowercase();
        validate_domain_name(&zone)?;

        let subdomains: Vec<Option<String>> = match lookup(env, "SUBDOMAIN")? {
            Some(raw) => {
                let list: Vec<String> = split_list(&raw)
                    .iter()
                    .map(|sub| sub.trim_end_matches('.').to_ascii_lowercase())
                    .collect();
                for sub in &list {
                    validate_domain_name(sub)?;
                }
                if list.is_empty() {
                    vec![None]
                } else {
                    list.into_iter().map(Some).collect()
                }
            }
            None => vec![None],
        };

        let record_types = match lookup(env, "RRTYPE")? {
            Some(raw) => {
                let mut types = Vec::new();
                for item in split_list(&raw) {
                    let record_type = item.parse::<RecordType>()?;
                    if !types.contains(&record_type) {
                        types.push(record_type);
                    }
                }
                if types.is_empty() {
                    return Err(Error::config("RRTYPE is set but lists no record type"));
                }
                types
            }
            None => vec![RecordType::A],
        };

        let proxied = match lookup(env, "PROXIED")? {
            Some(raw) => parse_bool("PROXIED", &raw)?,
            None => false,
        };

        let mut targets = Vec::with_capacity(subdomains.len() * record_types.len());
        for subdomain in &subdomains {
            for record_type in &record_types {
                targets.push(
                    Target::new(zone.clone(), subdomain.clone(), *record_type).with_proxied(proxied),
                );
            }
        }

        let method = match lookup(env, "DETECTION_METHOD")? {
            Some(raw) => raw.parse()?,
            None => DetectionMethod::default(),
        };
        let dns_server = match lookup(env, "DNS_SERVER")? {
            Some(raw) => Some(raw.parse::<IpAddr>().map_err(|_| {
                Error::config(format!("DNS_SERVER must be an IP address. Got: {}", raw))
            })?),
            None => None,
        };
        let custom_command = lookup(env, "CUSTOM_LOOKUP_CMD")?;

        let api_base = lookup(env, "CF_API")?.unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        if !api_base.starts_with("https://") && !api_base.starts_with("http://") {
            return Err(Error::config(format!(
                "CF_API must use HTTP or HTTPS scheme. Got: {}",
                api_base
            )));
        }
        let api_base = api_base.trim_end_matches('/').to_string();

        let max_attempts = parse_number(env, "MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS as u64, 1..=10)? as u32;
        let retry_delay_ms = parse_number(env, "RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS, 0..=60_000)?;
        let timeout_secs = parse_number(env, "HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS, 1..=300)?;

        Ok(Self {
            credential,
            targets,
            detection: DetectionConfig {
                method,
                dns_server,
                custom_command,
            },
            api_base,
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(retry_delay_ms)),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Resolve one variable, honouring the `_FILE` indirection
///
/// Empty values count as unset.
pub fn lookup(env: &dyn EnvSource, key: &str) -> Result<Option<String>> {
    let file_key = format!("{}_FILE", key);
    if let Some(path) = env.var(&file_key).filter(|p| !p.trim().is_empty()) {
        let contents = std::fs::read_to_string(path.trim()).map_err(|e| {
            Error::config(format!("{} points to an unreadable file '{}': {}", file_key, path, e))
        })?;
        let value = contents.trim();
        return Ok((!value.is_empty()).then(|| value.to_string()));
    }

    Ok(env
        .var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

fn required(env: &dyn EnvSource, key: &str) -> Result<String> {
    lookup(env, key)?.ok_or_else(|| {
        Error::config(format!(
            "{} is required. Set it via: export {}=... or {}_FILE=/path/to/file",
            key, key, key
        ))
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!(
            "{} must be true or false. Got: {}",
            key, raw
        ))),
    }
}

fn parse_number(
    env: &dyn EnvSource,
    key: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64> {
    let Some(raw) = lookup(env, key)? else {
        return Ok(default);
    };
    let value: u64 = raw
        .parse()
        .map_err(|_| Error::config(format!("{} must be a number. Got: {}", key, raw)))?;
    if !range.contains(&value) {
        return Err(Error::config(format!(
            "{} must be between {} and {}. Got: {}",
            key,
            range.start(),
            range.end(),
            value
        )));
    }
    Ok(value)
}

/// Basic RFC 1035 name validation; catches common typos, not every edge case
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!("Domain name has empty label: '{}'", domain)));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        // '*' allowed for wildcard records, '_' for service labels
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '*')
        {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = RunConfig::resolve(&env(&[("API_KEY", "tok"), ("ZONE", "example.com")])).unwrap();

        assert_eq!(config.credential, Credential::Bearer("tok".to_string()));
        assert_eq!(config.targets, vec![Target::new("example.com", None, RecordType::A)]);
        assert_eq!(config.detection.method, DetectionMethod::Auto);
        assert_eq!(config.detection.dns_server, None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.retry.max_attempts(), 3);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_missing_required_values() {
        let err = RunConfig::resolve(&env(&[("ZONE", "example.com")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("API_KEY")));

        let err = RunConfig::resolve(&env(&[("API_KEY", "tok")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("ZONE")));
    }

    #[test]
    fn test_file_variant_takes_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  token-from-file  ").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = RunConfig::resolve(&env(&[
            ("API_KEY", "token-from-env"),
            ("API_KEY_FILE", &path),
            ("ZONE", "example.com"),
        ]))
        .unwrap();

        assert_eq!(config.credential, Credential::Bearer("token-from-file".to_string()));
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let err = RunConfig::resolve(&env(&[
            ("API_KEY", "tok"),
            ("ZONE_FILE", "/nonexistent/ddns/zone"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("ZONE_FILE")));
    }

    #[test]
    fn test_invalid_record_type_rejected() {
        let err = RunConfig::resolve(&env(&[
            ("API_KEY", "tok"),
            ("ZONE", "example.com"),
            ("RRTYPE", "CNAME"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("CNAME")));
    }

    #[test]
    fn test_targets_are_cartesian_product() {
        let config = RunConfig::resolve(&env(&[
            ("API_KEY", "tok"),
            ("ZONE", "Example.com."),
            ("SUBDOMAIN", "home, vpn"),
            ("RRTYPE", "a,AAAA"),
            ("PROXIED", "true"),
        ]))
        .unwrap();

        let names: Vec<(String, RecordType)> = config
            .targets
            .iter()
            .map(|t| (t.fqdn(), t.record_type))
            .collect();
        assert_eq!(
            names,
            vec![
                ("home.example.com".to_string(), RecordType::A),
                ("home.example.com".to_string(), RecordType::Aaaa),
                ("vpn.example.com".to_string(), RecordType::A),
                ("vpn.example.com".to_string(), RecordType::Aaaa),
            ]
        );
        assert!(config.targets.iter().all(|t| t.proxied));
    }

    #[test]
    fn test_subdomains_normalized_like_zone() {
        let config = RunConfig::resolve(&env(&[
            ("API_KEY", "tok"),
            ("ZONE", "EXAMPLE.com."),
            ("SUBDOMAIN", "Home.,VPN"),
        ]))
        .unwrap();

        let names: Vec<String> = config.targets.iter().map(|t| t.fqdn()).collect();
        assert_eq!(names, vec!["home.example.com", "vpn.example.com"]);
    }

    #[test]
    fn test_email_switches_to_global_key() {
        let config = RunConfig::resolve(&env(&[
            ("API_KEY", "global-key"),
            ("EMAIL", "ops@example.com"),
            ("ZONE", "example.com"),
        ]))
        .unwrap();

        assert_eq!(
            config.credential,
            Credential::GlobalKey {
                email: "ops@example.com".to_string(),
                key: "global-key".to_string(),
            }
        );
    }

    #[test]
    fn test_detection_settings() {
        let config = RunConfig::resolve(&env(&[
            ("API_KEY", "tok"),
            ("ZONE", "example.com"),
            ("DETECTION_METHOD", "HTTP"),
            ("DNS_SERVER", "1.1.1.1"),
            ("CUSTOM_LOOKUP_CMD", "curl -s ifconfig.me"),
        ]))
        .unwrap();

        assert_eq!(config.detection.method, DetectionMethod::Http);
        assert_eq!(config.detection.dns_server, Some("1.1.1.1".parse().unwrap()));
        assert_eq!(config.detection.custom_command.as_deref(), Some("curl -s ifconfig.me"));

        let err = RunConfig::resolve(&env(&[
            ("API_KEY", "tok"),
            ("ZONE", "example.com"),
            ("DNS_SERVER", "one.one.one.one"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("PROXIED", "maybe"),
            ("MAX_ATTEMPTS", "0"),
            ("HTTP_TIMEOUT_SECS", "abc"),
            ("CF_API", "ftp://api.example.com"),
            ("SUBDOMAIN", "-bad"),
            ("DETECTION_METHOD", "carrier-pigeon"),
        ] {
            let result = RunConfig::resolve(&env(&[
                ("API_KEY", "tok"),
                ("ZONE", "example.com"),
                (key, value),
            ]));
            assert!(
                matches!(result, Err(Error::Config(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_credential_not_exposed_in_debug() {
        let bearer = format!("{:?}", Credential::Bearer("secret_token_12345".to_string()));
        let global = format!(
            "{:?}",
            Credential::GlobalKey {
                email: "ops@example.com".to_string(),
                key: "secret_key_67890".to_string(),
            }
        );

        assert!(!bearer.contains("secret_token"));
        assert!(!global.contains("secret_key"));
        assert!(global.contains("ops@example.com"));
    }

    #[test]
    fn test_fqdn() {
        let bare = Target::new("example.com", None, RecordType::A);
        let sub = Target::new("example.com", Some("home".to_string()), RecordType::A);
        assert_eq!(bare.fqdn(), "example.com");
        assert_eq!(sub.fqdn(), "home.example.com");
    }
}
