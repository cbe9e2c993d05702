//! Core traits for the DDNS updater
//!
//! This module defines the abstract interfaces the engine is written against.
//!
//! - [`IpSource`]: One way of discovering the host's public address
//! - [`DnsProvider`]: Typed access to a provider's zone/record API

pub mod ip_source;
pub mod dns_provider;

pub use ip_source::IpSource;
pub use dns_provider::{DnsProvider, ProviderRecord, ZoneId};
