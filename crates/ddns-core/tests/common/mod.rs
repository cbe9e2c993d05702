//! Test doubles and common utilities for contract tests
//!
//! `MockDnsProvider` is an in-memory provider that records every call, so
//! tests can assert exactly which reads and writes a run performed.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::{RecordType, Target};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{DnsProvider, IpSource, ProviderRecord, ZoneId};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One observed provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Verify,
    ResolveZone(String),
    List { name: String, record_type: RecordType },
    Create { name: String, content: String, proxied: bool },
    Update { id: String, content: String, proxied: bool },
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(self, Call::Create { .. } | Call::Update { .. })
    }

    fn op(&self) -> &'static str {
        match self {
            Call::Verify => "verify",
            Call::ResolveZone(_) => "resolve_zone",
            Call::List { .. } => "list",
            Call::Create { .. } => "create",
            Call::Update { .. } => "update",
        }
    }
}

struct Failure {
    remaining: usize,
    make: fn() -> Error,
}

#[derive(Default)]
struct State {
    zones: Vec<(String, String)>,
    records: Vec<(String, ProviderRecord)>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, Failure>,
    next_id: usize,
}

/// In-memory provider; clones share state
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    state: Arc<Mutex<State>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider hosting `example.com` as zone `zone-1`
    pub fn with_example_zone() -> Self {
        Self::new().with_zone("example.com", "zone-1")
    }

    pub fn with_zone(self, name: &str, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .zones
            .push((name.to_string(), id.to_string()));
        self
    }

    pub fn with_record(
        self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
        content: &str,
        proxied: bool,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let record = ProviderRecord {
                id: format!("rec-{}", state.next_id),
                record_type,
                name: name.to_string(),
                content: content.to_string(),
                proxied,
            };
            state.records.push((zone_id.to_string(), record));
        }
        self
    }

    /// Make the next `times` calls of `op` fail with `make()`
    ///
    /// `op` is one of: verify, resolve_zone, list, create, update.
    pub fn failing(self, op: &'static str, times: usize, make: fn() -> Error) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op, Failure { remaining: times, make });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.op() == op).count()
    }

    pub fn write_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_write()).count()
    }

    /// Current content of the single record named `name`
    pub fn content_of(&self, name: &str, record_type: RecordType) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|(_, r)| r.name == name && r.record_type == record_type)
            .map(|(_, r)| r.content.clone())
    }

    fn record_call(&self, call: Call) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let op = call.op();
        state.calls.push(call);
        if let Some(failure) = state.failures.get_mut(op) {
            if failure.remaining > 0 {
                failure.remaining -= 1;
                return Err((failure.make)());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn verify_credentials(&self) -> Result<()> {
        self.record_call(Call::Verify)
    }

    async fn resolve_zone(&self, name: &str) -> Result<ZoneId> {
        self.record_call(Call::ResolveZone(name.to_string()))?;
        let state = self.state.lock().unwrap();
        let matches: Vec<&(String, String)> =
            state.zones.iter().filter(|(n, _)| n == name).collect();
        match matches.as_slice() {
            [] => Err(Error::not_found(format!("zone {}", name))),
            [(_, id)] => Ok(ZoneId::new(id.clone())),
            _ => Err(Error::ambiguous(format!("zone {}", name))),
        }
    }

    async fn list_records(
        &self,
        zone: &ZoneId,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<ProviderRecord>> {
        self.record_call(Call::List {
            name: name.to_string(),
            record_type,
        })?;
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|(z, r)| z == zone.as_str() && r.name == name && r.record_type == record_type)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create_record(
        &self,
        zone: &ZoneId,
        name: &str,
        record_type: RecordType,
        content: IpAddr,
        proxied: bool,
    ) -> Result<ProviderRecord> {
        self.record_call(Call::Create {
            name: name.to_string(),
            content: content.to_string(),
            proxied,
        })?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let record = ProviderRecord {
            id: format!("rec-{}", state.next_id),
            record_type,
            name: name.to_string(),
            content: content.to_string(),
            proxied,
        };
        state.records.push((zone.as_str().to_string(), record.clone()));
        Ok(record)
    }

    async fn update_record(
        &self,
        zone: &ZoneId,
        record_id: &str,
        content: IpAddr,
        proxied: bool,
    ) -> Result<ProviderRecord> {
        self.record_call(Call::Update {
            id: record_id.to_string(),
            content: content.to_string(),
            proxied,
        })?;
        let mut state = self.state.lock().unwrap();
        let (_, record) = state
            .records
            .iter_mut()
            .find(|(z, r)| z == zone.as_str() && r.id == record_id)
            .ok_or_else(|| Error::request(format!("record {} not found", record_id)))?;
        record.content = content.to_string();
        record.proxied = proxied;
        Ok(record.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// IP source returning a fixed answer per record type
#[derive(Clone)]
pub struct ScriptedIpSource {
    answers: HashMap<RecordType, String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer `A` queries with `answer`
    pub fn v4(answer: &str) -> Self {
        Self::new().answering(RecordType::A, answer)
    }

    pub fn answering(mut self, record_type: RecordType, answer: &str) -> Self {
        self.answers.insert(record_type, answer.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpSource for ScriptedIpSource {
    async fn detect(&self, record_type: RecordType) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(&record_type)
            .cloned()
            .ok_or_else(|| Error::detection(format!("no {} answer", record_type)))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// `home.example.com` A record target
pub fn home_target() -> Target {
    Target::new("example.com", Some("home".to_string()), RecordType::A)
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid test address")
}
