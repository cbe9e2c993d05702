// # DNS IP Source
//
// Detects the public address by asking a resolver a diagnostic question
// whose answer is the address the query came from. The question depends on
// who operates the resolver:
//
// - Cloudflare: `whoami.cloudflare.` TXT in the CHAOS class
// - OpenDNS: `myip.opendns.com.` A or AAAA
//
// Queries are sent straight to the resolver over UDP; no system resolver,
// hosts file or cache is involved. An AAAA detection has to reach the
// resolver over IPv6 to see the IPv6 address, so the default resolvers are
// chosen per family. With `DNS_SERVER` unset, Cloudflare is tried first and
// OpenDNS second.

use async_trait::async_trait;
use ddns_core::config::RecordType;
use ddns_core::traits::IpSource;
use ddns_core::{Error, Result};
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType as QueryType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

const DNS_PORT: u16 = 53;

/// Largest UDP response accepted
const MAX_RESPONSE_LEN: usize = 4096;

pub const CLOUDFLARE_V4: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));
pub const CLOUDFLARE_V6: IpAddr =
    IpAddr::V6(Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1111));

pub const OPENDNS_V4: IpAddr = IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222));
pub const OPENDNS_V6: IpAddr = IpAddr::V6(Ipv6Addr::new(0x2620, 0x119, 0x35, 0, 0, 0, 0, 0x35));

const CLOUDFLARE_RESOLVERS: &[IpAddr] = &[
    CLOUDFLARE_V4,
    IpAddr::V4(Ipv4Addr::new(1, 0, 0, 1)),
    CLOUDFLARE_V6,
    IpAddr::V6(Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1001)),
];

const OPENDNS_RESOLVERS: &[IpAddr] = &[
    OPENDNS_V4,
    IpAddr::V4(Ipv4Addr::new(208, 67, 220, 220)),
    IpAddr::V4(Ipv4Addr::new(208, 67, 222, 220)),
    IpAddr::V4(Ipv4Addr::new(208, 67, 220, 222)),
    OPENDNS_V6,
    IpAddr::V6(Ipv6Addr::new(0x2620, 0x119, 0x53, 0, 0, 0, 0, 0x53)),
];

/// The "what is my address" question a resolver operator answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticQuery {
    /// `whoami.cloudflare.` CH TXT
    CloudflareWhoami,
    /// `myip.opendns.com.` IN A/AAAA
    OpenDnsMyIp,
}

impl DiagnosticQuery {
    /// The query understood by a well-known public resolver
    pub fn for_resolver(ip: IpAddr) -> Option<Self> {
        if CLOUDFLARE_RESOLVERS.contains(&ip) {
            Some(Self::CloudflareWhoami)
        } else if OPENDNS_RESOLVERS.contains(&ip) {
            Some(Self::OpenDnsMyIp)
        } else {
            None
        }
    }

    fn question(&self, record_type: RecordType) -> Result<Query> {
        let (name, query_type, class) = match (self, record_type) {
            (Self::CloudflareWhoami, _) => ("whoami.cloudflare.", QueryType::TXT, DNSClass::CH),
            (Self::OpenDnsMyIp, RecordType::A) => ("myip.opendns.com.", QueryType::A, DNSClass::IN),
            (Self::OpenDnsMyIp, RecordType::Aaaa) => {
                ("myip.opendns.com.", QueryType::AAAA, DNSClass::IN)
            }
        };

        let name = Name::from_ascii(name)
            .map_err(|e| Error::detection(format!("invalid query name {}: {}", name, e)))?;
        let mut query = Query::query(name, query_type);
        query.set_query_class(class);
        Ok(query)
    }
}

/// One resolver and the question to ask it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolver {
    pub addr: SocketAddr,
    pub query: DiagnosticQuery,
}

impl Resolver {
    fn well_known(ip: IpAddr, query: DiagnosticQuery) -> Self {
        Self {
            addr: SocketAddr::new(ip, DNS_PORT),
            query,
        }
    }
}

/// DNS-based IP source
#[derive(Debug, Clone)]
pub struct DnsIpSource {
    /// Explicit resolver; `None` uses the per-family defaults
    resolver: Option<Resolver>,
    timeout: Duration,
}

impl DnsIpSource {
    /// Create a source for `DNS_SERVER`
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: the server is not a resolver with a known
    ///   diagnostic query, so it could never report our address
    pub fn new(server: Option<IpAddr>, timeout: Duration) -> Result<Self> {
        let resolver = match server {
            Some(ip) => {
                let query = DiagnosticQuery::for_resolver(ip).ok_or_else(|| {
                    Error::config(format!(
                        "DNS_SERVER {} has no known public-address query. \
                        Use a Cloudflare (1.1.1.1, 1.0.0.1, 2606:4700:4700::1111) \
                        or OpenDNS (208.67.222.222, 208.67.220.220, 2620:119:35::35) resolver",
                        ip
                    ))
                })?;
                Some(Resolver::well_known(ip, query))
            }
            None => None,
        };

        Ok(Self { resolver, timeout })
    }

    /// Query one specific resolver
    pub fn with_resolver(resolver: Resolver, timeout: Duration) -> Self {
        Self {
            resolver: Some(resolver),
            timeout,
        }
    }

    /// Resolvers tried for `record_type`, in order
    pub fn resolvers_for(&self, record_type: RecordType) -> Vec<Resolver> {
        if let Some(resolver) = self.resolver {
            return vec![resolver];
        }

        match record_type {
            RecordType::A => vec![
                Resolver::well_known(CLOUDFLARE_V4, DiagnosticQuery::CloudflareWhoami),
                Resolver::well_known(OPENDNS_V4, DiagnosticQuery::OpenDnsMyIp),
            ],
            RecordType::Aaaa => vec![
                Resolver::well_known(CLOUDFLARE_V6, DiagnosticQuery::CloudflareWhoami),
                Resolver::well_known(OPENDNS_V6, DiagnosticQuery::OpenDnsMyIp),
            ],
        }
    }

    async fn ask(&self, resolver: Resolver, record_type: RecordType) -> Result<String> {
        let query = resolver.query.question(record_type)?;
        let id: u16 = rand::random();

        let mut request = Message::new();
        request
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(query);
        let bytes = request
            .to_vec()
            .map_err(|e| Error::detection(format!("failed to encode DNS query: {}", e)))?;

        let response = tokio::time::timeout(self.timeout, exchange(resolver.addr, &bytes))
            .await
            .map_err(|_| {
                Error::detection(format!(
                    "DNS query to {} timed out after {:?}",
                    resolver.addr, self.timeout
                ))
            })??;

        if response.id() != id {
            return Err(Error::detection(format!(
                "{} answered with mismatched id {}",
                resolver.addr,
                response.id()
            )));
        }
        if response.response_code() != ResponseCode::NoError {
            return Err(Error::detection(format!(
                "{} answered {}",
                resolver.addr,
                response.response_code()
            )));
        }

        first_answer(&response)
            .ok_or_else(|| Error::detection(format!("{} returned an empty answer", resolver.addr)))
    }
}

/// Send one datagram and decode the reply
async fn exchange(server: SocketAddr, request: &[u8]) -> Result<Message> {
    let local: SocketAddr = match server {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let io = |e: std::io::Error| Error::detection(format!("DNS query to {} failed: {}", server, e));

    let socket = UdpSocket::bind(local).await.map_err(io)?;
    socket.connect(server).await.map_err(io)?;
    socket.send(request).await.map_err(io)?;

    let mut buf = vec![0u8; MAX_RESPONSE_LEN];
    let len = socket.recv(&mut buf).await.map_err(io)?;

    Message::from_bytes(&buf[..len])
        .map_err(|e| Error::detection(format!("{} sent an undecodable reply: {}", server, e)))
}

/// Address text of the first A, AAAA or TXT answer
fn first_answer(response: &Message) -> Option<String> {
    response.answers().iter().find_map(|record| match record.data()? {
        RData::A(a) => Some(a.0.to_string()),
        RData::AAAA(aaaa) => Some(aaaa.0.to_string()),
        RData::TXT(txt) => {
            let text: String = txt
                .txt_data()
                .iter()
                .map(|chunk| String::from_utf8_lossy(chunk))
                .collect();
            (!text.trim().is_empty()).then_some(text)
        }
        _ => None,
    })
}

#[async_trait]
impl IpSource for DnsIpSource {
    async fn detect(&self, record_type: RecordType) -> Result<String> {
        let mut last_error = None;

        for resolver in self.resolvers_for(record_type) {
            tracing::debug!(
                "Querying {:?} for {} via {}",
                resolver.query,
                record_type,
                resolver.addr
            );
            match self.ask(resolver, record_type).await {
                Ok(answer) => return Ok(answer),
                Err(e) => {
                    tracing::warn!("DNS detection via {} failed: {}", resolver.addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::detection("no DNS resolver configured")))
    }

    fn name(&self) -> &'static str {
        "dns"
    }
}
