// SPDX-License-Identifier: AGPL-3.0-only

//! Resource records returned to the protocol layer.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use name::{from_host, Name};
use record::{effective_ttl, Record};

/// The query types that can be answered from a `Record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    A,
    AAAA,
    CNAME,
}

impl QueryType {
    /// Maps a QTYPE value to a supported query type.
    pub fn from_code(code: u16) -> Option<QueryType> {
        match code {
            1 => Some(QueryType::A),
            28 => Some(QueryType::AAAA),
            5 => Some(QueryType::CNAME),
            _ => None,
        }
    }

    /// The QTYPE value.
    pub fn code(self) -> u16 {
        match self {
            QueryType::A => 1,
            QueryType::AAAA => 28,
            QueryType::CNAME => 5,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            QueryType::A => "A",
            QueryType::AAAA => "AAAA",
            QueryType::CNAME => "CNAME",
        })
    }
}

/// The data of a resource record.
#[derive(Debug, Clone, PartialEq)]
pub enum RData {
    /// [A record data](https://tools.ietf.org/html/rfc1035#section-3.4.1), representing an IPv4
    /// address.
    A(Ipv4Addr),
    /// [AAAA record data](https://tools.ietf.org/html/rfc3596#section-2.2), representing an IPv6
    /// address.
    AAAA(Ipv6Addr),
    /// [CNAME record data](https://tools.ietf.org/html/rfc1035#section-3.3.1), representing a
    /// canonical name for an alias.
    CNAME(Name),
}

impl RData {
    pub fn query_type(&self) -> QueryType {
        match *self {
            RData::A(_) => QueryType::A,
            RData::AAAA(_) => QueryType::AAAA,
            RData::CNAME(_) => QueryType::CNAME,
        }
    }

    /// The resource record type.
    pub fn record_type(&self) -> u16 {
        self.query_type().code()
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RData::A(ref addr) => write!(f, "{}", addr),
            RData::AAAA(ref addr) => write!(f, "{}", addr),
            RData::CNAME(ref name) => write!(f, "{}", name),
        }
    }
}

/// A resource record in the IN class, owned by the query name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    name: Name,
    ttl: u32,
    rdata: RData,
}

impl ResourceRecord {
    pub fn new(name: Name, ttl: u32, rdata: RData) -> ResourceRecord {
        ResourceRecord { name, ttl, rdata }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn rdata(&self) -> &RData {
        &self.rdata
    }

    pub fn record_type(&self) -> u16 {
        self.rdata.record_type()
    }
}

/// Formats the record the way it would appear in a zone file.
impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\tIN\t{}\t{}",
            self.name,
            self.ttl,
            self.rdata.query_type(),
            self.rdata
        )
    }
}

/// The answer and additional sections of a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Answer {
    pub answers: Vec<ResourceRecord>,
    /// Reserved for glue; always empty for now.
    pub extras: Vec<ResourceRecord>,
}

/// Builds the answer for `query_type` at `name` from the entries of `record`, capping TTLs with
/// `ttl_ceiling` (0 for none).
pub fn build(query_type: QueryType, name: &Name, record: &Record, ttl_ceiling: u32) -> Answer {
    let ttl = |ttl: Option<u32>| effective_ttl(ttl.unwrap_or(0), ttl_ceiling);
    let answers = match query_type {
        QueryType::A => record
            .a
            .iter()
            .map(|a| ResourceRecord::new(name.clone(), ttl(a.ttl), RData::A(a.ip)))
            .collect(),
        QueryType::AAAA => record
            .aaaa
            .iter()
            .map(|aaaa| ResourceRecord::new(name.clone(), ttl(aaaa.ttl), RData::AAAA(aaaa.ip)))
            .collect(),
        QueryType::CNAME => record
            .cname
            .iter()
            .filter(|cname| !cname.host.is_empty())
            .filter_map(|cname| match from_host(&cname.host) {
                Some(target) => Some(ResourceRecord::new(
                    name.clone(),
                    ttl(cname.ttl),
                    RData::CNAME(target),
                )),
                None => {
                    warn!("skipping CNAME target {:?} for {}", cname.host, name);
                    None
                }
            }).collect(),
    };
    Answer {
        answers,
        extras: Vec::new(),
    }
}
