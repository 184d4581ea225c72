// SPDX-License-Identifier: AGPL-3.0-only

//! Record sets as stored upstream, and their normalization.
//!
//! Two payload shapes are accepted. Key/value stores hold one JSON object per label:
//!
//! ```json
//! {"a": [{"ip": "192.0.2.1", "ttl": 300}], "aaaa": [{"ip": "2001:db8::1"}],
//!  "cname": [{"host": "zaibon.grid.tf."}]}
//! ```
//!
//! 3bot explorers answer whois lookups with a list of address strings:
//!
//! ```json
//! {"record": {"addresses": ["192.0.2.1", "3bot.zaibon.be"], "names": ["zaibon.tf3bot"]}}
//! ```

use serde_json;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// TTL used when neither the record nor the configuration sets one.
pub const DEFAULT_TTL: u32 = 360;

/// TTL given to records built from explorer responses, which carry none.
pub const DEFAULT_DIRECTORY_TTL: u32 = 300;

/// Combines the TTL of a record with the configured ceiling. Zero means unset for both.
///
/// The ceiling caps an explicit record TTL but never extends it.
pub fn effective_ttl(ttl: u32, ceiling: u32) -> u32 {
    match (ttl, ceiling) {
        (0, 0) => DEFAULT_TTL,
        (ttl, 0) => ttl,
        (0, ceiling) => ceiling,
        (ttl, ceiling) => ttl.min(ceiling),
    }
}

/// Errors that can occur while normalizing a payload.
#[derive(Debug, Fail)]
pub enum RecordError {
    /// The payload is not JSON of the expected shape.
    #[fail(display = "invalid record payload: {}", _0)]
    Json(serde_json::Error),
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> RecordError {
        RecordError::Json(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct A {
    pub ip: Ipv4Addr,
    pub ttl: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AAAA {
    pub ip: Ipv6Addr,
    pub ttl: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CNAME {
    /// The target host. It is made fully qualified when answered.
    pub host: String,
    pub ttl: Option<u32>,
}

/// All records stored for one location, grouped by type.
///
/// A `Record` is built fresh for every query and never cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub a: Vec<A>,
    pub aaaa: Vec<AAAA>,
    pub cname: Vec<CNAME>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    ttl: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    ttl: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    a: Option<Vec<RawAddress>>,
    #[serde(default)]
    aaaa: Option<Vec<RawAddress>>,
    #[serde(default)]
    cname: Option<Vec<RawHost>>,
}

#[derive(Debug, Deserialize)]
struct WhoisRecord {
    #[serde(default)]
    addresses: Option<Vec<String>>,
    #[serde(default)]
    names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct WhoisResponse {
    record: WhoisRecord,
}

/// Parses an address field, returning `None` (and logging) when it is absent or not an address
/// of the wanted family.
fn parse_ip<T: ::std::str::FromStr>(family: &str, raw: &RawAddress) -> Option<T> {
    match raw.ip {
        Some(ref ip) if !ip.is_empty() => match ip.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!("dropping {} entry with unparseable address {:?}", family, ip);
                None
            }
        },
        _ => {
            warn!("dropping {} entry without an address", family);
            None
        }
    }
}

impl Record {
    /// Decodes the JSON stored for a label in a key/value store.
    ///
    /// Entries without a usable address are dropped; the rest of the record is kept. Only a
    /// payload that is not a JSON object of the expected shape is an error.
    pub fn from_kv_json(payload: &str) -> Result<Record, RecordError> {
        let raw: RawRecord = serde_json::from_str(payload)?;
        let mut record = Record::default();
        for entry in raw.a.unwrap_or_default() {
            if let Some(ip) = parse_ip("A", &entry) {
                record.a.push(A { ip, ttl: entry.ttl });
            }
        }
        for entry in raw.aaaa.unwrap_or_default() {
            if let Some(ip) = parse_ip("AAAA", &entry) {
                record.aaaa.push(AAAA { ip, ttl: entry.ttl });
            }
        }
        for entry in raw.cname.unwrap_or_default() {
            match entry.host {
                Some(host) => record.cname.push(CNAME {
                    host,
                    ttl: entry.ttl,
                }),
                None => warn!("dropping CNAME entry without a host"),
            }
        }
        Ok(record)
    }

    /// Decodes an explorer whois response body, giving every address `ttl`.
    pub fn from_directory_json(body: &[u8], ttl: u32) -> Result<Record, RecordError> {
        let response: WhoisResponse = serde_json::from_slice(body)?;
        trace!(
            "whois response for {:?}",
            response.record.names.as_ref().map(|n| n.as_slice()).unwrap_or(&[])
        );
        Ok(Record::from_addresses(
            response.record.addresses.unwrap_or_default(),
            ttl,
        ))
    }

    /// Classifies address strings into A and AAAA entries. Anything that is not an IP address,
    /// hostnames included, is discarded.
    pub fn from_addresses<I>(addresses: I, ttl: u32) -> Record
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut record = Record::default();
        for address in addresses {
            let address = address.as_ref();
            match address.parse() {
                Ok(IpAddr::V4(ip)) => record.a.push(A { ip, ttl: Some(ttl) }),
                Ok(IpAddr::V6(ip)) => record.aaaa.push(AAAA { ip, ttl: Some(ttl) }),
                Err(_) => debug!("discarding non-IP address {:?}", address),
            }
        }
        record
    }

    /// Appends the entries of `other`, keeping their order.
    pub fn merge(&mut self, other: Record) {
        self.a.extend(other.a);
        self.aaaa.extend(other.aaaa);
        self.cname.extend(other.cname);
    }

    /// Returns `true` if the record has no entries of any type.
    pub fn is_empty(&self) -> bool {
        self.a.is_empty() && self.aaaa.is_empty() && self.cname.is_empty()
    }
}
