// SPDX-License-Identifier: AGPL-3.0-only

//! Backing stores that zone indexes and records are fetched from.

use location;
use name::Name;
use record::{Record, RecordError};
use zone::Zone;

pub mod directory;
pub mod kv;

pub use self::directory::{DirectoryBackend, HttpClient, HttpResponse};
pub use self::kv::{KvBackend, KvStore, RedisStore};

/// Why one explorer endpoint did not produce a usable answer.
#[derive(Debug, Fail, PartialEq)]
pub enum EndpointError {
    /// The request could not be made or timed out.
    #[fail(display = "{}: request failed: {}", endpoint, reason)]
    Request { endpoint: String, reason: String },
    /// The endpoint answered with something other than 200.
    #[fail(display = "{}: unexpected status {}", endpoint, status)]
    Status { endpoint: String, status: u16 },
    /// The endpoint answered 200 with a body that could not be decoded.
    #[fail(display = "{}: malformed response: {}", endpoint, reason)]
    Malformed { endpoint: String, reason: String },
    /// The endpoint answered, but none of the addresses were usable.
    #[fail(display = "{}: no usable addresses", endpoint)]
    NoAddresses { endpoint: String },
}

/// Errors returned by a `RecordStore`.
#[derive(Debug, Fail)]
pub enum StoreError {
    /// Nothing is stored for the label.
    #[fail(display = "no record for {} in {}", label, zone)]
    NotFound { zone: Name, label: String },
    /// The store could not be reached.
    #[fail(display = "store unavailable: {}", _0)]
    Unavailable(String),
    /// The stored value could not be decoded.
    #[fail(display = "malformed record for {} in {}: {}", label, zone, error)]
    Malformed {
        zone: Name,
        label: String,
        error: RecordError,
    },
    /// Every explorer was tried without getting a usable record. Each attempt is recorded in
    /// order.
    #[fail(display = "no usable record for {} from any explorer", label)]
    EndpointsExhausted {
        label: String,
        attempts: Vec<EndpointError>,
    },
}

/// A source of zone indexes and records.
///
/// Implementations must be safe to call from concurrent queries. Every failure is an ordinary
/// error for the current query; nothing here may panic on bad upstream data.
pub trait RecordStore: Send + Sync {
    /// Lists the zones the store holds. Stores that cannot enumerate zones return an empty list.
    fn list_zones(&self) -> Result<Vec<Name>, StoreError> {
        Ok(Vec::new())
    }

    /// Loads the set of known locations of `zone`.
    fn load_zone(&self, zone: &Name) -> Result<Zone, StoreError>;

    /// Fetches the record stored for `label` in `zone`. `location::APEX` addresses the apex.
    fn fetch_record(&self, zone: &Name, label: &str) -> Result<Record, StoreError>;

    /// Picks the location that answers `query` within `zone`.
    fn locate(&self, query: &Name, zone: &Zone) -> Option<String> {
        location::resolve(query, zone)
    }
}
