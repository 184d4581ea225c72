// SPDX-License-Identifier: AGPL-3.0-only

//! The query entry point.

use std::time::{Duration, Instant};

use answer::{self, Answer, QueryType};
use config::{Config, ConfigError};
use name::Name;
use store::RecordStore;
use zone::{ZoneCache, ZoneError};

/// Why a query produced no answer.
#[derive(Debug, Fail, PartialEq)]
pub enum QueryError {
    /// Nothing is stored for the name, or what is stored could not be used.
    #[fail(display = "name not found")]
    NameNotFound,
    /// The query type is not one of A, AAAA or CNAME.
    #[fail(display = "query type {} not implemented", _0)]
    UnsupportedType(u16),
    /// The zone index could not be loaded.
    #[fail(display = "backend unavailable")]
    BackendUnavailable,
}

impl QueryError {
    /// The response code to answer with: NXDOMAIN, NOTIMP or SERVFAIL.
    pub fn rcode(&self) -> u8 {
        match *self {
            QueryError::NameNotFound => 3,
            QueryError::UnsupportedType(_) => 4,
            QueryError::BackendUnavailable => 2,
        }
    }
}

/// Answers queries for a set of zones from one record store.
///
/// A `Resolver` is shared by all concurrent queries; only its zone cache is mutable.
pub struct Resolver {
    store: Box<dyn RecordStore>,
    zones: ZoneCache,
    ttl: u32,
}

impl Resolver {
    /// Builds a resolver and its store from `config`.
    pub fn new(config: Config) -> Result<Resolver, ConfigError> {
        let config = config.normalize()?;
        Ok(Resolver::with_store(
            config.build_store()?,
            config.zone_names()?,
            config.refresh_interval,
            config.ttl,
        ))
    }

    pub fn with_store(
        store: Box<dyn RecordStore>,
        zones: Vec<Name>,
        refresh_interval: Duration,
        ttl: u32,
    ) -> Resolver {
        Resolver {
            store,
            zones: ZoneCache::new(zones, refresh_interval),
            ttl,
        }
    }

    /// The zones served as of the last refresh.
    pub fn zones(&self) -> Vec<Name> {
        self.zones.names()
    }

    /// Finds the served zone that most closely encloses `name`.
    pub fn find_zone(&self, name: &Name) -> Option<Name> {
        self.zones.find_zone(&*self.store, name, Instant::now())
    }

    pub fn resolve_query(&self, name: &Name, qtype: u16, zone: &Name) -> Result<Answer, QueryError> {
        self.resolve_query_at(name, qtype, zone, Instant::now())
    }

    /// Answers a query for `name` in `zone` as of `now`.
    pub fn resolve_query_at(
        &self,
        name: &Name,
        qtype: u16,
        zone: &Name,
        now: Instant,
    ) -> Result<Answer, QueryError> {
        let index = self.zones
            .get_or_refresh(&*self.store, zone, now)
            .map_err(|err| match err {
                ZoneError::NotServed(_) => QueryError::NameNotFound,
                ZoneError::Unavailable(_) => QueryError::BackendUnavailable,
            })?;

        let location = match self.store.locate(name, &index) {
            Some(location) => location,
            None => {
                debug!("no location for {} in {}", name, zone);
                return Err(QueryError::NameNotFound);
            }
        };

        let query_type = QueryType::from_code(qtype).ok_or(QueryError::UnsupportedType(qtype))?;

        let record = self.store.fetch_record(zone, &location).map_err(|err| {
            debug!("no record for {} at location {:?}: {}", name, location, err);
            QueryError::NameNotFound
        })?;

        let answer = answer::build(query_type, name, &record, self.ttl);
        debug!(
            "{} {} answered from {:?} with {} records",
            name,
            query_type,
            location,
            answer.answers.len()
        );
        Ok(answer)
    }
}
