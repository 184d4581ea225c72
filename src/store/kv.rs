// SPDX-License-Identifier: AGPL-3.0-only

//! Zones stored as key/value hashes.
//!
//! Each zone is one hash, keyed by `prefix + zone + suffix` (`grid.tf.` by default). The hash maps
//! location keys to the JSON accepted by [`Record::from_kv_json`]; the apex is stored under `@`.
//!
//! [`Record::from_kv_json`]: ../../record/struct.Record.html#method.from_kv_json

use failure;
use redis::{self, IntoConnectionInfo};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use name::Name;
use record::Record;
use store::{RecordStore, StoreError};
use zone::Zone;

/// The calls made against a key/value store.
pub trait KvStore: Send + Sync {
    /// Lists the keys matching a glob `pattern`.
    fn keys(&self, pattern: &str) -> Result<Vec<String>, failure::Error>;

    /// Lists the field names of the hash at `key`.
    fn fields(&self, key: &str) -> Result<Vec<String>, failure::Error>;

    /// Gets one field of the hash at `key`.
    fn field(&self, key: &str, field: &str) -> Result<Option<String>, failure::Error>;
}

/// A `KvStore` backed by Redis. A connection is opened for every call.
#[derive(Debug, Clone)]
pub struct RedisStore {
    client: redis::Client,
    timeout: Duration,
}

impl RedisStore {
    /// Creates a store for `address`, either a `redis://` URL or a bare `host:port`.
    pub fn open(
        address: &str,
        credential: Option<&str>,
        timeout: Duration,
    ) -> Result<RedisStore, redis::RedisError> {
        let mut info = if address.contains("://") {
            address.into_connection_info()?
        } else {
            format!("redis://{}", address).into_connection_info()?
        };
        if let Some(password) = credential {
            info.redis.password = Some(password.to_owned());
        }
        Ok(RedisStore {
            client: redis::Client::open(info)?,
            timeout,
        })
    }

    fn connection(&self) -> redis::RedisResult<redis::Connection> {
        let connection = self.client.get_connection_with_timeout(self.timeout)?;
        connection.set_read_timeout(Some(self.timeout))?;
        connection.set_write_timeout(Some(self.timeout))?;
        Ok(connection)
    }
}

impl KvStore for RedisStore {
    fn keys(&self, pattern: &str) -> Result<Vec<String>, failure::Error> {
        Ok(redis::cmd("KEYS")
            .arg(pattern)
            .query(&mut self.connection()?)?)
    }

    fn fields(&self, key: &str) -> Result<Vec<String>, failure::Error> {
        Ok(redis::cmd("HKEYS").arg(key).query(&mut self.connection()?)?)
    }

    fn field(&self, key: &str, field: &str) -> Result<Option<String>, failure::Error> {
        Ok(redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query(&mut self.connection()?)?)
    }
}

/// A `RecordStore` over a `KvStore`.
///
/// Zones found by `list_zones` keep the hash key they were discovered under, so stored keys need
/// not be lowercase.
#[derive(Debug)]
pub struct KvBackend<S> {
    store: S,
    key_prefix: String,
    key_suffix: String,
    discovered: RwLock<HashMap<Name, String>>,
}

impl<S: KvStore> KvBackend<S> {
    pub fn new(store: S) -> KvBackend<S> {
        KvBackend {
            store,
            key_prefix: String::new(),
            key_suffix: String::new(),
            discovered: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the strings wrapped around zone names to form hash keys.
    pub fn with_key_affixes(mut self, prefix: &str, suffix: &str) -> KvBackend<S> {
        self.key_prefix = prefix.to_owned();
        self.key_suffix = suffix.to_owned();
        self
    }

    fn zone_key(&self, zone: &Name) -> String {
        match self.discovered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(zone)
        {
            Some(key) => key.clone(),
            None => format!("{}{}{}", self.key_prefix, zone, self.key_suffix),
        }
    }
}

impl<S: KvStore> RecordStore for KvBackend<S> {
    fn list_zones(&self) -> Result<Vec<Name>, StoreError> {
        let pattern = format!("{}*{}", self.key_prefix, self.key_suffix);
        let keys = self.store
            .keys(&pattern)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let discovered: Vec<(Name, String)> = keys
            .into_iter()
            .filter_map(|key| {
                let name = {
                    let zone = key.get(
                        self.key_prefix.len()..key.len().checked_sub(self.key_suffix.len())?,
                    )?;
                    match Name::from_str(zone) {
                        Ok(name) => name,
                        Err(err) => {
                            warn!("ignoring store key {:?}: {}", key, err);
                            return None;
                        }
                    }
                };
                Some((name, key))
            }).collect();

        let names = discovered.iter().map(|&(ref name, _)| name.clone()).collect();
        *self.discovered
            .write()
            .unwrap_or_else(PoisonError::into_inner) = discovered.into_iter().collect();
        Ok(names)
    }

    fn load_zone(&self, zone: &Name) -> Result<Zone, StoreError> {
        let key = self.zone_key(zone);
        let fields = self.store.fields(&key).map_err(|err| {
            warn!("failed to list locations of {}: {}", key, err);
            StoreError::Unavailable(err.to_string())
        })?;
        Ok(Zone::new(zone.clone(), fields))
    }

    fn fetch_record(&self, zone: &Name, label: &str) -> Result<Record, StoreError> {
        let key = self.zone_key(zone);
        match self.store.field(&key, label) {
            Ok(Some(payload)) => Record::from_kv_json(&payload).map_err(|error| {
                warn!(
                    "data integrity: stored value for {} in {} is unusable: {}",
                    label, key, error
                );
                StoreError::Malformed {
                    zone: zone.clone(),
                    label: label.to_owned(),
                    error,
                }
            }),
            Ok(None) => Err(StoreError::NotFound {
                zone: zone.clone(),
                label: label.to_owned(),
            }),
            Err(err) => {
                warn!("failed to get {} from {}: {}", label, key, err);
                Err(StoreError::Unavailable(err.to_string()))
            }
        }
    }
}
