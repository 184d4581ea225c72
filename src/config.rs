// SPDX-License-Identifier: AGPL-3.0-only

//! Resolver configuration.

use reqwest;
use std::str::FromStr;
use std::time::Duration;

use name::Name;
use record::DEFAULT_DIRECTORY_TTL;
use store::{DirectoryBackend, KvBackend, RecordStore, RedisStore};

/// How often zone indexes are rebuilt from the store.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

/// Timeout for a single store or explorer request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Fail, PartialEq)]
pub enum ConfigError {
    #[fail(display = "invalid zone {:?}: {}", zone, reason)]
    InvalidZone { zone: String, reason: String },
    #[fail(display = "the directory backend needs at least one zone")]
    NoZones,
    #[fail(display = "the directory backend needs at least one explorer")]
    NoExplorers,
    #[fail(display = "the key/value backend needs a store address")]
    NoStoreAddress,
    #[fail(display = "explorers and a store address are both configured")]
    AmbiguousBackend,
    #[fail(display = "neither explorers nor a store address are configured")]
    NoBackend,
    #[fail(display = "failed to set up backend: {}", _0)]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KvConfig {
    /// `redis://` URL or `host:port`.
    pub address: String,
    pub credential: Option<String>,
    pub key_prefix: String,
    pub key_suffix: String,
    pub timeout: Duration,
}

impl KvConfig {
    pub fn new(address: &str) -> KvConfig {
        KvConfig {
            address: address.to_owned(),
            credential: None,
            key_prefix: String::new(),
            key_suffix: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryConfig {
    /// Explorer base URLs, tried in order.
    pub explorers: Vec<String>,
    pub record_ttl: u32,
    pub timeout: Duration,
}

impl DirectoryConfig {
    pub fn new(explorers: Vec<String>) -> DirectoryConfig {
        DirectoryConfig {
            explorers,
            record_ttl: DEFAULT_DIRECTORY_TTL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Where records come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Kv(KvConfig),
    Directory(DirectoryConfig),
}

impl Backend {
    /// Picks the backend from the surface settings: explorers select the directory backend, a
    /// store address the key/value backend. Exactly one of them must be given.
    pub fn select(
        explorers: Vec<String>,
        address: Option<String>,
        credential: Option<String>,
    ) -> Result<Backend, ConfigError> {
        match (explorers.is_empty(), address) {
            (false, Some(_)) => Err(ConfigError::AmbiguousBackend),
            (false, None) => Ok(Backend::Directory(DirectoryConfig::new(explorers))),
            (true, Some(address)) => Ok(Backend::Kv(KvConfig {
                credential,
                ..KvConfig::new(&address)
            })),
            (true, None) => Err(ConfigError::NoBackend),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Zones to serve. With the key/value backend, an empty list means every zone in the store.
    pub zones: Vec<String>,
    /// TTL ceiling for answers, 0 for none.
    pub ttl: u32,
    pub refresh_interval: Duration,
    pub backend: Backend,
}

impl Config {
    pub fn new(backend: Backend) -> Config {
        Config {
            zones: Vec::new(),
            ttl: 0,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            backend,
        }
    }

    /// Validates the configuration, making zone names lowercase and fully qualified and removing
    /// trailing slashes from explorer URLs.
    pub fn normalize(mut self) -> Result<Config, ConfigError> {
        self.zones = self.zone_names()?
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        match self.backend {
            Backend::Kv(ref kv) => {
                if kv.address.trim().is_empty() {
                    return Err(ConfigError::NoStoreAddress);
                }
            }
            Backend::Directory(ref mut directory) => {
                directory.explorers = directory
                    .explorers
                    .iter()
                    .map(|e| e.trim_end_matches('/').to_owned())
                    .filter(|e| !e.is_empty())
                    .collect();
                if directory.explorers.is_empty() {
                    return Err(ConfigError::NoExplorers);
                }
                if self.zones.is_empty() {
                    return Err(ConfigError::NoZones);
                }
            }
        }
        Ok(self)
    }

    /// Parses the configured zones.
    pub fn zone_names(&self) -> Result<Vec<Name>, ConfigError> {
        self.zones
            .iter()
            .map(|zone| {
                Name::from_str(zone).map_err(|err| ConfigError::InvalidZone {
                    zone: zone.clone(),
                    reason: err.to_string(),
                })
            }).collect()
    }

    /// Constructs the record store for the configured backend. No connection is made until the
    /// store is first used.
    pub fn build_store(&self) -> Result<Box<dyn RecordStore>, ConfigError> {
        let store: Box<dyn RecordStore> = match self.backend {
            Backend::Kv(ref kv) => {
                let store = RedisStore::open(
                    &kv.address,
                    kv.credential.as_ref().map(String::as_str),
                    kv.timeout,
                ).map_err(|err| ConfigError::Backend(err.to_string()))?;
                Box::new(KvBackend::new(store).with_key_affixes(&kv.key_prefix, &kv.key_suffix))
            }
            Backend::Directory(ref directory) => {
                let client = reqwest::blocking::Client::builder()
                    .timeout(directory.timeout)
                    .build()
                    .map_err(|err| ConfigError::Backend(err.to_string()))?;
                Box::new(
                    DirectoryBackend::new(client, &directory.explorers)
                        .with_record_ttl(directory.record_ttl),
                )
            }
        };
        Ok(store)
    }
}
