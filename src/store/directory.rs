// SPDX-License-Identifier: AGPL-3.0-only

//! Records looked up from 3bot explorers.
//!
//! Explorers are redundant HTTP endpoints publishing the same directory. They hold no zone index,
//! so a name is located directly from its shape (see `location::resolve_direct`) and looked up with
//! `GET {explorer}/explorer/whois/3bot/{label}`. Explorers are tried in order until one answers.

use failure;
use reqwest;

use location;
use name::Name;
use record::{Record, DEFAULT_DIRECTORY_TTL};
use store::{EndpointError, RecordStore, StoreError};
use zone::Zone;

const WHOIS_PATH: &str = "/explorer/whois/3bot/";

/// The parts of an HTTP response the directory backend looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Performs HTTP GET requests.
pub trait HttpClient: Send + Sync {
    fn fetch(&self, url: &str) -> Result<HttpResponse, failure::Error>;
}

/// Requests time out according to how the client was built.
impl HttpClient for reqwest::blocking::Client {
    fn fetch(&self, url: &str) -> Result<HttpResponse, failure::Error> {
        let response = self.get(url).send()?;
        let status = response.status().as_u16();
        Ok(HttpResponse {
            status,
            body: response.bytes()?.to_vec(),
        })
    }
}

#[derive(Debug)]
pub struct DirectoryBackend<C> {
    client: C,
    explorers: Vec<String>,
    record_ttl: u32,
}

impl<C: HttpClient> DirectoryBackend<C> {
    /// Creates a backend querying `explorers` in the given order. Trailing slashes are removed from
    /// the base URLs.
    pub fn new<I>(client: C, explorers: I) -> DirectoryBackend<C>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        DirectoryBackend {
            client,
            explorers: explorers
                .into_iter()
                .map(|e| e.as_ref().trim_end_matches('/').to_owned())
                .collect(),
            record_ttl: DEFAULT_DIRECTORY_TTL,
        }
    }

    /// Sets the TTL given to every address returned by an explorer.
    pub fn with_record_ttl(mut self, ttl: u32) -> DirectoryBackend<C> {
        self.record_ttl = ttl;
        self
    }

    pub fn explorers(&self) -> &[String] {
        &self.explorers
    }
}

impl<C: HttpClient> RecordStore for DirectoryBackend<C> {
    fn load_zone(&self, zone: &Name) -> Result<Zone, StoreError> {
        Ok(Zone::new(zone.clone(), Vec::new()))
    }

    fn fetch_record(&self, _zone: &Name, label: &str) -> Result<Record, StoreError> {
        let mut record = Record::default();
        let mut attempts = Vec::new();
        for explorer in &self.explorers {
            let url = format!("{}{}{}", explorer, WHOIS_PATH, label);
            debug!("GET {}", url);

            let response = match self.client.fetch(&url) {
                Ok(response) => response,
                Err(err) => {
                    let attempt = EndpointError::Request {
                        endpoint: explorer.clone(),
                        reason: err.to_string(),
                    };
                    warn!("skipping explorer {}", attempt);
                    attempts.push(attempt);
                    continue;
                }
            };
            if response.status != 200 {
                let attempt = EndpointError::Status {
                    endpoint: explorer.clone(),
                    status: response.status,
                };
                debug!("skipping explorer {}", attempt);
                attempts.push(attempt);
                continue;
            }

            match Record::from_directory_json(&response.body, self.record_ttl) {
                Ok(found) => {
                    if found.is_empty() {
                        attempts.push(EndpointError::NoAddresses {
                            endpoint: explorer.clone(),
                        });
                    }
                    record.merge(found);
                    break;
                }
                Err(err) => {
                    let attempt = EndpointError::Malformed {
                        endpoint: explorer.clone(),
                        reason: err.to_string(),
                    };
                    warn!("skipping explorer {}", attempt);
                    attempts.push(attempt);
                }
            }
        }
        if record.is_empty() {
            return Err(StoreError::EndpointsExhausted {
                label: label.to_owned(),
                attempts,
            });
        }
        Ok(record)
    }

    fn locate(&self, query: &Name, zone: &Zone) -> Option<String> {
        location::resolve_direct(query, zone.name())
    }
}
