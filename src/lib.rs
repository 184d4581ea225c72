// SPDX-License-Identifier: AGPL-3.0-only

//! threebot answers DNS queries for 3bot names.
//!
//! Records live outside the resolver, either as per-zone hashes in a key/value store or in the
//! directory published by 3bot explorers. A [`Resolver`](resolver/struct.Resolver.html) maps a
//! query to the location its records are stored under (synthesizing from wildcards where needed),
//! fetches and normalizes them, and builds the A, AAAA or CNAME answer. Wire handling is left to
//! the protocol layer embedding it.

#![cfg_attr(feature = "cargo-clippy", warn(clippy_pedantic))]
#![cfg_attr(feature = "cargo-clippy", allow(use_self, stutter))]

extern crate bytes;
#[macro_use]
extern crate failure;
extern crate idna;
#[macro_use]
extern crate log;
#[cfg(test)]
#[macro_use]
extern crate maplit;
extern crate redis;
extern crate reqwest;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;

pub mod answer;
pub mod config;
pub mod location;
pub mod name;
pub mod record;
pub mod resolver;
pub mod store;
pub mod zone;
