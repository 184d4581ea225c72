// SPDX-License-Identifier: AGPL-3.0-only

#[macro_use]
extern crate clap;
extern crate env_logger;
extern crate failure;
#[macro_use]
extern crate log;
extern crate threebot;

use clap::{App, Arg, ArgMatches};
use env_logger::Builder;
use failure::ResultExt;
use log::LevelFilter;
use std::process;
use std::str::FromStr;
use std::time::Duration;

use threebot::answer::QueryType;
use threebot::config::{Backend, Config};
use threebot::name::Name;
use threebot::resolver::{QueryError, Resolver};

fn parse_type(s: &str) -> Result<u16, failure::Error> {
    for qtype in &[QueryType::A, QueryType::AAAA, QueryType::CNAME] {
        if qtype.to_string().eq_ignore_ascii_case(s) {
            return Ok(qtype.code());
        }
    }
    Ok(u16::from_str(s).context(format!("Unknown query type: {}", s))?)
}

fn values(matches: &ArgMatches, name: &str) -> Vec<String> {
    matches
        .values_of(name)
        .map(|v| v.map(String::from).collect())
        .unwrap_or_default()
}

fn config(matches: &ArgMatches) -> Result<Config, failure::Error> {
    let mut backend = Backend::select(
        values(matches, "explorer"),
        matches.value_of("redis").map(String::from),
        matches.value_of("redis-password").map(String::from),
    )?;
    if let Backend::Kv(ref mut kv) = backend {
        kv.key_prefix = matches.value_of("key-prefix").unwrap_or("").to_owned();
        kv.key_suffix = matches.value_of("key-suffix").unwrap_or("").to_owned();
    }

    let mut config = Config::new(backend);
    config.zones = values(matches, "zone");
    if matches.is_present("ttl") {
        config.ttl = value_t!(matches, "ttl", u32)?;
    }
    if matches.is_present("refresh-interval") {
        config.refresh_interval = Duration::from_secs(value_t!(matches, "refresh-interval", u64)?);
    }
    Ok(config)
}

fn exit_with(name: &Name, err: &QueryError) -> ! {
    error!("{}: {}", name, err);
    process::exit(i32::from(err.rcode()))
}

fn main() -> Result<(), failure::Error> {
    let matches = App::new("threebot-lookup")
        .version(crate_version!())
        .about("Resolves one name against a Redis store or 3bot explorers")
        .arg(Arg::with_name("NAME").required(true).help("Name to look up"))
        .arg(
            Arg::with_name("TYPE")
                .default_value("A")
                .help("Query type: A, AAAA, CNAME or a numeric QTYPE"),
        ).arg(
            Arg::with_name("zone")
                .short("z")
                .long("zone")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Zone to serve (default: every zone in the Redis store)"),
        ).arg(
            Arg::with_name("explorer")
                .short("e")
                .long("explorer")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Explorer base URL, tried in the order given"),
        ).arg(
            Arg::with_name("redis")
                .short("r")
                .long("redis")
                .takes_value(true)
                .help("Redis address, host:port or redis:// URL"),
        ).arg(
            Arg::with_name("redis-password")
                .long("redis-password")
                .takes_value(true)
                .requires("redis"),
        ).arg(
            Arg::with_name("key-prefix")
                .long("key-prefix")
                .takes_value(true)
                .requires("redis"),
        ).arg(
            Arg::with_name("key-suffix")
                .long("key-suffix")
                .takes_value(true)
                .requires("redis"),
        ).arg(
            Arg::with_name("ttl")
                .short("t")
                .long("ttl")
                .takes_value(true)
                .help("TTL ceiling for answers, 0 for none"),
        ).arg(
            Arg::with_name("refresh-interval")
                .long("refresh-interval")
                .takes_value(true)
                .help("Seconds between zone index refreshes (default 600)"),
        ).arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Sets verbosity level (max: 3)"),
        ).get_matches();

    {
        let level = matches.occurrences_of("verbose");
        let mut builder = Builder::new();
        if level >= 3 {
            builder.filter_level(LevelFilter::Trace)
        } else {
            let level = match level {
                0 => LevelFilter::Info,
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            };
            builder
                .filter_module("threebot", level)
                .filter_module("threebot_lookup", level)
        };
        builder.init();
    }

    let name_str = matches.value_of("NAME").unwrap_or("");
    let name = Name::from_str(name_str).context(format!("Could not parse NAME: {}", name_str))?;
    let qtype = parse_type(matches.value_of("TYPE").unwrap_or("A"))?;

    let resolver = Resolver::new(config(&matches)?).context("Invalid configuration")?;
    let zone = match resolver.find_zone(&name) {
        Some(zone) => zone,
        None => exit_with(&name, &QueryError::NameNotFound),
    };
    debug!("{} is in zone {}", name, zone);

    match resolver.resolve_query(&name, qtype, &zone) {
        Ok(answer) => {
            if answer.answers.is_empty() {
                info!("{}: no records of the requested type", name);
            }
            for record in answer.answers.iter().chain(&answer.extras) {
                println!("{}", record);
            }
            Ok(())
        }
        Err(err) => exit_with(&name, &err),
    }
}
