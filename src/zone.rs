// SPDX-License-Identifier: AGPL-3.0-only

//! Zone label indexes and the cache that keeps them fresh.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use name::Name;
use store::RecordStore;

/// The set of label keys known to exist in a zone.
///
/// A zone index only answers existence questions during location resolution. Record payloads are
/// fetched separately for every query.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    name: Name,
    locations: HashSet<String>,
}

impl Zone {
    /// Creates a zone index. Empty keys are discarded.
    pub fn new(name: Name, locations: impl IntoIterator<Item = String>) -> Zone {
        Zone {
            name,
            locations: locations.into_iter().filter(|l| !l.is_empty()).collect(),
        }
    }

    /// The origin of the zone.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns `true` if `key` is exactly a known location.
    pub fn contains(&self, key: &str) -> bool {
        self.locations.contains(key)
    }

    /// Returns `true` if any known location ends with `suffix`.
    ///
    /// This is a plain string comparison, not a label-aligned one, and the empty suffix matches
    /// any non-empty zone.
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.locations.iter().any(|l| l.ends_with(suffix))
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.locations.iter().map(|l| l.as_str())
    }
}

/// Errors returned when a zone index cannot be produced for a query.
#[derive(Debug, Fail, PartialEq)]
pub enum ZoneError {
    /// The zone is neither configured nor discovered.
    #[fail(display = "zone {} is not served", _0)]
    NotServed(Name),
    /// The zone is served but its index could not be loaded from the store.
    #[fail(display = "zone {} could not be loaded", _0)]
    Unavailable(Name),
}

#[derive(Debug, Default)]
struct Snapshot {
    names: Vec<Name>,
    zones: HashMap<Name, Arc<Zone>>,
    /// Number of failed loads per zone since it last loaded successfully.
    failures: HashMap<Name, u64>,
    refreshed_at: Option<Instant>,
}

/// Holds the zone indexes for every served zone and rebuilds them wholesale once they are older
/// than the refresh interval.
///
/// Staleness is checked lazily when a query asks for a zone; the refresh runs on the querying
/// thread. Concurrent stale queries are coalesced: only the first to take the refresh lock reloads
/// the store, the others re-check staleness once they get the lock and go on with the new
/// snapshot. Retries of a zone that failed to load are coalesced the same way: a query that waited
/// for the lock while another query's retry failed gives up without calling the store.
///
/// When no zones are configured, the zone names themselves are discovered from the store on
/// every refresh.
#[derive(Debug)]
pub struct ZoneCache {
    configured: Vec<Name>,
    refresh_interval: Duration,
    snapshot: RwLock<Snapshot>,
    refresh_lock: Mutex<()>,
}

impl ZoneCache {
    pub fn new(configured: Vec<Name>, refresh_interval: Duration) -> ZoneCache {
        ZoneCache {
            configured,
            refresh_interval,
            snapshot: RwLock::new(Snapshot::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// The zone names served at the last refresh.
    pub fn names(&self) -> Vec<Name> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names
            .clone()
    }

    fn is_stale(&self, now: Instant) -> bool {
        match self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refreshed_at
        {
            Some(at) => now.saturating_duration_since(at) > self.refresh_interval,
            None => true,
        }
    }

    /// Refreshes the cache if it is due. Returns `true` if this call performed the refresh.
    pub fn refresh_if_due(&self, store: &dyn RecordStore, now: Instant) -> bool {
        if !self.is_stale(now) {
            return false;
        }
        let _guard = self.refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.is_stale(now) {
            trace!("zone refresh already done by a concurrent query");
            return false;
        }
        self.refresh(store, now);
        true
    }

    /// Rebuilds every zone index from the store. Zones that fail to load are left out of the new
    /// snapshot and retried on demand.
    fn refresh(&self, store: &dyn RecordStore, now: Instant) {
        let names = if self.configured.is_empty() {
            match store.list_zones() {
                Ok(names) => names,
                Err(err) => {
                    warn!("zone discovery failed, keeping previous zone list: {}", err);
                    self.names()
                }
            }
        } else {
            self.configured.clone()
        };

        let mut failures = self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .failures
            .clone();
        failures.retain(|name, _| names.contains(name));
        let mut zones = HashMap::with_capacity(names.len());
        for name in &names {
            match store.load_zone(name) {
                Ok(zone) => {
                    debug!("loaded zone {} with {} locations", name, zone.len());
                    failures.remove(name);
                    zones.insert(name.clone(), Arc::new(zone));
                }
                Err(err) => {
                    warn!("failed to load zone {}: {}", name, err);
                    *failures.entry(name.clone()).or_insert(0) += 1;
                }
            }
        }
        info!("refreshed {} of {} zones", zones.len(), names.len());

        *self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Snapshot {
            names,
            zones,
            failures,
            refreshed_at: Some(now),
        };
    }

    /// Returns the index for `zone`, refreshing the whole cache first if it is due.
    ///
    /// A served zone whose index failed to load at the last refresh is retried here, so a store
    /// outage only fails the queries that arrive while it lasts.
    pub fn get_or_refresh(
        &self,
        store: &dyn RecordStore,
        zone: &Name,
        now: Instant,
    ) -> Result<Arc<Zone>, ZoneError> {
        self.refresh_if_due(store, now);
        let seen_failures = {
            let snapshot = self.snapshot
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = snapshot.zones.get(zone) {
                return Ok(index.clone());
            }
            if !snapshot.names.contains(zone) {
                return Err(ZoneError::NotServed(zone.clone()));
            }
            snapshot.failures.get(zone).cloned().unwrap_or(0)
        };
        self.reload(store, zone, seen_failures)
    }

    /// Loads a single zone. `seen_failures` is the failure count observed before waiting for the
    /// lock; if it has grown since, the retry that just failed stands for this one too.
    fn reload(
        &self,
        store: &dyn RecordStore,
        zone: &Name,
        seen_failures: u64,
    ) -> Result<Arc<Zone>, ZoneError> {
        let _guard = self.refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        {
            let snapshot = self.snapshot
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = snapshot.zones.get(zone) {
                return Ok(index.clone());
            }
            if snapshot.failures.get(zone).cloned().unwrap_or(0) > seen_failures {
                debug!("zone {} failed to load while waiting, not retrying", zone);
                return Err(ZoneError::Unavailable(zone.clone()));
            }
        }
        let result = store.load_zone(zone);
        let mut snapshot = self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(index) => {
                let index = Arc::new(index);
                snapshot.failures.remove(zone);
                snapshot.zones.insert(zone.clone(), index.clone());
                Ok(index)
            }
            Err(err) => {
                warn!("failed to load zone {}: {}", zone, err);
                *snapshot.failures.entry(zone.clone()).or_insert(0) += 1;
                Err(ZoneError::Unavailable(zone.clone()))
            }
        }
    }

    /// Finds the served zone that most closely encloses `name`.
    pub fn find_zone(&self, store: &dyn RecordStore, name: &Name, now: Instant) -> Option<Name> {
        self.refresh_if_due(store, now);
        let names = self.names();
        let mut name = name.clone();
        while !name.is_root() {
            if names.contains(&name) {
                return Some(name);
            }
            name = name.pop();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};

    use name::Name;
    use record::Record;
    use store::{RecordStore, StoreError};
    use zone::{Zone, ZoneCache, ZoneError};

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    #[derive(Default)]
    struct CountingStore {
        loads: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    impl RecordStore for CountingStore {
        fn list_zones(&self) -> Result<Vec<Name>, StoreError> {
            Ok(vec![name("grid.tf."), name("sub.grid.tf.")])
        }

        fn load_zone(&self, zone: &Name) -> Result<Zone, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".to_owned()));
            }
            Ok(Zone::new(zone.clone(), vec!["zaibon".to_owned()]))
        }

        fn fetch_record(&self, _zone: &Name, _label: &str) -> Result<Record, StoreError> {
            Ok(Record::default())
        }
    }

    #[test]
    fn zone_drops_empty_keys() {
        let zone = Zone::new(
            name("grid.tf"),
            vec!["".to_owned(), "zaibon".to_owned(), "*.wild".to_owned()],
        );
        assert_eq!(zone.len(), 2);
        assert!(!zone.contains(""));
        assert!(zone.contains("*.wild"));
    }

    #[test]
    fn suffix_is_not_label_aligned() {
        let zone = Zone::new(name("grid.tf"), vec!["xwild".to_owned()]);
        assert!(zone.has_suffix("wild"));
        assert!(zone.has_suffix(""));
        assert!(!Zone::new(name("grid.tf"), Vec::new()).has_suffix(""));
    }

    #[test]
    fn refresh_only_when_due() {
        let store = CountingStore::default();
        let cache = ZoneCache::new(vec![name("grid.tf")], Duration::from_secs(60));
        let start = Instant::now();

        assert!(cache.get_or_refresh(&store, &name("grid.tf"), start).is_ok());
        assert!(cache.get_or_refresh(&store, &name("grid.tf"), start + Duration::from_secs(30)).is_ok());
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        cache
            .get_or_refresh(&store, &name("grid.tf"), start + Duration::from_secs(61))
            .unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unknown_zone_not_served() {
        let store = CountingStore::default();
        let cache = ZoneCache::new(vec![name("grid.tf")], Duration::from_secs(60));
        assert_eq!(
            cache.get_or_refresh(&store, &name("example.org"), Instant::now()),
            Err(ZoneError::NotServed(name("example.org")))
        );
    }

    #[test]
    fn failed_zone_retried_on_demand() {
        let store = CountingStore::default();
        store.failing.store(true, Ordering::SeqCst);
        let cache = ZoneCache::new(vec![name("grid.tf")], Duration::from_secs(60));
        let now = Instant::now();

        // the refresh and the on-demand retry both fail
        assert_eq!(
            cache.get_or_refresh(&store, &name("grid.tf"), now),
            Err(ZoneError::Unavailable(name("grid.tf")))
        );
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);

        store.failing.store(false, Ordering::SeqCst);
        let zone = cache.get_or_refresh(&store, &name("grid.tf"), now).unwrap();
        assert!(zone.contains("zaibon"));
        assert_eq!(store.loads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn discovers_zones_when_none_configured() {
        let store = CountingStore::default();
        let cache = ZoneCache::new(Vec::new(), Duration::from_secs(60));
        let now = Instant::now();
        assert_eq!(
            cache.find_zone(&store, &name("a.b.sub.grid.tf"), now),
            Some(name("sub.grid.tf"))
        );
        assert_eq!(
            cache.find_zone(&store, &name("zaibon.grid.tf"), now),
            Some(name("grid.tf"))
        );
        assert_eq!(cache.find_zone(&store, &name("grid.be"), now), None);
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_refresh_is_coalesced() {
        let store = Arc::new(CountingStore::default());
        let cache = Arc::new(ZoneCache::new(
            vec![name("grid.tf")],
            Duration::from_secs(60),
        ));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let cache = cache.clone();
                thread::spawn(move || {
                    cache
                        .get_or_refresh(&*store, &name("grid.tf"), now)
                        .unwrap()
                })
            }).collect();
        for handle in handles {
            assert!(handle.join().unwrap().contains("zaibon"));
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_failed_retries_are_coalesced() {
        let store = Arc::new(CountingStore {
            delay: Duration::from_millis(200),
            ..CountingStore::default()
        });
        store.failing.store(true, Ordering::SeqCst);
        let cache = Arc::new(ZoneCache::new(
            vec![name("grid.tf")],
            Duration::from_secs(60),
        ));
        let now = Instant::now();
        let start = Arc::new(Barrier::new(5));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let store = store.clone();
                let cache = cache.clone();
                let start = start.clone();
                thread::spawn(move || {
                    start.wait();
                    cache.get_or_refresh(&*store, &name("grid.tf"), now)
                })
            }).collect();
        for handle in handles {
            assert_eq!(
                handle.join().unwrap(),
                Err(ZoneError::Unavailable(name("grid.tf")))
            );
        }
        // the refresh and one retry
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);

        // a later query still retries
        store.failing.store(false, Ordering::SeqCst);
        assert!(cache.get_or_refresh(&*store, &name("grid.tf"), now).is_ok());
        assert_eq!(store.loads.load(Ordering::SeqCst), 3);
    }
}
