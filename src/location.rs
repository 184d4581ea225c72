// SPDX-License-Identifier: AGPL-3.0-only

//! Mapping query names to the location keys records are stored under.
//!
//! Locations are the owner names of a zone written relative to its origin (`zaibon`, `*.wild`).
//! The apex is stored under [`APEX`].
//!
//! [`resolve`] implements wildcard synthesis in the manner of
//! [RFC 4592](https://tools.ietf.org/html/rfc4592) against a flat set of keys rather than a tree.
//! For a query with no exact match, labels are stripped from the left one at a time; each
//! remainder is a candidate closest encloser and `*.` followed by it is the matching source of
//! synthesis. The first candidate that exists decides the answer: the wildcard below it if there is
//! one, otherwise no match at all. A broader wildcard further up is never consulted.
//!
//! A candidate exists if it is a key itself or if any key ends with it. The second test is a plain
//! string suffix comparison, so it also holds for keys deeper in the branch (and for keys that
//! merely share trailing characters).

use name::{labels_to_key, Name};
use zone::Zone;

/// The location key of the zone apex.
pub const APEX: &str = "@";

/// Splits off the leftmost label of `key`, returning the closest encloser candidate and its source
/// of synthesis. The last label yields `("", "*")`; the empty key yields nothing.
fn split_key(key: &str) -> Option<(&str, String)> {
    if key.is_empty() {
        return None;
    }
    Some(match key.find('.') {
        Some(pos) => {
            let closest_encloser = &key[pos + 1..];
            (closest_encloser, format!("*.{}", closest_encloser))
        }
        None => ("", "*".to_owned()),
    })
}

/// Returns the key of `query` relative to `origin`, `Some("")` at the apex.
fn relative_key(query: &Name, origin: &Name) -> Option<String> {
    query.relative_to(origin).map(labels_to_key)
}

/// Finds the location to answer `query` from in `zone`, using wildcard synthesis.
pub fn resolve(query: &Name, zone: &Zone) -> Option<String> {
    let key = relative_key(query, zone.name())?;
    if key.is_empty() {
        return Some(APEX.to_owned());
    }
    if zone.contains(&key) {
        trace!("{} matched location {}", query, key);
        return Some(key);
    }

    let mut candidate = key.as_str();
    while let Some((closest_encloser, source_of_synthesis)) = split_key(candidate) {
        if zone.contains(closest_encloser) || zone.has_suffix(closest_encloser) {
            return if zone.contains(&source_of_synthesis) {
                trace!("{} synthesized from {}", query, source_of_synthesis);
                Some(source_of_synthesis)
            } else {
                trace!(
                    "{} has closest encloser {:?} but no wildcard",
                    query,
                    closest_encloser
                );
                None
            };
        }
        candidate = closest_encloser;
    }
    None
}

/// Finds the location for `query` in a zone that has no index: the apex, or any name exactly two
/// labels below the origin (`zaibon.tf3bot`), which is assumed to exist.
pub fn resolve_direct(query: &Name, origin: &Name) -> Option<String> {
    let relative = query.relative_to(origin)?;
    match relative.len() {
        0 => Some(APEX.to_owned()),
        2 => Some(labels_to_key(relative)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use location::{resolve, resolve_direct, split_key, APEX};
    use name::Name;
    use zone::Zone;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn zone(locations: &[&str]) -> Zone {
        Zone::new(
            name("grid.tf."),
            locations.iter().map(|l| l.to_string()),
        )
    }

    #[test]
    fn split() {
        assert_eq!(split_key("a.b.c"), Some(("b.c", "*.b.c".to_owned())));
        assert_eq!(split_key("c"), Some(("", "*".to_owned())));
        assert_eq!(split_key(""), None);
    }

    #[test]
    fn apex() {
        let empty: &[&str] = &[];
        for locations in &[empty, &["zaibon"][..], &["*"][..]] {
            assert_eq!(
                resolve(&name("grid.tf."), &zone(locations)),
                Some(APEX.to_owned())
            );
        }
    }

    #[test]
    fn exact() {
        let zone = zone(&["zaibon", "a.b.c", "*.wild", "x.y"]);
        for key in zone.locations() {
            let query = name(&format!("{}.grid.tf.", key));
            assert_eq!(resolve(&query, &zone), Some(key.to_owned()));
        }
    }

    #[test]
    fn exact_is_case_insensitive() {
        assert_eq!(
            resolve(&name("ZAIBON.grid.tf"), &zone(&["zaibon"])),
            Some("zaibon".to_owned())
        );
    }

    #[test]
    fn wildcard() {
        let zone = zone(&["zaibon", "*.wild"]);
        assert_eq!(
            resolve(&name("sub.wild.grid.tf."), &zone),
            Some("*.wild".to_owned())
        );
        assert_eq!(
            resolve(&name("a.b.wild.grid.tf."), &zone),
            Some("*.wild".to_owned())
        );
        assert_eq!(resolve(&name("nomatch.grid.tf."), &zone), None);
    }

    #[test]
    fn apex_wildcard() {
        let zone = zone(&["zaibon", "*"]);
        assert_eq!(resolve(&name("nomatch.grid.tf."), &zone), Some("*".to_owned()));
        assert_eq!(resolve(&name("a.b.grid.tf."), &zone), Some("*".to_owned()));
    }

    #[test]
    fn existing_encloser_blocks_broader_wildcard() {
        // host.sub exists, so sub is the closest encloser of x.sub and the apex wildcard must
        // not be used.
        let zone = zone(&["*", "host.sub"]);
        assert_eq!(resolve(&name("x.sub.grid.tf."), &zone), None);
        assert_eq!(
            resolve(&name("x.other.grid.tf."), &zone),
            Some("*".to_owned())
        );
    }

    #[test]
    fn deeper_wildcard_branch() {
        // nothing is stored at b.c itself, only below it
        let zone = zone(&["*.b.c", "a.b.c"]);
        assert_eq!(
            resolve(&name("x.b.c.grid.tf."), &zone),
            Some("*.b.c".to_owned())
        );
        assert_eq!(resolve(&name("x.y.c.grid.tf."), &zone), None);
    }

    #[test]
    fn suffix_match_is_not_label_aligned() {
        // "xwild" ends with "wild", so wild counts as an existing closest encloser and the
        // apex wildcard is not reached
        let zone = zone(&["xwild", "*"]);
        assert_eq!(resolve(&name("host.wild.grid.tf."), &zone), None);
        assert_eq!(
            resolve(&name("host.other.grid.tf."), &zone),
            Some("*".to_owned())
        );
    }

    #[test]
    fn empty_zone() {
        assert_eq!(resolve(&name("zaibon.grid.tf."), &zone(&[])), None);
        assert_eq!(resolve(&name("a.b.grid.tf."), &zone(&[])), None);
    }

    #[test]
    fn outside_zone() {
        let zone = zone(&["zaibon", "*"]);
        assert_eq!(resolve(&name("zaibon.grid.be."), &zone), None);
        assert_eq!(resolve(&name("tf."), &zone), None);
    }

    #[test]
    fn direct() {
        let origin = name("grid.tf.");
        assert_eq!(
            resolve_direct(&name("zaibon.tf3bot.grid.tf."), &origin),
            Some("zaibon.tf3bot".to_owned())
        );
        assert_eq!(
            resolve_direct(&name("grid.tf."), &origin),
            Some(APEX.to_owned())
        );
        assert_eq!(resolve_direct(&name("zaibon.grid.tf."), &origin), None);
        assert_eq!(resolve_direct(&name("a.zaibon.tf3bot.grid.tf."), &origin), None);
        assert_eq!(resolve_direct(&name("zaibon.tf3bot.grid.be."), &origin), None);
    }
}
