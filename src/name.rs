// SPDX-License-Identifier: AGPL-3.0-only

//! Domain names and labels.

// Name::from_str always lowercases labels. Names built from iterators keep whatever case they were
// given, so PartialEq / Eq / Hash are written in a case-insensitive manner.

use bytes::Bytes;
use idna::uts46;
use std::fmt;
use std::hash;
use std::iter::FromIterator;
use std::ops::Deref;
use std::str::FromStr;

/// The longest a name may be on the wire, length octets included.
const MAX_NAME_LEN: usize = 255;

/// Errors that can occur while parsing a `Name`.
#[derive(Debug, Fail)]
pub enum NameParseError {
    /// The label is empty.
    #[fail(display = "empty label")]
    EmptyLabel,
    /// The label contains invalid characters according to UTS #46.
    #[fail(display = "label contains invalid characters: {:?}", _0)]
    InvalidLabel(uts46::Errors),
    /// The label is longer than 63 characters.
    #[fail(display = "label exceeds maximum length of 63: {}", _0)]
    LabelTooLong(usize),
    /// The encoded name is longer than 255 octets.
    #[fail(display = "name exceeds maximum length of 255: {}", _0)]
    NameTooLong(usize),
}

/// Validates and constructs a label from a string, normalizing it to lowercase ASCII. Non-ASCII
/// labels are converted to Punycode according to UTS #46. A lone `*` is accepted so wildcard
/// owners can be named.
fn label_from_str(s: &str) -> Result<Bytes, NameParseError> {
    fn byte_ok(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'-'
    }

    if s.is_empty() {
        return Err(NameParseError::EmptyLabel);
    }
    let label = if s == "*" || s.bytes().all(byte_ok)
        || (s.starts_with('_') && s.bytes().skip(1).all(byte_ok))
    {
        s.to_ascii_lowercase()
    } else {
        uts46::to_ascii(
            s,
            uts46::Flags {
                use_std3_ascii_rules: true,
                transitional_processing: true,
                verify_dns_length: true,
            },
        ).map_err(NameParseError::InvalidLabel)?
    };
    if label.len() > 63 {
        Err(NameParseError::LabelTooLong(label.len()))
    } else {
        Ok(Bytes::from(label))
    }
}

/// A fully-qualified domain name.
///
/// A name is stored as its labels from leftmost to rightmost; the root is the empty name. Every
/// `Name` is absolute, so `www.grid.tf` and `www.grid.tf.` parse to the same value and both
/// display as `www.grid.tf.`.
///
/// ```
/// use threebot::name::Name;
/// use std::str::FromStr;
///
/// let name = Name::from(vec!["ZAIBON".into(), "GRID".into(), "TF".into()]);
/// assert_eq!(name, Name::from_str("zaibon.grid.tf.").unwrap());
/// assert_eq!(name.to_string(), "ZAIBON.GRID.TF.");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Name(Vec<Bytes>);

impl Name {
    /// Returns a cloned name, skipping the first label.
    pub fn pop(&self) -> Name {
        Name(self.0.iter().skip(1).cloned().collect())
    }

    /// Returns `true` for the root name.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the labels of `self` that precede `origin`, or `None` if `self` is not within
    /// `origin`. The apex of `origin` yields an empty slice.
    pub fn relative_to(&self, origin: &Name) -> Option<&[Bytes]> {
        let split = self.0.len().checked_sub(origin.0.len())?;
        let (relative, tail) = self.0.split_at(split);
        if eq_labels(tail, &origin.0) {
            Some(relative)
        } else {
            None
        }
    }
}

/// Builds a name from a host string stored upstream, keeping its labels as given. Unlike
/// `from_str` no UTS #46 or STD3 rules are applied, so names like `my_host.grid.tf` are accepted.
/// `.` is the root; the empty string or an empty label yields `None`.
pub fn from_host(host: &str) -> Option<Name> {
    if host == "." {
        return Some(Name::default());
    }
    let relative = if host.ends_with('.') {
        &host[..host.len() - 1]
    } else {
        host
    };
    if relative.is_empty() || relative.split('.').any(str::is_empty) {
        return None;
    }
    Some(
        relative
            .split('.')
            .map(|label| Bytes::from(label.as_bytes()))
            .collect(),
    )
}

/// Joins labels into the dotted, lowercase key form used by zone indexes (`sub.wild`).
pub fn labels_to_key(labels: &[Bytes]) -> String {
    let mut key = String::new();
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            key.push('.');
        }
        key.push_str(&String::from_utf8_lossy(label).to_ascii_lowercase());
    }
    key
}

fn eq_lower(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a.eq_ignore_ascii_case(b))
}

fn eq_labels(a: &[Bytes], b: &[Bytes]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| eq_lower(a, b))
}

impl PartialEq for Name {
    fn eq(&self, rhs: &Name) -> bool {
        eq_labels(&self.0, &rhs.0)
    }
}

impl Eq for Name {}

impl hash::Hash for Name {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for label in &self.0 {
            label.to_ascii_lowercase().as_slice().hash(state);
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, ".");
        }
        for label in &self.0 {
            write!(f, "{}.", String::from_utf8_lossy(label))?;
        }
        Ok(())
    }
}

impl Deref for Name {
    type Target = [Bytes];

    fn deref(&self) -> &[Bytes] {
        self.0.deref()
    }
}

impl From<Vec<Bytes>> for Name {
    fn from(v: Vec<Bytes>) -> Name {
        Name(v)
    }
}

impl FromIterator<Bytes> for Name {
    fn from_iter<T: IntoIterator<Item = Bytes>>(iter: T) -> Name {
        Name(iter.into_iter().collect())
    }
}

impl FromStr for Name {
    type Err = NameParseError;

    fn from_str(s: &str) -> Result<Name, NameParseError> {
        if s.is_empty() || s == "." {
            return Ok(Name::default());
        }
        let relative = if s.ends_with('.') {
            &s[..s.len() - 1]
        } else {
            s
        };
        let labels = relative
            .split('.')
            .map(label_from_str)
            .collect::<Result<Vec<_>, _>>()?;
        let len = labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1;
        if len > MAX_NAME_LEN {
            return Err(NameParseError::NameTooLong(len));
        }
        Ok(Name(labels))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::str::FromStr;

    use name::{from_host, labels_to_key, Name};

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    #[test]
    fn display() {
        for s in &["grid.tf.", "tld.", "xn--n3h.net.", "_sip._udp.grid.tf.", "*.wild.grid.tf."] {
            assert_eq!(name(s).to_string(), s.to_owned());
        }
        assert_eq!(Name::default().to_string(), ".");
    }

    #[test]
    fn trailing_dot_optional() {
        assert_eq!(name("zaibon.grid.tf"), name("zaibon.grid.tf."));
    }

    #[test]
    fn lowercases() {
        assert_eq!(name("ZAIBON.Grid.TF.").to_string(), "zaibon.grid.tf.");
    }

    #[test]
    fn case_insensitive_hash() {
        let mut set = HashSet::new();
        set.insert(name("grid.tf"));
        assert!(set.contains(&Name::from(vec![Bytes::from("GRID"), Bytes::from("Tf")])));
    }

    #[test]
    fn punycode() {
        assert_eq!(name("☃.net").to_string(), "xn--n3h.net.");
    }

    #[test]
    fn pop() {
        assert_eq!(name("www.grid.tf").pop(), name("grid.tf"));
        assert!(name("tf").pop().is_root());
    }

    #[test]
    fn empty_label() {
        assert!(Name::from_str("grid..tf").is_err());
    }

    #[test]
    fn root() {
        assert!(name("").is_root());
        assert!(name(".").is_root());
    }

    #[test]
    fn too_long() {
        assert!(
            Name::from_str("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.tf")
                .is_err()
        );
        let long = vec!["a".repeat(60); 5].join(".");
        assert!(Name::from_str(&long).is_err());
    }

    #[test]
    fn relative_to() {
        let zone = name("grid.tf.");
        assert_eq!(
            labels_to_key(name("sub.wild.grid.tf").relative_to(&zone).unwrap()),
            "sub.wild"
        );
        assert_eq!(name("grid.tf").relative_to(&zone).map(|l| l.len()), Some(0));
        assert!(name("grid.be").relative_to(&zone).is_none());
        assert!(name("tf").relative_to(&zone).is_none());
        assert!(name("notgrid.tf").relative_to(&zone).is_none());
    }

    #[test]
    fn host_names_are_lenient() {
        assert_eq!(
            from_host("my_host.Grid.tf").map(|n| n.to_string()),
            Some("my_host.Grid.tf.".to_owned())
        );
        assert_eq!(from_host("3bot.zaibon.be."), Some(name("3bot.zaibon.be")));
        assert_eq!(from_host("."), Some(Name::default()));
        assert_eq!(from_host(""), None);
        assert_eq!(from_host("bad..name"), None);
    }

    #[test]
    fn key_is_lowercase() {
        let query = Name::from(vec![
            Bytes::from("Zaibon"),
            Bytes::from("grid"),
            Bytes::from("tf"),
        ]);
        assert_eq!(
            labels_to_key(query.relative_to(&name("grid.tf")).unwrap()),
            "zaibon"
        );
    }
}
