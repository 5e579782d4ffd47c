//! This dialect's domain-name compression table.
//!
//! Unlike general RFC 1035 compression (a 14-bit pointer into the whole
//! message), wpa_supplicant hex-encodes ANQP frames with no frame-relative
//! offsets to compute pointers from. Instead there is a small fixed table of
//! two-byte back-reference tokens bound to specific label suffixes, plus one
//! dynamic slot at `0xC0 0x27` that PTR rdata binds to the enclosing
//! ANQPData's name.

use crate::dnssd::domain::DomainName;

const PREFIX: u8 = 0xc0;

/// A suffix/token pair in compression order: longest, most specific first.
type Entry = (&'static [&'static str], [u8; 2]);

const STATIC_TABLE: &[Entry] = &[
    (&["_tcp", "local"], [PREFIX, 0x0c]),
    (&["_udp", "local"], [PREFIX, 0x1c]),
    (&["local"], [PREFIX, 0x11]),
];

const DYNAMIC_TOKEN: [u8; 2] = [PREFIX, 0x27];

/// Maps back-reference tokens to label suffixes for one encode/decode pass.
///
/// The dynamic slot, once bound via [`Compressor::with_reference`], is fixed
/// for the lifetime of this compressor — callers must not rebind it mid-name.
#[derive(Debug, Clone)]
pub struct Compressor {
    dynamic: Option<Vec<String>>,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor {
    /// A compressor with only the static table bound.
    pub fn new() -> Self {
        Compressor { dynamic: None }
    }

    /// A compressor whose dynamic `0xC0 0x27` slot is bound to `reference`'s
    /// labels, used when encoding/decoding PTR rdata against the enclosing
    /// ANQPData name.
    pub fn with_reference(reference: &DomainName) -> Self {
        Compressor {
            dynamic: Some(reference.labels().to_vec()),
        }
    }

    /// Returns the first matching compression token for the labels starting
    /// at `suffix`, if any matches the static table or the dynamic slot.
    pub fn compress(&self, suffix: &[String]) -> Option<[u8; 2]> {
        for (table_suffix, token) in STATIC_TABLE {
            if labels_match(suffix, table_suffix) {
                return Some(*token);
            }
        }
        if let Some(dyn_ref) = &self.dynamic {
            if labels_match(suffix, dyn_ref) {
                return Some(DYNAMIC_TOKEN);
            }
        }
        None
    }

    /// Resolves a back-reference token to its bound labels.
    pub fn decompress(&self, token: [u8; 2]) -> Option<Vec<String>> {
        if token == DYNAMIC_TOKEN {
            return self.dynamic.clone();
        }
        STATIC_TABLE
            .iter()
            .find(|(_, t)| *t == token)
            .map(|(suffix, _)| suffix.iter().map(|s| s.to_string()).collect())
    }

    /// The compression prefix byte (`0xC0`); a label byte equal to this marks
    /// the start of a two-byte back-reference token instead of a length.
    pub fn prefix() -> u8 {
        PREFIX
    }
}

fn labels_match(a: &[String], b: &[&str]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_table_round_trips() {
        let c = Compressor::new();
        let labels: Vec<String> = vec!["local".into()];
        let token = c.compress(&labels).expect("local should compress");
        assert_eq!(token, [0xc0, 0x11]);
        assert_eq!(c.decompress(token).unwrap(), vec!["local".to_string()]);
    }

    #[test]
    fn tcp_local_and_udp_local_tokens() {
        let c = Compressor::new();
        assert_eq!(
            c.compress(&["_tcp".to_string(), "local".to_string()]),
            Some([0xc0, 0x0c])
        );
        assert_eq!(
            c.compress(&["_udp".to_string(), "local".to_string()]),
            Some([0xc0, 0x1c])
        );
    }

    #[test]
    fn dynamic_slot_binds_to_reference() {
        let reference = DomainName::from_str("_spinet._tcp.local.").unwrap();
        let c = Compressor::with_reference(&reference);
        let token = c
            .compress(&["_spinet".to_string(), "_tcp".to_string(), "local".to_string()])
            .expect("dynamic slot should match the bound reference");
        assert_eq!(token, [0xc0, 0x27]);
    }

    #[test]
    fn no_match_returns_none() {
        let c = Compressor::new();
        assert_eq!(c.compress(&["example".to_string(), "com".to_string()]), None);
    }
}
