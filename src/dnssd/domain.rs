//! Domain names: `<len:u8><label>` pairs terminated by `0x00`, with this
//! dialect's back-reference compression (see [`super::compressor`]).

use byteorder::ReadBytesExt;
use std::fmt;
use std::io::Cursor;

use crate::error::CodecError;

use super::compressor::Compressor;

const MAX_LABEL_LEN: usize = 63;

/// An ordered sequence of ASCII labels (e.g. `["_spinet", "_tcp", "local"]`
/// for `_spinet._tcp.local.`). Equality is label-by-label case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct DomainName {
    labels: Vec<String>,
}

impl DomainName {
    /// Builds a name from a `.`-separated string, dropping a trailing empty
    /// component (so both `"local"` and `"local."` are accepted).
    pub fn from_str(value: &str) -> Result<Self, CodecError> {
        let mut labels: Vec<&str> = value.split('.').collect();
        if labels.last() == Some(&"") {
            labels.pop();
        }
        for l in &labels {
            if l.len() > MAX_LABEL_LEN {
                return Err(CodecError::LabelTooLong(l.len()));
            }
        }
        Ok(DomainName {
            labels: labels.into_iter().map(String::from).collect(),
        })
    }

    /// Builds a name directly from already-split labels.
    pub fn from_labels(labels: Vec<String>) -> Self {
        DomainName { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Dotted string representation with a trailing `.`.
    pub fn as_str(&self) -> String {
        let mut s = self.labels.join(".");
        s.push('.');
        s
    }

    /// Encodes this name using `compressor` for back-reference lookups.
    ///
    /// Walks labels left to right; at each suffix position asks the
    /// compressor for a matching token. On a match the token is emitted and
    /// encoding terminates; otherwise one `<len><label>` pair is emitted and
    /// the walk continues. Terminates with `0x00` if no suffix ever matches.
    pub fn encode(
        &self,
        compressor: &Compressor,
        buffer: &mut Vec<u8>,
    ) -> Result<usize, CodecError> {
        let mut written = 0usize;

        for i in 0..self.labels.len() {
            if let Some(token) = compressor.compress(&self.labels[i..]) {
                buffer.extend_from_slice(&token);
                return Ok(written + token.len());
            }

            let label = self.labels[i].as_bytes();
            if label.len() > MAX_LABEL_LEN {
                return Err(CodecError::LabelTooLong(label.len()));
            }
            buffer.push(label.len() as u8);
            buffer.extend_from_slice(label);
            written += 1 + label.len();
        }

        buffer.push(0);
        Ok(written + 1)
    }

    /// Decodes a name from `cursor`, resolving any back-reference token
    /// against `compressor`.
    pub fn decode(
        cursor: &mut Cursor<&[u8]>,
        compressor: &Compressor,
    ) -> Result<Self, CodecError> {
        let mut labels: Vec<String> = Vec::new();

        loop {
            let len = cursor
                .read_u8()
                .map_err(|_| CodecError::TruncatedInput)?;

            if len == 0 {
                break;
            }

            if len == Compressor::prefix() {
                let second = cursor
                    .read_u8()
                    .map_err(|_| CodecError::TruncatedInput)?;
                let token = [len, second];
                let mut suffix = compressor.decompress(token).ok_or_else(|| {
                    CodecError::MalformedName(format!(
                        "unresolvable back-reference token {:02x}{:02x}",
                        token[0], token[1]
                    ))
                })?;
                labels.append(&mut suffix);
                break;
            }

            let len = len as usize;
            let mut buf = vec![0u8; len];
            for byte in buf.iter_mut() {
                *byte = cursor.read_u8().map_err(|_| CodecError::TruncatedInput)?;
            }
            let label = String::from_utf8(buf)
                .map_err(|e| CodecError::MalformedName(e.to_string()))?;
            labels.push(label);
        }

        Ok(DomainName { labels })
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(&other.labels)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for DomainName {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_without_compression() {
        let name = DomainName::from_str("example.com").unwrap();
        let mut buf = Vec::new();
        let c = Compressor::new();
        name.encode(&c, &mut buf).unwrap();
        assert_eq!(buf.last(), Some(&0u8));

        let mut cursor = Cursor::new(buf.as_slice());
        let decoded = DomainName::decode(&mut cursor, &c).unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn round_trip_with_static_compression() {
        let name = DomainName::from_str("local.").unwrap();
        let mut buf = Vec::new();
        let c = Compressor::new();
        name.encode(&c, &mut buf).unwrap();
        assert_eq!(buf, vec![0xc0, 0x11]);

        let mut cursor = Cursor::new(buf.as_slice());
        let decoded = DomainName::decode(&mut cursor, &c).unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn label_too_long_fails() {
        let long_label = "a".repeat(64);
        let err = DomainName::from_str(&long_label).unwrap_err();
        assert!(matches!(err, CodecError::LabelTooLong(64)));
    }

    #[test]
    fn truncated_input_fails() {
        let c = Compressor::new();
        let mut cursor = Cursor::new(&[0x03, 0x66, 0x6f][..]);
        let err = DomainName::decode(&mut cursor, &c).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedInput));
    }

    #[test]
    fn case_insensitive_equality() {
        let a = DomainName::from_str("Example.COM").unwrap();
        let b = DomainName::from_str("example.com").unwrap();
        assert_eq!(a, b);
    }
}
