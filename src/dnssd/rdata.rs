//! PTR and TXT record data (the variable part of an ANQP/DNS-SD response).

use byteorder::ReadBytesExt;
use std::io::Cursor;

use crate::error::CodecError;

use super::compressor::Compressor;
use super::domain::DomainName;

/// A PTR record's rdata: the instance name a service-type PTR points to.
/// Always encoded/decoded with a compressor bound to the enclosing
/// ANQPData's name so its dynamic back-reference slot resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtrData(pub DomainName);

impl PtrData {
    pub fn encode(&self, compressor: &Compressor, buffer: &mut Vec<u8>) -> Result<usize, CodecError> {
        self.0.encode(compressor, buffer)
    }

    pub fn decode(cursor: &mut Cursor<&[u8]>, compressor: &Compressor) -> Result<Self, CodecError> {
        Ok(PtrData(DomainName::decode(cursor, compressor)?))
    }
}

/// A TXT record's rdata: an ordered `key=value` mapping. Insertion order is
/// preserved on the wire (and after decoding).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxtData {
    attrs: Vec<(String, String)>,
}

impl TxtData {
    pub fn new() -> Self {
        TxtData { attrs: Vec::new() }
    }

    pub fn from_pairs(attrs: Vec<(String, String)>) -> Self {
        TxtData { attrs }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encodes as `<len:u8>key=value` entries; an empty set is the single
    /// byte `0x00`.
    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<usize, CodecError> {
        if self.attrs.is_empty() {
            buffer.push(0);
            return Ok(1);
        }

        let mut written = 0usize;
        for (k, v) in &self.attrs {
            let entry = format!("{}={}", k, v);
            let bytes = entry.as_bytes();
            if bytes.len() > 255 {
                return Err(CodecError::LabelTooLong(bytes.len()));
            }
            buffer.push(bytes.len() as u8);
            buffer.extend_from_slice(bytes);
            written += 1 + bytes.len();
        }
        Ok(written)
    }

    /// Decodes entries until the buffer is exhausted. Accepts but does not
    /// require a terminating zero-length entry.
    pub fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let mut attrs = Vec::new();
        let total = cursor.get_ref().len() as u64;

        while cursor.position() < total {
            let len = cursor.read_u8().map_err(|_| CodecError::TruncatedInput)?;
            if len == 0 {
                break;
            }

            let len = len as usize;
            let mut buf = vec![0u8; len];
            for byte in buf.iter_mut() {
                *byte = cursor.read_u8().map_err(|_| CodecError::TruncatedInput)?;
            }
            let entry = String::from_utf8(buf)
                .map_err(|e| CodecError::MalformedName(e.to_string()))?;
            let (k, v) = entry
                .split_once('=')
                .ok_or_else(|| CodecError::MalformedName(format!("TXT entry without '=': {}", entry)))?;
            attrs.push((k.to_string(), v.to_string()));
        }

        Ok(TxtData { attrs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_txt_encodes_to_single_zero_byte() {
        let txt = TxtData::new();
        let mut buf = Vec::new();
        txt.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0u8]);
    }

    #[test]
    fn round_trip_preserves_insertion_order() {
        let mut txt = TxtData::new();
        txt.insert("uri", " https://[2001:db8::1]:10000/");
        txt.insert("a", "b");

        let mut buf = Vec::new();
        txt.encode(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf.as_slice());
        let decoded = TxtData::decode(&mut cursor).unwrap();
        assert_eq!(decoded.attrs, txt.attrs);
    }

    #[test]
    fn ptr_round_trips_with_dynamic_reference() {
        let reference = DomainName::from_str("_spinet._tcp.local.").unwrap();
        let compressor = Compressor::with_reference(&reference);
        let ptr = PtrData(DomainName::from_str("host._spinet._tcp.local.").unwrap());

        let mut buf = Vec::new();
        ptr.encode(&compressor, &mut buf).unwrap();

        let mut cursor = Cursor::new(buf.as_slice());
        let decoded = PtrData::decode(&mut cursor, &compressor).unwrap();
        assert_eq!(decoded, ptr);
    }
}
