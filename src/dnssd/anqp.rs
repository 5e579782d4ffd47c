//! ANQPData descriptor, the ANQP query/response envelope, and their rdata.
//!
//! Framing note: the query/response envelope header (`length`, `proto`,
//! `tid`, `code`) is little-endian throughout; `ANQPData`'s own
//! `<type><version>` trailer is also encoded little-endian, for consistency
//! with the rest of the envelope (see DESIGN.md for the resolved framing
//! decision).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::CodecError;

use super::compressor::Compressor;
use super::domain::DomainName;
use super::rdata::{PtrData, TxtData};

const PROTO: u8 = 1;
const VERSION: u8 = 1;

static TID_COUNTER: AtomicU8 = AtomicU8::new(1);

fn next_tid() -> u8 {
    TID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// The two ANQP/DNS-SD record types this dialect carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Ptr,
    Txt,
}

impl RecordType {
    const TYPE_PTR: u16 = 12;
    const TYPE_TXT: u16 = 16;

    fn to_u16(self) -> u16 {
        match self {
            RecordType::Ptr => Self::TYPE_PTR,
            RecordType::Txt => Self::TYPE_TXT,
        }
    }

    fn from_u16(v: u16) -> Result<Self, CodecError> {
        match v {
            Self::TYPE_PTR => Ok(RecordType::Ptr),
            Self::TYPE_TXT => Ok(RecordType::Txt),
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

/// Decoded rdata, tagged by the ANQPData's record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    Ptr(PtrData),
    Txt(TxtData),
}

impl RData {
    pub fn encode(&self, compressor: &Compressor, buffer: &mut Vec<u8>) -> Result<usize, CodecError> {
        match self {
            RData::Ptr(p) => p.encode(compressor, buffer),
            RData::Txt(t) => t.encode(buffer),
        }
    }
}

/// A service-type descriptor: `(name, type)` plus a constant version byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnqpData {
    pub name: DomainName,
    pub type_: RecordType,
}

impl AnqpData {
    pub fn new(name: DomainName, type_: RecordType) -> Self {
        AnqpData { name, type_ }
    }

    /// `<name><type:u16 LE><version:u8=1>`.
    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<usize, CodecError> {
        let compressor = Compressor::new();
        let n = self.name.encode(&compressor, buffer)?;
        buffer
            .write_u16::<LittleEndian>(self.type_.to_u16())
            .map_err(|_| CodecError::TruncatedInput)?;
        buffer.push(VERSION);
        Ok(n + 3)
    }

    pub fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let compressor = Compressor::new();
        let name = DomainName::decode(cursor, &compressor)?;
        let type_raw = cursor.read_u16::<LittleEndian>().map_err(|_| CodecError::TruncatedInput)?;
        let version = cursor.read_u8().map_err(|_| CodecError::TruncatedInput)?;
        if version != VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let type_ = RecordType::from_u16(type_raw)?;
        Ok(AnqpData { name, type_ })
    }

    /// A compressor whose dynamic slot is bound to this descriptor's name,
    /// used for encoding/decoding the PTR rdata that follows it.
    fn rdata_compressor(&self) -> Compressor {
        Compressor::with_reference(&self.name)
    }

    /// Decodes the rdata that follows this descriptor, dispatching on
    /// `type_` (PTR uses a name-bound compressor, TXT never does).
    pub fn parse_rdata(&self, cursor: &mut Cursor<&[u8]>) -> Result<RData, CodecError> {
        match self.type_ {
            RecordType::Ptr => {
                let compressor = self.rdata_compressor();
                Ok(RData::Ptr(PtrData::decode(cursor, &compressor)?))
            }
            RecordType::Txt => Ok(RData::Txt(TxtData::decode(cursor)?)),
        }
    }

    /// Encodes `rdata` (which must match this descriptor's `type_`) into
    /// `buffer`, using a compressor bound to this descriptor's name for PTR.
    pub fn encode_rdata(&self, rdata: &RData, buffer: &mut Vec<u8>) -> Result<usize, CodecError> {
        let compressor = self.rdata_compressor();
        rdata.encode(&compressor, buffer)
    }
}

/// `<length:u16 LE><proto:u8=1><tid:u8><ANQPData>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnqpQuery {
    pub data: AnqpData,
    pub tid: u8,
}

impl AnqpQuery {
    pub fn new(data: AnqpData) -> Self {
        AnqpQuery { data, tid: next_tid() }
    }

    pub fn with_tid(data: AnqpData, tid: u8) -> Self {
        AnqpQuery { data, tid }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut data_bytes = Vec::new();
        self.data.encode(&mut data_bytes)?;

        let mut out = Vec::with_capacity(4 + data_bytes.len());
        let length = (2 + data_bytes.len()) as u16;
        out.write_u16::<LittleEndian>(length).unwrap();
        out.push(PROTO);
        out.push(self.tid);
        out.extend_from_slice(&data_bytes);
        Ok(out)
    }

    pub fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(buffer);
        let _length = cursor.read_u16::<LittleEndian>().map_err(|_| CodecError::TruncatedInput)?;
        let proto = cursor.read_u8().map_err(|_| CodecError::TruncatedInput)?;
        if proto != PROTO {
            return Err(CodecError::UnsupportedProtocol(proto));
        }
        let tid = cursor.read_u8().map_err(|_| CodecError::TruncatedInput)?;
        let data = AnqpData::decode(&mut cursor)?;
        Ok(AnqpQuery { data, tid })
    }
}

/// Response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    ProtoUnavailable,
    InfoUnavailable,
    BadRequest,
}

impl ResponseCode {
    fn to_u8(self) -> u8 {
        match self {
            ResponseCode::Success => 0,
            ResponseCode::ProtoUnavailable => 1,
            ResponseCode::InfoUnavailable => 2,
            ResponseCode::BadRequest => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => ResponseCode::Success,
            1 => ResponseCode::ProtoUnavailable,
            2 => ResponseCode::InfoUnavailable,
            _ => ResponseCode::BadRequest,
        }
    }
}

/// `<length:u16 LE><proto:u8=1><tid:u8><code:u8>[<ANQPData><rdata>]`.
///
/// Only `code == Success` carries `data`/`rdata`; a non-success response
/// encodes to exactly 5 bytes (length=3, proto, tid, code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnqpResponse {
    pub code: ResponseCode,
    pub data: Option<AnqpData>,
    pub rdata: Option<RData>,
    pub tid: u8,
}

impl AnqpResponse {
    pub fn success(data: AnqpData, rdata: RData) -> Self {
        AnqpResponse {
            code: ResponseCode::Success,
            data: Some(data),
            rdata: Some(rdata),
            tid: next_tid(),
        }
    }

    pub fn failure(code: ResponseCode) -> Self {
        assert_ne!(code, ResponseCode::Success, "use AnqpResponse::success for SUCCESS");
        AnqpResponse {
            code,
            data: None,
            rdata: None,
            tid: next_tid(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut data_bytes = Vec::new();
        let mut rdata_bytes = Vec::new();

        if let (Some(data), Some(rdata)) = (&self.data, &self.rdata) {
            data.encode(&mut data_bytes)?;
            data.encode_rdata(rdata, &mut rdata_bytes)?;
        }

        let mut out = Vec::with_capacity(5 + data_bytes.len() + rdata_bytes.len());
        let length = (3 + data_bytes.len() + rdata_bytes.len()) as u16;
        out.write_u16::<LittleEndian>(length).unwrap();
        out.push(PROTO);
        out.push(self.tid);
        out.push(self.code.to_u8());
        out.extend_from_slice(&data_bytes);
        out.extend_from_slice(&rdata_bytes);
        Ok(out)
    }

    pub fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(buffer);
        let _length = cursor.read_u16::<LittleEndian>().map_err(|_| CodecError::TruncatedInput)?;
        let proto = cursor.read_u8().map_err(|_| CodecError::TruncatedInput)?;
        if proto != PROTO {
            return Err(CodecError::UnsupportedProtocol(proto));
        }
        let tid = cursor.read_u8().map_err(|_| CodecError::TruncatedInput)?;
        let code_raw = cursor.read_u8().map_err(|_| CodecError::TruncatedInput)?;
        let code = ResponseCode::from_u8(code_raw);

        if code == ResponseCode::Success {
            let data = AnqpData::decode(&mut cursor)?;
            let rdata = data.parse_rdata(&mut cursor)?;
            Ok(AnqpResponse {
                code,
                data: Some(data),
                rdata: Some(rdata),
                tid,
            })
        } else {
            Ok(AnqpResponse {
                code,
                data: None,
                rdata: None,
                tid,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptr_advertisement() -> (AnqpData, RData) {
        let type_name = DomainName::from_str("_spinet._tcp.local.").unwrap();
        let data = AnqpData::new(type_name, RecordType::Ptr);
        let instance = DomainName::from_str("host._spinet._tcp.local.").unwrap();
        (data, RData::Ptr(PtrData(instance)))
    }

    #[test]
    fn query_round_trips() {
        let (data, _rdata) = ptr_advertisement();
        let q = AnqpQuery::with_tid(data, 42);
        let bytes = q.encode().unwrap();
        let decoded = AnqpQuery::decode(&bytes).unwrap();
        assert_eq!(decoded, q);
    }

    #[test]
    fn response_round_trips_with_ptr_rdata() {
        let (data, rdata) = ptr_advertisement();
        let r = AnqpResponse {
            code: ResponseCode::Success,
            data: Some(data),
            rdata: Some(rdata),
            tid: 7,
        };
        let bytes = r.encode().unwrap();
        let decoded = AnqpResponse::decode(&bytes).unwrap();
        assert_eq!(decoded, r);
    }

    #[test]
    fn non_success_response_is_exactly_five_bytes() {
        let r = AnqpResponse::failure(ResponseCode::BadRequest);
        let bytes = r.encode().unwrap();
        assert_eq!(bytes.len(), 5);
        assert_eq!(bytes[0], 3);
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[2], PROTO);
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut buf = Vec::new();
        let compressor = Compressor::new();
        DomainName::from_str("local.").unwrap().encode(&compressor, &mut buf).unwrap();
        buf.write_u16::<LittleEndian>(RecordType::Ptr.to_u16() as u16).unwrap();
        buf.push(2); // bad version

        let mut cursor = Cursor::new(buf.as_slice());
        let err = AnqpData::decode(&mut cursor).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedVersion(2)));
    }

    #[test]
    fn pdu_advertisement_hex_contains_expected_tokens() {
        // Scenario 1: encode a PTR advertisement for "_spinet._tcp.local."
        let type_name = DomainName::from_str("_spinet._tcp.local.").unwrap();
        let data = AnqpData::new(type_name.clone(), RecordType::Ptr);
        let instance = DomainName::from_str("host._spinet._tcp.local.").unwrap();

        let mut data_bytes = Vec::new();
        data.encode(&mut data_bytes).unwrap();

        let mut rdata_bytes = Vec::new();
        data.encode_rdata(&RData::Ptr(PtrData(instance)), &mut rdata_bytes)
            .unwrap();

        // rdata: "host" label then a C0 27 back-reference
        assert_eq!(rdata_bytes[0], 4);
        assert_eq!(&rdata_bytes[1..5], b"host");
        assert_eq!(&rdata_bytes[5..7], &[0xc0, 0x27]);

        // ANQPData trailer: type PTR (12) LE, version 1
        let trailer = &data_bytes[data_bytes.len() - 3..];
        assert_eq!(trailer, &[0x0c, 0x00, 0x01]);
    }
}
