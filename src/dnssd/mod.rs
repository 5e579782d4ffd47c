//! ANQP-tunneled DNS-SD codec (C1): domain names with this dialect's custom
//! compression, PTR/TXT record data, and the ANQP query/response envelope.
//!
//! This is a binary-exact codec: every encode/decode pair round-trips, and
//! every wire layout matches the bytes wpa_supplicant's P2P Service Discovery
//! commands (`P2P_SERVICE_ADD`, `P2P_SERV_DISC_REQ`) exchange as hex.

mod anqp;
mod compressor;
mod domain;
mod hex;
mod rdata;

pub use anqp::{AnqpData, AnqpQuery, AnqpResponse, ResponseCode, RecordType};
pub use compressor::Compressor;
pub use domain::DomainName;
pub use hex::{from_hex, to_hex};
pub use rdata::{PtrData, TxtData};
