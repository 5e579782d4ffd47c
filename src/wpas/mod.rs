//! wpa_supplicant control client (C2): request/response on a locked socket,
//! unsolicited events on a second socket with auto-reattaching per-interface
//! readers, and a typed command surface for STATION/BSS/P2P/WPS operations.

mod client;
pub mod events;
mod net_params;
mod parse;
mod reader;
mod sock;

pub use client::{ConnectOptions, StaEntry, WpaSupplicant};
pub use events::{Event, EventHandler};
pub use parse::{parse_dict, parse_kv_line, parse_table};
