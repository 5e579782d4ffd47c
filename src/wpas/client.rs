//! The `WpaSupplicant` control client: connection lifecycle, the STATION/
//! BSS/network/P2P/WPS command surface, and TTL-cached identity properties.
//! Grounded on `wpas.py`'s `WPASupplicant`/`P2PWPASupplicant`/`WPSWPASupplicant`
//! for the command surface, and on the background-task-plus-shared-state
//! shape of a service client for how the concurrency is expressed in Rust.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

use super::events::EventBus;
use super::net_params::transform_for;
use super::parse::{parse_dict, parse_kv_line, parse_table};
use super::reader::{self, ReaderHandle};
use super::sock::RequestSocket;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_TTL: Duration = Duration::from_secs(5);

/// One row of a `STA`/`STA-NEXT` response: the peer's MAC address plus its
/// `key=value` attribute dump.
#[derive(Debug, Clone)]
pub struct StaEntry {
    pub address: String,
    pub fields: HashMap<String, String>,
}

/// Optional `P2P_CONNECT` modifiers beyond `(peer, method)`.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// `display` or `keypad`, selecting which side generated the PIN shown
    /// with the PIN provisioning method.
    pub pin_type: Option<String>,
    /// `None`: not persistent. `Some(None)`: persistent, new group id.
    /// `Some(Some(id))`: persistent, reuse network `id`.
    pub persistent: Option<Option<u32>>,
    pub join: bool,
    pub go_intent: Option<u8>,
    pub freq: Option<u32>,
    /// Let wpa_supplicant detect whether the peer is already a GO and join
    /// its group instead of running GO Negotiation.
    pub auto: bool,
    /// Hex-encoded Group SSID, used to disambiguate join targets that share
    /// a P2P Device/Interface address across multiple groups.
    pub ssid: Option<String>,
}

impl ConnectOptions {
    fn push_args(&self, args: &mut Vec<String>) {
        if let Some(pin_type) = &self.pin_type {
            args.push(pin_type.clone());
        }
        match self.persistent {
            Some(Some(id)) => args.push(format!("persistent={}", id)),
            Some(None) => args.push("persistent".into()),
            None => {}
        }
        if self.join {
            args.push("join".into());
        }
        if let Some(intent) = self.go_intent {
            args.push(format!("go_intent={}", intent));
        }
        if let Some(freq) = self.freq {
            args.push(format!("freq={}", freq));
        }
        if self.auto {
            args.push("auto".into());
        }
        if let Some(ssid) = &self.ssid {
            args.push(format!("ssid={}", ssid));
        }
    }
}

#[derive(Default)]
struct CachedValue {
    value: Option<String>,
    fetched_at: Option<Instant>,
}

impl CachedValue {
    fn get_or<'a>(&'a mut self, fresh: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
        let stale = match self.fetched_at {
            Some(t) => t.elapsed() > STATUS_TTL,
            None => true,
        };
        if stale {
            self.value = fresh.get(key).cloned();
            self.fetched_at = Some(Instant::now());
        }
        self.value.as_deref()
    }
}

#[derive(Default)]
struct IdentityCache {
    uuid: CachedValue,
    address: CachedValue,
    p2p_device_address: CachedValue,
}

/// A control connection to one wpa_supplicant interface, plus its
/// automatically-discovered `p2p-dev-*` companion interface.
pub struct WpaSupplicant {
    sock_dir: PathBuf,
    request: RequestSocket,
    bus: Arc<EventBus>,
    ifname: Mutex<Option<String>>,
    p2p_dev_ifname: Mutex<Option<String>>,
    readers: DashMap<String, ReaderHandle>,
    identity: Mutex<IdentityCache>,
}

impl WpaSupplicant {
    /// Constructs a client bound to `sock_dir` (wpa_supplicant's
    /// `ctrl_interface` directory), not yet attached to any interface.
    pub fn new(sock_dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        Ok(Arc::new(WpaSupplicant {
            sock_dir: sock_dir.into(),
            request: RequestSocket::new()?,
            bus: Arc::new(EventBus::new()),
            ifname: Mutex::new(None),
            p2p_dev_ifname: Mutex::new(None),
            readers: DashMap::new(),
            identity: Mutex::new(IdentityCache::default()),
        }))
    }

    /// The event bus handlers should be registered on before `start`.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Connects the request socket to `ifname`, spawns its event reader, and
    /// spawns a second reader for the `p2p-dev-<ifname>` companion interface
    /// if wpa_supplicant reports one.
    pub async fn start(self: &Arc<Self>, ifname: &str) -> Result<()> {
        self.request.connect(self.sock_dir.join(ifname)).await?;
        *self.ifname.lock().await = Some(ifname.to_string());

        let handle = reader::spawn(
            ifname.to_string(),
            self.sock_dir.clone(),
            self.bus.clone(),
            Arc::clone(self),
        );
        self.readers.insert(ifname.to_string(), handle);

        let companion = format!("p2p-dev-{}", ifname);
        if self.interfaces().await?.iter().any(|i| i == &companion) {
            let handle = reader::spawn(
                companion.clone(),
                self.sock_dir.clone(),
                self.bus.clone(),
                Arc::clone(self),
            );
            self.readers.insert(companion.clone(), handle);
            *self.p2p_dev_ifname.lock().await = Some(companion);
        }

        Ok(())
    }

    /// Interrupts and joins every reader task. Idempotent.
    pub async fn stop(&self) {
        let names: Vec<String> = self.readers.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((_, handle)) = self.readers.remove(&name) {
                handle.stop().await;
            }
        }
        *self.ifname.lock().await = None;
        *self.p2p_dev_ifname.lock().await = None;
    }

    pub async fn current_ifname(&self) -> Option<String> {
        self.ifname.lock().await.clone()
    }

    pub async fn p2p_dev_ifname(&self) -> Option<String> {
        self.p2p_dev_ifname.lock().await.clone()
    }

    /// Rebinds the request socket to `ifname` for the duration of `f`, then
    /// restores the previous binding.
    pub async fn with_interface<T, F, Fut>(&self, ifname: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.request.with_remote(self.sock_dir.join(ifname), f).await
    }

    async fn command(&self, cmd: &str) -> Result<String> {
        self.request.request(cmd, REQUEST_TIMEOUT).await
    }

    async fn command_ok(&self, cmd: &str) -> Result<()> {
        let resp = self.command(cmd).await?;
        if resp.trim() == "OK" {
            Ok(())
        } else {
            Err(Error::CommandFailed(resp))
        }
    }

    // ---- base control commands ----

    pub async fn ping(&self) -> Result<()> {
        let resp = self.command("PING").await?;
        if resp.trim() == "PONG" {
            Ok(())
        } else {
            Err(Error::CommandFailed(resp))
        }
    }

    pub async fn save_config(&self) -> Result<()> {
        self.command_ok("SAVE_CONFIG").await
    }

    pub async fn status(&self) -> Result<HashMap<String, String>> {
        parse_dict(&self.command("STATUS").await?)
    }

    pub async fn mib(&self) -> Result<HashMap<String, String>> {
        parse_dict(&self.command("MIB").await?)
    }

    pub async fn reassociate(&self) -> Result<()> {
        self.command_ok("REASSOCIATE").await
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.command_ok("RECONNECT").await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.command_ok("DISCONNECT").await
    }

    pub async fn reconfigure(&self) -> Result<()> {
        self.command_ok("RECONFIGURE").await
    }

    pub async fn scan(&self) -> Result<()> {
        self.command_ok("SCAN").await
    }

    pub async fn scan_results(&self) -> Result<(Vec<Vec<String>>, Vec<String>)> {
        Ok(parse_table(&self.command("SCAN_RESULTS").await?))
    }

    pub async fn bss(&self, id: &str) -> Result<HashMap<String, String>> {
        parse_dict(&self.command(&format!("BSS {}", id)).await?)
    }

    pub async fn list_networks(&self) -> Result<(Vec<Vec<String>>, Vec<String>)> {
        Ok(parse_table(&self.command("LIST_NETWORKS").await?))
    }

    pub async fn select_network(&self, id: u32) -> Result<()> {
        self.command_ok(&format!("SELECT_NETWORK {}", id)).await
    }

    pub async fn enable_network(&self, id: u32) -> Result<()> {
        self.command_ok(&format!("ENABLE_NETWORK {}", id)).await
    }

    pub async fn disable_network(&self, id: u32) -> Result<()> {
        self.command_ok(&format!("DISABLE_NETWORK {}", id)).await
    }

    pub async fn remove_network(&self, id: u32) -> Result<()> {
        self.command_ok(&format!("REMOVE_NETWORK {}", id)).await
    }

    /// `ADD_NETWORK` replies with the new network id as a bare integer.
    pub async fn add_network(&self) -> Result<u32> {
        let resp = self.command("ADD_NETWORK").await?;
        resp.trim()
            .parse()
            .map_err(|_| Error::ParseError(format!("unexpected ADD_NETWORK reply: {}", resp)))
    }

    /// Sets `key` on network `id`, applying the quoting [`net_params`]
    /// dictates for that key.
    pub async fn set_network(&self, id: u32, key: &str, value: &str) -> Result<()> {
        let transform = transform_for(key).ok_or_else(|| Error::UnsupportedParameter(key.into()))?;
        let encoded = transform.apply(value);
        self.command_ok(&format!("SET_NETWORK {} {} {}", id, key, encoded))
            .await
    }

    /// wpa_supplicant quotes string-valued replies; the outer quotes are
    /// stripped here.
    pub async fn get_network(&self, id: u32, key: &str) -> Result<String> {
        let resp = self.command(&format!("GET_NETWORK {} {}", id, key)).await?;
        Ok(strip_outer_quotes(resp.trim()).to_string())
    }

    /// Adds a network and applies every `(key, value)` pair from `config`.
    /// On the first failed `SET_NETWORK`, removes the partially-configured
    /// network before propagating the original error.
    pub async fn create_network(&self, config: &[(String, String)]) -> Result<u32> {
        let id = self.add_network().await?;
        for (key, value) in config {
            if let Err(e) = self.set_network(id, key, value).await {
                let _ = self.remove_network(id).await;
                return Err(e);
            }
        }
        Ok(id)
    }

    /// wpa_supplicant replies with one interface name per line; this client
    /// emits them in reverse of that order.
    pub async fn interfaces(&self) -> Result<Vec<String>> {
        let resp = self.command("INTERFACES").await?;
        let mut names: Vec<String> = resp.lines().map(str::to_string).filter(|l| !l.is_empty()).collect();
        names.reverse();
        Ok(names)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.command_ok(&format!("SET {} {}", key, value)).await
    }

    pub async fn dump(&self) -> Result<HashMap<String, String>> {
        parse_dict(&self.command("DUMP").await?)
    }

    /// One station's attributes, or `None` if `addr` is not associated.
    pub async fn sta(&self, addr: &str) -> Result<Option<StaEntry>> {
        let resp = self.command(&format!("STA {}", addr)).await?;
        if resp.trim() == "FAIL" {
            return Ok(None);
        }
        parse_sta_block(&resp).map(Some)
    }

    /// All currently associated stations, iterated via `STA-FIRST`/
    /// `STA-NEXT <addr>` until `FAIL`.
    pub async fn all_sta(&self) -> Result<Vec<StaEntry>> {
        let mut out = Vec::new();
        let mut resp = self.command("STA-FIRST").await?;
        loop {
            if resp.trim() == "FAIL" {
                break;
            }
            let entry = parse_sta_block(&resp)?;
            let next_addr = entry.address.clone();
            out.push(entry);
            resp = self.command(&format!("STA-NEXT {}", next_addr)).await?;
        }
        Ok(out)
    }

    // ---- identity (TTL-cached) ----

    async fn cached(&self, key: &str) -> Result<Option<String>> {
        let fresh = self.status().await?;
        let mut cache = self.identity.lock().await;
        let field = match key {
            "uuid" => &mut cache.uuid,
            "address" => &mut cache.address,
            "p2p_device_address" => &mut cache.p2p_device_address,
            _ => unreachable!(),
        };
        Ok(field.get_or(&fresh, key).map(str::to_string))
    }

    pub async fn uuid(&self) -> Result<Option<String>> {
        self.cached("uuid").await
    }

    pub async fn address(&self) -> Result<Option<String>> {
        self.cached("address").await
    }

    pub async fn p2p_device_address(&self) -> Result<Option<String>> {
        self.cached("p2p_device_address").await
    }

    // ---- WPS ----

    pub async fn wps_pbc(&self) -> Result<()> {
        self.command_ok("WPS_PBC").await
    }

    /// Requests a WPS PIN session, returning the PIN when `pin` is `None`
    /// (wpa_supplicant generates one) or echoing `pin` back otherwise.
    pub async fn wps_pin(&self, pin: Option<&str>) -> Result<String> {
        let cmd = match pin {
            Some(p) => format!("WPS_PIN any {}", p),
            None => "WPS_PIN any".to_string(),
        };
        let resp = self.command(&cmd).await?;
        if resp.trim() == "FAIL" {
            return Err(Error::CommandFailed(resp));
        }
        Ok(resp.trim().to_string())
    }

    // ---- P2P ----

    pub async fn p2p_find(&self, timeout: Option<Duration>) -> Result<()> {
        let cmd = match timeout {
            Some(t) => format!("P2P_FIND {}", t.as_secs()),
            None => "P2P_FIND".to_string(),
        };
        self.command_ok(&cmd).await
    }

    pub async fn p2p_stop_find(&self) -> Result<()> {
        self.command_ok("P2P_STOP_FIND").await
    }

    pub async fn p2p_flush(&self) -> Result<()> {
        self.command_ok("P2P_FLUSH").await
    }

    pub async fn p2p_peer(&self, addr: &str) -> Result<Option<HashMap<String, String>>> {
        let resp = self.command(&format!("P2P_PEER {}", addr)).await?;
        if resp.trim() == "FAIL" {
            return Ok(None);
        }
        parse_kv_line(&resp)
            .map(|m| Some(m.into_iter().map(|(k, v)| (k, v.unwrap_or_default())).collect()))
    }

    /// Every discovered peer, iterated via `P2P_PEER FIRST`/
    /// `P2P_PEER NEXT-<addr>` until `FAIL`.
    pub async fn p2p_peers(&self) -> Result<Vec<HashMap<String, String>>> {
        let mut out = Vec::new();
        let mut resp = self.command("P2P_PEER FIRST").await?;
        loop {
            if resp.trim() == "FAIL" {
                break;
            }
            let fields: HashMap<String, String> = parse_kv_line(&resp)?
                .into_iter()
                .map(|(k, v)| (k, v.unwrap_or_default()))
                .collect();
            let addr = fields
                .get("address")
                .cloned()
                .ok_or_else(|| Error::ParseError("P2P_PEER reply missing address".into()))?;
            out.push(fields);
            resp = self.command(&format!("P2P_PEER NEXT-{}", addr)).await?;
        }
        Ok(out)
    }

    pub async fn p2p_listen(&self, timeout: Option<Duration>) -> Result<()> {
        let cmd = match timeout {
            Some(t) => format!("P2P_LISTEN {}", t.as_secs()),
            None => "P2P_LISTEN".to_string(),
        };
        self.command_ok(&cmd).await
    }

    pub async fn p2p_group_remove(&self, ifname: &str) -> Result<()> {
        self.command_ok(&format!("P2P_GROUP_REMOVE {}", ifname)).await
    }

    pub async fn p2p_group_add(&self, persistent: Option<Option<u32>>) -> Result<()> {
        let cmd = match persistent {
            Some(Some(id)) => format!("P2P_GROUP_ADD persistent={}", id),
            Some(None) => "P2P_GROUP_ADD persistent".to_string(),
            None => "P2P_GROUP_ADD".to_string(),
        };
        self.command_ok(&cmd).await
    }

    pub async fn p2p_reject(&self, addr: &str) -> Result<()> {
        self.command_ok(&format!("P2P_REJECT {}", addr)).await
    }

    pub async fn p2p_invite(&self, group_ifname: &str, peer: &str) -> Result<()> {
        self.command_ok(&format!("P2P_INVITE group={} peer={}", group_ifname, peer))
            .await
    }

    /// `P2P_CONNECT <peer> <method> [modifiers...]`, `method` being one of
    /// `pbc`, `pin`, or a PIN/passphrase literal.
    pub async fn p2p_connect(&self, peer: &str, method: &str, opts: &ConnectOptions) -> Result<String> {
        let mut args = vec![peer.to_string(), method.to_string()];
        opts.push_args(&mut args);
        let resp = self.command(&format!("P2P_CONNECT {}", args.join(" "))).await?;
        if resp.trim() == "FAIL" {
            return Err(Error::CommandFailed(resp));
        }
        Ok(resp.trim().to_string())
    }

    pub async fn p2p_remove_client(&self, addr: &str) -> Result<()> {
        self.command_ok(&format!("P2P_REMOVE_CLIENT {}", addr)).await
    }

    pub async fn p2p_service_add(&self, kind: &str, spec_args: &str) -> Result<()> {
        self.command_ok(&format!("P2P_SERVICE_ADD {} {}", kind, spec_args)).await
    }

    pub async fn p2p_service_del(&self, kind: &str, spec_args: &str) -> Result<()> {
        self.command_ok(&format!("P2P_SERVICE_DEL {} {}", kind, spec_args)).await
    }

    pub async fn p2p_service_flush(&self) -> Result<()> {
        self.command_ok("P2P_SERVICE_FLUSH").await
    }

    pub async fn p2p_service_update(&self) -> Result<()> {
        self.command_ok("P2P_SERVICE_UPDATE").await
    }

    pub async fn p2p_serv_disc_req(&self, addr: &str, query_hex: &str) -> Result<String> {
        let resp = self
            .command(&format!("P2P_SERV_DISC_REQ {} {}", addr, query_hex))
            .await?;
        if resp.trim() == "FAIL" {
            return Err(Error::CommandFailed(resp));
        }
        Ok(resp.trim().to_string())
    }

    pub async fn p2p_serv_disc_cancel_req(&self, req_id: &str) -> Result<()> {
        self.command_ok(&format!("P2P_SERV_DISC_CANCEL_REQ {}", req_id)).await
    }
}

fn strip_outer_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_sta_block(resp: &str) -> Result<StaEntry> {
    let mut lines = resp.lines();
    let address = lines
        .next()
        .ok_or_else(|| Error::ParseError("empty STA reply".into()))?
        .trim()
        .to_string();
    let fields = parse_dict(lines.collect::<Vec<_>>().join("\n").as_str())?;
    Ok(StaEntry { address, fields })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_options_build_expected_tokens() {
        let mut args = Vec::new();
        let opts = ConnectOptions {
            pin_type: Some("display".into()),
            go_intent: Some(7),
            freq: Some(2412),
            persistent: Some(Some(3)),
            join: true,
            auto: true,
            ssid: Some("737069".into()),
        };
        opts.push_args(&mut args);
        assert_eq!(
            args,
            vec![
                "display",
                "persistent=3",
                "join",
                "go_intent=7",
                "freq=2412",
                "auto",
                "ssid=737069",
            ]
        );
    }

    #[test]
    fn parse_sta_block_splits_address_and_fields() {
        let entry = parse_sta_block("02:00:00:00:01:00\nflags=[AUTH][ASSOC]\naid=1").unwrap();
        assert_eq!(entry.address, "02:00:00:00:01:00");
        assert_eq!(entry.fields.get("aid").map(String::as_str), Some("1"));
    }

    #[test]
    fn strip_outer_quotes_unwraps_quoted_values() {
        assert_eq!(strip_outer_quotes("\"mynetwork\""), "mynetwork");
        assert_eq!(strip_outer_quotes("unquoted"), "unquoted");
    }
}
