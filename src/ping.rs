//! C3: per-interface IPv6 multicast ICMPv6 neighbor pinger. Runs on a
//! dedicated OS thread per interface, driven by a blocking raw
//! socket with a computed receive timeout rather than an async reactor,
//! grounded on `examples/original_source/spinet/cms/ping.py`'s
//! `IPv6McastPinger` for the schedule and on `hdds-team-hdds`'s
//! `transport/mobility/pktinfo.rs` for the raw-socket/`if_nametoindex` FFI
//! pattern.

use std::collections::HashMap;
use std::ffi::CString;
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::{Error, Result};

const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// `<type=128 Echo Request><code=0><checksum=0><id=0><seq=0>`, no payload.
/// The kernel fills in the ICMPv6 checksum for `IPPROTO_ICMPV6` raw sockets.
const ECHO_REQUEST: [u8; 8] = [128, 0, 0, 0, 0, 0, 0, 0];

const MIN_POLL: Duration = Duration::from_millis(10);

/// `ping_interval`/`purge_interval`/`lifetime` default to 1s/1s/5s.
#[derive(Debug, Clone)]
pub struct PingerConfig {
    pub ping_interval: Duration,
    pub purge_interval: Duration,
    pub lifetime: Duration,
}

impl Default for PingerConfig {
    fn default() -> Self {
        PingerConfig {
            ping_interval: Duration::from_secs(1),
            purge_interval: Duration::from_secs(1),
            lifetime: Duration::from_secs(5),
        }
    }
}

/// Called with `(addr, true)` on first sighting and `(addr, false)` on
/// eviction. Invoked from the pinger's background thread.
pub type ChangeHandler = dyn Fn(Ipv6Addr, bool) + Send + Sync;

/// A running per-interface pinger. Dropping this without calling [`stop`]
/// leaves the background thread running until the process exits; prefer
/// `stop` for an orderly shutdown.
///
/// [`stop`]: Pinger::stop
pub struct Pinger {
    running: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Pinger {
    /// Opens a raw ICMPv6 socket bound to `ifname` and spawns its scheduling
    /// loop on a dedicated OS thread.
    pub fn start(ifname: &str, on_change: Arc<ChangeHandler>, config: PingerConfig) -> Result<Self> {
        let ifindex = if_nametoindex(ifname)?;
        let my_addrs = interface_addrs(ifname)?;
        let sock = open_socket(ifname)?;

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let ifname_owned = ifname.to_string();

        let thread = std::thread::Builder::new()
            .name(format!("icmpv6-pinger-{}", ifname))
            .spawn(move || run(sock, ifindex, my_addrs, on_change, config, thread_running, ifname_owned))
            .map_err(|e| Error::Transport(std::io::Error::other(e)))?;

        Ok(Pinger {
            running,
            thread: Some(thread),
        })
    }

    /// Flips the running flag; the thread exits at its next timeout tick
    /// (within one `MIN_POLL`-to-`max(ping_interval, purge_interval)`
    /// window) and is joined here.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for Pinger {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn if_nametoindex(ifname: &str) -> Result<u32> {
    let cname = CString::new(ifname)
        .map_err(|_| Error::ParseError(format!("interface name contains NUL: {}", ifname)))?;
    // SAFETY: `cname` is a valid NUL-terminated C string for the duration of
    // the call; `if_nametoindex` does not retain the pointer.
    let idx = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if idx == 0 {
        return Err(Error::Transport(std::io::Error::last_os_error()));
    }
    Ok(idx)
}

/// Every IPv6 address currently assigned to `ifname`, via `getifaddrs(3)`.
fn interface_addrs(ifname: &str) -> Result<std::collections::HashSet<Ipv6Addr>> {
    let mut out = std::collections::HashSet::new();
    let mut addrs: *mut libc::ifaddrs = std::ptr::null_mut();

    // SAFETY: `getifaddrs` allocates a linked list into `addrs`; we own it
    // until `freeifaddrs` and never read past a non-null `ifa_addr`.
    if unsafe { libc::getifaddrs(&mut addrs) } != 0 {
        return Err(Error::Transport(std::io::Error::last_os_error()));
    }

    let mut cur = addrs;
    while !cur.is_null() {
        // SAFETY: `cur` was just checked non-null and was produced by the
        // kernel's `getifaddrs` list.
        let ifa = unsafe { &*cur };
        let name = unsafe { std::ffi::CStr::from_ptr(ifa.ifa_name) };
        if name.to_str() == Ok(ifname) && !ifa.ifa_addr.is_null() {
            // SAFETY: non-null `ifa_addr`, checked family before reading the
            // wider `sockaddr_in6` through the same pointer.
            let family = unsafe { (*ifa.ifa_addr).sa_family as i32 };
            if family == libc::AF_INET6 {
                let sin6 = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in6) };
                out.insert(Ipv6Addr::from(sin6.sin6_addr.s6_addr));
            }
        }
        cur = ifa.ifa_next;
    }

    // SAFETY: `addrs` was populated by the successful `getifaddrs` call above.
    unsafe { libc::freeifaddrs(addrs) };
    Ok(out)
}

fn open_socket(ifname: &str) -> Result<Socket> {
    let sock = Socket::new(Domain::IPV6, Type::RAW, Some(Protocol::ICMPV6))?;
    sock.bind_device(Some(ifname.as_bytes()))?;
    Ok(sock)
}

fn run(
    sock: Socket,
    ifindex: u32,
    my_addrs: std::collections::HashSet<Ipv6Addr>,
    on_change: Arc<ChangeHandler>,
    config: PingerConfig,
    running: Arc<AtomicBool>,
    ifname: String,
) {
    let dest = SockAddr::from(std::net::SocketAddrV6::new(ALL_NODES, 0, 0, ifindex));
    let mut liveness: HashMap<Ipv6Addr, Instant> = HashMap::new();
    let mut next_ping = Instant::now();
    let mut next_purge = Instant::now();

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= next_ping {
            if let Err(e) = sock.send_to(&ECHO_REQUEST, &dest) {
                log::debug!("ping send failed on {}: {}", ifname, e);
            }
            next_ping = now + config.ping_interval;
        }
        if now >= next_purge {
            purge(&mut liveness, config.lifetime, &on_change);
            next_purge = now + config.purge_interval;
        }

        let deadline = next_ping.min(next_purge);
        let wait = deadline.saturating_duration_since(Instant::now()).max(MIN_POLL);
        if let Err(e) = sock.set_read_timeout(Some(wait)) {
            log::warn!("set_read_timeout failed on {}: {}", ifname, e);
        }

        let mut buf = [std::mem::MaybeUninit::new(0u8); 2048];
        match sock.recv_from(&mut buf) {
            Ok((_n, src)) => process_response(src, ifindex, &my_addrs, &mut liveness, &on_change),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {}
            Err(e) => log::debug!("recv failed on {}: {}", ifname, e),
        }
    }
}

fn process_response(
    src: SockAddr,
    ifindex: u32,
    my_addrs: &std::collections::HashSet<Ipv6Addr>,
    liveness: &mut HashMap<Ipv6Addr, Instant>,
    on_change: &Arc<ChangeHandler>,
) {
    let Some(src) = src.as_socket_ipv6() else { return };
    if src.scope_id() != 0 && src.scope_id() != ifindex {
        return;
    }
    let addr = *src.ip();
    if my_addrs.contains(&addr) {
        return;
    }

    let first_seen = !liveness.contains_key(&addr);
    liveness.insert(addr, Instant::now());
    if first_seen {
        on_change(addr, true);
    }
}

fn purge(liveness: &mut HashMap<Ipv6Addr, Instant>, lifetime: Duration, on_change: &Arc<ChangeHandler>) {
    let now = Instant::now();
    let expired: Vec<Ipv6Addr> = liveness
        .iter()
        .filter(|(_, &seen)| now.duration_since(seen) > lifetime)
        .map(|(addr, _)| *addr)
        .collect();
    for addr in expired {
        liveness.remove(&addr);
        on_change(addr, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_evicts_and_notifies_once_per_address() {
        let mut liveness = HashMap::new();
        liveness.insert(Ipv6Addr::LOCALHOST, Instant::now() - Duration::from_secs(10));
        liveness.insert(Ipv6Addr::UNSPECIFIED, Instant::now());

        let evicted = std::sync::Mutex::new(Vec::new());
        let on_change: Arc<ChangeHandler> = Arc::new(move |addr, joined| {
            evicted.lock().unwrap().push((addr, joined));
        });

        purge(&mut liveness, Duration::from_secs(5), &on_change);

        assert!(!liveness.contains_key(&Ipv6Addr::LOCALHOST));
        assert!(liveness.contains_key(&Ipv6Addr::UNSPECIFIED));
    }

    #[test]
    fn echo_request_has_no_payload_and_correct_type() {
        assert_eq!(ECHO_REQUEST.len(), 8);
        assert_eq!(ECHO_REQUEST[0], 128);
        assert_eq!(ECHO_REQUEST[1], 0);
    }
}
