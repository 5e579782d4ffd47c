//! Demonstration entry point: attaches to one wpa_supplicant interface,
//! wires the IPv6 pinger to the P2P group lifecycle, and idles processing
//! events until interrupted.
//!
//! Usage: `spinet-ctl <ifname> [ctrl-interface-dir]`. Arguments are read by
//! hand with no argument-parsing crate involved.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};

use spinet_core::ping::{Pinger, PingerConfig};
use spinet_core::wpas::{events, WpaSupplicant};

#[tokio::main]
async fn main() -> spinet_core::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let ifname = args.next().unwrap_or_else(|| {
        eprintln!("usage: spinet-ctl <ifname> [ctrl-interface-dir]");
        std::process::exit(1);
    });
    let sock_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/run/wpa_supplicant"));

    debug!("starting on interface {} (ctrl dir {})", ifname, sock_dir.display());

    let sup = WpaSupplicant::new(sock_dir)?;

    let pingers: Arc<DashMap<String, Pinger>> = Arc::new(DashMap::new());

    let start_pingers = pingers.clone();
    sup.events().subscribe(events::names::P2P_GROUP_STARTED, move |event, _sup| {
        on_group_started(event, &start_pingers)
    });

    let stop_pingers = pingers.clone();
    sup.events().subscribe(events::names::P2P_GROUP_REMOVED, move |event, _sup| {
        on_group_removed(event, &stop_pingers)
    });

    sup.start(&ifname).await?;
    info!("attached to {}", ifname);

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");

    let active: Vec<String> = pingers.iter().map(|e| e.key().clone()).collect();
    for ifname in active {
        if let Some((_, pinger)) = pingers.remove(&ifname) {
            pinger.stop();
        }
    }
    sup.stop().await;

    Ok(())
}

/// `P2P-GROUP-STARTED <ifname> GO ...` starts a pinger on the group
/// interface; any other role, or a malformed event with fewer than two
/// space-separated tokens, is logged and ignored.
fn on_group_started(event: &events::Event, pingers: &DashMap<String, Pinger>) -> spinet_core::Result<()> {
    let mut tokens = event.data.split_whitespace();
    let (group_ifname, role) = match (tokens.next(), tokens.next()) {
        (Some(i), Some(r)) => (i, r),
        _ => {
            warn!("malformed P2P-GROUP-STARTED event: {:?}", event.data);
            return Ok(());
        }
    };

    if role != "GO" {
        debug!("not a GO, skipping pinger for {}", group_ifname);
        return Ok(());
    }

    let group_ifname_owned = group_ifname.to_string();
    let on_change: Arc<spinet_core::ping::ChangeHandler> = Arc::new(move |addr, joined| {
        if joined {
            info!("peer {} joined on {}", addr, group_ifname_owned);
        } else {
            info!("peer {} left on {}", addr, group_ifname_owned);
        }
    });

    match Pinger::start(group_ifname, on_change, PingerConfig::default()) {
        Ok(pinger) => {
            pingers.insert(group_ifname.to_string(), pinger);
        }
        Err(e) => warn!("failed to start pinger on {}: {}", group_ifname, e),
    }
    Ok(())
}

/// `P2P-GROUP-REMOVED <ifname> GO ...` stops the pinger on the group
/// interface; any other role, or a malformed event with fewer than two
/// space-separated tokens, is logged and ignored, mirroring the checks
/// `on_group_started` uses to start it.
fn on_group_removed(event: &events::Event, pingers: &DashMap<String, Pinger>) -> spinet_core::Result<()> {
    let mut tokens = event.data.split_whitespace();
    let (group_ifname, role) = match (tokens.next(), tokens.next()) {
        (Some(i), Some(r)) => (i, r),
        _ => {
            warn!("malformed P2P-GROUP-REMOVED event: {:?}", event.data);
            return Ok(());
        }
    };

    if role != "GO" {
        debug!("not a GO, skipping pinger teardown for {}", group_ifname);
        return Ok(());
    }

    if let Some((_, pinger)) = pingers.remove(group_ifname) {
        pinger.stop();
    }
    Ok(())
}
