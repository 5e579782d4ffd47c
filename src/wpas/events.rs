//! Process-wide event subscription/dispatch table: a map from event name to
//! an ordered list of subscribers, dispatched synchronously in receive order
//! by the owning interface's event reader task.

use dashmap::DashMap;
use std::sync::Arc;

use super::client::WpaSupplicant;
use crate::error::Result;

/// One decoded, unsolicited notification line from wpa_supplicant.
#[derive(Debug, Clone)]
pub struct Event {
    pub ifname: String,
    pub priority: Option<u32>,
    pub name: String,
    pub data: String,
}

/// A subscriber capability: `(ifname, priority, event, data, sup) -> ()`
/// expressed as a fallible closure so a failing handler can be
/// logged and skipped rather than aborting dispatch.
pub type EventHandler = dyn Fn(&Event, &WpaSupplicant) -> Result<()> + Send + Sync;

/// Event name → ordered subscriber list. Handler registration is expected
/// before `start()` or under an external guard; reads are
/// otherwise lock-free via `DashMap`.
#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<String, Vec<Arc<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            subscribers: DashMap::new(),
        }
    }

    /// Registers `handler` for `event_name`. Handlers for the same name are
    /// invoked in registration order.
    pub fn subscribe<F>(&self, event_name: impl Into<String>, handler: F)
    where
        F: Fn(&Event, &WpaSupplicant) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribers
            .entry(event_name.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Invokes every subscriber of `event.name` in order. A handler error is
    /// logged and does not suppress subsequent subscribers.
    pub fn dispatch(&self, event: &Event, sup: &WpaSupplicant) {
        if let Some(handlers) = self.subscribers.get(&event.name) {
            for handler in handlers.iter() {
                if let Err(e) = handler(event, sup) {
                    log::error!("error in handler for event {}: {}", event.name, e);
                }
            }
        }
    }
}

/// Documented constants for the notable events wpa_supplicant emits. The bus
/// itself is open — any event name can be subscribed to; wpa_supplicant's
/// `_on_event` dispatch has no allow-list, and neither does this one.
pub mod names {
    pub const P2P_PROV_DISC_PBC_REQ: &str = "P2P-PROV-DISC-PBC-REQ";
    pub const WPS_PIN_NEEDED: &str = "WPS-PIN-NEEDED";
    pub const P2P_PROV_DISC_SHOW_PIN: &str = "P2P-PROV-DISC-SHOW-PIN";
    pub const P2P_DEVICE_FOUND: &str = "P2P-DEVICE-FOUND";
    pub const P2P_DEVICE_LOST: &str = "P2P-DEVICE-LOST";
    pub const P2P_FIND_STOPPED: &str = "P2P-FIND-STOPPED";
    pub const P2P_INVITATION_RECEIVED: &str = "P2P-INVITATION-RECEIVED";
    pub const P2P_GROUP_STARTED: &str = "P2P-GROUP-STARTED";
    pub const P2P_GROUP_REMOVED: &str = "P2P-GROUP-REMOVED";
    pub const P2P_SERV_DISC_RESP: &str = "P2P-SERV-DISC-RESP";
}

/// Parses a raw event line into `(priority, name, data)`, stripping an
/// optional leading `<N>` priority marker.
pub(crate) fn split_event_line(line: &str) -> Result<(Option<u32>, String, String)> {
    let mut data = line.trim();
    let mut priority = None;

    if let Some(rest) = data.strip_prefix('<') {
        let end = rest.find('>').ok_or_else(|| {
            crate::error::Error::ParseError(format!("malformed event priority: {}", line))
        })?;
        priority = rest[..end].parse::<u32>().ok();
        data = rest[end + 1..].trim_start();
    }

    match data.find(' ') {
        None => Ok((priority, data.to_string(), String::new())),
        Some(sep) => Ok((priority, data[..sep].to_string(), data[sep + 1..].to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_priority_name_and_data() {
        let (priority, name, data) = split_event_line("<3>P2P-DEVICE-FOUND 02:00:00:00:01:00").unwrap();
        assert_eq!(priority, Some(3));
        assert_eq!(name, "P2P-DEVICE-FOUND");
        assert_eq!(data, "02:00:00:00:01:00");
    }

    #[test]
    fn no_priority_no_data() {
        let (priority, name, data) = split_event_line("P2P-FIND-STOPPED").unwrap();
        assert_eq!(priority, None);
        assert_eq!(name, "P2P-FIND-STOPPED");
        assert_eq!(data, "");
    }

    #[test]
    fn malformed_priority_errors() {
        assert!(split_event_line("<3P2P-FIND-STOPPED").is_err());
    }

    #[test]
    fn dispatch_runs_all_subscribers_in_order_despite_handler_error() {
        use std::sync::Mutex;

        let sup = WpaSupplicant::new(std::env::temp_dir()).unwrap();
        let bus = EventBus::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let seen_first = seen.clone();
        bus.subscribe("P2P-DEVICE-FOUND", move |event, _sup| {
            seen_first.lock().unwrap().push(format!("first:{}", event.data));
            Err(crate::error::Error::Stopped)
        });

        let seen_second = seen.clone();
        bus.subscribe("P2P-DEVICE-FOUND", move |event, _sup| {
            seen_second.lock().unwrap().push(format!("second:{}", event.data));
            Ok(())
        });

        let event_a = Event {
            ifname: "wlan0".to_string(),
            priority: None,
            name: "P2P-DEVICE-FOUND".to_string(),
            data: "a".to_string(),
        };
        let event_b = Event {
            data: "b".to_string(),
            ..event_a.clone()
        };

        bus.dispatch(&event_a, &sup);
        bus.dispatch(&event_b, &sup);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:a", "second:a", "first:b", "second:b"]
        );
    }
}
