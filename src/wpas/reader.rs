//! One event-reader task per attached interface: attach, dispatch until a
//! fault or an interrupt, detach best-effort, and — unless interrupted —
//! back off 2s and reattach. Interruption is a `tokio::sync::Notify` selected
//! alongside the blocking receive, the tokio-native equivalent of the
//! auxiliary interrupt-socket strategy used by the original control daemon.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::client::WpaSupplicant;
use super::events::{self, Event, EventBus};
use super::sock::EventSocket;
use crate::error::{Error, Result};

const REATTACH_BACKOFF: Duration = Duration::from_secs(2);
const ATTACH_TIMEOUT: Duration = Duration::from_secs(5);
const DETACH_TIMEOUT: Duration = Duration::from_secs(3);

pub(crate) struct ReaderHandle {
    pub task: JoinHandle<()>,
    pub interrupt: Arc<Notify>,
}

impl ReaderHandle {
    /// Interrupts the reader and waits for its task to exit.
    pub async fn stop(self) {
        self.interrupt.notify_one();
        let _ = self.task.await;
    }
}

enum ReaderOutcome {
    Stopped,
    Error(Error),
}

pub(crate) fn spawn(
    ifname: String,
    sock_dir: PathBuf,
    bus: Arc<EventBus>,
    sup: Arc<WpaSupplicant>,
) -> ReaderHandle {
    let interrupt = Arc::new(Notify::new());
    let task_interrupt = interrupt.clone();

    let task = tokio::spawn(async move {
        log::debug!("starting event reader thread [{}]", ifname);
        loop {
            match event_loop(&ifname, &sock_dir, &bus, &sup, &task_interrupt).await {
                ReaderOutcome::Stopped => break,
                ReaderOutcome::Error(e) => {
                    log::warn!("error in event receiver [{}]: {}", ifname, e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(REATTACH_BACKOFF) => {}
                _ = task_interrupt.notified() => break,
            }
        }
        log::debug!("stopping event reader thread [{}]", ifname);
    });

    ReaderHandle { task, interrupt }
}

async fn event_loop(
    ifname: &str,
    sock_dir: &std::path::Path,
    bus: &EventBus,
    sup: &WpaSupplicant,
    interrupt: &Notify,
) -> ReaderOutcome {
    let remote = sock_dir.join(ifname);
    let mut sock = match EventSocket::new() {
        Ok(s) => s,
        Err(e) => return ReaderOutcome::Error(e),
    };

    let attached = tokio::select! {
        r = sock.attach(&remote, ATTACH_TIMEOUT) => r,
        _ = interrupt.notified() => return ReaderOutcome::Stopped,
    };
    if let Err(e) = attached {
        return ReaderOutcome::Error(e);
    }

    loop {
        tokio::select! {
            line = sock.recv_event() => {
                match line {
                    Ok(line) => {
                        if let Err(e) = dispatch_line(ifname, &line, bus, sup) {
                            log::warn!("error while processing event: {}", e);
                        }
                    }
                    Err(e) => {
                        let _ = sock.detach(DETACH_TIMEOUT).await;
                        return ReaderOutcome::Error(e);
                    }
                }
            }
            _ = interrupt.notified() => {
                if let Err(e) = sock.detach(DETACH_TIMEOUT).await {
                    log::warn!("detach failed: {}", e);
                }
                return ReaderOutcome::Stopped;
            }
        }
    }
}

fn dispatch_line(ifname: &str, line: &str, bus: &EventBus, sup: &WpaSupplicant) -> Result<()> {
    let (priority, name, data) = events::split_event_line(line)?;
    let event = Event {
        ifname: ifname.to_string(),
        priority,
        name,
        data,
    };
    bus.dispatch(&event, sup);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;
    use tokio::net::UnixDatagram;

    fn stub_dir(tag: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("wpas-reader-test-{}-{}-{}", std::process::id(), tag, n));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// No socket is bound at `remote` when the reader first tries to attach,
    /// so the first attempt fails immediately. Once the stub supplicant comes
    /// up, the reader's 2s backoff loop reattaches on its own and delivers an
    /// event injected afterward.
    #[tokio::test]
    async fn auto_reattaches_after_stub_restart_and_delivers_event() {
        let dir = stub_dir("reattach");
        let ifname = "teststa0".to_string();
        let remote = dir.join(&ifname);

        let sup = WpaSupplicant::new(dir.clone()).unwrap();
        let bus = Arc::new(EventBus::new());

        let received: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let received_in_handler = received.clone();
        bus.subscribe(events::names::P2P_FIND_STOPPED, move |event, _sup| {
            *received_in_handler.lock().unwrap() = Some(event.data.clone());
            Ok(())
        });

        let handle = spawn(ifname, dir.clone(), bus.clone(), sup);

        // Let the first (failing) attach attempt run and enter its backoff sleep.
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Bring the stub supplicant up now; it answers the reader's next
        // ATTACH and then pushes one event.
        let stub = UnixDatagram::bind(&remote).unwrap();
        let stub_task = tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let (_n, addr) = stub.recv_from(&mut buf).await.unwrap();
            stub.send_to(b"OK", addr).await.unwrap();
            stub.send_to(b"P2P-FIND-STOPPED test-data", addr).await.unwrap();
        });

        // REATTACH_BACKOFF plus slack for the retry and event delivery.
        tokio::time::sleep(REATTACH_BACKOFF + Duration::from_millis(500)).await;

        assert_eq!(received.lock().unwrap().as_deref(), Some("test-data"));

        handle.task.abort();
        stub_task.abort();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
