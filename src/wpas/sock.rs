//! Local (filesystem-path) datagram socket wrappers over
//! `tokio::net::UnixDatagram`: the request socket (mutex-guarded,
//! single-outstanding-request) and the event socket (attach/detach).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UnixDatagram;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

const MAX_LEN: usize = 65536;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_socket_path() -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("wpas{}-{}.sock", std::process::id(), n))
}

/// A bound-but-unconnected local datagram socket with a throwaway local
/// address, unlinked on drop (mirrors `WPASock.close`'s `os.unlink`).
pub(crate) struct WpasSocket {
    sock: UnixDatagram,
    local_path: PathBuf,
}

impl WpasSocket {
    pub fn bind() -> Result<Self> {
        let local_path = temp_socket_path();
        let sock = UnixDatagram::bind(&local_path)?;
        Ok(WpasSocket { sock, local_path })
    }

    pub async fn connect(&self, remote: &Path) -> Result<()> {
        log::debug!("connecting to {}", remote.display());
        self.sock.connect(remote)?;
        Ok(())
    }

    pub async fn tx(&self, data: &str) -> Result<()> {
        log::debug!("[{}]< {:?}", self.local_path.display(), data);
        let n = self.sock.send(data.as_bytes()).await?;
        if n != data.len() {
            return Err(Error::Transport(std::io::Error::other(format!(
                "short write: sent {} of {} bytes",
                n,
                data.len()
            ))));
        }
        Ok(())
    }

    pub async fn rx(&self) -> Result<String> {
        let mut buf = vec![0u8; MAX_LEN];
        let n = self.sock.recv(&mut buf).await?;
        if n >= MAX_LEN {
            return Err(Error::ParseError("truncated data".into()));
        }
        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        log::debug!("[{}]> {:?}", self.local_path.display(), &text[..text.len().min(80)]);
        Ok(text)
    }
}

impl Drop for WpasSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.local_path);
    }
}

/// Request/response endpoint: exactly one outstanding request at a time.
/// wpa_supplicant does not tag replies, so overlapping requests on the same
/// socket would ambiguate which reply belongs to which request.
pub(crate) struct RequestSocket {
    sock: WpasSocket,
    lock: Mutex<()>,
    remote: Mutex<PathBuf>,
}

impl RequestSocket {
    pub fn new() -> Result<Self> {
        Ok(RequestSocket {
            sock: WpasSocket::bind()?,
            lock: Mutex::new(()),
            remote: Mutex::new(PathBuf::new()),
        })
    }

    pub async fn connect(&self, remote: PathBuf) -> Result<()> {
        self.sock.connect(&remote).await?;
        *self.remote.lock().await = remote;
        Ok(())
    }

    pub async fn current_remote(&self) -> PathBuf {
        self.remote.lock().await.clone()
    }

    /// Sends `data` and waits up to `timeout` for exactly one reply.
    pub async fn request(&self, data: &str, timeout: Duration) -> Result<String> {
        let _guard = self.lock.lock().await;
        self.sock.tx(data).await?;
        match tokio::time::timeout(timeout, self.sock.rx()).await {
            Ok(Ok(resp)) => Ok(resp.trim().to_string()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Rebinds to `remote` for the duration of `f`, then restores the
    /// previous binding, holding the request lock throughout so concurrent
    /// callers see a consistent binding only while the scope holds.
    pub async fn with_remote<T, F, Fut>(&self, remote: PathBuf, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let _guard = self.lock.lock().await;
        let previous = self.remote.lock().await.clone();

        self.sock.connect(&remote).await?;
        *self.remote.lock().await = remote;

        let result = f().await;

        self.sock.connect(&previous).await?;
        *self.remote.lock().await = previous;

        result
    }
}

/// Event endpoint: attached to exactly one remote path, or detached.
pub(crate) struct EventSocket {
    sock: WpasSocket,
    attached: Option<PathBuf>,
}

impl EventSocket {
    pub fn new() -> Result<Self> {
        Ok(EventSocket {
            sock: WpasSocket::bind()?,
            attached: None,
        })
    }

    pub async fn attach(&mut self, remote: &Path, timeout: Duration) -> Result<()> {
        log::debug!("attaching to {}", remote.display());
        self.sock.connect(remote).await?;
        self.sock.tx("ATTACH").await?;

        let resp = match tokio::time::timeout(timeout, self.sock.rx()).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(Error::Timeout),
        };
        if resp.trim() != "OK" {
            return Err(Error::CommandFailed(resp));
        }
        self.attached = Some(remote.to_path_buf());
        Ok(())
    }

    /// Drains pending events until `OK`/`FAIL` or `timeout` elapses; any
    /// event datagrams seen in between are discarded (there is no reader
    /// left to dispatch them to once detach has been requested).
    pub async fn detach(&mut self, timeout: Duration) -> Result<()> {
        let remote = self.attached.clone().ok_or(Error::Stopped)?;
        self.sock.tx("DETACH").await?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }

            let resp = match tokio::time::timeout(remaining, self.sock.rx()).await {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(Error::Timeout),
            };

            match resp.trim() {
                "OK" => {
                    self.attached = None;
                    return Ok(());
                }
                "FAIL" => {
                    return Err(Error::CommandFailed(format!(
                        "detach from {} failed",
                        remote.display()
                    )))
                }
                _ => continue,
            }
        }
    }

    pub async fn recv_event(&self) -> Result<String> {
        self.sock.rx().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    fn stub_path(tag: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("wpas-test-{}-{}-{}.sock", std::process::id(), tag, n))
    }

    /// Two tasks calling `request("PING")` on one client must not cross reply
    /// strings: `RequestSocket`'s lock serializes them onto the wire, so each
    /// caller gets the reply addressed to its own turn.
    #[tokio::test]
    async fn concurrent_requests_on_one_client_observe_disjoint_replies() {
        let remote = stub_path("concurrency");
        let listener = Arc::new(UnixDatagram::bind(&remote).unwrap());

        let stub = listener.clone();
        let stub_task = tokio::spawn(async move {
            for i in 1..=2 {
                let mut buf = [0u8; 64];
                let (_n, addr) = stub.recv_from(&mut buf).await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
                stub.send_to(format!("PONG{}", i).as_bytes(), addr).await.unwrap();
            }
        });

        let client = Arc::new(RequestSocket::new().unwrap());
        client.connect(remote.clone()).await.unwrap();

        let c1 = client.clone();
        let c2 = client.clone();
        let (r1, r2) = tokio::join!(
            c1.request("PING", Duration::from_secs(2)),
            c2.request("PING", Duration::from_secs(2)),
        );

        let mut replies = vec![r1.unwrap(), r2.unwrap()];
        replies.sort();
        assert_eq!(replies, vec!["PONG1".to_string(), "PONG2".to_string()]);

        stub_task.await.unwrap();
        let _ = std::fs::remove_file(&remote);
    }

    /// A request whose reply never arrives times out without poisoning the
    /// socket for the next caller.
    #[tokio::test]
    async fn timed_out_request_does_not_wedge_later_requests() {
        let remote = stub_path("timeout");
        let listener = UnixDatagram::bind(&remote).unwrap();

        let stub_task = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            // First request: silently dropped, so the caller times out.
            let (_n, _addr) = listener.recv_from(&mut buf).await.unwrap();
            // Second request: answered right away.
            let (_n, addr) = listener.recv_from(&mut buf).await.unwrap();
            listener.send_to(b"PONG", addr).await.unwrap();
        });

        let client = RequestSocket::new().unwrap();
        client.connect(remote.clone()).await.unwrap();

        let first = client.request("PING", Duration::from_millis(100)).await;
        assert!(matches!(first, Err(Error::Timeout)));

        let second = client.request("PING", Duration::from_secs(2)).await.unwrap();
        assert_eq!(second, "PONG");

        stub_task.await.unwrap();
        let _ = std::fs::remove_file(&remote);
    }
}
