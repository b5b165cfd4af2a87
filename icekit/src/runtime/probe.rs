//! Port-open readiness probe.

use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// How long an accepted connection must stay open before the port counts as
/// served. Docker's userland proxy accepts and immediately closes while
/// nothing listens inside the container.
const HOLD_OPEN: Duration = Duration::from_millis(100);

/// Polls `host:port` until a connection is accepted and held open, or
/// `timeout` elapses. Returns whether the port became ready.
pub async fn wait_for_port(host: &str, port: u16, timeout: Duration, interval: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if port_served(host, port).await {
            tracing::debug!("{}:{} accepted a connection after {} attempt(s)", host, port, attempts);
            return true;
        }
        if tokio::time::Instant::now() + interval > deadline {
            tracing::warn!(
                "{}:{} still closed after {} attempt(s) over {:?}",
                host,
                port,
                attempts,
                timeout
            );
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

async fn port_served(host: &str, port: u16) -> bool {
    let Ok(Ok(mut stream)) =
        tokio::time::timeout(Duration::from_secs(1), TcpStream::connect((host, port))).await
    else {
        return false;
    };

    let mut buf = [0u8; 1];
    match tokio::time::timeout(HOLD_OPEN, stream.read(&mut buf)).await {
        // Still open and silent: a real server waiting for its client.
        Err(_elapsed) => true,
        // Server greeted first.
        Ok(Ok(n)) if n > 0 => true,
        Ok(_) => false
    }
}
