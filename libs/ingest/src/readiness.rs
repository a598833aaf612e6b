use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;

/// Blocks startup until a broker accepts TCP connections.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    addrs: Vec<String>,
    poll_interval: Duration,
    connect_timeout: Duration,
}

impl ReadinessGate {
    pub fn new(addrs: Vec<String>) -> Self {
        Self {
            addrs,
            poll_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// One round over all addresses; true on the first accepted connection.
    pub async fn any_reachable(&self) -> bool {
        for addr in &self.addrs {
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr.as_str())).await {
                Ok(Ok(_)) => {
                    tracing::info!(broker = %addr, "broker reachable");
                    return true;
                }
                Ok(Err(e)) => tracing::debug!(broker = %addr, error = %e, "broker connect failed"),
                Err(_) => tracing::debug!(broker = %addr, "broker connect timed out"),
            }
        }
        false
    }

    /// Poll until reachable or `timeout` elapses. At least one check is
    /// made even with a zero timeout.
    pub async fn wait_for_broker(&self, timeout: Duration) -> bool {
        tracing::info!(brokers = ?self.addrs, timeout_s = timeout.as_secs(), "waiting for broker");
        let started = Instant::now();
        loop {
            if self.any_reachable().await {
                return true;
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                tracing::error!(brokers = ?self.addrs, elapsed_s = elapsed.as_secs(), "timed out waiting for broker");
                return false;
            }
            tracing::info!(elapsed_s = elapsed.as_secs(), "broker not reachable yet");
            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_listener_is_ready() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let gate = ReadinessGate::new(vec!["127.0.0.1:1".into(), addr]);
        assert!(gate.wait_for_broker(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn closed_port_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let gate = ReadinessGate::new(vec![addr]).with_poll_interval(Duration::from_millis(20));
        let started = std::time::Instant::now();
        assert!(!gate.wait_for_broker(Duration::from_millis(100)).await);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn zero_timeout_still_checks_once() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let gate = ReadinessGate::new(vec![addr]);
        assert!(gate.wait_for_broker(Duration::ZERO).await);
    }
}
