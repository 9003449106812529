use async_trait::async_trait;
use std::{fmt::Debug, net::SocketAddr, time::Duration};
use tokio::net::TcpStream;

/// Reports whether the network is currently reachable.
#[async_trait]
pub trait Connectivity: Send + Sync + Debug {
    async fn is_connected(&self) -> bool;
}

/// Reachable iff a TCP handshake with any probe address completes in time.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addrs: Vec<SocketAddr>,
    timeout: Duration,
}

impl TcpProbe {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(addrs: Vec<SocketAddr>, timeout: Duration) -> Self {
        Self { addrs, timeout }
    }
}

impl Default for TcpProbe {
    /// Public DNS resolvers on port 53.
    fn default() -> Self {
        let addrs = vec![
            SocketAddr::from(([1, 1, 1, 1], 53)),
            SocketAddr::from(([8, 8, 8, 8], 53)),
        ];
        Self::new(addrs, Self::DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_connected(&self) -> bool {
        for addr in &self.addrs {
            match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_)) => {
                    tracing::debug!(%addr, "connectivity probe succeeded");
                    return true;
                }
                Ok(Err(e)) => tracing::debug!(%addr, error = %e, "connectivity probe failed"),
                Err(_) => tracing::debug!(%addr, "connectivity probe timed out"),
            }
        }
        false
    }
}

/// Fixed answer, for forced offline mode.
#[derive(Debug, Clone, Copy)]
pub struct StaticConnectivity(pub bool);

#[async_trait]
impl Connectivity for StaticConnectivity {
    async fn is_connected(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_succeeds_against_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new(vec![addr], Duration::from_secs(1));
        assert!(probe.is_connected().await);
    }

    #[tokio::test]
    async fn probe_fails_when_nothing_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = TcpProbe::new(vec![addr], Duration::from_secs(1));
        assert!(!probe.is_connected().await);
    }

    #[tokio::test]
    async fn probe_with_no_addresses_is_offline() {
        let probe = TcpProbe::new(Vec::new(), Duration::from_millis(10));
        assert!(!probe.is_connected().await);
    }

    #[tokio::test]
    async fn static_connectivity_reports_its_value() {
        assert!(StaticConnectivity(true).is_connected().await);
        assert!(!StaticConnectivity(false).is_connected().await);
    }
}
