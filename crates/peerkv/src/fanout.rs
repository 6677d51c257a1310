//! Best-effort fanout: one bounded attempt per peer, failures isolated.

use std::future::Future;
use std::time::Duration;

use futures_util::{stream, StreamExt};

use peerkv_core::{PeerRecord, Protocol};
use peerkv_net::NetError;

/// A peer a fanout attempt did not reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerFailure {
    pub address: String,
    pub reason: String,
}

/// Outcome of fanning one operation out to the directory snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Peers in the snapshot.
    pub attempted: usize,
    /// Peers the operation completed against.
    pub delivered: usize,
    pub failures: Vec<PeerFailure>,
}

impl FanoutReport {
    /// True if every attempted peer was reached.
    pub fn is_complete(&self) -> bool {
        self.delivered == self.attempted
    }

    fn record<T>(&mut self, protocol: Protocol, address: String, outcome: &Result<T, NetError>) {
        match outcome {
            Ok(_) => self.delivered += 1,
            Err(e) => {
                tracing::debug!(%protocol, %address, error = %e, "fanout attempt failed");
                self.failures.push(PeerFailure {
                    address,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Run `attempt` once per peer, at most `concurrency` at a time, each bounded
/// by `peer_timeout`.
///
/// Calls `on_success` with each value as it arrives; the closure may fail,
/// which aborts the fanout with its error (used for local store errors only).
pub(crate) async fn fanout<F, Fut, T, E>(
    protocol: Protocol,
    peers: Vec<PeerRecord>,
    concurrency: usize,
    peer_timeout: Duration,
    attempt: F,
    mut on_success: impl FnMut(T) -> Result<(), E>,
) -> Result<FanoutReport, E>
where
    F: Fn(PeerRecord) -> Fut,
    Fut: Future<Output = Result<T, NetError>>,
{
    let mut report = FanoutReport {
        attempted: peers.len(),
        ..FanoutReport::default()
    };

    let mut attempts = stream::iter(peers)
        .map(|peer| {
            let address = peer.address.clone();
            let pending = attempt(peer);
            async move {
                let outcome = tokio::time::timeout(peer_timeout, pending)
                    .await
                    .unwrap_or_else(|_| {
                        Err(NetError::Timeout(format!(
                            "{protocol} got no answer within {peer_timeout:?}"
                        )))
                    });
                (address, outcome)
            }
        })
        .buffer_unordered(concurrency);

    while let Some((address, outcome)) = attempts.next().await {
        report.record(protocol, address, &outcome);
        if let Ok(value) = outcome {
            on_success(value)?;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn peers(n: usize) -> Vec<PeerRecord> {
        (0..n)
            .map(|i| PeerRecord::with_address(format!("peer-{i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut seen = Vec::new();
        let report = fanout(
            Protocol::PutDht,
            peers(4),
            2,
            Duration::from_secs(1),
            |peer| async move {
                if peer.address == "peer-2" {
                    Err(NetError::UnexpectedResponse("refused".into()))
                } else {
                    Ok(peer.address)
                }
            },
            |address| {
                seen.push(address);
                Ok::<_, Infallible>(())
            },
        )
        .await
        .unwrap();

        assert_eq!(report.attempted, 4);
        assert_eq!(report.delivered, 3);
        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].address, "peer-2");

        seen.sort();
        assert_eq!(seen, vec!["peer-0", "peer-1", "peer-3"]);
    }

    #[tokio::test]
    async fn test_hung_peer_is_bounded() {
        let started = tokio::time::Instant::now();
        let report = fanout(
            Protocol::GetDht,
            peers(2),
            4,
            Duration::from_millis(50),
            |peer| async move {
                if peer.address == "peer-0" {
                    std::future::pending::<()>().await;
                }
                Ok(())
            },
            |_| Ok::<_, Infallible>(()),
        )
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(report.delivered, 1);
        assert!(report.failures[0].reason.contains("timeout"));
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_a_no_op() {
        let report = fanout(
            Protocol::PutDht,
            Vec::new(),
            4,
            Duration::from_secs(1),
            |_| async { Ok(()) },
            |_| Ok::<_, Infallible>(()),
        )
        .await
        .unwrap();

        assert_eq!(report, FanoutReport::default());
        assert!(report.is_complete());
    }
}
