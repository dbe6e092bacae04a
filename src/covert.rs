//! Covert message delivery.
//!
//! Components and signatures must reach the coordinator without the
//! connection identity or timing linking them to the participant or to one
//! another. Each message travels alone on its own short-lived connection,
//! fired at an instant drawn uniformly from the server-declared window.
//! Connections are pre-opened at jittered times ahead of the first window
//! so connection establishment does not correlate with submission either.
//!
//! An aborting round cancels everything that has not fired yet; in-flight
//! sends get a bounded grace period before their tasks are torn down.

use crate::message::CovertMessage;
use crate::transport::{Connector, FusionStream};
use crate::wire::FramedConn;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};

/// Grace allowed to in-flight sends at shutdown.
const CANCEL_GRACE: Duration = Duration::from_secs(1);

/// Spread applied to pre-opened connections.
const PREWARM_JITTER_MS: u64 = 5_000;

/// The covert endpoint announced in `FusionBegin`.
#[derive(Clone, Debug)]
pub struct CovertTarget {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
}

pub struct CovertSubmitter {
    target: Arc<CovertTarget>,
    connector: Connector,
    pool: Arc<Mutex<Vec<FramedConn<FusionStream>>>>,
    /// Cancellation generation: any bump cancels every task spawned before
    /// it that has not fired yet.
    cancel_tx: watch::Sender<u64>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    num_connections: usize,
}

impl CovertSubmitter {
    pub fn new(
        target: CovertTarget,
        proxy: Option<SocketAddr>,
        num_components: usize,
        spare_connections: usize,
    ) -> Self {
        let connector = Connector::new(proxy, target.ssl);
        let (cancel_tx, _) = watch::channel(0u64);
        Self {
            target: Arc::new(target),
            connector,
            pool: Arc::new(Mutex::new(Vec::new())),
            cancel_tx,
            tasks: Mutex::new(Vec::new()),
            num_connections: num_components + spare_connections,
        }
    }

    /// Pre-open connections at jittered instants, ahead of any submission
    /// window. Failures are tolerated: a submission missing a pooled
    /// connection dials fresh.
    pub fn schedule_connections(&self) {
        let now = Instant::now();
        let mut tasks = self.tasks.lock().unwrap();
        for _ in 0..self.num_connections {
            let at = now + Duration::from_millis(rand::thread_rng().gen_range(0..PREWARM_JITTER_MS));
            let pool = self.pool.clone();
            let connector = self.connector.clone();
            let target = self.target.clone();
            let mut cancel = self.cancel_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                tokio::select! {
                    _ = sleep_until(at) => {}
                    _ = cancel.changed() => return,
                }
                match connector.connect(&target.host, target.port).await {
                    Ok(stream) => pool.lock().unwrap().push(FramedConn::new(stream)),
                    Err(e) => tracing::debug!("covert pre-connect failed: {}", e),
                }
            }));
        }
    }

    /// Schedule one send per message, each at an independent uniform instant
    /// inside `[window_start, window_end]`, each on its own connection.
    pub fn schedule_submissions(
        &self,
        messages: Vec<CovertMessage>,
        window_start: Instant,
        window_end: Instant,
    ) {
        let window = window_end.saturating_duration_since(window_start);
        let mut tasks = self.tasks.lock().unwrap();
        for msg in messages {
            let at = window_start + window.mul_f64(rand::thread_rng().gen::<f64>());
            let pool = self.pool.clone();
            let connector = self.connector.clone();
            let target = self.target.clone();
            let mut cancel = self.cancel_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                tokio::select! {
                    _ = sleep_until(at) => {}
                    _ = cancel.changed() => {
                        tracing::debug!("covert send cancelled before firing");
                        return;
                    }
                }
                let pooled = pool.lock().unwrap().pop();
                let mut conn = match pooled {
                    Some(conn) => conn,
                    None => match connector.connect(&target.host, target.port).await {
                        Ok(stream) => FramedConn::new(stream),
                        Err(e) => {
                            tracing::warn!("covert connect failed: {}", e);
                            return;
                        }
                    },
                };
                if let Err(e) = conn.send(&msg).await {
                    tracing::warn!("covert send failed: {}", e);
                }
                // Dropping the connection closes it: one message, one
                // connection.
            }));
        }
    }

    /// Cancel every scheduled send and pre-connect that has not fired yet.
    /// Already-open pooled connections stay available for the next round.
    pub fn cancel_pending(&self) {
        self.cancel_tx.send_modify(|generation| *generation += 1);
    }

    /// Cancel everything that has not fired and tear the submitter down.
    /// In-flight sends get [`CANCEL_GRACE`] to finish before their tasks
    /// are torn down.
    pub async fn shutdown(&self) {
        self.cancel_pending();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().unwrap().drain(..).collect();
        for mut task in tasks {
            if timeout(CANCEL_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }
        self.pool.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::net::TcpListener;

    fn message(n: u8) -> CovertMessage {
        CovertMessage::Component {
            round_pubkey: [n; 32],
            component: vec![n; 16],
            signature: vec![n; 64],
        }
    }

    async fn collect_messages(
        listener: TcpListener,
        count: usize,
        per_recv: Duration,
    ) -> (Vec<CovertMessage>, HashSet<SocketAddr>) {
        let mut messages = Vec::new();
        let mut peers = HashSet::new();
        while messages.len() < count {
            let (stream, peer) = listener.accept().await.unwrap();
            peers.insert(peer);
            let mut conn = FramedConn::new(stream);
            if let Some(msg) = conn.recv::<CovertMessage>(per_recv).await.unwrap() {
                messages.push(msg);
            }
        }
        (messages, peers)
    }

    #[tokio::test]
    async fn delivers_each_message_on_its_own_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let collector = tokio::spawn(collect_messages(listener, 3, Duration::from_secs(5)));

        let submitter = CovertSubmitter::new(
            CovertTarget {
                host: "127.0.0.1".into(),
                port: addr.port(),
                ssl: false,
            },
            None,
            3,
            0,
        );

        let start = Instant::now();
        submitter.schedule_submissions(
            vec![message(1), message(2), message(3)],
            start,
            start + Duration::from_millis(200),
        );

        let (messages, peers) = collector.await.unwrap();
        assert_eq!(messages.len(), 3);
        // One connection per message: three distinct source ports.
        assert_eq!(peers.len(), 3);
        submitter.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pooled_connections_are_consumed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let submitter = CovertSubmitter::new(
            CovertTarget {
                host: "127.0.0.1".into(),
                port: addr.port(),
                ssl: false,
            },
            None,
            1,
            1,
        );
        submitter.schedule_connections();

        let accepter = tokio::spawn(collect_messages(listener, 1, Duration::from_secs(60)));
        let start = Instant::now();
        submitter.schedule_submissions(
            vec![message(9)],
            start + Duration::from_secs(6),
            start + Duration::from_secs(6),
        );
        let (messages, _) = accepter.await.unwrap();
        assert_eq!(messages[0], message(9));
        submitter.shutdown().await;
    }

    #[tokio::test]
    async fn cancellation_drops_unsent_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let submitter = CovertSubmitter::new(
            CovertTarget {
                host: "127.0.0.1".into(),
                port: addr.port(),
                ssl: false,
            },
            None,
            2,
            0,
        );

        let start = Instant::now();
        submitter.schedule_submissions(
            vec![message(1), message(2)],
            start + Duration::from_secs(60),
            start + Duration::from_secs(70),
        );
        submitter.shutdown().await;

        // Nothing may arrive after cancellation.
        let outcome = timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(outcome.is_err());
    }
}
