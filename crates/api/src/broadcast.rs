//! Stream Broadcast
//!
//! Per-connection frame loop for dashboard clients. Every connection owns its
//! own ticker and frame source; a slow or dead client only ever stalls itself.

use crate::config::StreamConfig;
use crate::service::LiveSample;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub type ClientId = u64;

/// Stream delivery errors; each one ends only its own connection
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Frame write timed out after {0}ms")]
    Timeout(u64),

    #[error("Frame encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub peer: Option<SocketAddr>,
    pub connected_at_ms: i64,
}

/// Connected stream clients. `register` and guard drop are the only mutators.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, ClientInfo>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client; it stays registered until the returned guard is dropped
    pub fn register(self: &Arc<Self>, peer: Option<SocketAddr>) -> ClientGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let info = ClientInfo {
            id,
            peer,
            connected_at_ms: Utc::now().timestamp_millis(),
        };

        let count = {
            let mut clients = self.clients();
            clients.insert(id, info);
            clients.len()
        };
        metrics::gauge!("stream_clients_connected").set(count as f64);
        info!("Stream client {} connected ({} active)", id, count);

        ClientGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    fn deregister(&self, id: ClientId) {
        let count = {
            let mut clients = self.clients();
            clients.remove(&id);
            clients.len()
        };
        metrics::gauge!("stream_clients_connected").set(count as f64);
        info!("Stream client {} disconnected ({} active)", id, count);
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients().is_empty()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients().contains_key(&id)
    }

    pub fn snapshot(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<ClientInfo> = self.clients().values().cloned().collect();
        clients.sort_by_key(|c| c.id);
        clients
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<ClientId, ClientInfo>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registration handle; dropping it deregisters the client
#[derive(Debug)]
pub struct ClientGuard {
    registry: Arc<ClientRegistry>,
    id: ClientId,
}

impl ClientGuard {
    pub fn id(&self) -> ClientId {
        self.id
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

/// One WebSocket text frame: `{"sensor_values": [v1, v2, v3]}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamFrame {
    pub sensor_values: [f64; 3],
}

impl StreamFrame {
    pub fn new(sensor_values: [f64; 3]) -> Self {
        Self { sensor_values }
    }
}

/// Produces the next frame for one connection; `None` skips the tick
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<StreamFrame>;
}

/// Demo values: heart rate 60..=100 bpm, gsr 0.5..5.0, cortisol 0.1..1.0
pub struct SyntheticSource {
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Option<StreamFrame> {
        let heart_rate = self.rng.gen_range(60u32..=100) as f64;
        let gsr = round2(self.rng.gen_range(0.5..=5.0));
        let cortisol = round2(self.rng.gen_range(0.1..=1.0));
        Some(StreamFrame::new([heart_rate, gsr, cortisol]))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Latest ingested `[heart_rate, gsr, score]`
pub struct LiveSource {
    latest: watch::Receiver<Option<LiveSample>>,
}

impl LiveSource {
    pub fn new(latest: watch::Receiver<Option<LiveSample>>) -> Self {
        Self { latest }
    }
}

impl FrameSource for LiveSource {
    fn next_frame(&mut self) -> Option<StreamFrame> {
        let sample = (*self.latest.borrow())?;
        Some(StreamFrame::new([
            sample.reading.heart_rate,
            sample.reading.gsr,
            sample.score,
        ]))
    }
}

/// Outbound half of one client connection
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError>;
}

/// Why a stream loop ended
#[derive(Debug)]
pub enum StreamEnd {
    /// Client closed the connection
    Closed,
    /// A frame could not be delivered
    Failed(StreamError),
}

/// Send one frame per interval until `closed` resolves or a write fails.
///
/// Consumes the client's guard, so the client is deregistered as soon as the
/// loop ends.
pub async fn run_stream<S, C>(
    guard: ClientGuard,
    mut sink: S,
    mut source: Box<dyn FrameSource>,
    closed: C,
    config: StreamConfig,
) -> StreamEnd
where
    S: FrameSink,
    C: Future<Output = ()> + Send,
{
    tokio::pin!(closed);

    let write_timeout = config.write_timeout();
    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end = loop {
        tokio::select! {
            _ = &mut closed => break StreamEnd::Closed,
            _ = ticker.tick() => {
                let Some(frame) = source.next_frame() else {
                    continue;
                };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => break StreamEnd::Failed(StreamError::Encode(e.to_string())),
                };
                match tokio::time::timeout(write_timeout, sink.send_text(text)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => break StreamEnd::Failed(e),
                    Err(_) => {
                        let waited = write_timeout.as_millis() as u64;
                        break StreamEnd::Failed(StreamError::Timeout(waited));
                    }
                }
            }
        }
    };

    match &end {
        StreamEnd::Closed => debug!("Stream client {} closed the connection", guard.id()),
        StreamEnd::Failed(e) => debug!("Dropping stream client {}: {}", guard.id(), e),
    }
    drop(guard);
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::StressLevel;
    use feature_engine::RawReading;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    struct ChannelSink(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
            self.0
                .send(text)
                .map_err(|e| StreamError::ConnectionLost(e.to_string()))
        }
    }

    /// Accepts `remaining` frames, then reports a broken connection
    struct FailingSink {
        remaining: usize,
    }

    #[async_trait]
    impl FrameSink for FailingSink {
        async fn send_text(&mut self, _text: String) -> Result<(), StreamError> {
            if self.remaining == 0 {
                return Err(StreamError::ConnectionLost("broken pipe".to_string()));
            }
            self.remaining -= 1;
            Ok(())
        }
    }

    struct StalledSink;

    #[async_trait]
    impl FrameSink for StalledSink {
        async fn send_text(&mut self, _text: String) -> Result<(), StreamError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[test]
    fn test_synthetic_ranges() {
        let mut source = SyntheticSource::seeded(42);
        for _ in 0..500 {
            let [hr, gsr, cortisol] = source.next_frame().unwrap().sensor_values;
            assert!((60.0..=100.0).contains(&hr));
            assert_eq!(hr.fract(), 0.0);
            assert!((0.5..=5.0).contains(&gsr));
            assert!((0.1..=1.0).contains(&cortisol));
            assert!(((gsr * 100.0).round() - gsr * 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_frame_json() {
        let frame = StreamFrame::new([72.0, 1.25, 0.4]);
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"sensor_values":[72.0,1.25,0.4]}"#
        );
    }

    #[test]
    fn test_live_source_waits_for_first_reading() {
        let (tx, rx) = watch::channel(None);
        let mut source = LiveSource::new(rx);
        assert!(source.next_frame().is_none());

        tx.send_replace(Some(LiveSample {
            reading: RawReading::new(2230.0, 1312.0, 88.0, 1453.0),
            score: 12.5,
            stress_level: StressLevel::Moderate,
        }));
        assert_eq!(source.next_frame().unwrap().sensor_values, [88.0, 1453.0, 12.5]);
    }

    #[test]
    fn test_guard_drop_deregisters() {
        let registry = Arc::new(ClientRegistry::new());
        let first = registry.register(None);
        let second = registry.register(None);
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len(), 2);

        drop(first);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(second.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_client_removed_within_one_interval() {
        let registry = Arc::new(ClientRegistry::new());
        let config = StreamConfig::default();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let healthy_guard = registry.register(None);
        let healthy_id = healthy_guard.id();
        let healthy = tokio::spawn(run_stream(
            healthy_guard,
            ChannelSink(tx),
            Box::new(SyntheticSource::seeded(1)),
            std::future::pending::<()>(),
            config.clone(),
        ));

        let dead_guard = registry.register(None);
        let dead_id = dead_guard.id();
        let start = Instant::now();
        let dead = tokio::spawn(run_stream(
            dead_guard,
            FailingSink { remaining: 1 },
            Box::new(SyntheticSource::seeded(2)),
            std::future::pending::<()>(),
            config.clone(),
        ));

        let end = dead.await.unwrap();
        assert!(matches!(end, StreamEnd::Failed(StreamError::ConnectionLost(_))));
        assert!(start.elapsed() <= config.interval());
        assert!(!registry.contains(dead_id));
        assert!(registry.contains(healthy_id));

        // The healthy client keeps its cadence
        let frame = rx.recv().await.unwrap();
        assert!(frame.starts_with(r#"{"sensor_values":["#));
        while rx.try_recv().is_ok() {}

        tokio::time::sleep(config.interval() * 3).await;
        let mut delivered = 0;
        while rx.try_recv().is_ok() {
            delivered += 1;
        }
        assert!(delivered >= 2);

        healthy.abort();
        let _ = healthy.await;
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_client_times_out() {
        let registry = Arc::new(ClientRegistry::new());
        let config = StreamConfig {
            write_timeout_ms: 200,
            ..Default::default()
        };

        let end = run_stream(
            registry.register(None),
            StalledSink,
            Box::new(SyntheticSource::seeded(3)),
            std::future::pending::<()>(),
            config,
        )
        .await;

        assert!(matches!(end, StreamEnd::Failed(StreamError::Timeout(200))));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_close_ends_stream() {
        let registry = Arc::new(ClientRegistry::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(run_stream(
            registry.register(None),
            ChannelSink(tx),
            Box::new(SyntheticSource::seeded(4)),
            async move {
                let _ = close_rx.await;
            },
            StreamConfig::default(),
        ));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(registry.len(), 1);
        close_tx.send(()).unwrap();

        assert!(matches!(handle.await.unwrap(), StreamEnd::Closed));
        assert!(registry.is_empty());
    }
}
