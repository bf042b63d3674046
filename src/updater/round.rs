//! Periodic collection rounds.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::ServerConfig;
use crate::hub::{Hub, HubError};
use crate::observability::metrics;
use crate::plugins::{MetricPlugin, PluginRegistry};
use crate::wire::{Snapshot, Status};

/// Drives collection rounds and hands each aggregate to the hub.
pub struct Updater {
    collector: Collector,
    hub: Hub,
    interval: Duration,
}

impl Updater {
    pub fn new(registry: Arc<PluginRegistry>, hub: Hub, config: &ServerConfig) -> Self {
        Self {
            collector: Collector::new(&registry, config.plugin_timeout()),
            hub,
            interval: config.update_interval(),
        }
    }

    /// Run rounds until shutdown or until the hub stops.
    ///
    /// The first round happens one interval after start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            plugins = ?self.collector.names(),
            "Updater starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.tick().await.is_err() {
                        tracing::warn!("Hub is gone, stopping updater");
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Updater received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run a single round and publish its result.
    pub async fn tick(&self) -> Result<(), HubError> {
        let status = self.collector.collect().await;

        let frame = match status.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Dropping collection round");
                metrics::record_round("encode_failed");
                return Ok(());
            }
        };

        metrics::record_round("published");
        self.hub.publish(frame).await
    }
}

/// Queries every registered plugin once per round.
///
/// A call that overruns the timeout keeps its blocking thread until the
/// plugin returns. Until then the plugin is skipped, so a hung plugin
/// holds at most one thread and never starves the others.
pub struct Collector {
    slots: Vec<PluginSlot>,
    plugin_timeout: Duration,
}

struct PluginSlot {
    plugin: Arc<dyn MetricPlugin>,
    in_flight: Arc<AtomicBool>,
}

/// Clears a plugin's in-flight flag when its blocking call ends, panics
/// included.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Collector {
    pub fn new(registry: &PluginRegistry, plugin_timeout: Duration) -> Self {
        let slots = registry
            .iter()
            .map(|plugin| PluginSlot {
                plugin: Arc::clone(plugin),
                in_flight: Arc::new(AtomicBool::new(false)),
            })
            .collect();
        Self {
            slots,
            plugin_timeout,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(|slot| slot.plugin.name()).collect()
    }

    /// Plugins whose previous call has not returned yet.
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.in_flight.load(Ordering::Acquire))
            .count()
    }

    /// Query every plugin concurrently and aggregate the successful snapshots.
    pub async fn collect(&self) -> Status {
        let calls = self
            .slots
            .iter()
            .map(|slot| snapshot_with_timeout(slot, self.plugin_timeout));

        let metrics: BTreeMap<String, Snapshot> = join_all(calls).await.into_iter().flatten().collect();
        tracing::debug!(
            plugins = self.slots.len(),
            succeeded = metrics.len(),
            "Collection round finished"
        );
        Status::from_metrics(metrics)
    }
}

async fn snapshot_with_timeout(slot: &PluginSlot, plugin_timeout: Duration) -> Option<(String, Snapshot)> {
    let name = slot.plugin.name().to_string();

    if slot.in_flight.swap(true, Ordering::AcqRel) {
        tracing::warn!(plugin = %name, "Previous snapshot still running, skipping this round");
        metrics::record_plugin_failure(&name, "busy");
        return None;
    }

    let guard = InFlightGuard(Arc::clone(&slot.in_flight));
    let plugin = Arc::clone(&slot.plugin);
    let call = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        plugin.snapshot()
    });

    match time::timeout(plugin_timeout, call).await {
        Ok(Ok(Ok(snapshot))) => Some((name, snapshot)),
        Ok(Ok(Err(e))) => {
            tracing::warn!(plugin = %name, error = %e, "Plugin snapshot failed, skipping this round");
            metrics::record_plugin_failure(&name, "error");
            None
        }
        Ok(Err(e)) => {
            tracing::warn!(plugin = %name, error = %e, "Plugin snapshot panicked, skipping this round");
            metrics::record_plugin_failure(&name, "panic");
            None
        }
        Err(_) => {
            tracing::warn!(
                plugin = %name,
                timeout_ms = plugin_timeout.as_millis() as u64,
                "Plugin snapshot timed out, skipping this round"
            );
            metrics::record_plugin_failure(&name, "timeout");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::net::ConnectionId;
    use crate::plugins::PluginError;
    use serde_json::json;

    struct Fixed(&'static str, serde_json::Value);

    impl MetricPlugin for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn snapshot(&self) -> Result<Snapshot, PluginError> {
            Ok(Snapshot::Value(self.1.clone()))
        }
    }

    struct Failing(&'static str);

    impl MetricPlugin for Failing {
        fn name(&self) -> &str {
            self.0
        }

        fn snapshot(&self) -> Result<Snapshot, PluginError> {
            Err(PluginError::Other("device unavailable".into()))
        }
    }

    struct Stuck;

    impl MetricPlugin for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        fn snapshot(&self) -> Result<Snapshot, PluginError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Snapshot::Value(json!("late")))
        }
    }

    struct Panicking;

    impl MetricPlugin for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn snapshot(&self) -> Result<Snapshot, PluginError> {
            panic!("collector bug")
        }
    }

    fn config(interval_ms: u64) -> ServerConfig {
        ServerConfig {
            update_interval_ms: interval_ms,
            plugin_timeout_ms: 100,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_failed_plugin_is_skipped() {
        let mut registry = PluginRegistry::new();
        registry.register(Failing("swap")).unwrap();
        registry
            .register(Fixed("mem", json!({"total": 100, "used": 40})))
            .unwrap();

        let status = Collector::new(&registry, Duration::from_secs(1)).collect().await;
        assert_eq!(
            status.encode().unwrap().as_str(),
            r#"{"metrics":{"mem":{"total":100,"used":40}}}"#
        );
    }

    #[tokio::test]
    async fn test_slow_and_panicking_plugins_are_skipped() {
        let mut registry = PluginRegistry::new();
        registry.register(Stuck).unwrap();
        registry.register(Panicking).unwrap();
        registry.register(Fixed("ok", json!(1))).unwrap();

        let started = std::time::Instant::now();
        let status = Collector::new(&registry, Duration::from_millis(50)).collect().await;

        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(status.get("stuck").is_none());
        assert!(status.get("panicking").is_none());
        assert_eq!(status.get("ok"), Some(&Snapshot::Value(json!(1))));
    }

    #[tokio::test]
    async fn test_panicked_call_clears_in_flight() {
        let mut registry = PluginRegistry::new();
        registry.register(Panicking).unwrap();
        let collector = Collector::new(&registry, Duration::from_secs(1));

        collector.collect().await;
        assert_eq!(collector.in_flight(), 0);
    }

    struct Hung;

    impl MetricPlugin for Hung {
        fn name(&self) -> &str {
            "hung"
        }

        fn snapshot(&self) -> Result<Snapshot, PluginError> {
            std::thread::sleep(Duration::from_secs(1));
            Ok(Snapshot::Value(json!("late")))
        }
    }

    #[test]
    fn test_hung_plugin_does_not_starve_others() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(2)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let mut registry = PluginRegistry::new();
            registry.register(Hung).unwrap();
            registry.register(Fixed("good", json!(1))).unwrap();
            let collector = Collector::new(&registry, Duration::from_millis(50));

            for round in 0..6 {
                let status = collector.collect().await;
                assert!(status.get("hung").is_none(), "round {round}");
                assert!(status.get("good").is_some(), "round {round}");
            }
            assert_eq!(collector.in_flight(), 1);
        });
    }

    #[tokio::test]
    async fn test_round_without_successes_still_publishes() {
        let shutdown = Shutdown::new();
        let (hub, _handle) = Hub::spawn(8, shutdown.subscribe());
        let mut sub = hub.join(ConnectionId::new()).await.unwrap();

        let mut registry = PluginRegistry::new();
        registry.register(Failing("swap")).unwrap();
        let updater = Updater::new(Arc::new(registry), hub.clone(), &config(1000));

        updater.tick().await.unwrap();

        assert_eq!(sub.recv().await.unwrap().as_str(), "{}");
        assert_eq!(sub.recv().await.unwrap().as_str(), r#"{"metrics":{}}"#);
    }

    #[tokio::test]
    async fn test_run_publishes_on_each_tick() {
        let shutdown = Shutdown::new();
        let (hub, _handle) = Hub::spawn(8, shutdown.subscribe());
        let mut sub = hub.join(ConnectionId::new()).await.unwrap();

        let mut registry = PluginRegistry::new();
        registry.register(Fixed("mem", json!({"total": 1}))).unwrap();
        let updater = Updater::new(Arc::new(registry), hub.clone(), &config(20));
        let task = tokio::spawn(updater.run(shutdown.subscribe()));

        assert_eq!(sub.recv().await.unwrap().as_str(), "{}");
        for _ in 0..2 {
            let frame = tokio::time::timeout(Duration::from_secs(2), sub.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(frame.as_str(), r#"{"metrics":{"mem":{"total":1}}}"#);
        }

        shutdown.trigger();
        task.await.unwrap();
    }
}
