/// Background schedule-trigger service
///
/// Ticks roughly every two seconds and evaluates enabled scheduleTrigger
/// nodes against the cron matcher once per absolute minute. Deduplication
/// is minute-granular across the whole scheduler: at most one matched
/// trigger starts a run per minute (first match wins), and the processed
/// minute advances whether or not anything fired.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

use crate::cron;
use crate::runtime::engine::ExecutionEngine;
use crate::workflow::store::WorkflowStore;
use crate::workflow::types::NodeType;

/// Tick interval for the scheduler loop.
const TICK: Duration = Duration::from_secs(2);

/// Minute-granular trigger scheduler.
pub struct Scheduler {
    engine: Arc<ExecutionEngine>,
    store: Arc<WorkflowStore>,
    last_minute: std::sync::atomic::AtomicI64,
}

impl Scheduler {
    pub fn new(engine: Arc<ExecutionEngine>, store: Arc<WorkflowStore>) -> Self {
        Self {
            engine,
            store,
            last_minute: std::sync::atomic::AtomicI64::new(i64::MIN),
        }
    }

    /// Run the tick loop until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!("⏰ Scheduler started ({}s tick)", TICK.as_secs());
        let mut interval = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("⏹️ Scheduler stopped");
                    return;
                }
                _ = interval.tick() => {
                    if let Some(node_id) = self.scan_at(Local::now()) {
                        self.start_run(node_id);
                    }
                }
            }
        }
    }

    /// Evaluate trigger nodes for the minute containing `now`.
    ///
    /// Returns the id of the trigger node to fire, if any. Pure over the
    /// workflow snapshot so the firing policy is testable without a clock.
    pub fn scan_at(&self, now: DateTime<Local>) -> Option<String> {
        use std::sync::atomic::Ordering;

        let minute = now.timestamp().div_euclid(60);
        let last = self.last_minute.load(Ordering::SeqCst);
        if minute <= last {
            return None;
        }
        // Advance unconditionally so the same minute is never re-scanned.
        self.last_minute.store(minute, Ordering::SeqCst);

        let workflow = self.store.snapshot();
        for node in &workflow.nodes {
            if node.node_type != NodeType::ScheduleTrigger {
                continue;
            }
            if !node.data_bool("enabled").unwrap_or(false) {
                continue;
            }
            let Some(expr) = node.data_str("cronExpression") else {
                continue;
            };
            if cron::matches(expr, now) {
                tracing::info!("🔔 Schedule trigger matched: {} ({})", node.id, expr);
                return Some(node.id.clone());
            }
        }
        None
    }

    fn start_run(&self, trigger_node_id: String) {
        if self.engine.state().is_running() {
            tracing::warn!(
                "⏭️ Skipping schedule trigger {}: a run is already in progress",
                trigger_node_id
            );
            return;
        }
        let engine = Arc::clone(&self.engine);
        let workflow = self.store.snapshot();
        tokio::spawn(async move {
            match engine.run(workflow).await {
                Ok(()) => {
                    tracing::info!("✅ Scheduled run completed (trigger: {})", trigger_node_id)
                }
                Err(err) => {
                    tracing::error!(
                        "❌ Scheduled run failed (trigger: {}): {}",
                        trigger_node_id,
                        err
                    )
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::registry::ExecutorRegistry;
    use crate::services::Services;
    use crate::workflow::types::Workflow;
    use chrono::TimeZone;
    use serde_json::json;

    async fn scheduler_with(workflow: Workflow) -> Scheduler {
        let artifacts = Arc::new(crate::artifact::ArtifactStore::in_memory().await.unwrap());
        let services = Arc::new(Services::with_artifacts(artifacts));
        let engine = ExecutionEngine::new(Arc::new(ExecutorRegistry::with_builtins()), services);
        let store = Arc::new(WorkflowStore::with_workflow(workflow).unwrap());
        Scheduler::new(engine, store)
    }

    fn trigger_workflow(enabled: bool) -> Workflow {
        serde_json::from_value(json!({
            "nodes": [
                {"id": "s1", "type": "scheduleTrigger",
                 "data": {"enabled": enabled, "cronExpression": "* * * * *"}},
                {"id": "out", "type": "output"}
            ],
            "edges": [
                {"id": "e1", "source": "s1", "target": "out"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn fires_once_per_minute() {
        let scheduler = scheduler_with(trigger_workflow(true)).await;
        let at = Local.with_ymd_and_hms(2025, 1, 1, 9, 30, 5).unwrap();
        assert_eq!(scheduler.scan_at(at), Some("s1".to_string()));
        // Same minute, later tick: nothing fires.
        let later = Local.with_ymd_and_hms(2025, 1, 1, 9, 30, 45).unwrap();
        assert_eq!(scheduler.scan_at(later), None);
        // Next minute fires again.
        let next = Local.with_ymd_and_hms(2025, 1, 1, 9, 31, 1).unwrap();
        assert_eq!(scheduler.scan_at(next), Some("s1".to_string()));
    }

    #[tokio::test]
    async fn disabled_triggers_never_fire() {
        let scheduler = scheduler_with(trigger_workflow(false)).await;
        let at = Local.with_ymd_and_hms(2025, 1, 1, 9, 30, 5).unwrap();
        assert_eq!(scheduler.scan_at(at), None);
    }

    #[tokio::test]
    async fn minute_advances_even_without_match() {
        let scheduler = scheduler_with(trigger_workflow(true)).await;
        // First scan consumes the minute with a match.
        let at = Local.with_ymd_and_hms(2025, 1, 1, 9, 30, 5).unwrap();
        assert!(scheduler.scan_at(at).is_some());
        // A scan for an earlier minute is a no-op.
        let earlier = Local.with_ymd_and_hms(2025, 1, 1, 9, 29, 0).unwrap();
        assert_eq!(scheduler.scan_at(earlier), None);
    }
}
