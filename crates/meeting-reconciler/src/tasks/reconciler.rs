//! Reconciler background task.
//!
//! On a fixed interval, queries meetings that are still SCHEDULED although
//! their start time has passed and dispatches one transition task per
//! meeting. A cycle ends when dispatch ends; the loop never waits for the
//! transitions themselves.
//!
//! # Concurrency
//!
//! - A meeting whose previous task is still running is not dispatched again
//!   (in-flight set, entries released by a drop guard)
//! - At most `max_concurrent_transitions` tasks do store or push work at once;
//!   the permit is taken inside the task so dispatch never blocks
//! - The store update is guarded on the current status, so a second worker
//!   racing on the same meeting sees a benign skip
//!
//! # Graceful Shutdown
//!
//! When the cancellation token is triggered the loop stops starting cycles and
//! waits up to `shutdown_timeout` for dispatched tasks to finish.

use crate::config::{Config, DEFAULT_MAX_CONCURRENT_TRANSITIONS, DEFAULT_MAX_DUE_BATCH};
use crate::models::{Meeting, MeetingStatus};
use crate::observability::metrics;
use crate::repositories::MeetingsRepository;
use crate::services::{TransitionOutcome, Transitioner};
use chrono::{DateTime, Utc};
use common::types::MeetingId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

/// Default reconciliation interval in seconds.
const DEFAULT_INTERVAL_SECONDS: u64 = 5;

/// Default time allowed for in-flight transitions on shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;

/// Configuration for the reconciler task.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Pause between the end of one dispatch and the next query.
    pub interval: Duration,
    /// Upper bound on transitions doing work at the same time.
    pub max_concurrent_transitions: usize,
    /// Upper bound on meetings fetched per cycle.
    pub max_due_batch: u32,
    /// How long shutdown waits for in-flight transitions.
    pub shutdown_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECONDS),
            max_concurrent_transitions: DEFAULT_MAX_CONCURRENT_TRANSITIONS,
            max_due_batch: DEFAULT_MAX_DUE_BATCH,
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECONDS),
        }
    }
}

impl From<&Config> for ReconcilerConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.interval,
            max_concurrent_transitions: config.max_concurrent_transitions,
            max_due_batch: config.max_due_batch,
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Meetings returned by the due-set query.
    pub due: usize,
    /// Transition tasks spawned.
    pub dispatched: usize,
    /// Due meetings skipped because their previous task is still running.
    pub skipped_in_flight: usize,
    /// The due-set query failed; nothing was dispatched.
    pub query_failed: bool,
}

type InFlightSet = Arc<Mutex<HashSet<MeetingId>>>;

/// Removes a meeting from the in-flight set when dropped, including when the
/// owning task panics.
struct InFlightGuard {
    set: InFlightSet,
    id: MeetingId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// The reconciliation engine.
///
/// Cloning shares the in-flight set, limiter and task tracker.
#[derive(Clone)]
pub struct Reconciler {
    meetings: Arc<dyn MeetingsRepository>,
    transitioner: Transitioner,
    config: ReconcilerConfig,
    in_flight: InFlightSet,
    limiter: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl Reconciler {
    pub fn new(
        meetings: Arc<dyn MeetingsRepository>,
        transitioner: Transitioner,
        config: ReconcilerConfig,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_transitions));
        Self {
            meetings,
            transitioner,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            limiter,
            tracker: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Number of meetings with a dispatched, unfinished task.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run one cycle: query the due set as of `now` and dispatch.
    ///
    /// Returns once every due meeting has been dispatched or skipped.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let due = match self
            .meetings
            .find_due(MeetingStatus::Scheduled, now, self.config.max_due_batch)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                error!(
                    target: "reconciler.task",
                    error = %e,
                    "Failed to query due meetings, skipping cycle"
                );
                metrics::record_cycle("error");
                return CycleReport {
                    query_failed: true,
                    ..CycleReport::default()
                };
            }
        };

        let mut report = CycleReport {
            due: due.len(),
            ..CycleReport::default()
        };

        for meeting in due {
            let Some(guard) = self.claim(&meeting.id) else {
                debug!(
                    target: "reconciler.task",
                    meeting = %meeting,
                    "Transition already in flight, skipping"
                );
                report.skipped_in_flight += 1;
                continue;
            };

            self.dispatch(meeting, guard);
            report.dispatched += 1;
        }

        metrics::record_cycle("success");
        metrics::record_due_meetings(report.due);
        if report.due > 0 {
            info!(
                target: "reconciler.task",
                due = report.due,
                dispatched = report.dispatched,
                skipped_in_flight = report.skipped_in_flight,
                "Dispatched due meetings"
            );
        }

        report
    }

    /// Wait for every dispatched task to finish, up to `timeout`.
    ///
    /// Returns `false` if tasks were still running after `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
        {
            true
        } else {
            warn!(
                target: "reconciler.task",
                remaining = self.tracker.len(),
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Shutdown timeout reached with transitions still in flight"
            );
            false
        }
    }

    fn claim(&self, id: &MeetingId) -> Option<InFlightGuard> {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !set.insert(id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            id: id.clone(),
        })
    }

    fn dispatch(&self, meeting: Meeting, guard: InFlightGuard) {
        let transitioner = self.transitioner.clone();
        let limiter = Arc::clone(&self.limiter);

        self.tracker.spawn(async move {
            let _guard = guard;
            let Ok(_permit) = limiter.acquire_owned().await else {
                warn!(target: "reconciler.task", meeting = %meeting, "Transition limiter closed");
                return;
            };

            match transitioner.transition(&meeting, MeetingStatus::Active).await {
                Ok(TransitionOutcome::Transitioned {
                    notification: Err(e),
                }) => {
                    // Status is already ACTIVE; the meeting will not come back.
                    warn!(
                        target: "reconciler.task",
                        meeting = %meeting,
                        error = %e,
                        "Meeting transitioned but notification failed"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(
                        target: "reconciler.task",
                        meeting = %meeting,
                        error = %e,
                        "Transition failed, will retry next cycle"
                    );
                }
            }
        });
    }
}

/// Start the reconciler background task.
///
/// Runs a cycle, sleeps for the configured interval, and repeats until the
/// cancellation token is triggered. Then drains in-flight transitions.
///
/// # Arguments
///
/// * `reconciler` - The engine, already wired to the store and push gateway
/// * `cancel_token` - Token for graceful shutdown
#[instrument(skip_all, name = "reconciler.task")]
pub async fn start_reconciler(reconciler: Reconciler, cancel_token: CancellationToken) {
    let config = reconciler.config().clone();

    info!(
        target: "reconciler.task",
        interval_ms = u64::try_from(config.interval.as_millis()).unwrap_or(u64::MAX),
        max_concurrent_transitions = config.max_concurrent_transitions,
        max_due_batch = config.max_due_batch,
        "Starting reconciler task"
    );

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        reconciler.run_cycle(Utc::now()).await;

        tokio::select! {
            () = tokio::time::sleep(config.interval) => {}
            () = cancel_token.cancelled() => {
                info!(
                    target: "reconciler.task",
                    "Reconciler task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    let in_flight = reconciler.in_flight();
    if in_flight > 0 {
        info!(
            target: "reconciler.task",
            in_flight = in_flight,
            "Waiting for in-flight transitions"
        );
    }
    reconciler.drain(config.shutdown_timeout).await;

    info!(target: "reconciler.task", "Reconciler task stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::errors::ReconcilerError;
    use crate::models::User;
    use crate::repositories::UsersRepository;
    use crate::services::{DeviceResolver, Notifier, PushGateway, PushMessage, PushReport};
    use async_trait::async_trait;
    use common::types::UserId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns `due` from every query unless `fail` is set; updates always apply.
    struct FixedDue {
        due: Vec<Meeting>,
        fail: bool,
        queries: AtomicUsize,
        limits: Mutex<Vec<u32>>,
    }

    impl FixedDue {
        fn new(due: Vec<Meeting>, fail: bool) -> Self {
            Self {
                due,
                fail,
                queries: AtomicUsize::new(0),
                limits: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl MeetingsRepository for FixedDue {
        async fn find_due(
            &self,
            _status: MeetingStatus,
            _now: DateTime<Utc>,
            limit: u32,
        ) -> Result<Vec<Meeting>, ReconcilerError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.limits.lock().unwrap().push(limit);
            if self.fail {
                return Err(ReconcilerError::Store("no primary".to_string()));
            }
            Ok(self.due.clone())
        }

        async fn update_status(
            &self,
            _id: &MeetingId,
            _from: MeetingStatus,
            _to: MeetingStatus,
        ) -> Result<bool, ReconcilerError> {
            Ok(true)
        }
    }

    struct NoUsers;

    #[async_trait]
    impl UsersRepository for NoUsers {
        async fn find_by_id(&self, _id: &UserId) -> Result<Option<User>, ReconcilerError> {
            Ok(None)
        }
    }

    struct NullGateway;

    #[async_trait]
    impl PushGateway for NullGateway {
        async fn send(
            &self,
            _message: &PushMessage,
            _retries: u32,
        ) -> Result<PushReport, ReconcilerError> {
            Ok(PushReport::default())
        }
    }

    fn meeting(id: &str) -> Meeting {
        Meeting {
            id: MeetingId::new(id),
            goal: "Sync".to_string(),
            participants: vec![],
            owner: None,
            company: None,
            room: None,
            start_time: Utc::now(),
            end_time: None,
            status: MeetingStatus::Scheduled,
        }
    }

    fn reconciler(store: Arc<FixedDue>, config: ReconcilerConfig) -> Reconciler {
        let notifier = Notifier::new(
            DeviceResolver::new(Arc::new(NoUsers)),
            Arc::new(NullGateway),
            3,
        );
        let transitioner = Transitioner::new(store.clone(), notifier);
        Reconciler::new(store, transitioner, config)
    }

    #[test]
    fn test_default_config() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_transitions, 32);
        assert_eq!(config.max_due_batch, 500);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_query_failure_skips_cycle() {
        let store = Arc::new(FixedDue::new(vec![meeting("a")], true));
        let reconciler = reconciler(store, ReconcilerConfig::default());

        let report = reconciler.run_cycle(Utc::now()).await;

        assert_eq!(
            report,
            CycleReport {
                query_failed: true,
                ..CycleReport::default()
            }
        );
        assert_eq!(reconciler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_due_histogram_only_sampled_for_successful_queries() {
        use metrics_util::debugging::{DebugValue, DebuggingRecorder};

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        let failing = Arc::new(FixedDue::new(vec![meeting("a")], true));
        reconciler(failing, ReconcilerConfig::default())
            .run_cycle(Utc::now())
            .await;

        let working = Arc::new(FixedDue::new(vec![], false));
        reconciler(working, ReconcilerConfig::default())
            .run_cycle(Utc::now())
            .await;

        let snapshot = snapshotter.snapshot().into_vec();
        let samples: Vec<f64> = snapshot
            .iter()
            .find_map(|(key, _, _, value)| match (key.key().name(), value) {
                ("reconciler_due_meetings", DebugValue::Histogram(values)) => {
                    Some(values.iter().map(|v| v.into_inner()).collect())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(samples, vec![0.0]);

        let error_cycles = snapshot.iter().find_map(|(key, _, _, value)| {
            let is_error = key.key().name() == "reconciler_cycles_total"
                && key.key().labels().any(|l| l.value() == "error");
            match (is_error, value) {
                (true, DebugValue::Counter(v)) => Some(*v),
                _ => None,
            }
        });
        assert_eq!(error_cycles, Some(1));
    }

    #[tokio::test]
    async fn test_cycle_passes_batch_cap_to_query() {
        let store = Arc::new(FixedDue::new(vec![], false));
        let config = ReconcilerConfig {
            max_due_batch: 7,
            ..ReconcilerConfig::default()
        };
        let reconciler = reconciler(store.clone(), config);

        reconciler.run_cycle(Utc::now()).await;

        assert_eq!(*store.limits.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_guard_drops() {
        let store = Arc::new(FixedDue::new(vec![], false));
        let reconciler = reconciler(store, ReconcilerConfig::default());
        let id = MeetingId::new("a");

        let guard = reconciler.claim(&id).unwrap();
        assert!(reconciler.claim(&id).is_none());
        assert_eq!(reconciler.in_flight(), 1);

        drop(guard);
        assert_eq!(reconciler.in_flight(), 0);
        assert!(reconciler.claim(&id).is_some());
    }

    #[tokio::test]
    async fn test_dispatched_tasks_release_in_flight_entries() {
        let store = Arc::new(FixedDue::new(vec![meeting("a"), meeting("b")], false));
        let reconciler = reconciler(store, ReconcilerConfig::default());

        let report = reconciler.run_cycle(Utc::now()).await;
        assert_eq!(report.due, 2);
        assert_eq!(report.dispatched, 2);

        assert!(reconciler.drain(Duration::from_secs(5)).await);
        assert_eq!(reconciler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_task() {
        let store = Arc::new(FixedDue::new(vec![], false));
        let config = ReconcilerConfig {
            interval: Duration::from_secs(5),
            ..ReconcilerConfig::default()
        };
        let reconciler = reconciler(store.clone(), config);
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(start_reconciler(reconciler, cancel_token.clone()));

        // First cycle runs immediately, second after one interval.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.queries.load(Ordering::SeqCst), 2);

        cancel_token.cancel();
        handle.await.unwrap();
        assert_eq!(store.queries.load(Ordering::SeqCst), 2);
    }
}
