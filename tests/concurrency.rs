use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ticketsim::config::{DelayRange, RunLimit, SimConfig};
use ticketsim::engine::{Engine, Outcome, WakePolicy};
use ticketsim::model::{EventIndex, Query, WorkerId};
use ticketsim::query::{ScriptedSourceFactory, RandomSourceFactory};
use ticketsim::report::{Status, StatusSink};
use ticketsim::supervisor::Supervisor;

// ── Test infrastructure ──────────────────────────────────────

/// Tracks which worker holds a mutating slot on each event, from the claim log.
#[derive(Default)]
struct ClaimAudit {
    inner: Mutex<AuditState>,
}

#[derive(Default)]
struct AuditState {
    holders: HashMap<EventIndex, WorkerId>,
    overlaps: Vec<(EventIndex, WorkerId, WorkerId)>,
    claims: u64,
    booked: i64,
    cancelled: i64,
}

impl StatusSink for ClaimAudit {
    fn record(&self, status: &Status) {
        let mut guard = self.inner.lock().unwrap();
        let state = &mut *guard;
        match status {
            Status::SlotClaimed { worker, query, .. } if query.kind().is_mutating() => {
                state.claims += 1;
                if let Some(&other) = state.holders.get(&query.event()) {
                    state.overlaps.push((query.event(), other, *worker));
                }
                state.holders.insert(query.event(), *worker);
            }
            Status::SlotReleasing { worker, query, .. } if query.kind().is_mutating() => {
                if state.holders.get(&query.event()) == Some(worker) {
                    state.holders.remove(&query.event());
                }
            }
            Status::Completed { outcome: Outcome::Booked(b), .. } => state.booked += i64::from(b.tickets),
            Status::Completed { outcome: Outcome::Cancelled(_), .. } => state.cancelled += 1,
            _ => {}
        }
    }
}

fn single_event_config(policy: WakePolicy, run_limit: RunLimit) -> SimConfig {
    SimConfig {
        event_count: 1,
        capacity: 20,
        worker_count: 10,
        admission_limit: 2,
        registry_slots: 2,
        run_limit,
        think_delay: DelayRange::new(0, 2),
        idle_delay: DelayRange::new(0, 2),
        wake_policy: policy,
        seed: Some(2024),
        ..SimConfig::default()
    }
}

fn alternating_script() -> Arc<ScriptedSourceFactory> {
    Arc::new(ScriptedSourceFactory::new(vec![
        Query::Book { event: 0, tickets: 3 },
        Query::Cancel { event: 0 },
    ]))
}

/// Samples the shared state while the pool runs and fails on any broken invariant.
fn spawn_monitor(engine: Arc<Engine>, capacity: u32, stop: CancellationToken) -> tokio::task::JoinHandle<u64> {
    tokio::spawn(async move {
        let mut samples = 0;
        while !stop.is_cancelled() {
            let reserved = engine.ledger.reserved(0).await.unwrap();
            assert!(reserved <= capacity, "reserved {reserved} over capacity");

            let mutating = engine
                .registry
                .active()
                .into_iter()
                .filter(|(_, q)| q.event == 0 && q.kind.is_mutating())
                .count();
            assert!(mutating <= 1, "{mutating} mutating slots on event 0");

            samples += 1;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        samples
    })
}

// ── Scenarios ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ten_workers_hammer_one_event_for_five_seconds() {
    let config = single_event_config(WakePolicy::CheckOnce, RunLimit::Duration(Duration::from_secs(5)));
    let engine = Arc::new(Engine::from_config(&config));
    let audit = Arc::new(ClaimAudit::default());

    let monitor_stop = CancellationToken::new();
    let monitor = spawn_monitor(engine.clone(), config.capacity, monitor_stop.clone());

    let report = Supervisor::new(config.clone())
        .with_sink(audit.clone())
        .with_source_factory(alternating_script())
        .run_on(engine.clone(), CancellationToken::new())
        .await
        .unwrap();

    monitor_stop.cancel();
    let samples = monitor.await.unwrap();
    assert!(samples > 0);

    let state = audit.inner.lock().unwrap();
    assert!(state.overlaps.is_empty(), "conflicting claims: {:?}", state.overlaps);
    assert!(state.claims > 0);
    assert!(state.holders.is_empty());

    let reserved = report.events[0].reserved;
    assert!(reserved <= config.capacity);
    assert_eq!(state.booked - state.cancelled, i64::from(reserved));
    assert_eq!(report.workers.len(), 10);
    assert!(engine.registry.active().is_empty());
    assert_eq!(engine.gate.admitted().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn recheck_policy_keeps_the_same_guarantees() {
    let config = single_event_config(WakePolicy::Recheck, RunLimit::Operations(500));
    let engine = Arc::new(Engine::from_config(&config));
    let audit = Arc::new(ClaimAudit::default());

    let report = Supervisor::new(config.clone())
        .with_sink(audit.clone())
        .with_source_factory(alternating_script())
        .run_on(engine.clone(), CancellationToken::new())
        .await
        .unwrap();

    let state = audit.inner.lock().unwrap();
    assert!(state.overlaps.is_empty(), "conflicting claims: {:?}", state.overlaps);
    assert_eq!(state.booked - state.cancelled, i64::from(report.events[0].reserved));
    assert_eq!(engine.gate.admitted().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn random_queries_balance_across_events() {
    let config = SimConfig {
        event_count: 4,
        capacity: 60,
        worker_count: 8,
        admission_limit: 3,
        registry_slots: 3,
        run_limit: RunLimit::Operations(1_000),
        think_delay: DelayRange::none(),
        idle_delay: DelayRange::new(0, 1),
        seed: Some(5),
        ..SimConfig::default()
    };
    let engine = Arc::new(Engine::from_config(&config));
    let audit = Arc::new(ClaimAudit::default());

    let report = Supervisor::new(config.clone())
        .with_sink(audit.clone())
        .with_source_factory(Arc::new(RandomSourceFactory::new(config.clone())))
        .run_on(engine, CancellationToken::new())
        .await
        .unwrap();

    let state = audit.inner.lock().unwrap();
    assert!(state.overlaps.is_empty());
    for row in &report.events {
        assert!(row.reserved <= 60);
        assert_eq!(row.reserved + row.available, 60);
    }
    assert_eq!(state.booked - state.cancelled, report.total_reserved() as i64);
}
