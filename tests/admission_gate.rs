// Timing and ordering tests for the admission gate.
//
// All tests run on tokio's paused clock: sleeps complete instantly by
// advancing virtual time, so the release instant of each caller can be
// compared exactly against quota window boundaries.

use std::sync::{Arc, Mutex};

use perspective::ratelimit::{AdmissionGate, PacerState};
use tokio::time::{Duration, Instant};

const MINUTE: Duration = Duration::from_secs(60);

/// Queue `n` callers in order and return (caller index, release offset)
/// in the order they were released.
async fn release_log(gate: &AdmissionGate, n: usize) -> Vec<(usize, Duration)> {
    let start = Instant::now();
    let log = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..n)
        .map(|i| {
            let admission = gate.acquire();
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                admission.await;
                log.lock().unwrap().push((i, start.elapsed()));
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    let log = log.lock().unwrap().clone();
    log
}

fn secs(d: Duration) -> u64 {
    d.as_secs()
}

// ============================================================
// Scenarios
// ============================================================

#[tokio::test(start_paused = true)]
async fn third_caller_waits_for_next_window() {
    let gate = AdmissionGate::new(2, MINUTE).unwrap();
    let log = release_log(&gate, 3).await;

    let order: Vec<usize> = log.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, vec![0, 1, 2]);

    assert_eq!(log[0].1, Duration::ZERO);
    assert_eq!(log[1].1, Duration::ZERO);
    assert!(
        log[2].1 >= MINUTE && log[2].1 < MINUTE + Duration::from_secs(1),
        "third caller should be released at the 60s window reset, got {:?}",
        log[2].1
    );
}

#[tokio::test(start_paused = true)]
async fn server_rejection_blocks_until_full_period_after_it() {
    let gate = AdmissionGate::new(5, MINUTE).unwrap();
    let start = Instant::now();

    // Three permits used at t=0, two left
    for _ in 0..3 {
        gate.acquire().await;
    }
    assert_eq!(gate.window().remaining(), 2);

    tokio::time::advance(Duration::from_secs(10)).await;
    gate.force_exhaust();

    tokio::time::advance(Duration::from_secs(5)).await;
    gate.acquire().await;

    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_secs(70) && elapsed < Duration::from_secs(71),
        "expected admission at t=70 (10 + 60), not t=60; got {:?}",
        elapsed
    );
}

// ============================================================
// Quota properties
// ============================================================

#[tokio::test(start_paused = true)]
async fn callers_within_limit_are_not_delayed() {
    let gate = AdmissionGate::new(10, MINUTE).unwrap();
    let log = release_log(&gate, 10).await;

    assert_eq!(log.len(), 10);
    assert!(log.iter().all(|(_, t)| *t == Duration::ZERO));
}

#[tokio::test(start_paused = true)]
async fn at_most_limit_released_per_window() {
    let period = Duration::from_secs(10);
    let gate = AdmissionGate::new(3, period).unwrap();
    let log = release_log(&gate, 7).await;

    let times: Vec<u64> = log.iter().map(|(_, t)| secs(*t)).collect();
    assert_eq!(times, vec![0, 0, 0, 10, 10, 10, 20]);

    for window in 0..3u64 {
        let in_window = times
            .iter()
            .filter(|t| **t >= window * 10 && **t < (window + 1) * 10)
            .count();
        assert!(in_window <= 3, "window {window} released {in_window}");
    }
}

#[tokio::test(start_paused = true)]
async fn release_order_survives_exhaustion_boundaries() {
    let gate = AdmissionGate::new(2, Duration::from_secs(5)).unwrap();
    let log = release_log(&gate, 9).await;

    let order: Vec<usize> = log.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, (0..9).collect::<Vec<_>>());

    // Release offsets never go backwards
    assert!(log.windows(2).all(|pair| pair[0].1 <= pair[1].1));
}

#[tokio::test(start_paused = true)]
async fn late_arrival_waits_out_a_window_the_earlier_burst_used_up() {
    let gate = AdmissionGate::new(2, MINUTE).unwrap();
    let start = Instant::now();
    gate.acquire().await;
    gate.acquire().await;
    assert_eq!(gate.pacer_state(), PacerState::Idle);

    tokio::time::advance(Duration::from_secs(20)).await;
    gate.acquire().await;
    assert_eq!(secs(start.elapsed()), 60);
}

#[tokio::test(start_paused = true)]
async fn new_window_after_idle_period_is_full() {
    let gate = AdmissionGate::new(2, MINUTE).unwrap();
    gate.acquire().await;
    gate.acquire().await;

    tokio::time::advance(Duration::from_secs(300)).await;
    let log = release_log(&gate, 2).await;
    assert!(log.iter().all(|(_, t)| *t == Duration::ZERO));
}

// ============================================================
// force_exhaust
// ============================================================

#[tokio::test(start_paused = true)]
async fn force_exhaust_with_idle_gate_delays_next_caller_by_full_period() {
    let gate = AdmissionGate::new(100, MINUTE).unwrap();
    let start = Instant::now();

    gate.force_exhaust();
    gate.acquire().await;
    assert_eq!(secs(start.elapsed()), 60);
}

#[tokio::test(start_paused = true)]
async fn repeated_force_exhaust_extends_from_latest_call() {
    let gate = AdmissionGate::new(100, MINUTE).unwrap();
    let start = Instant::now();

    gate.force_exhaust();
    tokio::time::advance(Duration::from_secs(40)).await;
    gate.force_exhaust();

    gate.acquire().await;
    assert_eq!(secs(start.elapsed()), 100);
}

#[tokio::test(start_paused = true)]
async fn force_exhaust_holds_back_queued_callers() {
    let gate = AdmissionGate::new(1, MINUTE).unwrap();
    let start = Instant::now();
    gate.acquire().await;

    let waiting = tokio::spawn(gate.acquire());
    tokio::task::yield_now().await;
    gate.force_exhaust();

    waiting.await.unwrap();
    assert_eq!(secs(start.elapsed()), 60);
    assert_eq!(gate.pacer_state(), PacerState::Idle);
}

// ============================================================
// Cancellation & sharing
// ============================================================

#[tokio::test(start_paused = true)]
async fn abandoned_caller_does_not_use_a_permit() {
    let gate = AdmissionGate::new(1, MINUTE).unwrap();
    let start = Instant::now();
    gate.acquire().await;

    let abandoned = gate.acquire();
    let kept = gate.acquire();
    assert_eq!(gate.queued(), 2);
    drop(abandoned);

    kept.await;
    assert_eq!(secs(start.elapsed()), 60);
    assert_eq!(gate.queued(), 0);
}

#[tokio::test(start_paused = true)]
async fn abandoned_future_polled_once_is_skipped() {
    let gate = AdmissionGate::new(1, MINUTE).unwrap();
    let start = Instant::now();
    gate.acquire().await;

    // Give up after 10s of waiting
    let timed_out = tokio::time::timeout(Duration::from_secs(10), gate.acquire()).await;
    assert!(timed_out.is_err());

    gate.acquire().await;
    assert_eq!(secs(start.elapsed()), 60);
}

#[tokio::test(start_paused = true)]
async fn clones_share_one_quota() {
    let gate = AdmissionGate::new(2, MINUTE).unwrap();
    let other = gate.clone();
    let start = Instant::now();

    gate.acquire().await;
    other.acquire().await;
    gate.acquire().await;

    assert_eq!(secs(start.elapsed()), 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_on_threads_all_get_through() {
    let gate = AdmissionGate::new(1000, MINUTE).unwrap();

    let handles: Vec<_> = (0..200)
        .map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(gate.window().remaining(), 800);
    assert_eq!(gate.queued(), 0);
}
