use crate::aggregate::Aggregator;
use crate::error::ScanError;
use crate::probe::{probe_port, ProbeOptions};
use crate::progress::ProgressReporter;
use crate::types::{ProbeOutcome, ScanSummary};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Parameters for scanning one target.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum number of probes in flight at once.
    pub workers: usize,
    pub probe: ProbeOptions,
    /// Draw the progress indicator on stderr.
    pub show_progress: bool,
}

/// Scan `ports` on `host` with at most `opts.workers` concurrent TCP probes.
pub async fn scan_host(
    host: &str,
    ports: &[u16],
    opts: &ScanOptions,
) -> Result<ScanSummary, ScanError> {
    scan_host_with_cancel(host, ports, opts, CancellationToken::new()).await
}

/// Variant of [`scan_host`] that stops early when `cancel` fires.
///
/// A cancelled run yields [`ScanError::Cancelled`], never a partial summary.
pub async fn scan_host_with_cancel(
    host: &str,
    ports: &[u16],
    opts: &ScanOptions,
    cancel: CancellationToken,
) -> Result<ScanSummary, ScanError> {
    info!(host, ports = ports.len(), workers = opts.workers, "starting scan");

    let (reporter, progress_tx) =
        ProgressReporter::spawn(host, ports.len() as u64, opts.show_progress);

    let shared_host: Arc<str> = Arc::from(host);
    let probe_opts = Arc::new(opts.probe.clone());
    let probe = move |port: u16| {
        let host = shared_host.clone();
        let probe_opts = probe_opts.clone();
        async move { probe_port(&host, port, &probe_opts).await }
    };

    let res = run_pool(host, ports, opts.workers, probe, Some(progress_tx), cancel).await;
    reporter.finish().await;

    match &res {
        Ok(summary) => info!(
            host,
            scanned = summary.scanned_count,
            open = summary.open_count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "scan finished"
        ),
        Err(e) => warn!(host, error = %e, "scan failed"),
    }
    res
}

/// Fan `ports` out to a fixed pool of workers and aggregate their outcomes.
///
/// - A producer task enqueues every port exactly once, then closes the queue.
/// - `min(workers, ports.len())` workers each pull the next port, run `probe`,
///   publish the outcome, then publish a completion event on `progress`.
/// - The result channel closes when the last worker exits; that is the
///   completion signal the aggregation loop waits on.
///
/// A `probe` error cancels the remaining workers of this run and fails it.
/// `cancel` itself is only observed, never triggered, so callers may share it
/// across runs.
pub async fn run_pool<F, Fut>(
    target: &str,
    ports: &[u16],
    workers: usize,
    probe: F,
    progress: Option<mpsc::UnboundedSender<u16>>,
    cancel: CancellationToken,
) -> Result<ScanSummary, ScanError>
where
    F: Fn(u16) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<ProbeOutcome, ScanError>> + Send + 'static,
{
    let cancel = cancel.child_token();
    let submitted = ports.len();
    let started = Instant::now();
    let worker_count = workers.max(1).min(submitted);
    let capacity = worker_count.max(1);

    let (task_tx, task_rx) = mpsc::channel::<u16>(capacity);
    let task_rx = Arc::new(Mutex::new(task_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<ProbeOutcome>(capacity);

    let feed = ports.to_vec();
    let producer = tokio::spawn(async move {
        for port in feed {
            // Fails only once every worker has exited.
            if task_tx.send(port).await.is_err() {
                break;
            }
        }
    });

    let mut set = JoinSet::new();
    for _ in 0..worker_count {
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let progress = progress.clone();
        let probe = probe.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            loop {
                let port = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = next_port(&task_rx) => match next {
                        Some(port) => port,
                        None => break,
                    },
                };

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    res = probe(port) => match res {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            cancel.cancel();
                            return Err(e);
                        }
                    },
                };

                if result_tx.send(outcome).await.is_err() {
                    break;
                }
                if let Some(progress) = &progress {
                    let _ = progress.send(port);
                }
            }
            Ok::<(), ScanError>(())
        });
    }
    // Workers hold the only remaining handles from here on.
    drop(task_rx);
    drop(result_tx);
    drop(progress);

    let mut agg = Aggregator::new(target, started);
    while let Some(outcome) = result_rx.recv().await {
        agg.record(outcome);
    }

    let mut failure: Option<ScanError> = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failure.get_or_insert(e);
            }
            Err(e) => {
                failure.get_or_insert(ScanError::WorkerPanicked(e.to_string()));
            }
        }
    }
    if let Err(e) = producer.await {
        failure.get_or_insert(ScanError::WorkerPanicked(e.to_string()));
    }

    if let Some(e) = failure {
        return Err(e);
    }
    if cancel.is_cancelled() && agg.scanned() < submitted {
        return Err(ScanError::Cancelled {
            completed: agg.scanned(),
            submitted,
        });
    }
    agg.finish(submitted)
}

async fn next_port(queue: &Mutex<mpsc::Receiver<u16>>) -> Option<u16> {
    queue.lock().await.recv().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn every_seventh(port: u16) -> impl Future<Output = Result<ProbeOutcome, ScanError>> {
        async move {
            tokio::task::yield_now().await;
            if port % 7 == 0 {
                Ok(ProbeOutcome::open(port, None))
            } else {
                Ok(ProbeOutcome::closed(port))
            }
        }
    }

    fn open_set(summary: &ScanSummary) -> HashSet<u16> {
        summary.open_ports.iter().map(|o| o.port).collect()
    }

    #[tokio::test]
    async fn every_port_reported_once() {
        let ports: Vec<u16> = (1..=200).collect();
        let summary = run_pool("t", &ports, 8, every_seventh, None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.scanned_count, 200);
        let expected: HashSet<u16> = ports.iter().copied().filter(|p| p % 7 == 0).collect();
        assert_eq!(open_set(&summary), expected);
        assert_eq!(summary.open_count(), expected.len());
    }

    #[tokio::test]
    async fn empty_port_list_terminates() {
        let run = run_pool("t", &[], 16, every_seventh, None, CancellationToken::new());
        let summary = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("pool must not hang on empty input")
            .unwrap();
        assert_eq!(summary.scanned_count, 0);
        assert_eq!(summary.open_count(), 0);
        assert!(summary.open_ports.is_empty());
    }

    #[tokio::test]
    async fn worker_count_does_not_change_open_set() {
        let ports: Vec<u16> = (1..=60).collect();
        let mut sets = Vec::new();
        for workers in [1, 3, 60, 500] {
            let summary = run_pool("t", &ports, workers, every_seventh, None, CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(summary.scanned_count, ports.len());
            sets.push(open_set(&summary));
        }
        assert!(sets.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn in_flight_probes_are_bounded_by_workers() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let probe = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            move |port: u16| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(ProbeOutcome::closed(port))
                }
            }
        };

        let ports: Vec<u16> = (1..=40).collect();
        let summary = run_pool("t", &ports, 4, probe, None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.scanned_count, 40);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak concurrency {peak} exceeds worker count");
        assert!(peak > 1, "workers never overlapped");
    }

    #[tokio::test]
    async fn completion_events_match_outcomes() {
        let ports: Vec<u16> = (100..150).collect();
        let (reporter, tx) = ProgressReporter::spawn("t", ports.len() as u64, false);
        let summary = run_pool("t", &ports, 5, every_seventh, Some(tx), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reporter.finish().await, ports.len() as u64);
        assert_eq!(summary.scanned_count, ports.len());
    }

    #[tokio::test]
    async fn resource_exhaustion_fails_the_run() {
        let probe = |port: u16| async move {
            if port == 5 {
                Err(ScanError::ResourceExhausted(io::Error::from_raw_os_error(24)))
            } else {
                Ok(ProbeOutcome::closed(port))
            }
        };
        let ports: Vec<u16> = (1..=20).collect();
        let res = run_pool("t", &ports, 2, probe, None, CancellationToken::new()).await;
        assert!(matches!(res, Err(ScanError::ResourceExhausted(_))));
    }

    #[tokio::test]
    async fn exhaustion_leaves_shared_token_usable() {
        let shared = CancellationToken::new();
        let exhausted = |port: u16| async move {
            if port == 1 {
                Err(ScanError::ResourceExhausted(io::Error::from_raw_os_error(24)))
            } else {
                Ok(ProbeOutcome::closed(port))
            }
        };
        let res = run_pool("a", &[1, 2, 3], 2, exhausted, None, shared.clone()).await;
        assert!(matches!(res, Err(ScanError::ResourceExhausted(_))));
        assert!(!shared.is_cancelled());

        let summary = run_pool("b", &[10, 11], 2, every_seventh, None, shared.clone())
            .await
            .unwrap();
        assert_eq!(summary.scanned_count, 2);
    }

    #[tokio::test]
    async fn cancelled_run_is_not_summarized() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ports: Vec<u16> = (1..=10).collect();
        let res = run_pool("t", &ports, 2, every_seventh, None, cancel).await;
        match res {
            Err(ScanError::Cancelled { submitted, .. }) => assert_eq!(submitted, 10),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
