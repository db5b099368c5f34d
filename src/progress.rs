use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// In-place "N/total" indicator fed by per-port completion events.
///
/// It only ever reads the completion side channel, so dropping it or having it
/// fail leaves the outcome stream and the resulting summary untouched.
#[derive(Debug)]
pub struct ProgressReporter {
    completed: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Spawn the reporter task. The returned sender is cloned into each worker;
    /// the task ends once every clone has been dropped.
    ///
    /// With `visible == false` the counter is still maintained but nothing is drawn.
    pub fn spawn(target: &str, total: u64, visible: bool) -> (Self, mpsc::UnboundedSender<u16>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<u16>();
        let completed = Arc::new(AtomicU64::new(0));

        let draw_target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(total), draw_target);
        bar.set_style(
            ProgressStyle::with_template("Scanning {prefix}: {pos}/{len} ports")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_prefix(target.to_string());

        let counter = completed.clone();
        let handle = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
                bar.set_position(done);
            }
            bar.finish_and_clear();
        });

        (Self { completed, handle }, tx)
    }

    /// Ports reported as finished so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Wait for the event stream to drain and clear the indicator.
    pub async fn finish(self) -> u64 {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "progress reporter stopped early");
        }
        self.completed.load(Ordering::Relaxed)
    }
}
