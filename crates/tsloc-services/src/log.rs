use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_FLUSH_THRESHOLD: usize = 200;

type Sink = Box<dyn Fn(String) + Send + Sync>;

struct Inner {
    lines: Mutex<Vec<String>>,
    threshold: usize,
    sink: Sink,
}

/// Line buffer for task-facing messages.
///
/// Lines are delivered to the sink in batches joined by `\n`, either when
/// `threshold` lines have piled up or when the periodic flusher fires. The
/// buffer lock is held while a batch is handed to the sink, so batches leave
/// in the order their lines were appended.
#[derive(Clone)]
pub struct TaskLog {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLog")
            .field("pending", &self.pending())
            .field("threshold", &self.inner.threshold)
            .finish()
    }
}

impl TaskLog {
    pub fn new(threshold: usize, sink: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                lines: Mutex::new(Vec::new()),
                threshold: threshold.max(1),
                sink: Box::new(sink),
            }),
        }
    }

    /// A log whose batches go nowhere; lines still reach `tracing`.
    pub fn discard() -> Self {
        Self::new(DEFAULT_FLUSH_THRESHOLD, |_| {})
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.inner
            .lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn line(&self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::debug!(target: "tsloc::task", "{msg}");
        let mut lines = self.lock();
        lines.push(msg);
        if lines.len() >= self.inner.threshold {
            self.drain(&mut lines);
        }
    }

    pub fn flush(&self) {
        let mut lines = self.lock();
        self.drain(&mut lines);
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn drain(&self, lines: &mut Vec<String>) {
        if lines.is_empty() {
            return;
        }
        let batch = lines.join("\n");
        lines.clear();
        (self.inner.sink)(batch);
    }

    /// Flush on a fixed interval until the returned handle is aborted.
    /// Must be called from within a tokio runtime.
    pub fn spawn_flusher(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let log = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                log.flush();
            }
        })
    }
}

#[cfg(test)]
pub(crate) fn collecting(threshold: usize) -> (TaskLog, Arc<Mutex<Vec<String>>>) {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let log = TaskLog::new(threshold, move |b| sink.lock().unwrap().push(b));
    (log, batches)
}
