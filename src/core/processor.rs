//! Batch processor: buffering, flush scheduling, and batched export.
//!
//! The processor owns the live buffer that producer threads append to and a
//! single background worker that drains it. Producers only ever touch the
//! buffer mutex, held for the append or swap alone; the transport is owned
//! by the worker, so a slow or failing collector can never stall `enqueue`.
//!
//! Flush triggers, whichever comes first:
//! - the buffer reaches `max_batch_size`,
//! - `linger_interval` elapses after the buffer becomes non-empty,
//! - an explicit flush or drain command arrives.
//!
//! A flush swaps the whole live buffer for a fresh one in one indivisible
//! step, then exports the retired records in chunks of at most
//! `max_batch_size`, strictly in order, from the one worker. Batch N is
//! always sent before batch N+1 and sends never overlap.

use crate::config::{BackpressurePolicy, PipelineConfig};
use crate::core::record::Record;
use crate::diagnostics::Diagnostics;
use crate::transport::{ExportError, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, error, warn};

/// Control messages for the flush worker.
#[derive(Debug)]
pub(crate) enum Command {
    /// Flush the live buffer now and acknowledge.
    Flush(oneshot::Sender<()>),
    /// Flush the live buffer, acknowledge, and stop the worker.
    Drain(oneshot::Sender<()>),
}

/// Live buffer state, guarded by one mutex.
#[derive(Debug, Default)]
struct BufferState {
    queue: VecDeque<Record>,
    /// When the buffer last became non-empty; anchors the linger timer.
    first_enqueued_at: Option<Instant>,
    /// Set once shutdown begins; enqueue rejects afterwards.
    closed: bool,
}

/// Owns the in-memory buffer and the flush-trigger policy.
#[derive(Debug)]
pub struct BatchProcessor {
    state: Mutex<BufferState>,
    /// Signalled whenever a flush frees buffer space; `Block`-policy
    /// producers wait on this.
    space_available: Condvar,
    /// Wakes the worker on the first record of a buffer and on size trigger.
    wakeup: Notify,
    max_batch_size: usize,
    max_queue_capacity: usize,
    backpressure_policy: BackpressurePolicy,
    enqueue_block_timeout: Duration,
    linger_interval: Duration,
    max_retry_attempts: u32,
    retry_initial_backoff: Duration,
    diagnostics: Arc<Diagnostics>,
}

fn recover<T>(result: Result<T, PoisonError<T>>) -> T {
    // A poisoned buffer mutex only means a producer panicked mid-append;
    // the queue itself is still structurally sound.
    result.unwrap_or_else(PoisonError::into_inner)
}

impl BatchProcessor {
    pub fn new(config: &PipelineConfig, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            space_available: Condvar::new(),
            wakeup: Notify::new(),
            max_batch_size: config.max_batch_size,
            max_queue_capacity: config.max_queue_capacity,
            backpressure_policy: config.backpressure_policy,
            enqueue_block_timeout: config.enqueue_block_timeout(),
            linger_interval: config.linger_interval(),
            max_retry_attempts: config.max_retry_attempts,
            retry_initial_backoff: config.retry_initial_backoff(),
            diagnostics,
        }
    }

    /// Append a record to the live buffer.
    ///
    /// Never fails toward the caller: a full buffer is resolved by the
    /// configured backpressure policy and a closed one rejects the record,
    /// with either outcome recorded in the diagnostics counters.
    pub fn enqueue(&self, record: Record) {
        let mut state = recover(self.state.lock());

        if state.closed {
            self.diagnostics.increment_records_rejected_shutdown();
            return;
        }

        if state.queue.len() >= self.max_queue_capacity {
            match self.backpressure_policy {
                BackpressurePolicy::Block => {
                    let capacity = self.max_queue_capacity;
                    let (guard, _timeout) = recover(self.space_available.wait_timeout_while(
                        state,
                        self.enqueue_block_timeout,
                        |s| !s.closed && s.queue.len() >= capacity,
                    ));
                    state = guard;
                    if state.closed {
                        self.diagnostics.increment_records_rejected_shutdown();
                        return;
                    }
                    if state.queue.len() >= self.max_queue_capacity {
                        // waited out the bound without space appearing
                        self.diagnostics.increment_records_dropped_backpressure();
                        return;
                    }
                }
                BackpressurePolicy::DropNewest => {
                    self.diagnostics.increment_records_dropped_backpressure();
                    return;
                }
                BackpressurePolicy::DropOldest => {
                    state.queue.pop_front();
                    self.diagnostics.increment_records_dropped_backpressure();
                }
            }
        }

        if state.queue.is_empty() {
            state.first_enqueued_at = Some(Instant::now());
        }
        state.queue.push_back(record);
        let should_wake = state.queue.len() == 1 || state.queue.len() >= self.max_batch_size;
        drop(state);

        self.diagnostics.increment_records_enqueued();
        if should_wake {
            self.wakeup.notify_one();
        }
    }

    /// Stop accepting records. Producers blocked on backpressure are woken
    /// and their records rejected.
    pub fn close_intake(&self) {
        let mut state = recover(self.state.lock());
        state.closed = true;
        drop(state);
        self.space_available.notify_all();
    }

    /// Records currently sitting in the live buffer.
    pub fn buffered_records(&self) -> usize {
        recover(self.state.lock()).queue.len()
    }

    /// Deadline of the pending linger window, if the buffer is non-empty.
    fn linger_deadline(&self) -> Option<tokio::time::Instant> {
        let state = recover(self.state.lock());
        state
            .first_enqueued_at
            .map(|at| tokio::time::Instant::from_std(at + self.linger_interval))
    }

    fn batch_ready(&self) -> bool {
        recover(self.state.lock()).queue.len() >= self.max_batch_size
    }

    /// Swap the live buffer out and export the retired records.
    ///
    /// The swap is the only step that holds the lock; producers appending
    /// concurrently land in the fresh buffer and never wait on the export.
    pub(crate) async fn flush_now(&self, transport: &dyn Transport) {
        let mut drained: Vec<Record> = {
            let mut state = recover(self.state.lock());
            state.first_enqueued_at = None;
            state.queue.drain(..).collect()
        };
        if drained.is_empty() {
            return;
        }
        self.space_available.notify_all();

        while !drained.is_empty() {
            let take = drained.len().min(self.max_batch_size);
            let batch: Vec<Record> = drained.drain(..take).collect();
            self.export_with_retry(transport, batch).await;
        }
    }

    /// Send one batch, retrying transient failures with exponential backoff.
    async fn export_with_retry(&self, transport: &dyn Transport, batch: Vec<Record>) {
        let mut attempt: u32 = 1;
        let mut backoff = self.retry_initial_backoff;

        loop {
            match transport.send(&batch).await {
                Ok(()) => {
                    self.diagnostics.add_records_exported(batch.len() as u64);
                    debug!(records = batch.len(), "batch exported");
                    return;
                }
                Err(ExportError::Fatal(reason)) => {
                    self.diagnostics.add_records_lost_fatal(batch.len() as u64);
                    error!(
                        records = batch.len(),
                        %reason,
                        "dropping batch after fatal export failure"
                    );
                    return;
                }
                Err(ExportError::Retryable(reason)) => {
                    if attempt >= self.max_retry_attempts {
                        self.diagnostics.add_records_lost_retry(batch.len() as u64);
                        warn!(
                            records = batch.len(),
                            attempts = attempt,
                            %reason,
                            "dropping batch after retry budget exhausted"
                        );
                        return;
                    }
                    warn!(attempt, %reason, "export failed, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }
}

/// Flush worker loop. One instance per processor; all transport calls happen
/// here, so batch ordering toward the collector is total.
pub(crate) async fn run_flush_worker(
    processor: Arc<BatchProcessor>,
    transport: Arc<dyn Transport>,
    mut commands: mpsc::Receiver<Command>,
) {
    enum Wake {
        Buffer,
        Linger,
        Command(Option<Command>),
    }

    debug!("flush worker started");
    loop {
        let wake = match processor.linger_deadline() {
            Some(deadline) => tokio::select! {
                _ = processor.wakeup.notified() => Wake::Buffer,
                _ = tokio::time::sleep_until(deadline) => Wake::Linger,
                cmd = commands.recv() => Wake::Command(cmd),
            },
            None => tokio::select! {
                _ = processor.wakeup.notified() => Wake::Buffer,
                cmd = commands.recv() => Wake::Command(cmd),
            },
        };

        match wake {
            Wake::Buffer => {
                if processor.batch_ready() {
                    processor.flush_now(transport.as_ref()).await;
                }
                // below the size trigger the linger deadline takes over
            }
            Wake::Linger => {
                processor.flush_now(transport.as_ref()).await;
            }
            Wake::Command(Some(Command::Flush(ack))) => {
                processor.flush_now(transport.as_ref()).await;
                let _ = ack.send(());
            }
            Wake::Command(Some(Command::Drain(ack))) => {
                processor.flush_now(transport.as_ref()).await;
                let _ = ack.send(());
                break;
            }
            Wake::Command(None) => {
                // control handle dropped; drain whatever is left and stop
                processor.flush_now(transport.as_ref()).await;
                break;
            }
        }
    }
    debug!("flush worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Severity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, Copy)]
    enum Outcome {
        Deliver,
        Retryable,
        Fatal,
    }

    /// Transport double that records batches and plays back a script of
    /// outcomes, delivering once the script runs out.
    #[derive(Debug)]
    struct MockTransport {
        batches: Mutex<Vec<Vec<Record>>>,
        script: Mutex<VecDeque<Outcome>>,
        attempts: AtomicU32,
        close_count: AtomicU32,
    }

    impl MockTransport {
        fn new(script: Vec<Outcome>) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                script: Mutex::new(script.into_iter().collect()),
                attempts: AtomicU32::new(0),
                close_count: AtomicU32::new(0),
            }
        }

        fn delivered(&self) -> Vec<Vec<Record>> {
            self.batches.lock().unwrap().clone()
        }

        fn delivered_bodies(&self) -> Vec<String> {
            self.delivered()
                .iter()
                .flatten()
                .map(|r| r.body.clone())
                .collect()
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, batch: &[Record]) -> Result<(), ExportError> {
            assert!(!batch.is_empty(), "transport must never see an empty batch");
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Outcome::Deliver);
            match outcome {
                Outcome::Deliver => {
                    self.batches.lock().unwrap().push(batch.to_vec());
                    Ok(())
                }
                Outcome::Retryable => Err(ExportError::Retryable("scripted".to_string())),
                Outcome::Fatal => Err(ExportError::Fatal("scripted".to_string())),
            }
        }

        async fn close(&self) {
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn processor_with(config: PipelineConfig) -> (Arc<BatchProcessor>, Arc<Diagnostics>) {
        let diagnostics = Arc::new(Diagnostics::new());
        let processor = Arc::new(BatchProcessor::new(&config, Arc::clone(&diagnostics)));
        (processor, diagnostics)
    }

    fn record(body: &str) -> Record {
        Record::new(Severity::Info, body, Vec::new(), None)
    }

    fn quick_retry_config() -> PipelineConfig {
        PipelineConfig {
            retry_initial_backoff_ms: 10,
            linger_interval_ms: 60_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_flush_splits_batches_in_order() {
        let config = PipelineConfig {
            max_batch_size: 3,
            linger_interval_ms: 60_000,
            ..Default::default()
        };
        let (processor, _) = processor_with(config);
        let transport = MockTransport::new(Vec::new());

        for i in 0..8 {
            processor.enqueue(record(&format!("r{}", i)));
        }
        processor.flush_now(&transport).await;

        let batches = transport.delivered();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[1].len(), 3);
        assert_eq!(batches[2].len(), 2);
        let expected: Vec<String> = (0..8).map(|i| format!("r{}", i)).collect();
        assert_eq!(transport.delivered_bodies(), expected);
        assert_eq!(processor.buffered_records(), 0);
    }

    #[tokio::test]
    async fn test_empty_buffer_produces_no_send() {
        let (processor, _) = processor_with(PipelineConfig::default());
        let transport = MockTransport::new(Vec::new());
        processor.flush_now(&transport).await;
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_drop_oldest_retains_newest() {
        let config = PipelineConfig {
            max_queue_capacity: 5,
            max_batch_size: 100,
            linger_interval_ms: 60_000,
            backpressure_policy: BackpressurePolicy::DropOldest,
            ..Default::default()
        };
        let (processor, diagnostics) = processor_with(config);

        for i in 0..8 {
            processor.enqueue(record(&format!("r{}", i)));
        }
        assert_eq!(processor.buffered_records(), 5);
        assert_eq!(diagnostics.snapshot().records_dropped_backpressure, 3);

        let transport = MockTransport::new(Vec::new());
        processor.flush_now(&transport).await;
        assert_eq!(
            transport.delivered_bodies(),
            vec!["r3", "r4", "r5", "r6", "r7"]
        );
    }

    #[tokio::test]
    async fn test_drop_newest_retains_oldest() {
        let config = PipelineConfig {
            max_queue_capacity: 4,
            max_batch_size: 100,
            linger_interval_ms: 60_000,
            backpressure_policy: BackpressurePolicy::DropNewest,
            ..Default::default()
        };
        let (processor, diagnostics) = processor_with(config);

        for i in 0..6 {
            processor.enqueue(record(&format!("r{}", i)));
        }
        assert_eq!(diagnostics.snapshot().records_dropped_backpressure, 2);

        let transport = MockTransport::new(Vec::new());
        processor.flush_now(&transport).await;
        assert_eq!(transport.delivered_bodies(), vec!["r0", "r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn test_block_policy_bounded_wait_then_drop() {
        let config = PipelineConfig {
            max_queue_capacity: 1,
            max_batch_size: 100,
            linger_interval_ms: 60_000,
            backpressure_policy: BackpressurePolicy::Block,
            enqueue_block_timeout_ms: 50,
            ..Default::default()
        };
        let (processor, diagnostics) = processor_with(config);

        processor.enqueue(record("kept"));
        let started = Instant::now();
        processor.enqueue(record("dropped"));
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(50));
        assert_eq!(processor.buffered_records(), 1);
        assert_eq!(diagnostics.snapshot().records_dropped_backpressure, 1);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let (processor, diagnostics) = processor_with(quick_retry_config());
        let transport = MockTransport::new(vec![Outcome::Retryable, Outcome::Retryable]);

        processor.enqueue(record("persistent"));
        processor.flush_now(&transport).await;

        assert_eq!(transport.attempts(), 3);
        assert_eq!(transport.delivered_bodies(), vec!["persistent"]);
        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.records_exported, 1);
        assert_eq!(snapshot.records_lost_retry, 0);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_drops_batch() {
        let config = PipelineConfig {
            max_retry_attempts: 2,
            ..quick_retry_config()
        };
        let (processor, diagnostics) = processor_with(config);
        let transport = MockTransport::new(vec![
            Outcome::Retryable,
            Outcome::Retryable,
            Outcome::Retryable,
        ]);

        processor.enqueue(record("doomed-1"));
        processor.enqueue(record("doomed-2"));
        processor.flush_now(&transport).await;

        assert_eq!(transport.attempts(), 2);
        assert!(transport.delivered().is_empty());
        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.records_lost_retry, 2);
        assert_eq!(snapshot.records_exported, 0);
    }

    #[tokio::test]
    async fn test_fatal_failure_drops_without_retry() {
        let (processor, diagnostics) = processor_with(quick_retry_config());
        let transport = MockTransport::new(vec![Outcome::Fatal]);

        processor.enqueue(record("rejected"));
        processor.flush_now(&transport).await;

        assert_eq!(transport.attempts(), 1);
        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.records_lost_fatal, 1);
        assert_eq!(snapshot.records_lost_retry, 0);
    }

    #[tokio::test]
    async fn test_closed_intake_rejects_records() {
        let (processor, diagnostics) = processor_with(PipelineConfig::default());
        processor.close_intake();
        processor.enqueue(record("late"));

        assert_eq!(processor.buffered_records(), 0);
        assert_eq!(diagnostics.snapshot().records_rejected_shutdown, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_flushes_on_linger() {
        let config = PipelineConfig {
            max_batch_size: 100,
            linger_interval_ms: 100,
            ..Default::default()
        };
        let (processor, _) = processor_with(config);
        let transport = Arc::new(MockTransport::new(Vec::new()));
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let worker = tokio::spawn(run_flush_worker(
            Arc::clone(&processor),
            Arc::clone(&transport) as Arc<dyn Transport>,
            cmd_rx,
        ));

        processor.enqueue(record("lonely"));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(transport.delivered_bodies(), vec!["lonely"]);
        worker.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_flushes_on_size_trigger() {
        let config = PipelineConfig {
            max_batch_size: 4,
            linger_interval_ms: 60_000,
            ..Default::default()
        };
        let (processor, _) = processor_with(config);
        let transport = Arc::new(MockTransport::new(Vec::new()));
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let worker = tokio::spawn(run_flush_worker(
            Arc::clone(&processor),
            Arc::clone(&transport) as Arc<dyn Transport>,
            cmd_rx,
        ));

        for i in 0..4 {
            processor.enqueue(record(&format!("r{}", i)));
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(transport.delivered_bodies(), vec!["r0", "r1", "r2", "r3"]);
        worker.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_command_flushes_and_stops_worker() {
        let config = PipelineConfig {
            linger_interval_ms: 60_000,
            ..Default::default()
        };
        let (processor, _) = processor_with(config);
        let transport = Arc::new(MockTransport::new(Vec::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let worker = tokio::spawn(run_flush_worker(
            Arc::clone(&processor),
            Arc::clone(&transport) as Arc<dyn Transport>,
            cmd_rx,
        ));

        processor.enqueue(record("last words"));
        let (ack_tx, ack_rx) = oneshot::channel();
        cmd_tx.send(Command::Drain(ack_tx)).await.unwrap();
        ack_rx.await.unwrap();

        assert_eq!(transport.delivered_bodies(), vec!["last words"]);
        // worker exits on its own after a drain
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();
    }
}
