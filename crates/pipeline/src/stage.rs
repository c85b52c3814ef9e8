//! Stage worker - one task per stage
//!
//! The worker reads from its inbound channel, applies the transform and
//! forwards the result. Control is checked before every receive, and a
//! blocked forward is raced against `Stop` so that a stopped pipeline never
//! waits on a full downstream buffer.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{debug, instrument, warn};

use crate::control::{StageCommand, wait_for_command};
use crate::error::BoxError;
use crate::handle::StageShared;

/// Transform applied by a stage
pub(crate) type Transform<T> = Box<dyn Fn(T) -> Result<T, BoxError> + Send + Sync>;

/// Why a stage worker returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageExit {
    /// `Stop` observed
    Stopped,
    /// Upstream closed and everything received was forwarded
    InputClosed,
    /// Downstream receiver dropped
    OutputClosed,
    /// The control writer was dropped
    ControlClosed,
}

pub(crate) struct StageWorker<T> {
    pub(crate) shared: Arc<StageShared<T>>,
    pub(crate) transform: Transform<T>,
    pub(crate) inbound: mpsc::Receiver<T>,
    pub(crate) outbound: mpsc::Sender<T>,
    pub(crate) control: watch::Receiver<StageCommand>,
}

impl<T: Clone + Send + 'static> StageWorker<T> {
    #[instrument(
        name = "stage_worker_loop",
        skip(self),
        fields(stage = %self.shared.name())
    )]
    pub(crate) async fn run(mut self) -> StageExit {
        debug!("Stage worker started");
        let mut processed: u64 = 0;

        let exit = loop {
            let command = *self.control.borrow_and_update();
            match command {
                StageCommand::Stop => break StageExit::Stopped,
                StageCommand::Pause => {
                    if !wait_for_command(&mut self.control, |c| c != StageCommand::Pause).await {
                        break StageExit::ControlClosed;
                    }
                    continue;
                }
                StageCommand::Run => {}
            }

            let item = tokio::select! {
                biased;

                changed = self.control.changed() => {
                    if changed.is_err() {
                        break StageExit::ControlClosed;
                    }
                    continue;
                }
                item = self.inbound.recv() => match item {
                    Some(item) => item,
                    None => break StageExit::InputClosed,
                },
            };

            let Some(output) = self.process(item, &mut processed) else {
                continue;
            };

            tokio::select! {
                biased;

                _ = wait_for_command(&mut self.control, |c| c == StageCommand::Stop) => {
                    break StageExit::Stopped;
                }
                sent = self.outbound.send(output) => {
                    if sent.is_err() {
                        break StageExit::OutputClosed;
                    }
                }
            }
        };

        debug!(processed, exit = ?exit, "Stage worker stopped");
        exit
    }

    /// Apply the transform; `None` when it failed and the item is skipped
    fn process(&self, item: T, processed: &mut u64) -> Option<T> {
        let name = self.shared.name();
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.transform)(item)));
        let elapsed = started.elapsed();

        let error = match outcome {
            Ok(Ok(output)) => {
                *processed += 1;
                self.shared.metrics().record_processed(elapsed);
                observability::record_stage_processed(name, elapsed);
                self.shared.emit(*processed, &output, elapsed);
                return Some(output);
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("transform panicked: {}", panic_message(payload.as_ref())),
        };

        self.shared.metrics().inc_failure_count();
        observability::record_stage_failure(name);
        warn!(
            stage = %name,
            processed = *processed,
            error = %error,
            "Transform failed, item skipped"
        );
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::StageControl;
    use crate::handle::StageHandle;
    use tokio::task::JoinHandle;
    use tokio::time::{Duration, timeout};

    struct Harness {
        input: mpsc::Sender<i64>,
        output: mpsc::Receiver<i64>,
        control: StageControl,
        handle: StageHandle<i64>,
        task: JoinHandle<StageExit>,
    }

    fn spawn_stage<F>(capacity: usize, transform: F) -> Harness
    where
        F: Fn(i64) -> Result<i64, BoxError> + Send + Sync + 'static,
    {
        let shared = Arc::new(StageShared::new("stage".to_string(), 16));
        let (input, inbound) = mpsc::channel(capacity);
        let (outbound, output) = mpsc::channel(capacity);
        let (control, control_rx) = StageControl::new();

        let worker = StageWorker {
            shared: Arc::clone(&shared),
            transform: Box::new(transform),
            inbound,
            outbound,
            control: control_rx,
        };

        Harness {
            input,
            output,
            control,
            handle: StageHandle::new(shared),
            task: tokio::spawn(worker.run()),
        }
    }

    #[tokio::test]
    async fn test_transform_and_input_closed() {
        let mut h = spawn_stage(4, |x| Ok(x * 2));
        for i in 1..=3 {
            h.input.send(i).await.unwrap();
        }
        drop(h.input);

        let mut seen = Vec::new();
        while let Some(v) = h.output.recv().await {
            seen.push(v);
        }
        assert_eq!(seen, vec![2, 4, 6]);
        assert_eq!(h.task.await.unwrap(), StageExit::InputClosed);
        assert_eq!(h.handle.metrics().processed_count, 3);
    }

    #[tokio::test]
    async fn test_failures_are_skipped() {
        let mut h = spawn_stage(8, |x| {
            if x == 2 {
                panic!("boom");
            }
            if x == 4 {
                return Err("rejected".into());
            }
            Ok(x)
        });
        for i in 1..=5 {
            h.input.send(i).await.unwrap();
        }
        drop(h.input);

        let mut seen = Vec::new();
        while let Some(v) = h.output.recv().await {
            seen.push(v);
        }
        assert_eq!(seen, vec![1, 3, 5]);

        let metrics = h.handle.metrics();
        assert_eq!(metrics.processed_count, 3);
        assert_eq!(metrics.failure_count, 2);
    }

    #[tokio::test]
    async fn test_stop_preempts_blocked_send() {
        let h = spawn_stage(1, Ok);
        // fills the output buffer, then blocks forwarding the next item
        h.input.send(1).await.unwrap();
        h.input.send(2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!h.task.is_finished());

        h.control.send(StageCommand::Stop);
        let exit = timeout(Duration::from_secs(1), h.task)
            .await
            .expect("stage must stop while blocked on send")
            .unwrap();
        assert_eq!(exit, StageExit::Stopped);
    }

    #[tokio::test]
    async fn test_pause_holds_items() {
        let mut h = spawn_stage(4, Ok);
        h.control.send(StageCommand::Pause);
        tokio::task::yield_now().await;

        h.input.send(7).await.unwrap();
        assert!(timeout(Duration::from_millis(50), h.output.recv()).await.is_err());

        h.control.send(StageCommand::Run);
        let v = timeout(Duration::from_secs(1), h.output.recv()).await.unwrap();
        assert_eq!(v, Some(7));
    }

    #[tokio::test]
    async fn test_stop_while_paused() {
        let h = spawn_stage(4, Ok);
        h.control.send(StageCommand::Pause);
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.control.send(StageCommand::Stop);

        let exit = timeout(Duration::from_secs(1), h.task).await.unwrap().unwrap();
        assert_eq!(exit, StageExit::Stopped);
    }

    #[tokio::test]
    async fn test_measurement_counts() {
        let mut h = spawn_stage(8, |x| Ok(x + 1));
        let mut records = h.handle.enable_measurement();

        for i in 0..5 {
            h.input.send(i).await.unwrap();
        }
        drop(h.input);
        while h.output.recv().await.is_some() {}

        let mut counts = Vec::new();
        let mut results = Vec::new();
        while let Ok(record) = records.try_recv() {
            counts.push(record.processed_count);
            results.push(record.result);
        }
        assert_eq!(counts, vec![1, 2, 3, 4, 5]);
        assert_eq!(results, vec![1, 2, 3, 4, 5]);
    }
}
