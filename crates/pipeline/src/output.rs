//! PipelineOutput - the consumer end of the last stage

use tokio::sync::{mpsc, watch};

use contracts::PipelineState;

/// Readable end of a started pipeline
///
/// Ends in two ways:
/// - the input channel closes: every stage forwards what it already
///   received and exits, then `recv` drains the buffer and returns `None`
///   while the state stays `Running`;
/// - the pipeline is stopped: `recv` returns `None` at once and items
///   still buffered are never yielded.
#[derive(Debug)]
pub struct PipelineOutput<T> {
    rx: mpsc::Receiver<T>,
    state: watch::Receiver<PipelineState>,
}

impl<T> PipelineOutput<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>, state: watch::Receiver<PipelineState>) -> Self {
        Self { rx, state }
    }

    /// Receive the next transformed item
    pub async fn recv(&mut self) -> Option<T> {
        if self.is_stopped() {
            return None;
        }

        tokio::select! {
            biased;

            _ = stopped(&mut self.state) => None,
            item = self.rx.recv() => item,
        }
    }

    /// Receive without waiting
    pub fn try_recv(&mut self) -> Result<T, mpsc::error::TryRecvError> {
        if self.is_stopped() {
            return Err(mpsc::error::TryRecvError::Disconnected);
        }
        self.rx.try_recv()
    }

    /// Whether the pipeline reached `Stopped`
    pub fn is_stopped(&self) -> bool {
        self.state.borrow().is_stopped()
    }
}

/// Resolves once the state is `Stopped`; never resolves if the dispatcher
/// went away without stopping
async fn stopped(state: &mut watch::Receiver<PipelineState>) {
    let reached = state.wait_for(|s| s.is_stopped()).await.map(|_| ());
    if reached.is_err() {
        std::future::pending::<()>().await;
    }
}
