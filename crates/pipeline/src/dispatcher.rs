//! Dispatcher - forwards input into the first stage and owns the lifecycle
//!
//! Control requests are served ahead of forwarding. An item taken from the
//! input is held until the first stage has room for it, so a paused or
//! stopping pipeline never blocks the dispatcher on a full buffer.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

use contracts::PipelineState;

use crate::control::{Ack, ControlReceivers, ControlSignal, StageCommand, StageControl};
use crate::error::PipelineError;
use crate::stage::StageExit;

/// Outcome of one dispatcher select round
enum Event<T> {
    Control(ControlSignal, Ack),
    Forwarded,
    FirstStageGone,
    Received(T),
    InputClosed,
}

/// A spawned stage as seen by the dispatcher
pub(crate) struct StageTask {
    pub(crate) name: String,
    pub(crate) control: StageControl,
    pub(crate) handle: JoinHandle<StageExit>,
}

pub(crate) struct Dispatcher<T> {
    pub(crate) name: String,
    pub(crate) input: mpsc::Receiver<T>,
    /// `None` once the input ended or the first stage went away
    pub(crate) first: Option<mpsc::Sender<T>>,
    pub(crate) control: ControlReceivers,
    pub(crate) stages: Vec<StageTask>,
    pub(crate) state: watch::Sender<PipelineState>,
    pub(crate) grace_period: Duration,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Run the dispatcher main loop
    ///
    /// Returns after `stop`, or once every control handle is gone and no
    /// more input can be forwarded.
    #[instrument(
        name = "dispatcher_run",
        skip(self),
        fields(pipeline = %self.name, stages = self.stages.len())
    )]
    pub(crate) async fn run(mut self) {
        self.set_state(PipelineState::Running);
        info!("Dispatcher started");

        let mut pending: Option<T> = None;
        let mut forwarded: u64 = 0;

        loop {
            let running = self.current_state() == PipelineState::Running;
            let can_forward = running && self.first.is_some();

            let event = tokio::select! {
                biased;

                Some(ack) = self.control.stop.recv() => Event::Control(ControlSignal::Stop, ack),
                Some(ack) = self.control.pause.recv() => Event::Control(ControlSignal::Pause, ack),
                Some(ack) = self.control.resume.recv() => Event::Control(ControlSignal::Resume, ack),
                permit = reserve(self.first.as_ref()), if can_forward && pending.is_some() => {
                    match (permit, pending.take()) {
                        (Some(permit), Some(item)) => {
                            permit.send(item);
                            Event::Forwarded
                        }
                        _ => Event::FirstStageGone,
                    }
                }
                item = self.input.recv(), if can_forward && pending.is_none() => match item {
                    Some(item) => Event::Received(item),
                    None => Event::InputClosed,
                },
                else => break,
            };

            match event {
                Event::Control(ControlSignal::Stop, ack) => {
                    drop(pending.take());
                    self.shutdown().await;
                    let _ = ack.send(Ok(()));
                    info!(forwarded, "Dispatcher stopped");
                    return;
                }
                Event::Control(ControlSignal::Pause, ack) => {
                    let _ = ack.send(self.pause());
                }
                Event::Control(ControlSignal::Resume, ack) => {
                    let _ = ack.send(self.resume());
                }
                Event::Forwarded => {
                    forwarded += 1;
                    observability::record_item_dispatched(&self.name);
                }
                Event::FirstStageGone => {
                    warn!("First stage is gone, dropping further input");
                    self.first = None;
                }
                Event::Received(item) => pending = Some(item),
                Event::InputClosed => {
                    debug!(forwarded, "Input closed, closing the first stage");
                    self.first = None;
                }
            }
        }

        // every control handle is gone; nothing can change the state again
        if self.current_state() == PipelineState::Paused {
            self.shutdown().await;
        } else {
            self.drain().await;
        }
        info!(forwarded, "Dispatcher finished");
    }

    fn current_state(&self) -> PipelineState {
        *self.state.borrow()
    }

    fn set_state(&self, state: PipelineState) {
        self.state.send_replace(state);
        observability::record_pipeline_state(&self.name, state);
        debug!(state = %state, "Pipeline state changed");
    }

    fn broadcast(&self, command: StageCommand) {
        for stage in &self.stages {
            stage.control.send(command);
        }
    }

    fn pause(&self) -> Result<(), PipelineError> {
        let state = self.current_state();
        if !state.can_pause() {
            return Err(PipelineError::protocol_violation("pause", state));
        }
        self.broadcast(StageCommand::Pause);
        self.set_state(PipelineState::Paused);
        info!("Pipeline paused");
        Ok(())
    }

    fn resume(&self) -> Result<(), PipelineError> {
        match self.current_state() {
            PipelineState::Paused => {
                self.broadcast(StageCommand::Run);
                self.set_state(PipelineState::Running);
                info!("Pipeline resumed");
                Ok(())
            }
            PipelineState::Running => {
                debug!("Resume while running ignored");
                Ok(())
            }
            state => Err(PipelineError::protocol_violation("resume", state)),
        }
    }

    /// Stop every stage and wait for them within the grace period
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    async fn shutdown(&mut self) {
        self.first = None;
        self.broadcast(StageCommand::Stop);

        let deadline = Instant::now() + self.grace_period;
        for stage in &mut self.stages {
            match timeout_at(deadline, &mut stage.handle).await {
                Ok(Ok(exit)) => debug!(stage = %stage.name, exit = ?exit, "Stage joined"),
                Ok(Err(e)) => warn!(stage = %stage.name, error = %e, "Stage task failed"),
                Err(_) => {
                    warn!(stage = %stage.name, "Stage did not stop in time, aborting");
                    stage.handle.abort();
                }
            }
        }

        self.set_state(PipelineState::Stopped);
    }

    /// Wait for the stages to finish on their own after the input ended
    async fn drain(&mut self) {
        for stage in &mut self.stages {
            if let Err(e) = (&mut stage.handle).await {
                warn!(stage = %stage.name, error = %e, "Stage task failed");
            }
        }
    }
}

/// Reserve a slot in the first stage; `None` if it is gone
async fn reserve<T>(first: Option<&mpsc::Sender<T>>) -> Option<mpsc::Permit<'_, T>> {
    match first {
        Some(tx) => tx.reserve().await.ok(),
        None => std::future::pending().await,
    }
}
