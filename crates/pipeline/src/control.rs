//! Control plumbing between the handle, the dispatcher and the stages
//!
//! Pipeline-level requests travel over three single-slot channels, one per
//! signal, each carrying an acknowledgement sender. Stage-level commands
//! are a `watch` cell per stage: writing it never blocks, and a stage only
//! ever needs the latest command.

use tokio::sync::{mpsc, oneshot, watch};

use crate::error::PipelineError;

/// Command observed by a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageCommand {
    Run,
    Pause,
    Stop,
}

/// Pipeline-level control signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlSignal {
    Stop,
    Pause,
    Resume,
}

impl ControlSignal {
    pub(crate) fn operation(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }
}

/// Acknowledgement returned to the caller once a request took effect
pub(crate) type Ack = oneshot::Sender<Result<(), PipelineError>>;

/// Sending side, owned by `PipelineHandle`
#[derive(Debug, Clone)]
pub(crate) struct ControlSenders {
    stop: mpsc::Sender<Ack>,
    pause: mpsc::Sender<Ack>,
    resume: mpsc::Sender<Ack>,
}

impl ControlSenders {
    pub(crate) fn get(&self, signal: ControlSignal) -> &mpsc::Sender<Ack> {
        match signal {
            ControlSignal::Stop => &self.stop,
            ControlSignal::Pause => &self.pause,
            ControlSignal::Resume => &self.resume,
        }
    }
}

/// Receiving side, owned by the dispatcher
#[derive(Debug)]
pub(crate) struct ControlReceivers {
    pub(crate) stop: mpsc::Receiver<Ack>,
    pub(crate) pause: mpsc::Receiver<Ack>,
    pub(crate) resume: mpsc::Receiver<Ack>,
}

pub(crate) fn control_channels() -> (ControlSenders, ControlReceivers) {
    let (stop_tx, stop_rx) = mpsc::channel(1);
    let (pause_tx, pause_rx) = mpsc::channel(1);
    let (resume_tx, resume_rx) = mpsc::channel(1);

    (
        ControlSenders {
            stop: stop_tx,
            pause: pause_tx,
            resume: resume_tx,
        },
        ControlReceivers {
            stop: stop_rx,
            pause: pause_rx,
            resume: resume_rx,
        },
    )
}

/// Writer of one stage's command cell
#[derive(Debug)]
pub(crate) struct StageControl {
    tx: watch::Sender<StageCommand>,
}

impl StageControl {
    pub(crate) fn new() -> (Self, watch::Receiver<StageCommand>) {
        let (tx, rx) = watch::channel(StageCommand::Run);
        (Self { tx }, rx)
    }

    /// Publish a command; `Stop` is never overwritten
    pub(crate) fn send(&self, command: StageCommand) {
        self.tx.send_if_modified(|current| {
            if *current == StageCommand::Stop || *current == command {
                return false;
            }
            *current = command;
            true
        });
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> StageCommand {
        *self.tx.borrow()
    }
}

/// Wait until the command satisfies `accept`
///
/// Returns `false` if the writer was dropped first.
pub(crate) async fn wait_for_command(
    control: &mut watch::Receiver<StageCommand>,
    accept: impl Fn(StageCommand) -> bool,
) -> bool {
    loop {
        let current = *control.borrow_and_update();
        if accept(current) {
            return true;
        }
        if control.changed().await.is_err() {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_sticky() {
        let (control, rx) = StageControl::new();
        control.send(StageCommand::Pause);
        assert_eq!(*rx.borrow(), StageCommand::Pause);

        control.send(StageCommand::Stop);
        control.send(StageCommand::Run);
        control.send(StageCommand::Pause);
        assert_eq!(control.current(), StageCommand::Stop);
        assert_eq!(*rx.borrow(), StageCommand::Stop);
    }

    #[tokio::test]
    async fn test_wait_for_command() {
        let (control, mut rx) = StageControl::new();
        control.send(StageCommand::Pause);

        let waiter = tokio::spawn(async move {
            wait_for_command(&mut rx, |c| c != StageCommand::Pause).await
        });
        tokio::task::yield_now().await;
        control.send(StageCommand::Run);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_for_command_writer_dropped() {
        let (control, mut rx) = StageControl::new();
        drop(control);
        assert!(!wait_for_command(&mut rx, |c| c == StageCommand::Stop).await);
    }
}
