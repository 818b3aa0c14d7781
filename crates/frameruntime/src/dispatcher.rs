//! Work item dispatcher
//!
//! A dispatcher is the loop each pool worker runs. It pulls tokens off the
//! shared input channel, applies the work function and pushes
//! `Envelope::Result`s onto the shared output channel until one of three
//! things happens:
//!
//! - a stop token arrives (**Stopped**)
//! - the end-of-stream sentinel arrives (**Drained**)
//! - the work function fails or panics, or a channel disconnects (**Faulted**)
//!
//! Whatever the outcome, the dispatcher posts exactly one `WorkerReport` on
//! the `finished` channel before returning. Dispatchers never create or
//! close channels; they only hold clones of the controller's handles.
//!
//! Every input read is bounded by the poll interval so a stop request is
//! observed within one interval. crossbeam channels tolerate concurrent
//! disconnects, so the interval is about stop responsiveness only.

use crate::{WorkArgs, WorkFn, WorkerFault};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use framecore::PluginError;
use serde::Serialize;
use std::any::Any;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

pub type WorkerId = usize;

/// Item on the input channel
#[derive(Debug, Clone, PartialEq)]
pub enum WorkToken<T> {
    Item(T),
    /// End of stream; each sentinel retires one dispatcher
    Sentinel,
}

/// Item on the output channel
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T, R> {
    Result { worker: WorkerId, token: T, result: R },
    /// Acknowledges a sentinel; nothing more comes from this worker
    Drained { worker: WorkerId },
}

/// Terminal state of a dispatcher
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum WorkerStatus {
    Stopped,
    Drained,
    Faulted {
        /// Debug rendering of the token being processed, if any
        token: Option<String>,
        #[serde(serialize_with = "serialize_fault")]
        error: WorkerFault,
    },
}

fn serialize_fault<S: serde::Serializer>(fault: &WorkerFault, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&fault.to_string())
}

impl WorkerStatus {
    pub fn is_faulted(&self) -> bool {
        matches!(self, WorkerStatus::Faulted { .. })
    }
}

/// Posted on the `finished` channel when a dispatcher terminates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerReport {
    pub worker: WorkerId,
    pub status: WorkerStatus,
    /// Tokens that produced a result
    pub processed: usize,
    pub finished_at: DateTime<Utc>,
}

/// The four channel handles a dispatcher is bound to
pub struct DispatcherChannels<T, R> {
    pub input: Receiver<WorkToken<T>>,
    pub output: Sender<Envelope<T, R>>,
    pub stop: Receiver<()>,
    pub finished: Sender<WorkerReport>,
}

impl<T, R> Clone for DispatcherChannels<T, R> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            output: self.output.clone(),
            stop: self.stop.clone(),
            finished: self.finished.clone(),
        }
    }
}

pub struct Dispatcher<T, R> {
    worker: WorkerId,
    channels: DispatcherChannels<T, R>,
    work: WorkFn<T, R>,
    args: Arc<WorkArgs>,
    poll_interval: Duration,
}

impl<T, R> Dispatcher<T, R>
where
    T: Clone + Debug,
{
    pub fn new(
        worker: WorkerId,
        channels: DispatcherChannels<T, R>,
        work: WorkFn<T, R>,
        args: Arc<WorkArgs>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            worker,
            channels,
            work,
            args,
            poll_interval,
        }
    }

    /// Run until a terminal state is reached, then report it on `finished`
    pub fn run(self) -> WorkerStatus {
        tracing::debug!("Worker {} started", self.worker);
        let mut processed = 0;
        let status = self.run_loop(&mut processed);

        match &status {
            WorkerStatus::Faulted { token, error } => {
                tracing::warn!(
                    "Worker {} faulted on token {:?}: {}",
                    self.worker,
                    token,
                    error
                );
            }
            other => {
                tracing::debug!("Worker {} finished: {:?}", self.worker, other);
            }
        }

        let report = WorkerReport {
            worker: self.worker,
            status: status.clone(),
            processed,
            finished_at: Utc::now(),
        };
        if self.channels.finished.send(report).is_err() {
            tracing::error!("Worker {} could not post to the finished channel", self.worker);
        }
        status
    }

    fn run_loop(&self, processed: &mut usize) -> WorkerStatus {
        loop {
            match self.channels.stop.try_recv() {
                Ok(()) => return WorkerStatus::Stopped,
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    return fault(None, WorkerFault::ChannelClosed("stop"));
                }
            }

            let token = match self.channels.input.recv_timeout(self.poll_interval) {
                Ok(WorkToken::Item(token)) => token,
                Ok(WorkToken::Sentinel) => {
                    let ack = Envelope::Drained {
                        worker: self.worker,
                    };
                    if self.channels.output.send(ack).is_err() {
                        return fault(None, WorkerFault::ChannelClosed("output"));
                    }
                    return WorkerStatus::Drained;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return fault(None, WorkerFault::ChannelClosed("input"));
                }
            };

            let result = match invoke(&self.work, token.clone(), &self.args) {
                Ok(result) => result,
                Err(e) => return fault(Some(format!("{:?}", token)), WorkerFault::Callable(e)),
            };

            let envelope = Envelope::Result {
                worker: self.worker,
                token: token.clone(),
                result,
            };
            if self.channels.output.send(envelope).is_err() {
                return fault(Some(format!("{:?}", token)), WorkerFault::ChannelClosed("output"));
            }
            *processed += 1;
        }
    }
}

fn fault(token: Option<String>, error: WorkerFault) -> WorkerStatus {
    WorkerStatus::Faulted { token, error }
}

/// Call the work function, turning a panic into a `PluginError`
fn invoke<T, R>(work: &WorkFn<T, R>, token: T, args: &WorkArgs) -> Result<R, PluginError> {
    match panic::catch_unwind(AssertUnwindSafe(|| work(token, args))) {
        Ok(result) => result,
        Err(payload) => Err(PluginError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
