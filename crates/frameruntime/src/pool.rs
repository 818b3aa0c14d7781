use crate::dispatcher::{
    Dispatcher, DispatcherChannels, Envelope, WorkToken, WorkerId, WorkerReport, WorkerStatus,
};
use crate::{PoolConfig, PoolError, WorkArgs, WorkFn};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use framecore::PluginError;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Controller side of every channel. Only the controller creates these and
/// they are dropped only after all worker threads have been joined.
struct Channels<T, R> {
    input_tx: Sender<WorkToken<T>>,
    output_rx: Receiver<Envelope<T, R>>,
    stop_tx: Sender<()>,
    finished_rx: Receiver<WorkerReport>,
    workers: DispatcherChannels<T, R>,
}

impl<T, R> Channels<T, R> {
    fn new() -> Self {
        let (input_tx, input_rx) = unbounded();
        let (output_tx, output_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();
        let (finished_tx, finished_rx) = unbounded();
        Self {
            input_tx,
            output_rx,
            stop_tx,
            finished_rx,
            workers: DispatcherChannels {
                input: input_rx,
                output: output_tx,
                stop: stop_rx,
                finished: finished_tx,
            },
        }
    }
}

/// Entry point for starting worker pools
pub struct WorkerPool;

impl WorkerPool {
    /// Spawn `config.workers` dispatchers bound to a fresh channel set
    pub fn start<T, R, F>(
        work: F,
        args: WorkArgs,
        config: PoolConfig,
    ) -> Result<PoolHandle<T, R>, PoolError>
    where
        T: Clone + Debug + Send + 'static,
        R: Send + 'static,
        F: Fn(T, &WorkArgs) -> Result<R, PluginError> + Send + Sync + 'static,
    {
        Self::start_shared(Arc::new(work), args, config)
    }

    /// Same as `start` for an already shared work function
    pub fn start_shared<T, R>(
        work: WorkFn<T, R>,
        args: WorkArgs,
        config: PoolConfig,
    ) -> Result<PoolHandle<T, R>, PoolError>
    where
        T: Clone + Debug + Send + 'static,
        R: Send + 'static,
    {
        config.validate()?;
        let run_id = Uuid::new_v4();
        let channels = Channels::new();
        let args = Arc::new(args);

        tracing::info!("Starting pool {} with {} workers", run_id, config.workers);

        let mut workers = Vec::with_capacity(config.workers);
        for worker in 0..config.workers {
            let dispatcher = Dispatcher::new(
                worker,
                channels.workers.clone(),
                Arc::clone(&work),
                Arc::clone(&args),
                config.poll_interval(),
            );
            let spawned = std::thread::Builder::new()
                .name(format!("frameflow-worker-{}", worker))
                .spawn(move || dispatcher.run());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    tracing::error!("Failed to spawn worker {}: {}", worker, e);
                    for _ in &workers {
                        let _ = channels.stop_tx.send(());
                    }
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        Ok(PoolHandle {
            run_id,
            config,
            channels,
            workers,
            submitted: 0,
            received: 0,
            sentinel_acks: 0,
            faulted_tokens: 0,
            terminated: HashSet::new(),
            reports: Vec::new(),
            input_closed: false,
            stop_requested: false,
        })
    }
}

/// Handle to a running pool: submit work, collect results, shut down
pub struct PoolHandle<T, R> {
    run_id: Uuid,
    config: PoolConfig,
    channels: Channels<T, R>,
    workers: Vec<JoinHandle<WorkerStatus>>,
    submitted: usize,
    received: usize,
    sentinel_acks: usize,
    faulted_tokens: usize,
    /// Workers known to have reached a terminal state
    terminated: HashSet<WorkerId>,
    reports: Vec<WorkerReport>,
    input_closed: bool,
    stop_requested: bool,
}

impl<T, R> PoolHandle<T, R>
where
    T: Debug,
{
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn worker_count(&self) -> usize {
        self.config.workers
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Sentinels acknowledged so far
    pub fn sentinel_acks(&self) -> usize {
        self.sentinel_acks
    }

    /// Submitted tokens that have neither produced a result nor faulted
    pub fn outstanding(&self) -> usize {
        self.submitted
            .saturating_sub(self.received + self.faulted_tokens)
    }

    /// Finished reports collected so far
    pub fn reports(&self) -> &[WorkerReport] {
        &self.reports
    }

    pub fn submit(&mut self, token: T) -> Result<(), PoolError> {
        if self.input_closed || self.stop_requested {
            return Err(PoolError::InputClosed);
        }
        self.channels
            .input_tx
            .send(WorkToken::Item(token))
            .map_err(|_| PoolError::ChannelClosed("input"))?;
        self.submitted += 1;
        Ok(())
    }

    pub fn submit_all(&mut self, tokens: impl IntoIterator<Item = T>) -> Result<usize, PoolError> {
        let mut count = 0;
        for token in tokens {
            self.submit(token)?;
            count += 1;
        }
        tracing::debug!("Pool {} queued {} tokens", self.run_id, count);
        Ok(count)
    }

    /// Queue one sentinel per worker. Idempotent.
    pub fn close_input(&mut self) -> Result<(), PoolError> {
        if self.input_closed || self.stop_requested {
            return Ok(());
        }
        for _ in 0..self.workers.len() {
            self.channels
                .input_tx
                .send(WorkToken::Sentinel)
                .map_err(|_| PoolError::ChannelClosed("input"))?;
        }
        self.input_closed = true;
        tracing::debug!("Pool {} input closed after {} tokens", self.run_id, self.submitted);
        Ok(())
    }

    /// Ask every worker to stop after its current item. Idempotent.
    pub fn request_stop(&mut self) {
        if self.stop_requested {
            return;
        }
        tracing::info!("Stop requested for pool {}", self.run_id);
        for _ in 0..self.workers.len() {
            let _ = self.channels.stop_tx.send(());
        }
        self.stop_requested = true;
    }

    /// Collect results until the pool settles or the configured deadline
    /// passes
    pub fn drain(&mut self) -> Result<Vec<(T, R)>, PoolError> {
        self.drain_with_cancel(&CancellationToken::new())
    }

    /// Collect results until one of:
    ///
    /// - every worker has terminated (sentinel acknowledged or reported)
    /// - input is still open and nothing submitted is outstanding
    /// - the drain deadline passes or `cancel` fires; both request a stop
    ///
    /// While tokens are outstanding, a pool that makes no progress for the
    /// join grace period fails with `StalledWorker`, naming the live workers
    /// that stayed silent that long.
    ///
    /// Results arrive in completion order, not submission order.
    pub fn drain_with_cancel(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(T, R)>, PoolError> {
        let deadline = self.config.drain_deadline().map(|d| Instant::now() + d);
        let grace = self.config.join_grace();
        let started = Instant::now();
        let mut last_seen: HashMap<WorkerId, Instant> = HashMap::new();
        let mut last_progress = started;
        let mut results = Vec::new();

        loop {
            if self.collect_reports() > 0 {
                last_progress = Instant::now();
            }
            if self.all_terminated() {
                // Workers send output before their report, so whatever they
                // produced is already queued
                while let Ok(envelope) = self.channels.output_rx.try_recv() {
                    self.accept(envelope, &mut results);
                }
                break;
            }
            if !self.input_closed && !self.stop_requested && self.outstanding() == 0 {
                break;
            }
            if cancel.is_cancelled() {
                tracing::warn!("Collection for pool {} cancelled", self.run_id);
                self.request_stop();
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(
                    "Drain deadline passed for pool {} with {} tokens outstanding",
                    self.run_id,
                    self.outstanding()
                );
                self.request_stop();
                break;
            }

            if self.outstanding() > 0 && last_progress.elapsed() >= grace {
                let stalled: Vec<WorkerId> = self
                    .live_workers()
                    .into_iter()
                    .filter(|id| {
                        last_seen.get(id).copied().unwrap_or(started).elapsed() >= grace
                    })
                    .collect();
                if !stalled.is_empty() {
                    tracing::error!(
                        "Pool {} stalled with {} tokens outstanding, silent workers {:?}",
                        self.run_id,
                        self.outstanding(),
                        stalled
                    );
                    return Err(PoolError::StalledWorker {
                        workers: stalled,
                        grace_ms: self.config.join_grace_ms,
                    });
                }
            }

            match self.channels.output_rx.recv_timeout(self.config.poll_interval()) {
                Ok(envelope) => {
                    let now = Instant::now();
                    last_seen.insert(self.accept(envelope, &mut results), now);
                    last_progress = now;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PoolError::ChannelClosed("output"));
                }
            }
        }

        tracing::debug!(
            "Pool {} collected {} results ({} outstanding)",
            self.run_id,
            results.len(),
            self.outstanding()
        );
        Ok(results)
    }

    /// Book one envelope and return the worker that sent it
    fn accept(&mut self, envelope: Envelope<T, R>, results: &mut Vec<(T, R)>) -> WorkerId {
        match envelope {
            Envelope::Result {
                worker,
                token,
                result,
            } => {
                tracing::trace!("Worker {} delivered {:?}", worker, token);
                self.received += 1;
                results.push((token, result));
                worker
            }
            Envelope::Drained { worker } => {
                self.sentinel_acks += 1;
                self.terminated.insert(worker);
                worker
            }
        }
    }

    fn collect_reports(&mut self) -> usize {
        let mut count = 0;
        while let Ok(report) = self.channels.finished_rx.try_recv() {
            self.record(report);
            count += 1;
        }
        count
    }

    fn record(&mut self, report: WorkerReport) {
        if let WorkerStatus::Faulted { token: Some(_), .. } = &report.status {
            self.faulted_tokens += 1;
        }
        self.terminated.insert(report.worker);
        self.reports.push(report);
    }

    fn reported(&self) -> HashSet<WorkerId> {
        self.reports.iter().map(|r| r.worker).collect()
    }

    fn all_terminated(&self) -> bool {
        self.live_workers().is_empty()
    }

    /// Workers neither known to have terminated nor exited
    fn live_workers(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .enumerate()
            .filter(|(id, handle)| !self.terminated.contains(id) && !handle.is_finished())
            .map(|(id, _)| id)
            .collect()
    }

    /// Wait for every worker's finished report, join the threads and tear
    /// down the channels.
    ///
    /// Input is closed first unless a close or stop was already requested.
    /// Workers still silent after the join grace period are reported as
    /// stalled; threads that died without reporting as panicked.
    pub fn join(mut self) -> Result<Vec<WorkerReport>, PoolError> {
        if !self.input_closed && !self.stop_requested {
            self.close_input()?;
        }

        let grace = Instant::now() + self.config.join_grace();
        self.collect_reports();
        while self.reported().len() < self.workers.len() && Instant::now() < grace {
            match self.channels.finished_rx.recv_timeout(self.config.poll_interval()) {
                Ok(report) => self.record(report),
                Err(RecvTimeoutError::Timeout) => {
                    let reported = self.reported();
                    let silent_alive = self
                        .workers
                        .iter()
                        .enumerate()
                        .any(|(id, handle)| !reported.contains(&id) && !handle.is_finished());
                    if !silent_alive {
                        // Whoever has not reported is already dead
                        self.collect_reports();
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        while let Ok(envelope) = self.channels.output_rx.try_recv() {
            if let Envelope::Drained { worker } = envelope {
                self.sentinel_acks += 1;
                self.terminated.insert(worker);
            }
        }

        let reported = self.reported();
        let mut stalled = Vec::new();
        let mut panicked = Vec::new();
        for (id, handle) in std::mem::take(&mut self.workers).into_iter().enumerate() {
            if !reported.contains(&id) && !handle.is_finished() {
                stalled.push(id);
                continue;
            }
            if handle.join().is_err() || !reported.contains(&id) {
                panicked.push(id);
            }
        }

        if !stalled.is_empty() {
            tracing::error!("Pool {} has stalled workers {:?}", self.run_id, stalled);
            // Let them exit whenever they come back
            for _ in &stalled {
                let _ = self.channels.stop_tx.send(());
            }
            return Err(PoolError::StalledWorker {
                workers: stalled,
                grace_ms: self.config.join_grace_ms,
            });
        }
        if !panicked.is_empty() {
            tracing::error!("Pool {} lost workers {:?}", self.run_id, panicked);
            return Err(PoolError::WorkerPanicked(panicked));
        }

        let mut reports = std::mem::take(&mut self.reports);
        reports.sort_by_key(|r| r.worker);
        tracing::info!(
            "Pool {} joined: {} results, {} faulted workers",
            self.run_id,
            self.received,
            reports.iter().filter(|r| r.status.is_faulted()).count()
        );
        Ok(reports)
    }
}

impl<T, R> Drop for PoolHandle<T, R> {
    fn drop(&mut self) {
        // Dropped without join: make the workers exit on their own
        if !self.workers.is_empty() {
            for _ in 0..self.workers.len() {
                let _ = self.channels.stop_tx.send(());
            }
        }
    }
}
