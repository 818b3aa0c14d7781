// crates/frameruntime/tests/dispatcher_test.rs

use crossbeam_channel::{unbounded, Receiver, Sender};
use framecore::PluginError;
use frameruntime::{
    Dispatcher, DispatcherChannels, Envelope, WorkArgs, WorkFn, WorkToken, WorkerFault,
    WorkerReport, WorkerStatus,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    input: Sender<WorkToken<u32>>,
    output: Receiver<Envelope<u32, u32>>,
    stop: Sender<()>,
    finished: Receiver<WorkerReport>,
    channels: DispatcherChannels<u32, u32>,
}

fn harness() -> Harness {
    let (input_tx, input_rx) = unbounded();
    let (output_tx, output_rx) = unbounded();
    let (stop_tx, stop_rx) = unbounded();
    let (finished_tx, finished_rx) = unbounded();
    Harness {
        input: input_tx,
        output: output_rx,
        stop: stop_tx,
        finished: finished_rx,
        channels: DispatcherChannels {
            input: input_rx,
            output: output_tx,
            stop: stop_rx,
            finished: finished_tx,
        },
    }
}

/// Doubles its input, fails on 13, panics on 99
fn doubling() -> WorkFn<u32, u32> {
    Arc::new(|token: u32, _args: &WorkArgs| match token {
        13 => Err(PluginError::ExecutionFailed("unlucky".to_string())),
        99 => panic!("token 99 is cursed"),
        n => Ok(n * 2),
    })
}

fn dispatcher(h: &Harness) -> Dispatcher<u32, u32> {
    Dispatcher::new(
        0,
        h.channels.clone(),
        doubling(),
        Arc::new(WorkArgs::new()),
        Duration::from_millis(5),
    )
}

fn outputs(h: &Harness) -> Vec<Envelope<u32, u32>> {
    h.output.try_iter().collect()
}

#[test]
fn test_stop_before_work_yields_nothing() {
    let h = harness();
    h.stop.send(()).unwrap();

    let status = dispatcher(&h).run();

    assert_eq!(status, WorkerStatus::Stopped);
    assert!(outputs(&h).is_empty());
    let reports: Vec<_> = h.finished.try_iter().collect();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, WorkerStatus::Stopped);
    assert_eq!(reports[0].processed, 0);
}

#[test]
fn test_stop_wins_over_queued_work() {
    let h = harness();
    h.input.send(WorkToken::Item(1)).unwrap();
    h.stop.send(()).unwrap();

    assert_eq!(dispatcher(&h).run(), WorkerStatus::Stopped);
    assert!(outputs(&h).is_empty());
    assert_eq!(h.input.len(), 1);
}

#[test]
fn test_sentinel_drains() {
    let h = harness();
    for token in [1, 2, 3] {
        h.input.send(WorkToken::Item(token)).unwrap();
    }
    h.input.send(WorkToken::Sentinel).unwrap();

    assert_eq!(dispatcher(&h).run(), WorkerStatus::Drained);

    assert_eq!(
        outputs(&h),
        vec![
            Envelope::Result { worker: 0, token: 1, result: 2 },
            Envelope::Result { worker: 0, token: 2, result: 4 },
            Envelope::Result { worker: 0, token: 3, result: 6 },
            Envelope::Drained { worker: 0 },
        ]
    );
    let report = h.finished.try_recv().unwrap();
    assert_eq!(report.status, WorkerStatus::Drained);
    assert_eq!(report.processed, 3);
}

#[test]
fn test_error_faults_without_consuming_more() {
    let h = harness();
    for token in [1, 13, 3] {
        h.input.send(WorkToken::Item(token)).unwrap();
    }
    h.input.send(WorkToken::Sentinel).unwrap();

    let status = dispatcher(&h).run();

    assert_eq!(
        status,
        WorkerStatus::Faulted {
            token: Some("13".to_string()),
            error: WorkerFault::Callable(PluginError::ExecutionFailed("unlucky".to_string())),
        }
    );
    assert_eq!(outputs(&h), vec![Envelope::Result { worker: 0, token: 1, result: 2 }]);
    // 3 and the sentinel are left for other workers
    assert_eq!(h.input.len(), 2);
    assert!(h.finished.try_recv().unwrap().status.is_faulted());
}

#[test]
fn test_panic_is_classified() {
    let h = harness();
    h.input.send(WorkToken::Item(99)).unwrap();

    match dispatcher(&h).run() {
        WorkerStatus::Faulted {
            error: WorkerFault::Callable(PluginError::Panicked(message)),
            ..
        } => assert!(message.contains("cursed")),
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(h.finished.len(), 1);
}

#[test]
fn test_disconnected_input_is_a_fault() {
    let h = harness();
    let Harness {
        input,
        finished,
        channels,
        stop: _stop,
        ..
    } = h;
    drop(input);

    let status = Dispatcher::new(
        3,
        channels,
        doubling(),
        Arc::new(WorkArgs::new()),
        Duration::from_millis(5),
    )
    .run();

    assert_eq!(
        status,
        WorkerStatus::Faulted {
            token: None,
            error: WorkerFault::ChannelClosed("input"),
        }
    );
    assert_eq!(finished.try_recv().unwrap().worker, 3);
}

#[test]
fn test_fixed_args_are_forwarded() {
    let h = harness();
    h.input.send(WorkToken::Item(5)).unwrap();
    h.input.send(WorkToken::Sentinel).unwrap();

    let work: WorkFn<u32, u32> = Arc::new(|token: u32, args: &WorkArgs| {
        let offset = args
            .kwargs
            .get("offset")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| PluginError::MissingInput("offset".to_string()))?;
        Ok(token + offset as u32 + args.args.len() as u32)
    });
    let args = WorkArgs::new().with_arg(true).with_kwarg("offset", 10i64);

    Dispatcher::new(0, h.channels.clone(), work, Arc::new(args), Duration::from_millis(5)).run();

    assert_eq!(
        outputs(&h).first(),
        Some(&Envelope::Result { worker: 0, token: 5, result: 16 })
    );
}
