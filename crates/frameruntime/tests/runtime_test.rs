// crates/frameruntime/tests/runtime_test.rs

use async_trait::async_trait;
use framecore::{Kwargs, Plugin, PluginError, PluginOutput, TreeEvent, Value};
use frameruntime::{
    CatalogError, FrameRuntime, PluginCatalog, PluginFactory, PoolConfig, RuntimeError,
    StageSpec, WorkArgs,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Adds `amount` to a numeric input and counts its invocations
struct AddPlugin {
    amount: f64,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Plugin for AddPlugin {
    fn plugin_type(&self) -> &str {
        "test.add"
    }

    async fn execute(&self, data: Value, kwargs: Kwargs) -> Result<PluginOutput, PluginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = data
            .as_f64()
            .ok_or_else(|| PluginError::MissingInput("data".to_string()))?;
        if kwargs.get("frame").and_then(|f| f.as_i64()) == Some(7) && self.amount < 0.0 {
            return Err(PluginError::ExecutionFailed("frame 7 rejected".to_string()));
        }
        Ok(PluginOutput::new(n + self.amount).with_kwargs(kwargs))
    }
}

struct AddFactory {
    calls: Arc<AtomicUsize>,
}

impl PluginFactory for AddFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Plugin>, PluginError> {
        let amount = config
            .get("amount")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| PluginError::Configuration("amount is required".to_string()))?;
        Ok(Arc::new(AddPlugin {
            amount,
            calls: Arc::clone(&self.calls),
        }))
    }

    fn plugin_type(&self) -> &str {
        "test.add"
    }
}

fn runtime(workers: usize) -> (FrameRuntime, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut catalog = PluginCatalog::new();
    catalog.register(Arc::new(AddFactory {
        calls: Arc::clone(&calls),
    }));
    let runtime = FrameRuntime::with_catalog(
        Arc::new(catalog),
        PoolConfig::default().with_workers(workers),
    );
    (runtime, calls)
}

#[test]
fn test_build_tree_chains_by_default() {
    let (runtime, _) = runtime(1);
    let tree = runtime
        .build_tree(&[
            StageSpec::new("test.add").with_config("amount", 1.0),
            StageSpec::new("test.add").with_config("amount", 2.0),
            StageSpec::new("test.add").with_config("amount", 3.0).with_parent(0),
        ])
        .unwrap();

    assert_eq!(tree.chains(), vec![vec![0, 1], vec![0, 2]]);
}

#[test]
fn test_build_tree_reports_catalog_errors() {
    let (runtime, _) = runtime(1);

    let err = runtime.build_tree(&[StageSpec::new("missing")]).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Catalog(CatalogError::UnknownPluginType(ref t)) if t == "missing"
    ));

    let err = runtime.build_tree(&[StageSpec::new("test.add")]).unwrap_err();
    assert!(matches!(err, RuntimeError::Catalog(CatalogError::Creation { .. })));
}

#[test]
fn test_run_chains_covers_every_chain_and_frame() {
    let (runtime, _) = runtime(3);
    let tree = runtime
        .build_tree(&[
            StageSpec::new("test.add").with_config("amount", 1.0),
            StageSpec::new("test.add").with_config("amount", 10.0),
            StageSpec::new("test.add").with_config("amount", 100.0).with_parent(0),
        ])
        .unwrap();

    let report = runtime
        .run_chains(Arc::new(tree), 0..20, WorkArgs::new(), &CancellationToken::new())
        .unwrap();

    assert_eq!(report.submitted, 40);
    assert_eq!(report.results.len(), 40);
    assert_eq!(report.sentinel_acks, 3);
    assert_eq!(report.faulted_workers(), 0);

    let seen: HashSet<_> = report.results.iter().map(|(item, _)| item.clone()).collect();
    assert_eq!(seen.len(), 40);
    for (item, output) in &report.results {
        let expected = match item.chain.as_slice() {
            [0, 1] => item.frame as f64 + 11.0,
            [0, 2] => item.frame as f64 + 101.0,
            other => panic!("unexpected chain {:?}", other),
        };
        assert_eq!(output.result, Value::Number(expected));
        assert_eq!(output.kwargs.get("frame"), Some(&Value::from(item.frame)));
    }
}

#[test]
fn test_run_frames_executes_whole_tree_per_frame() {
    let (runtime, calls) = runtime(2);
    let mut events = runtime.subscribe_events();
    let tree = runtime
        .build_tree(&[
            StageSpec::new("test.add").with_config("amount", 1.0),
            StageSpec::new("test.add").with_config("amount", 1.0),
            StageSpec::new("test.add").with_config("amount", 1.0).with_parent(0),
        ])
        .unwrap();

    let report = runtime
        .run_frames(Arc::new(tree), 0..10, WorkArgs::new(), &CancellationToken::new())
        .unwrap();

    assert_eq!(report.results.len(), 10);
    assert_eq!(calls.load(Ordering::SeqCst), 30);

    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        if let TreeEvent::ExecutionCompleted { success: true, .. } = event {
            completed += 1;
        }
    }
    assert_eq!(completed, 10);
}

#[test]
fn test_failing_frame_faults_one_worker() {
    let (runtime, _) = runtime(2);
    let tree = runtime
        .build_tree(&[
            StageSpec::new("test.add").with_config("amount", 1.0),
            StageSpec::new("test.add").with_config("amount", -1.0),
        ])
        .unwrap();

    let report = runtime
        .run_frames(Arc::new(tree), 0..12, WorkArgs::new(), &CancellationToken::new())
        .unwrap();

    assert_eq!(report.results.len(), 11);
    assert_eq!(report.faulted_workers(), 1);
    assert!(report.results.iter().all(|(frame, _)| *frame != 7));
}
