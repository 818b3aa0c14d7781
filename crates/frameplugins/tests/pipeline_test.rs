// crates/frameplugins/tests/pipeline_test.rs

use framecore::Value;
use frameplugins::{register_all, Record};
use frameruntime::{FrameRuntime, PluginCatalog, PoolConfig, StageSpec, WorkArgs};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn runtime(workers: usize) -> (FrameRuntime, frameplugins::RecordStore) {
    let mut catalog = PluginCatalog::new();
    let store = register_all(&mut catalog);
    let runtime = FrameRuntime::with_catalog(
        Arc::new(catalog),
        PoolConfig::default().with_workers(workers),
    );
    (runtime, store)
}

#[test]
fn test_catalog_lists_standard_plugins() {
    let (runtime, _) = runtime(1);
    assert_eq!(
        runtime.catalog().list_plugin_types(),
        vec![
            "debug.fail_on",
            "debug.log",
            "math.clamp",
            "math.offset",
            "math.scale",
            "sink.record",
            "time.delay",
        ]
    );
    let metadata = runtime.catalog().get_metadata("math.offset").unwrap();
    assert!(metadata.parameters[0].required);
}

#[tokio::test]
async fn test_branching_tree_records_every_frame() {
    let (runtime, store) = runtime(3);
    let tree = runtime
        .build_tree(&[
            StageSpec::new("math.scale").with_config("factor", 2.0),
            StageSpec::new("math.offset").with_config("amount", 1.0),
            StageSpec::new("sink.record").with_config("label", "plus"),
            StageSpec::new("math.clamp")
                .with_config("max", 5.0)
                .with_parent(0),
            StageSpec::new("sink.record").with_config("label", "clamped"),
        ])
        .unwrap();

    let report = runtime
        .run_frames(Arc::new(tree), 0..6, WorkArgs::new(), &CancellationToken::new())
        .unwrap();
    assert_eq!(report.results.len(), 6);

    let records = store.snapshot().await;
    assert_eq!(records.len(), 12);
    assert_eq!(
        records[..2],
        [
            Record {
                label: "clamped".to_string(),
                frame: Some(0),
                value: Value::Number(0.0),
            },
            Record {
                label: "plus".to_string(),
                frame: Some(0),
                value: Value::Number(1.0),
            },
        ]
    );
    let last_clamped = records
        .iter()
        .find(|r| r.label == "clamped" && r.frame == Some(5))
        .unwrap();
    assert_eq!(last_clamped.value, Value::Number(5.0));
}

#[tokio::test]
async fn test_fail_on_skips_one_frame() {
    let (runtime, store) = runtime(2);
    let tree = runtime
        .build_tree(&[
            StageSpec::new("debug.fail_on").with_config("frame", 3.0),
            StageSpec::new("sink.record"),
        ])
        .unwrap();

    let report = runtime
        .run_frames(Arc::new(tree), 0..8, WorkArgs::new(), &CancellationToken::new())
        .unwrap();

    assert_eq!(report.faulted_workers(), 1);
    let frames: Vec<_> = store.snapshot().await.iter().filter_map(|r| r.frame).collect();
    assert!(!frames.contains(&3));
    assert_eq!(frames.len(), report.results.len());
}

#[test]
fn test_factories_reject_bad_config() {
    let (runtime, _) = runtime(1);
    assert!(runtime.build_tree(&[StageSpec::new("math.scale")]).is_err());
    assert!(runtime
        .build_tree(&[StageSpec::new("math.offset").with_config("amount", "one")])
        .is_err());
    assert!(runtime
        .build_tree(&[StageSpec::new("time.delay").with_config("delay_ms", -1.0)])
        .is_err());
    assert!(runtime
        .build_tree(&[StageSpec::new("math.scale")
            .with_config("factor", 2.0)
            .with_config("offset", 1.0)])
        .is_err());
}
