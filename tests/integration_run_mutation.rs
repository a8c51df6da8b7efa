mod common;

use anyhow::Result;
use benchmark_data_engine::{
    mutation::{add_runs, delete_run, rename_runs},
    EngineError,
};
use common::{synthetic_run, temp_store};
use std::collections::BTreeMap;
use std::thread;

/// Deleting the only run of a benchmark is refused before anything is
/// rewritten; the benchmark must be deleted as a whole instead.
#[test]
fn last_run_cannot_be_deleted() -> Result<()> {
    let (_temp, store) = temp_store();
    store.store(1, &[synthetic_run("only", 2, 20)])?;
    let before = std::fs::read(store.data_path(1))?;

    assert_eq!(store.metadata(1)?.run_count, 1);
    assert!(matches!(delete_run(&store, 1, 0), Err(EngineError::LastRun { id: 1 })));
    assert_eq!(std::fs::read(store.data_path(1))?, before);

    store.delete(1)?;
    assert!(store.benchmark_ids()?.is_empty());
    Ok(())
}

#[test]
fn add_rename_and_remove_runs() -> Result<()> {
    let (_temp, store) = temp_store();
    store.store(2, &[synthetic_run("low", 2, 20)])?;

    add_runs(&store, 2, &[synthetic_run("medium", 2, 20), synthetic_run("high", 2, 20)])?;
    assert_eq!(store.metadata(2)?.run_labels, vec!["low", "medium", "high"]);

    let labels = BTreeMap::from([(0, "Low".to_string()), (2, "Ultra".to_string())]);
    let search = rename_runs(&store, 2, &labels)?;
    assert_eq!(search.labels, "Low, medium, Ultra");

    let search = delete_run(&store, 2, 1)?;
    assert_eq!(search.labels, "Low, Ultra");
    assert_eq!(store.load_run(2, 1)?.label, "Ultra");
    assert_eq!(store.precomputed(2)?.len(), 2);
    Ok(())
}

/// Concurrent appends to one benchmark are serialized; none is lost.
#[test]
fn concurrent_appends_are_serialized() -> Result<()> {
    let (_temp, store) = temp_store();
    store.store(3, &[synthetic_run("seed", 1, 10)])?;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || add_runs(&store, 3, &[synthetic_run(&format!("t{}", i), 1, 10)]))
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread panicked")?;
    }

    let meta = store.metadata(3)?;
    assert_eq!(meta.run_count, 9);
    for i in 0..8 {
        assert!(meta.run_labels.contains(&format!("t{}", i)));
    }
    Ok(())
}
