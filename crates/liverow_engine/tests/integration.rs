//! End-to-end tests for the row sync engine against the in-memory store.

use liverow_engine::{
    BoundRow, ClientRegistry, RecordingSink, RowIdentity, RowOptions, RowSnapshot, RowSyncEngine,
};
use liverow_store::{ChangeEvent, MemoryStore, Row, RowKey, RowSelect, StoreClient};
use serde_json::json;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn profile(id: &str, name: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), json!(id));
    row.insert("name".into(), json!(name));
    row
}

fn registry_with(store: Arc<MemoryStore>) -> ClientRegistry {
    let registry = ClientRegistry::new();
    registry.initialize(store).unwrap();
    registry
}

/// Receives snapshots until one satisfies the predicate.
fn wait_for(
    rx: &Receiver<RowSnapshot>,
    timeout: Duration,
    pred: impl Fn(&RowSnapshot) -> bool,
) -> RowSnapshot {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .expect("timed out waiting for snapshot");
        let snapshot = rx
            .recv_timeout(remaining)
            .expect("watch channel closed or timed out");
        if pred(&snapshot) {
            return snapshot;
        }
    }
}

fn name_of(snapshot: &RowSnapshot) -> Option<String> {
    snapshot
        .value
        .as_row()
        .and_then(|row| row.get("name"))
        .and_then(|v| v.as_str())
        .map(String::from)
}

#[test]
fn initial_read_loads_the_row() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));
    let registry = registry_with(store);

    let engine = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new(),
    )
    .unwrap();
    let rx = engine.watch();

    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| s.loaded);
    assert_eq!(name_of(&snapshot).as_deref(), Some("Ann"));
}

#[test]
fn read_miss_logs_and_leaves_value_unknown() {
    let store = Arc::new(MemoryStore::new());
    let registry = registry_with(store);
    let sink = Arc::new(RecordingSink::new());

    let engine = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "ghost"),
        RowOptions::new().with_sink(sink.clone()),
    )
    .unwrap();
    let rx = engine.watch();

    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| s.loaded);
    assert!(snapshot.value.is_unknown());
    assert_eq!(sink.len(), 1);
    assert!(sink.messages()[0].contains("no row"));
}

#[test]
fn feed_event_beats_in_flight_read() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));
    store.set_fetch_delay(Some(Duration::from_millis(150)));
    let registry = registry_with(store.clone());

    let engine = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new(),
    )
    .unwrap();
    let rx = engine.watch();

    // The update lands while the read is still sleeping.
    store.emit(ChangeEvent::update(
        "public",
        "profiles",
        profile("u1", "Ann2"),
        Some(profile("u1", "Ann")),
    ));

    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| s.loaded);
    assert_eq!(name_of(&snapshot).as_deref(), Some("Ann2"));

    // Let the read resolve, then confirm its stale result was discarded.
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(
        engine.value().as_row().unwrap().get("name"),
        Some(&json!("Ann2"))
    );
    assert!(engine.loaded());
}

#[test]
fn profiles_scenario_read_update_delete() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));
    let registry = registry_with(store.clone());

    let engine = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new(),
    )
    .unwrap();
    let rx = engine.watch();

    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| s.loaded);
    assert_eq!(name_of(&snapshot).as_deref(), Some("Ann"));

    store.emit(ChangeEvent::update(
        "public",
        "profiles",
        profile("u1", "Ann2"),
        Some(profile("u1", "Ann")),
    ));
    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| {
        name_of(s).as_deref() == Some("Ann2")
    });
    assert!(snapshot.loaded);

    store.emit(ChangeEvent::delete(
        "public",
        "profiles",
        profile("u1", "Ann2"),
    ));
    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| s.value.is_absent());
    assert!(snapshot.loaded);
}

#[test]
fn set_row_persists_and_reaches_other_engines() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));
    let registry = registry_with(store.clone());

    let writer = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new(),
    )
    .unwrap();
    let observer = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new(),
    )
    .unwrap();
    let writer_rx = writer.watch();
    let observer_rx = observer.watch();
    wait_for(&writer_rx, Duration::from_secs(2), |s| s.loaded);
    wait_for(&observer_rx, Duration::from_secs(2), |s| s.loaded);

    writer.update_row(|prev| {
        let mut row = prev.unwrap();
        row.insert("name".into(), json!("X"));
        Some(row)
    });

    // Immediately visible locally, regardless of persistence outcome.
    assert_eq!(
        writer.value().as_row().unwrap().get("name"),
        Some(&json!("X"))
    );

    // The persist round-trips through the store's feed to the observer.
    let snapshot = wait_for(&observer_rx, Duration::from_secs(2), |s| {
        name_of(s).as_deref() == Some("X")
    });
    assert!(snapshot.loaded);

    // And the store itself holds the merged row.
    let select = RowSelect::new("public", "profiles", "id", RowKey::from("u1"));
    let stored = store.fetch_row(&select).unwrap().unwrap();
    assert_eq!(stored.get("name"), Some(&json!("X")));
    assert_eq!(stored.get("id"), Some(&json!("u1")));
}

#[test]
fn persist_failure_keeps_optimistic_value_and_logs() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));
    let registry = registry_with(store.clone());
    let sink = Arc::new(RecordingSink::new());

    let engine = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new().with_sink(sink.clone()),
    )
    .unwrap();
    let rx = engine.watch();
    wait_for(&rx, Duration::from_secs(2), |s| s.loaded);

    store.set_fail_updates(true);
    engine.set_row(profile("u1", "X"));

    assert_eq!(
        engine.value().as_row().unwrap().get("name"),
        Some(&json!("X"))
    );

    let deadline = Instant::now() + Duration::from_secs(2);
    while sink.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(sink.len(), 1);
    assert!(sink.messages()[0].contains("persist"));
    // No rollback.
    assert_eq!(
        engine.value().as_row().unwrap().get("name"),
        Some(&json!("X"))
    );
}

#[test]
fn auto_sync_off_never_touches_the_store() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));
    let registry = registry_with(store.clone());

    let engine = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new().with_auto_sync(false),
    )
    .unwrap();
    let rx = engine.watch();
    wait_for(&rx, Duration::from_secs(2), |s| s.loaded);

    engine.set_row(profile("u1", "X"));
    std::thread::sleep(Duration::from_millis(100));

    let select = RowSelect::new("public", "profiles", "id", RowKey::from("u1"));
    let stored = store.fetch_row(&select).unwrap().unwrap();
    assert_eq!(stored.get("name"), Some(&json!("Ann")));
}

#[test]
fn fetch_failure_marks_loaded_and_logs_once() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));
    store.set_fail_fetches(true);
    let registry = registry_with(store);
    let sink = Arc::new(RecordingSink::new());

    let engine = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new().with_sink(sink.clone()),
    )
    .unwrap();
    let rx = engine.watch();

    // The read settles as a failure: loaded, value untouched, one warning.
    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| s.loaded);
    assert!(snapshot.value.is_unknown());
    assert!(engine.loaded());
    assert!(engine.value().is_unknown());
    assert_eq!(sink.len(), 1);
    assert!(sink.messages()[0].contains("failed"));
}

#[test]
fn watch_opened_during_mutation_converges_in_order() {
    // A watcher registered while another thread mutates the cell must
    // end on the engine's current state, with deliveries in mutation
    // order (never an older value after a newer one).
    for _ in 0..100 {
        let store = Arc::new(MemoryStore::new());
        store.put_row("public", "profiles", "id", profile("u1", "Ann"));
        let registry = registry_with(store.clone());

        let engine = RowSyncEngine::attach(
            &registry,
            RowIdentity::keyed("profiles", "u1"),
            RowOptions::new(),
        )
        .unwrap();
        let warm = engine.watch();
        wait_for(&warm, Duration::from_secs(2), |s| s.loaded);

        let emitter = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store.emit(ChangeEvent::update(
                    "public",
                    "profiles",
                    profile("u1", "Ann2"),
                    Some(profile("u1", "Ann")),
                ));
            })
        };
        let rx = engine.watch();
        emitter.join().unwrap();

        // After the emitter is done no further mutations happen, so the
        // channel must already hold (or have held) the final state.
        let mut last = None;
        let deadline = Instant::now() + Duration::from_secs(2);
        while last.as_ref() != Some(&engine.snapshot()) {
            assert!(Instant::now() < deadline, "watcher never saw the final state");
            match rx.try_recv() {
                Ok(snapshot) => {
                    // Once the newer value arrives the older one may not.
                    if name_of(&snapshot).as_deref() == Some("Ann") {
                        assert_ne!(
                            last.as_ref().and_then(name_of).as_deref(),
                            Some("Ann2"),
                            "snapshots delivered out of mutation order"
                        );
                    }
                    last = Some(snapshot);
                }
                Err(_) => std::thread::sleep(Duration::from_millis(1)),
            }
        }
    }
}

#[test]
fn detach_discards_feed_events_and_late_reads() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));
    store.set_fetch_delay(Some(Duration::from_millis(150)));
    let registry = registry_with(store.clone());

    let engine = RowSyncEngine::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new(),
    )
    .unwrap();

    engine.detach();
    engine.detach();

    store.emit(ChangeEvent::update(
        "public",
        "profiles",
        profile("u1", "Ann2"),
        None,
    ));
    // Let the delayed read resolve against the detached engine.
    std::thread::sleep(Duration::from_millis(300));

    assert!(engine.value().is_unknown());
    assert!(!engine.loaded());
    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn bound_row_follows_identity_changes() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));
    store.put_row("public", "profiles", "id", profile("u2", "Bob"));
    let registry = registry_with(store.clone());

    let mut bound = BoundRow::attach(
        &registry,
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new(),
    )
    .unwrap();
    let rx = bound.watch();
    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| s.loaded);
    assert_eq!(name_of(&snapshot).as_deref(), Some("Ann"));

    bound
        .rebind(
            &registry,
            RowIdentity::keyed("profiles", "u2"),
            RowOptions::new(),
        )
        .unwrap();
    assert_eq!(store.subscriber_count(), 1);

    let rx = bound.watch();
    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| {
        s.loaded && name_of(s).as_deref() == Some("Bob")
    });
    assert!(snapshot.loaded);
}

#[test]
fn global_registry_round_trip() {
    let store = Arc::new(MemoryStore::new());
    store.put_row("public", "profiles", "id", profile("u1", "Ann"));

    liverow_engine::initialize(store).unwrap();
    assert!(liverow_engine::client().is_ok());
    assert!(liverow_engine::initialize(Arc::new(MemoryStore::new())).is_err());

    let engine = RowSyncEngine::attach_global(
        RowIdentity::keyed("profiles", "u1"),
        RowOptions::new(),
    )
    .unwrap();
    let rx = engine.watch();
    let snapshot = wait_for(&rx, Duration::from_secs(2), |s| s.loaded);
    assert_eq!(name_of(&snapshot).as_deref(), Some("Ann"));
}
