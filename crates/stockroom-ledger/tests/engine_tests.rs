//! Integration tests for the ledger engine against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use stockroom_core::clock::Clock;
use stockroom_core::error::LedgerError;
use stockroom_core::material::{Material, MaterialPatch, MaterialSpec};
use stockroom_core::operation::{NewOperation, OperationKind};
use stockroom_core::store::DurableStore;
use stockroom_ledger::LedgerEngine;
use stockroom_store::MemoryStore;
use stockroom_test_support::{AppendFailingStore, FailingStore, SteppingClock, init_test_tracing};

fn stepping_clock() -> Arc<SteppingClock> {
    Arc::new(SteppingClock::new(
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        Duration::seconds(1),
    ))
}

async fn open_engine() -> LedgerEngine {
    init_test_tracing();
    LedgerEngine::open(Arc::new(MemoryStore::new()), stepping_clock())
        .await
        .expect("engine should open on an empty store")
}

fn widget_spec() -> MaterialSpec {
    let mut spec = MaterialSpec::new("A1", "Widget");
    spec.min_stock = 5;
    spec.category = "Fasteners".into();
    spec.location = "Rack 3".into();
    spec
}

#[tokio::test]
async fn test_create_material_with_initial_stock_records_opening_entry() {
    // Arrange
    let engine = open_engine().await;

    // Act
    let material = engine
        .create_material(widget_spec(), 10)
        .await
        .expect("creation should succeed");

    // Assert
    assert_eq!(material.current_stock, 10);
    let history = engine.history(material.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, OperationKind::In);
    assert_eq!(history[0].previous_stock, 0);
    assert_eq!(history[0].current_stock, 10);
    assert_eq!(history[0].reason.as_deref(), Some("initial stock"));
}

#[tokio::test]
async fn test_duplicate_barcode_is_rejected_and_creates_nothing() {
    // Arrange
    let engine = open_engine().await;
    engine.create_material(widget_spec(), 0).await.unwrap();

    // Act
    let mut rival = MaterialSpec::new("A1", "Impostor Widget");
    rival.min_stock = 0;
    let result = engine.create_material(rival, 3).await;

    // Assert
    assert!(matches!(result, Err(LedgerError::DuplicateBarcode(b)) if b == "A1"));
    let materials = engine.materials();
    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].name, "Widget");
    assert_eq!(engine.recent_operations(None).await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_rejected_stock_out_leaves_state_unchanged() {
    // Arrange
    let engine = open_engine().await;
    let material = engine.create_material(widget_spec(), 7).await.unwrap();
    let history_before = engine.history(material.id).await.unwrap().len();

    // Act
    let result = engine.stock_out(material.id, 100, None).await;

    // Assert
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientStock {
            available: 7,
            requested: 100,
            ..
        })
    ));
    let unchanged = engine.material(material.id).unwrap();
    assert_eq!(unchanged.current_stock, 7);
    assert_eq!(
        engine.history(material.id).await.unwrap().len(),
        history_before
    );
}

#[tokio::test]
async fn test_non_positive_quantities_are_rejected() {
    // Arrange
    let engine = open_engine().await;
    let material = engine.create_material(widget_spec(), 5).await.unwrap();

    // Act / Assert
    for quantity in [0, -4] {
        let stock_in = engine.stock_in(material.id, quantity, None).await;
        assert!(matches!(stock_in, Err(LedgerError::InvalidQuantity(q)) if q == quantity));

        let stock_out = engine.stock_out(material.id, quantity, None).await;
        assert!(matches!(stock_out, Err(LedgerError::InvalidQuantity(q)) if q == quantity));
    }
    let adjust = engine.adjust_stock(material.id, -1, None).await;
    assert!(matches!(adjust, Err(LedgerError::InvalidQuantity(-1))));

    // Adjustment to zero is a valid correction, unlike a zero movement.
    assert!(engine.adjust_stock(material.id, 0, None).await.is_ok());
}

#[tokio::test]
async fn test_operation_chain_links_previous_to_current() {
    // Arrange
    let engine = open_engine().await;
    let material = engine.create_material(widget_spec(), 10).await.unwrap();

    // Act
    engine.stock_out(material.id, 3, None).await.unwrap();
    engine.stock_in(material.id, 8, None).await.unwrap();
    engine.adjust_stock(material.id, 12, None).await.unwrap();

    // Assert: oldest to newest, each entry starts where the last ended.
    let mut history = engine.history(material.id).await.unwrap();
    history.reverse();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].previous_stock, 0);
    for pair in history.windows(2) {
        assert_eq!(pair[1].previous_stock, pair[0].current_stock);
    }
    let newest = history.last().unwrap();
    assert_eq!(newest.current_stock, 12);
    assert_eq!(
        engine.material(material.id).unwrap().current_stock,
        newest.current_stock
    );
}

#[tokio::test]
async fn test_scan_counter_scenario_tracks_low_stock() {
    // Arrange: Widget on rack A1 with a reorder threshold of 5.
    let engine = open_engine().await;
    let material = engine.create_material(widget_spec(), 0).await.unwrap();

    // Act / Assert: receipt of 10, issue of 3, a rejected issue of 100,
    // then a correction down to 2.
    let moved = engine.stock_in(material.id, 10, None).await.unwrap();
    assert_eq!(moved.material.current_stock, 10);

    let moved = engine.stock_out(material.id, 3, None).await.unwrap();
    assert_eq!(moved.material.current_stock, 7);
    assert!(engine.low_stock().is_empty());

    let rejected = engine.stock_out(material.id, 100, None).await;
    assert!(rejected.is_err());
    assert_eq!(engine.material(material.id).unwrap().current_stock, 7);

    let corrected = engine
        .adjust_stock(material.id, 2, Some("cycle count".into()))
        .await
        .unwrap();
    assert_eq!(corrected.material.current_stock, 2);
    assert_eq!(corrected.operation.kind, OperationKind::Adjustment);
    assert_eq!(corrected.operation.quantity, 2);

    let low = engine.low_stock();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].id, material.id);
    assert_eq!(engine.stats().low_stock_count, 1);
    assert_eq!(engine.stats().total_stock, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_stock_ins_serialize_into_a_consistent_chain() {
    // Arrange
    let engine = Arc::new(open_engine().await);
    let material = engine.create_material(widget_spec(), 0).await.unwrap();

    // Act: two near-simultaneous receipts of 5 against the same material.
    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        let id = material.id;
        async move { engine.stock_in(id, 5, None).await }
    });
    let second = tokio::spawn({
        let engine = Arc::clone(&engine);
        let id = material.id;
        async move { engine.stock_in(id, 5, None).await }
    });
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    // Assert: both applied, neither lost, and the chain reads 0 -> 5 -> 10.
    assert_eq!(engine.material(material.id).unwrap().current_stock, 10);
    let mut history = engine.history(material.id).await.unwrap();
    history.reverse();
    assert_eq!(history.len(), 2);
    assert_eq!(
        (history[0].previous_stock, history[0].current_stock),
        (0, 5)
    );
    assert_eq!(
        (history[1].previous_stock, history[1].current_stock),
        (5, 10)
    );
}

#[tokio::test]
async fn test_update_material_edits_fields_without_touching_stock() {
    // Arrange
    let engine = open_engine().await;
    let material = engine.create_material(widget_spec(), 4).await.unwrap();

    // Act
    let patch = MaterialPatch {
        name: Some("Widget Mk2".into()),
        location: Some("Rack 7".into()),
        ..MaterialPatch::default()
    };
    let updated = engine.update_material(material.id, patch).await.unwrap();

    // Assert
    assert_eq!(updated.name, "Widget Mk2");
    assert_eq!(updated.location, "Rack 7");
    assert_eq!(updated.current_stock, 4);
    assert!(updated.updated_at > material.updated_at);
    // Field edits leave no ledger entry behind.
    assert_eq!(engine.history(material.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_material_rejects_barcode_already_in_use() {
    // Arrange
    let engine = open_engine().await;
    engine.create_material(widget_spec(), 0).await.unwrap();
    let other = engine
        .create_material(MaterialSpec::new("B2", "Gadget"), 0)
        .await
        .unwrap();

    // Act
    let patch = MaterialPatch {
        barcode: Some("A1".into()),
        ..MaterialPatch::default()
    };
    let result = engine.update_material(other.id, patch).await;

    // Assert
    assert!(matches!(result, Err(LedgerError::DuplicateBarcode(b)) if b == "A1"));
    assert_eq!(engine.material(other.id).unwrap().barcode, "B2");
}

#[tokio::test]
async fn test_deleted_material_keeps_its_audit_trail() {
    // Arrange
    let engine = open_engine().await;
    let material = engine.create_material(widget_spec(), 10).await.unwrap();
    engine.stock_out(material.id, 4, None).await.unwrap();

    // Act
    engine.delete_material(material.id).await.unwrap();

    // Assert: the material is gone from every live view but its history
    // survives with the denormalized name and barcode intact.
    assert!(engine.material(material.id).is_none());
    assert!(engine.material_by_barcode("A1").is_none());
    assert_eq!(engine.stats().total_materials, 0);

    let history = engine.history(material.id).await.unwrap();
    assert_eq!(history.len(), 2);
    for operation in &history {
        assert_eq!(operation.material_barcode, "A1");
        assert_eq!(operation.material_name, "Widget");
    }
}

#[tokio::test]
async fn test_delete_of_unknown_material_reports_not_found() {
    // Arrange
    let engine = open_engine().await;
    let ghost = Uuid::new_v4();

    // Act
    let result = engine.delete_material(ghost).await;

    // Assert
    assert!(matches!(result, Err(LedgerError::NotFound(id)) if id == ghost));
}

#[tokio::test]
async fn test_cache_views_match_store_after_mixed_mutations() {
    // Arrange
    let engine = open_engine().await;
    let widget = engine.create_material(widget_spec(), 10).await.unwrap();
    let mut bolt = MaterialSpec::new("B2", "Bolt");
    bolt.category = "Fasteners".into();
    let bolt = engine.create_material(bolt, 3).await.unwrap();
    engine
        .create_material(MaterialSpec::new("C3", "Crate"), 1)
        .await
        .unwrap();

    // Act
    engine.stock_out(widget.id, 2, None).await.unwrap();
    engine.delete_material(bolt.id).await.unwrap();

    // Assert
    let listed = engine.materials();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "Crate");
    assert_eq!(listed[1].name, "Widget");
    assert_eq!(engine.materials_by_category("Fasteners").len(), 1);
    assert_eq!(engine.categories(), vec!["Fasteners".to_owned()]);
    assert_eq!(engine.search("rack 3").len(), 1);
    assert_eq!(engine.stats().total_stock, 9);

    // The incremental cache agrees with a full recomputation.
    engine.verify_projection().await.unwrap();
    assert_eq!(engine.stats().total_stock, 9);
}

#[tokio::test]
async fn test_operations_today_counts_and_recent_operations_cap() {
    // Arrange
    let engine = open_engine().await;
    let material = engine.create_material(widget_spec(), 1).await.unwrap();
    engine.stock_in(material.id, 1, None).await.unwrap();
    engine.stock_in(material.id, 1, None).await.unwrap();

    // Act / Assert
    assert_eq!(engine.operations_today().await.unwrap(), 3);
    let recent = engine.recent_operations(Some(2)).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].sequence > recent[1].sequence);
    assert_eq!(engine.locations().await.unwrap(), vec!["Rack 3".to_owned()]);
}

#[tokio::test]
async fn test_operator_name_is_recorded_on_operations() {
    // Arrange
    init_test_tracing();
    let engine = LedgerEngine::open(Arc::new(MemoryStore::new()), stepping_clock())
        .await
        .unwrap()
        .with_operator("night-shift");

    // Act
    let material = engine.create_material(widget_spec(), 6).await.unwrap();

    // Assert
    let history = engine.history(material.id).await.unwrap();
    assert_eq!(history[0].operator, "night-shift");
}

#[tokio::test]
async fn test_open_replays_ledger_over_a_lagging_material_row() {
    // Arrange: a store crashed between the operation append and the
    // material write, so the row still shows the pre-movement stock.
    init_test_tracing();
    let store = Arc::new(MemoryStore::new());
    let clock = stepping_clock();
    let now = clock.now();
    let material = Material {
        id: Uuid::new_v4(),
        barcode: "A1".into(),
        name: "Widget".into(),
        specification: String::new(),
        unit: "pcs".into(),
        current_stock: 3,
        min_stock: 0,
        max_stock: 999_999,
        location: String::new(),
        category: String::new(),
        description: String::new(),
        created_at: now,
        updated_at: now,
    };
    store.insert_material(&material).await.unwrap();
    store
        .insert_operation(NewOperation {
            id: Uuid::new_v4(),
            material_id: material.id,
            material_barcode: material.barcode.clone(),
            material_name: material.name.clone(),
            kind: OperationKind::In,
            quantity: 5,
            previous_stock: 3,
            current_stock: 8,
            operator: "admin".into(),
            reason: None,
            created_at: clock.now(),
        })
        .await
        .unwrap();

    // Act
    let engine = LedgerEngine::open(store, clock).await.unwrap();

    // Assert: the row was healed to the ledger's view before serving reads.
    assert_eq!(engine.material(material.id).unwrap().current_stock, 8);
    assert_eq!(engine.stats().total_stock, 8);
}

#[tokio::test]
async fn test_failed_opening_movement_leaves_no_material_behind() {
    // Arrange: material rows persist fine but ledger appends fail, so the
    // opening stock-in of a create breaks mid-sequence.
    init_test_tracing();
    let store = Arc::new(MemoryStore::new());
    let faulty = Arc::new(AppendFailingStore::new(store.clone()));
    let engine = LedgerEngine::open(faulty, stepping_clock()).await.unwrap();

    // Act
    let result = engine.create_material(widget_spec(), 5).await;

    // Assert: the rejected create left nothing visible and nothing durable.
    assert!(matches!(result, Err(LedgerError::StorageUnavailable(_))));
    assert!(engine.material_by_barcode("A1").is_none());
    assert!(engine.materials().is_empty());
    assert!(store.material_by_barcode("A1").await.unwrap().is_none());

    // The barcode is free again once the append path is healthy.
    let healthy = LedgerEngine::open(store, stepping_clock()).await.unwrap();
    let material = healthy.create_material(widget_spec(), 5).await.unwrap();
    assert_eq!(material.current_stock, 5);
}

#[tokio::test]
async fn test_storage_outage_surfaces_as_typed_error() {
    // Arrange / Act
    init_test_tracing();
    let result = LedgerEngine::open(Arc::new(FailingStore), stepping_clock()).await;

    // Assert
    assert!(matches!(result, Err(LedgerError::StorageUnavailable(_))));
}
