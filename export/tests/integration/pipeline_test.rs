use export::cache::PreloadOutcome;
use export::category::Category;
use export::classify::SimpleShopInfo;
use export::destination::memory::MemoryOutputWriter;
use export::downstream::NoopRemoteSync;
use export::error::ErrorKind;
use export::pipeline::ExportPipeline;
use export::projection::ProcessingLevel;
use export::source::SourceQuery;
use export::test_utils::fixtures::{EntityFixture, row, test_export_config};
use export::test_utils::memory_source::MemorySource;
use export::test_utils::recording_downstream::{DownstreamCall, RecordingDownstream};
use export::types::EntityId;
use export_config::shared::{ExportConfig, ProcessingMode, SkipEntry};
use export_telemetry::tracing::init_test_tracing;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;

type TestPipeline =
    ExportPipeline<MemorySource, MemoryOutputWriter, RecordingDownstream, NoopRemoteSync>;

fn config(mode: ProcessingMode) -> ExportConfig {
    let mut config = test_export_config(Path::new("export-output"));
    config.mode = mode;
    config
}

fn pipeline(
    config: ExportConfig,
    source: &MemorySource,
    writer: &MemoryOutputWriter,
    downstream: &RecordingDownstream,
) -> TestPipeline {
    ExportPipeline::new(
        config,
        source.clone(),
        writer.clone(),
        downstream.clone(),
        NoopRemoteSync,
    )
}

fn ids(values: &[u64]) -> HashSet<EntityId> {
    values.iter().copied().map(EntityId::new).collect()
}

/// Counts the row queries issued against `table`, ignoring aggregate count queries.
fn row_query_count(queries: &[SourceQuery], table: &str) -> usize {
    queries
        .iter()
        .filter(|query| {
            matches!(query, SourceQuery::ScopedRows { table: spec, .. } if spec.name == table)
        })
        .count()
}

/// Inserts entities that are Active but too large to be Simple Shops.
async fn insert_busy_entities(source: &MemorySource, entity_ids: impl IntoIterator<Item = u64>) {
    for entity_id in entity_ids {
        EntityFixture::new(entity_id)
            .employees(6)
            .insert(source)
            .await;
    }
}

#[tokio::test]
async fn simple_shop_is_fully_exported_in_demo_mode() {
    init_test_tracing();
    let source = MemorySource::new();
    EntityFixture::new(416)
        .location(Some("Main Street"), true)
        .location(Some("Old Depot"), false)
        .employee(Some("Ada"), true)
        .employee(None, true)
        .employee(Some("Grace"), true)
        .insert(&source)
        .await;
    insert_busy_entities(&source, [417]).await;

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config(ProcessingMode::Demo), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.simple_shops, 1);
    assert_eq!(summary.selected, 1);
    assert_eq!(summary.phase1.processed, 2);
    assert_eq!(summary.phase2.processed, 1);
    assert!(summary.index_finalized);

    let projection = writer.projection(EntityId::new(416)).await.unwrap();
    assert_eq!(projection.processing_level, ProcessingLevel::Full);
    assert_eq!(
        projection.simple_shop,
        Some(SimpleShopInfo {
            is_simple_shop: true,
            location_count: 1,
            employee_count: 3,
            location_names: vec!["Main Street".to_string()],
            employee_names: vec![
                "Ada".to_string(),
                "#416002".to_string(),
                "Grace".to_string()
            ],
        })
    );

    let value = serde_json::to_value(&projection).unwrap();
    assert_eq!(value["isSimpleShop"], json!(true));
    assert_eq!(value["locationCount"], json!(1));
    assert_eq!(value["employeeCount"], json!(3));

    let basic = writer.projection(EntityId::new(417)).await.unwrap();
    assert_eq!(basic.processing_level, ProcessingLevel::Basic);
    assert!(basic.simple_shop.is_none());
    assert!(serde_json::to_value(&basic).unwrap().get("isSimpleShop").is_none());

    let statistics = writer.statistics(EntityId::new(417)).await.unwrap();
    assert_eq!(statistics.active_employees, 6);

    let index = writer.index().await.unwrap();
    assert_eq!(index.total_entities, 2);
    assert_eq!(index.fully_processed(), ids(&[416]));

    assert_eq!(
        downstream.calls().await[0],
        DownstreamCall::Customers {
            entities: vec![EntityId::new(416)],
            mode: ProcessingMode::Demo,
            target: None,
        }
    );
}

#[tokio::test]
async fn simple_shops_above_preload_threshold_are_preloaded_in_one_query_per_table() {
    init_test_tracing();
    let source = MemorySource::new();
    for entity_id in 1..=150 {
        EntityFixture::new(entity_id)
            .location(Some("Front"), true)
            .employee(Some("Ada"), true)
            .insert(&source)
            .await;
    }

    // The target does not exist, so only the basic pass runs.
    let mut config = config(ProcessingMode::Demo);
    config.target_entity_id = Some(9999);

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config, &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.simple_shops, 150);
    assert_eq!(summary.selected, 0);
    assert_eq!(summary.phase1.processed, 150);
    assert_eq!(
        summary.simple_shop_preload,
        PreloadOutcome::Completed {
            tables_loaded: 2,
            tables_failed: 0,
            rows: 300,
        }
    );

    let queries = source.queries().await;
    assert_eq!(row_query_count(&queries, "EntityLocation"), 1);
    assert_eq!(row_query_count(&queries, "EntityEmployee"), 1);

    let projection = writer.projection(EntityId::new(150)).await.unwrap();
    assert_eq!(projection.processing_level, ProcessingLevel::Basic);
    let simple_shop = projection.simple_shop.unwrap();
    assert_eq!(simple_shop.location_names, vec!["Front".to_string()]);
    assert_eq!(simple_shop.employee_names, vec!["Ada".to_string()]);
}

#[tokio::test]
async fn entity_and_location_addresses_are_resolved() {
    init_test_tracing();
    let source = MemorySource::new();
    source
        .insert_rows(
            "Address",
            vec![
                row(json!({"addressId": 5, "line1": "5 Harbour"})),
                row(json!({"addressId": 6, "line1": "6 Quay"})),
            ],
        )
        .await;
    EntityFixture::new(1)
        .employees(6)
        .field("primaryAddressId", json!(5))
        .dependent(
            "EntityLocation",
            json!({"entityLocationId": 1001, "title": "Yard", "active": 1, "physicalAddressId": 6}),
        )
        .insert(&source)
        .await;

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    let projection = writer.projection(EntityId::new(1)).await.unwrap();
    assert_eq!(projection.processing_level, ProcessingLevel::Full);
    assert_eq!(
        projection.addresses.primary.as_ref().unwrap()["line1"],
        json!("5 Harbour")
    );
    assert_eq!(projection.location_addresses.len(), 1);
    assert_eq!(projection.location_addresses[0].entity_location_id, json!(1001));

    let value = serde_json::to_value(&projection).unwrap();
    assert_eq!(
        value["locationAddresses"][0]["physical"]["line1"],
        json!("6 Quay")
    );
}

#[tokio::test]
async fn basic_and_full_categories_share_their_shape() {
    init_test_tracing();
    let source = MemorySource::new();
    EntityFixture::new(1)
        .dependent("EntityNote", json!({"entityNoteId": 1}))
        .dependent("EntityPart", json!({"entityPartId": 2}))
        .insert(&source)
        .await;
    insert_busy_entities(&source, [2]).await;

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    pipeline(config(ProcessingMode::Demo), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    let full = writer.categories(EntityId::new(1)).await.unwrap();
    let basic = writer.categories(EntityId::new(2)).await.unwrap();
    assert_eq!(full.len(), 7);
    assert_eq!(basic.len(), 7);

    for (full, basic) in full.iter().zip(&basic) {
        assert_eq!(full.category(), basic.category());
        assert_eq!(
            full.keys().collect::<Vec<_>>(),
            basic.keys().collect::<Vec<_>>()
        );
        assert_eq!(full.metadata().table_count, basic.metadata().table_count);
        assert_eq!(basic.metadata().total_records, 0);
    }

    let core = writer
        .category(EntityId::new(1), Category::CoreBusiness)
        .await
        .unwrap();
    assert_eq!(core.metadata().total_records, 1);
}

#[tokio::test]
async fn rerun_skips_fully_processed_entities() {
    init_test_tracing();
    let source = MemorySource::new();
    for entity_id in 1..=3 {
        EntityFixture::new(entity_id)
            .dependent("EntityNote", json!({"entityNoteId": entity_id}))
            .insert(&source)
            .await;
    }
    insert_busy_entities(&source, [4]).await;

    let writer = MemoryOutputWriter::new();
    let first = pipeline(
        config(ProcessingMode::Demo),
        &source,
        &writer,
        &RecordingDownstream::new(),
    )
    .run()
    .await
    .unwrap();
    assert_eq!(first.phase2.processed, 3);

    let mut before = Vec::new();
    for entity_id in 1..=3 {
        let entity_id = EntityId::new(entity_id);
        before.push((
            writer.projection(entity_id).await,
            writer.categories(entity_id).await,
        ));
    }
    writer.clear_logs().await;

    let downstream = RecordingDownstream::new();
    let second = pipeline(config(ProcessingMode::Demo), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(second.already_processed, 3);
    assert_eq!(second.selected, 0);
    assert_eq!(second.phase2.processed, 0);
    assert_eq!(second.phase1.processed, 1);
    assert!(downstream.calls().await.is_empty());

    for (entity_id, (projection, categories)) in (1..=3).zip(before) {
        let entity_id = EntityId::new(entity_id);
        assert_eq!(writer.projection(entity_id).await, projection);
        assert_eq!(writer.categories(entity_id).await, categories);
    }

    assert_eq!(
        writer.projection_writes().await,
        vec![(EntityId::new(4), ProcessingLevel::Basic)]
    );
    // The index already existed, so only the final rebuild ran.
    assert_eq!(writer.finalize_calls().await, 1);
    assert_eq!(writer.index().await.unwrap().fully_processed(), ids(&[1, 2, 3]));
}

#[tokio::test]
async fn target_overrides_skip_list() {
    init_test_tracing();
    let source = MemorySource::new();
    insert_busy_entities(&source, [1, 2, 3]).await;

    let mut config = config(ProcessingMode::Full);
    config.target_entity_id = Some(2);
    config.skip_list = vec![SkipEntry {
        entity_id: 2,
        reason: "manual review".to_string(),
    }];

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config, &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.selected, 1);
    assert_eq!(summary.phase2.processed, 1);
    assert_eq!(downstream.aggregated_entities().await, vec![EntityId::new(2)]);
    assert_eq!(
        writer
            .projection(EntityId::new(2))
            .await
            .unwrap()
            .processing_level,
        ProcessingLevel::Full
    );
    assert_eq!(
        writer
            .projection(EntityId::new(1))
            .await
            .unwrap()
            .processing_level,
        ProcessingLevel::Basic
    );
}

#[tokio::test]
async fn fully_processed_target_is_exported_again() {
    init_test_tracing();
    let source = MemorySource::new();
    insert_busy_entities(&source, [1, 2]).await;

    let writer = MemoryOutputWriter::new();
    let first = pipeline(
        config(ProcessingMode::Full),
        &source,
        &writer,
        &RecordingDownstream::new(),
    )
    .run()
    .await
    .unwrap();
    assert_eq!(first.phase2.processed, 2);
    writer.clear_logs().await;

    let mut config = config(ProcessingMode::Full);
    config.target_entity_id = Some(2);
    let downstream = RecordingDownstream::new();
    let second = pipeline(config, &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(second.already_processed, 2);
    assert_eq!(second.selected, 1);
    assert_eq!(second.phase2.processed, 1);
    assert_eq!(downstream.aggregated_entities().await, vec![EntityId::new(2)]);
    assert_eq!(
        writer.projection_writes().await,
        vec![(EntityId::new(2), ProcessingLevel::Full)]
    );
    assert_eq!(writer.index().await.unwrap().fully_processed(), ids(&[1, 2]));
}

#[tokio::test]
async fn skip_list_filters_automatic_selection() {
    init_test_tracing();
    let source = MemorySource::new();
    insert_busy_entities(&source, [1, 2, 3]).await;
    EntityFixture::new(4)
        .status("Cancelled")
        .insert(&source)
        .await;

    let mut config = config(ProcessingMode::Full);
    config.skip_list = vec![SkipEntry {
        entity_id: 2,
        reason: "manual review".to_string(),
    }];

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config, &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.discovered, 4);
    assert_eq!(summary.selected, 2);
    assert_eq!(
        downstream.aggregated_entities().await,
        vec![EntityId::new(1), EntityId::new(3)]
    );
}

#[tokio::test]
async fn inactive_target_is_not_fully_processed() {
    init_test_tracing();
    let source = MemorySource::new();
    EntityFixture::new(5)
        .status("Cancelled")
        .insert(&source)
        .await;
    insert_busy_entities(&source, [6]).await;

    let mut config = config(ProcessingMode::Full);
    config.target_entity_id = Some(5);

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config, &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.selected, 0);
    assert_eq!(summary.phase1.processed, 2);
    assert!(downstream.calls().await.is_empty());
}

#[tokio::test]
async fn cache_stays_bounded_over_long_runs() {
    init_test_tracing();
    let source = MemorySource::new();
    for entity_id in 1..=200 {
        EntityFixture::new(entity_id)
            .dependent("EntityNote", json!({"entityNoteId": entity_id}))
            .dependent("EntityPart", json!({"entityPartId": entity_id}))
            .insert(&source)
            .await;
    }

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.selected, 200);
    assert_eq!(summary.phase2.processed, 200);
    assert!(summary.full_preload.is_skipped());
    assert_eq!(summary.global_evictions, 4);
    assert!(summary.peak_resident_entities <= 50);
}

#[tokio::test]
async fn large_selection_skips_bulk_preload() {
    init_test_tracing();
    let source = MemorySource::new();
    for entity_id in 1..=150 {
        EntityFixture::new(entity_id)
            .dependent("EntityNote", json!({"entityNoteId": entity_id}))
            .insert(&source)
            .await;
    }

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(
        summary.full_preload,
        PreloadOutcome::Skipped {
            requested: 150,
            max_entities: 100,
        }
    );
    assert_eq!(summary.phase2.processed, 150);
    // One lazy query per entity.
    assert_eq!(source.query_count("EntityNote").await, 150);
}

#[tokio::test]
async fn small_selection_is_preloaded_with_one_query_per_table() {
    init_test_tracing();
    let source = MemorySource::new();
    for entity_id in 1..=20 {
        EntityFixture::new(entity_id)
            .dependent("EntityNote", json!({"entityNoteId": entity_id}))
            .insert(&source)
            .await;
    }

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(
        summary.full_preload,
        PreloadOutcome::Completed {
            tables_loaded: 12,
            tables_failed: 0,
            rows: 20,
        }
    );
    assert_eq!(summary.phase2.processed, 20);
    assert_eq!(source.query_count("EntityNote").await, 1);
}

#[tokio::test]
async fn failing_fee_table_degrades_to_empty_fees() {
    init_test_tracing();
    let source = MemorySource::new();
    EntityFixture::new(1)
        .dependent("EntityFee", json!({"entityFeeId": 1}))
        .dependent("EntityNote", json!({"entityNoteId": 1}))
        .dependent("EntityNote", json!({"entityNoteId": 2}))
        .insert(&source)
        .await;
    source.fail_table("EntityFee").await;

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.phase2.processed, 1);
    assert_eq!(summary.phase2.errored, 0);
    assert!(summary.cache.failed_loads >= 1);

    let core = writer
        .category(EntityId::new(1), Category::CoreBusiness)
        .await
        .unwrap();
    assert_eq!(core.rows("fees").map(<[_]>::len), Some(0));
    assert_eq!(core.rows("notes").map(<[_]>::len), Some(2));
    assert_eq!(core.metadata().total_records, 2);
}

#[tokio::test]
async fn downstream_failures_do_not_undo_completion() {
    init_test_tracing();
    let source = MemorySource::new();
    insert_busy_entities(&source, [1, 2]).await;

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    downstream.fail_customers().await;
    downstream.fail_aggregations(EntityId::new(2)).await;

    let summary = pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.phase2.processed, 2);
    assert_eq!(summary.phase2.errored, 0);
    assert_eq!(summary.downstream_failures, 4);
    assert_eq!(writer.index().await.unwrap().fully_processed(), ids(&[1, 2]));
}

#[tokio::test]
async fn output_failures_are_counted_per_entity() {
    init_test_tracing();
    let source = MemorySource::new();
    insert_busy_entities(&source, [1, 2, 3]).await;

    let writer = MemoryOutputWriter::new();
    writer.fail_entity(EntityId::new(2)).await;
    let downstream = RecordingDownstream::new();

    let summary = pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.phase1.processed, 2);
    assert_eq!(summary.phase1.errored, 1);
    assert_eq!(summary.phase2.processed, 2);
    assert_eq!(summary.phase2.errored, 1);
    assert_eq!(writer.index().await.unwrap().fully_processed(), ids(&[1, 3]));
}

#[tokio::test]
async fn global_eviction_counts_only_successful_entities() {
    init_test_tracing();
    let source = MemorySource::new();
    insert_busy_entities(&source, 1..=55).await;

    let writer = MemoryOutputWriter::new();
    for entity_id in 1..=10 {
        writer.fail_entity(EntityId::new(entity_id)).await;
    }

    let summary = pipeline(
        config(ProcessingMode::Full),
        &source,
        &writer,
        &RecordingDownstream::new(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.selected, 55);
    assert_eq!(summary.phase2.processed, 45);
    assert_eq!(summary.phase2.errored, 10);
    assert_eq!(summary.global_evictions, 0);
}

#[tokio::test]
async fn invalid_entities_are_skipped() {
    init_test_tracing();
    let source = MemorySource::new();
    insert_busy_entities(&source, [1]).await;
    EntityFixture::new(2).name("  ").insert(&source).await;

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.phase1.processed, 1);
    assert_eq!(summary.phase1.skipped, 1);
    assert_eq!(summary.selected, 1);
    assert!(writer.projection(EntityId::new(2)).await.is_none());
}

#[tokio::test]
async fn classification_failure_continues_without_simple_shops() {
    init_test_tracing();
    let source = MemorySource::new();
    EntityFixture::new(1).insert(&source).await;
    source.fail_simple_shop_query().await;

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let summary = pipeline(config(ProcessingMode::Demo), &source, &writer, &downstream)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.simple_shops, 0);
    assert_eq!(summary.selected, 0);
    assert_eq!(summary.phase1.processed, 1);
    assert!(writer.index().await.is_some());
}

#[tokio::test]
async fn discovery_failure_aborts_the_run() {
    init_test_tracing();
    let source = MemorySource::new();
    source.fail_table("Entity").await;

    let writer = MemoryOutputWriter::new();
    let downstream = RecordingDownstream::new();
    let err = pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    assert!(writer.index().await.is_none());
}

#[tokio::test]
async fn index_finalize_failure_is_reported() {
    init_test_tracing();
    let source = MemorySource::new();
    insert_busy_entities(&source, [1]).await;

    let writer = MemoryOutputWriter::new();
    writer.fail_finalize().await;
    let downstream = RecordingDownstream::new();

    // The initial index is written through finalize as well, so the run aborts before the
    // full pass when no index exists yet.
    let err = pipeline(config(ProcessingMode::Full), &source, &writer, &downstream)
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DestinationIoError);
    assert!(downstream.calls().await.is_empty());
}
