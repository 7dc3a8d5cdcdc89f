use export::cache::{BulkPreloader, EntityCache, PreloadOutcome};
use export::category::{Category, CategoryAssembler, SECOND_LEVEL_TABLES};
use export::test_utils::fixtures::EntityFixture;
use export::test_utils::memory_source::MemorySource;
use export::types::EntityId;
use export_telemetry::tracing::init_test_tracing;
use serde_json::json;

async fn seeded_source() -> MemorySource {
    let source = MemorySource::new();

    EntityFixture::new(1)
        .location(Some("Main"), true)
        .employee(Some("Ada"), true)
        .dependent("EntityNote", json!({"entityNoteId": 10, "note": "first"}))
        .dependent("EntityNote", json!({"entityNoteId": 11, "note": "second"}))
        .dependent("EntityHistory", json!({"entityHistoryId": 20}))
        .child(
            "EntityHistoryDetail",
            json!({"entityHistoryDetailId": 1, "entityHistoryId": 20}),
        )
        .insert(&source)
        .await;
    EntityFixture::new(2)
        .dependent("EntityFee", json!({"entityFeeId": 30, "amount": "12.50"}))
        .insert(&source)
        .await;
    // Entity 3 has no dependent rows at all.
    EntityFixture::new(3).insert(&source).await;

    source
}

#[tokio::test]
async fn preloaded_and_lazy_reads_are_identical() {
    init_test_tracing();
    let source = seeded_source().await;
    let entity_ids = [EntityId::new(1), EntityId::new(2), EntityId::new(3)];

    let preloaded = EntityCache::new();
    let outcome = BulkPreloader::new(&source, &preloaded, 100)
        .preload(SECOND_LEVEL_TABLES.iter(), &entity_ids)
        .await;
    assert!(!outcome.is_skipped());

    let lazy = EntityCache::new();

    for table in SECOND_LEVEL_TABLES.iter() {
        for entity_id in entity_ids {
            let from_preload = preloaded.load(&source, table, entity_id).await;
            let from_lazy = lazy.load(&source, table, entity_id).await;

            assert_eq!(
                from_preload, from_lazy,
                "{} differs for entity {entity_id}",
                table.name
            );
        }
    }
}

#[tokio::test]
async fn preloaded_and_lazy_categories_are_identical() {
    init_test_tracing();
    let source = seeded_source().await;
    let entity_ids = [EntityId::new(1), EntityId::new(2), EntityId::new(3)];

    let preloaded = EntityCache::new();
    BulkPreloader::new(&source, &preloaded, 100)
        .preload(SECOND_LEVEL_TABLES.iter(), &entity_ids)
        .await;
    let lazy = EntityCache::new();

    let with_preload = CategoryAssembler::new(&source, &preloaded);
    let without_preload = CategoryAssembler::new(&source, &lazy);

    for entity_id in entity_ids {
        for category in Category::ALL {
            let left = with_preload.load_category(category, entity_id).await;
            let right = without_preload.load_category(category, entity_id).await;

            for key in left.keys() {
                assert_eq!(left.rows(key), right.rows(key), "{category} / {key}");
            }
            assert_eq!(
                left.metadata().total_records,
                right.metadata().total_records
            );
        }
    }

    let core = with_preload
        .load_category(Category::CoreBusiness, EntityId::new(1))
        .await;
    assert_eq!(core.rows("notes").map(<[_]>::len), Some(2));
    assert_eq!(core.rows("historyDetail").map(<[_]>::len), Some(1));
}

#[tokio::test]
async fn entities_without_rows_are_cached_as_empty() {
    init_test_tracing();
    let source = seeded_source().await;
    let cache = EntityCache::new();

    BulkPreloader::new(&source, &cache, 100)
        .preload(SECOND_LEVEL_TABLES.iter(), &[EntityId::new(3)])
        .await;
    let queries_after_preload = source.total_queries().await;

    for table in SECOND_LEVEL_TABLES.iter() {
        assert!(cache.contains(table.name, EntityId::new(3)).await);
        assert!(cache.load(&source, table, EntityId::new(3)).await.is_empty());
    }

    // Empty entries are answered from memory, not re-queried.
    assert_eq!(source.total_queries().await, queries_after_preload);
}

#[tokio::test]
async fn failed_bulk_table_falls_back_to_lazy_loads() {
    init_test_tracing();
    let source = seeded_source().await;
    source.fail_table("EntityFee").await;
    let cache = EntityCache::new();

    let outcome = BulkPreloader::new(&source, &cache, 100)
        .preload(SECOND_LEVEL_TABLES.iter(), &[EntityId::new(1), EntityId::new(2)])
        .await;

    assert!(matches!(
        outcome,
        PreloadOutcome::Completed {
            tables_failed: 1,
            tables_loaded: 11,
            ..
        }
    ));
    assert!(!cache.contains("EntityFee", EntityId::new(2)).await);
    assert!(cache.contains("EntityNote", EntityId::new(2)).await);

    let core = CategoryAssembler::new(&source, &cache)
        .load_category(Category::CoreBusiness, EntityId::new(2))
        .await;
    assert_eq!(core.rows("fees"), Some(&[][..]));
    assert_eq!(core.metadata().total_records, 0);
    assert_eq!(cache.stats().await.failed_loads, 1);
}
