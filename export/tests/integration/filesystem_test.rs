use export::category::Category;
use export::destination::filesystem::FileSystemOutputWriter;
use export::destination::{ENTITY_FILE, INDEX_FILE, IndexDocument, OutputWriter, STATISTICS_FILE};
use export::downstream::{DirectoryMirrorSync, NoopDownstream, NoopRemoteSync};
use export::pipeline::ExportPipeline;
use export::test_utils::fixtures::{EntityFixture, test_export_config};
use export::test_utils::memory_source::MemorySource;
use export::types::EntityId;
use export_config::shared::ProcessingMode;
use export_telemetry::tracing::init_test_tracing;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::path::Path;

async fn seeded_source() -> MemorySource {
    let source = MemorySource::new();
    EntityFixture::new(416)
        .location(Some("Main Street"), true)
        .employee(Some("Ada"), true)
        .dependent("EntityNote", json!({"entityNoteId": 1, "note": "call back"}))
        .insert(&source)
        .await;
    EntityFixture::new(417).employees(6).insert(&source).await;

    source
}

async fn read_json(path: &Path) -> Value {
    let bytes = tokio::fs::read(path).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn entity_files(root: &Path, entity_id: u64) -> Vec<(String, Vec<u8>)> {
    let mut names: Vec<String> = Category::ALL
        .into_iter()
        .map(|category| format!("{}.json", category.file_stem()))
        .collect();
    names.push(ENTITY_FILE.to_string());

    let mut files = Vec::new();
    for name in names {
        let path = root.join(entity_id.to_string()).join(&name);
        files.push((name, tokio::fs::read(path).await.unwrap()));
    }

    files
}

#[tokio::test]
async fn writes_the_export_tree_and_resumes_from_it() {
    init_test_tracing();
    let output = tempfile::tempdir().unwrap();
    let source = seeded_source().await;

    let mut config = test_export_config(output.path());
    config.mode = ProcessingMode::Demo;
    let writer = FileSystemOutputWriter::new(output.path());

    let summary = ExportPipeline::new(
        config.clone(),
        source.clone(),
        writer.clone(),
        NoopDownstream,
        NoopRemoteSync,
    )
    .run()
    .await
    .unwrap();
    assert_eq!(summary.phase2.processed, 1);

    for entity_id in ["416", "417"] {
        assert!(writer.file_exists(&format!("{entity_id}/{ENTITY_FILE}")).await);
        assert!(writer.file_exists(&format!("{entity_id}/{STATISTICS_FILE}")).await);
        for category in Category::ALL {
            let path = format!("{entity_id}/{}.json", category.file_stem());
            assert!(writer.file_exists(&path).await, "missing {path}");
        }
    }

    let projection = read_json(&output.path().join("416").join(ENTITY_FILE)).await;
    assert_eq!(projection["processingLevel"], json!("full"));
    assert_eq!(projection["isSimpleShop"], json!(true));
    assert_eq!(projection["locationNames"], json!(["Main Street"]));

    let core = read_json(&output.path().join("416/core_business.json")).await;
    assert_eq!(core["notes"][0]["note"], json!("call back"));
    assert_eq!(core["metadata"]["category"], json!("Core Business"));
    assert_eq!(core["metadata"]["totalRecords"], json!(1));

    let index: IndexDocument =
        serde_json::from_value(read_json(&output.path().join(INDEX_FILE)).await).unwrap();
    assert_eq!(index.total_entities, 2);
    assert_eq!(
        index.fully_processed(),
        HashSet::from([EntityId::new(416)])
    );

    let before = entity_files(output.path(), 416).await;

    let rerun = ExportPipeline::new(
        config,
        source,
        writer,
        NoopDownstream,
        NoopRemoteSync,
    )
    .run()
    .await
    .unwrap();

    assert_eq!(rerun.already_processed, 1);
    assert_eq!(rerun.phase2.processed, 0);
    assert_eq!(entity_files(output.path(), 416).await, before);
}

#[tokio::test]
async fn fully_processed_entities_are_mirrored() {
    init_test_tracing();
    let output = tempfile::tempdir().unwrap();
    let mirror = tempfile::tempdir().unwrap();
    let source = seeded_source().await;

    let mut config = test_export_config(output.path());
    config.mode = ProcessingMode::Demo;

    let summary = ExportPipeline::new(
        config,
        source,
        FileSystemOutputWriter::new(output.path()),
        NoopDownstream,
        DirectoryMirrorSync::new(mirror.path(), "entities"),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.downstream_failures, 0);

    let mirrored = mirror.path().join("entities/416");
    let projection = read_json(&mirrored.join(ENTITY_FILE)).await;
    assert_eq!(projection["entityId"], json!(416));
    assert!(tokio::fs::try_exists(mirrored.join("core_business.json")).await.unwrap());
    // Only fully processed entities are synced.
    assert!(!tokio::fs::try_exists(mirror.path().join("entities/417")).await.unwrap());
}
