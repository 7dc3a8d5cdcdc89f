use export_config::shared::ExportConfig;
use futures::TryStreamExt;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache::{BulkPreloader, CacheStats, EntityCache, PreloadOutcome};
use crate::category::{
    Category, CategoryAssembler, CategoryPayload, ENTITY_EMPLOYEE, ENTITY_LOCATION, ENTITY_TABLE,
    SECOND_LEVEL_TABLES, TableSpec,
};
use crate::classify::{AddressIndex, SimpleShopClassifier, SimpleShopInfo};
use crate::concurrency::governor::MemoryGovernor;
use crate::destination::{INDEX_FILE, OutputWriter};
use crate::downstream::{Downstream, DownstreamScope, RemoteSync};
use crate::error::ExportResult;
use crate::mode::ModeSelector;
use crate::projection::{EntityProjection, ProcessingLevel, ValidatedEntity};
use crate::source::Source;
use crate::statistics::StatisticsIndex;
use crate::types::{EntityId, Row};

/// Tables preloaded for Simple Shops ahead of the basic pass.
static SIMPLE_SHOP_TABLES: [&TableSpec; 2] = [&ENTITY_LOCATION, &ENTITY_EMPLOYEE];

/// Per-phase outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseSummary {
    pub processed: usize,
    /// Entities left out before any work was done, for example because they failed validation.
    pub skipped: usize,
    pub errored: usize,
}

/// Outcome of one [`ExportPipeline::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub discovered: usize,
    pub already_processed: usize,
    pub simple_shops: usize,
    pub selected: usize,
    pub simple_shop_preload: PreloadOutcome,
    pub full_preload: PreloadOutcome,
    pub phase1: PhaseSummary,
    pub phase2: PhaseSummary,
    /// Downstream, aggregation and sync steps that failed after an entity was persisted.
    pub downstream_failures: usize,
    pub global_evictions: usize,
    /// Largest number of entities with cached rows observed during the full pass.
    pub peak_resident_entities: usize,
    pub cache: CacheStats,
    pub index_finalized: bool,
}

/// State gathered before the basic pass and shared by both phases.
#[derive(Debug)]
struct RunContext {
    entities: BTreeMap<EntityId, ValidatedEntity>,
    simple_shops: BTreeSet<EntityId>,
    addresses: AddressIndex,
    statistics: StatisticsIndex,
}

impl RunContext {
    fn active_entities(&self) -> BTreeSet<EntityId> {
        self.entities
            .values()
            .filter(|entity| entity.is_active())
            .map(|entity| entity.entity_id)
            .collect()
    }
}

/// Drives a full export run.
///
/// The run discovers every entity, writes a basic export for all of them and then the full
/// export for the selected subset. Failures of a single entity are logged and counted; only
/// failures that make the whole run meaningless (discovery, reading the resume markers,
/// writing the initial index) are returned as errors.
#[derive(Debug)]
pub struct ExportPipeline<S, W, D, R> {
    config: Arc<ExportConfig>,
    source: S,
    writer: W,
    downstream: D,
    remote_sync: R,
}

impl<S, W, D, R> ExportPipeline<S, W, D, R>
where
    S: Source + Sync,
    W: OutputWriter + Sync,
    D: Downstream + Sync,
    R: RemoteSync + Sync,
{
    pub fn new(config: ExportConfig, source: S, writer: W, downstream: D, remote_sync: R) -> Self {
        Self {
            config: Arc::new(config),
            source,
            writer,
            downstream,
            remote_sync,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub async fn run(&self) -> ExportResult<RunSummary> {
        // Every run owns its cache, so nothing leaks between runs.
        let cache = EntityCache::new();

        let entity_rows = self.discover().await?;
        let discovered = entity_rows.len();
        let fully_processed = self.writer.list_fully_processed().await?;

        info!(
            discovered,
            fully_processed = fully_processed.len(),
            mode = %self.config.mode,
            "starting export run"
        );

        let simple_shops = match SimpleShopClassifier::new(&self.source, &self.config.simple_shop)
            .classify()
            .await
        {
            Ok(simple_shops) => simple_shops,
            Err(err) => {
                warn!(
                    error = %err,
                    "simple shop classification failed, continuing without simple shops"
                );
                BTreeSet::new()
            }
        };

        let simple_shop_ids: Vec<EntityId> = simple_shops.iter().copied().collect();
        // Simple Shops are preloaded however many there are, one IN-list per chunk.
        let simple_shop_preload = BulkPreloader::new(
            &self.source,
            &cache,
            self.config.preload.max_entities,
        )
        .preload_in_chunks(
            SIMPLE_SHOP_TABLES,
            &simple_shop_ids,
            self.config.preload.chunk_size,
        )
        .await;

        let addresses = match AddressIndex::load(&self.source, self.config.scan.batch_size).await {
            Ok(addresses) => addresses,
            Err(err) => {
                warn!(error = %err, "address scan failed, addresses will be empty");
                AddressIndex::default()
            }
        };
        let statistics = StatisticsIndex::load(&self.source).await;

        let mut context = RunContext {
            entities: BTreeMap::new(),
            simple_shops,
            addresses,
            statistics,
        };

        let (phase1, already_processed) = self
            .run_basic_phase(&cache, &mut context, entity_rows, &fully_processed)
            .await;

        // Drops preloaded rows of Simple Shops the basic pass skipped as already processed.
        cache.evict_all().await;

        // The initial index is only written when absent, so progress from a previous run is
        // never clobbered.
        if !self.writer.file_exists(INDEX_FILE).await {
            self.writer.finalize_index().await?;
            info!("initial index written");
        }

        let selected = ModeSelector::from_config(&self.config).select(
            &context.active_entities(),
            &context.simple_shops,
            &fully_processed,
        );
        info!(selected = selected.len(), "selected entities for full processing");

        let full_preload = BulkPreloader::new(
            &self.source,
            &cache,
            self.config.preload.max_entities,
        )
        .preload(SECOND_LEVEL_TABLES.iter(), &selected)
        .await;

        let mut governor = MemoryGovernor::new(self.config.memory.global_eviction_interval);
        let mut phase2 = PhaseSummary::default();
        let mut downstream_failures = 0;
        let mut peak_resident_entities = 0;

        for entity_id in &selected {
            let succeeded = match self.process_full(&cache, &context, *entity_id).await {
                Ok(failures) => {
                    phase2.processed += 1;
                    downstream_failures += failures;
                    true
                }
                Err(err) => {
                    error!(%entity_id, error = %err, "full export failed");
                    phase2.errored += 1;
                    false
                }
            };

            peak_resident_entities =
                peak_resident_entities.max(cache.resident_entities().await.len());

            // Eviction runs whether the entity succeeded or not.
            cache.evict_entity(*entity_id).await;
            if succeeded {
                governor.entity_finished(&cache).await;
            }
        }

        info!(
            processed = phase2.processed,
            errored = phase2.errored,
            downstream_failures,
            "full pass completed"
        );

        let index_finalized = match self.writer.finalize_index().await {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "failed to finalize index");
                false
            }
        };

        let summary = RunSummary {
            discovered,
            already_processed,
            simple_shops: context.simple_shops.len(),
            selected: selected.len(),
            simple_shop_preload,
            full_preload,
            phase1,
            phase2,
            downstream_failures,
            global_evictions: governor.global_evictions(),
            peak_resident_entities,
            cache: cache.stats().await,
            index_finalized,
        };

        info!(
            discovered = summary.discovered,
            already_processed = summary.already_processed,
            simple_shops = summary.simple_shops,
            selected = summary.selected,
            global_evictions = summary.global_evictions,
            peak_resident_entities = summary.peak_resident_entities,
            cache_hits = summary.cache.hits,
            cache_misses = summary.cache.misses,
            index_finalized = summary.index_finalized,
            "export run completed"
        );

        Ok(summary)
    }

    /// Reads every root row with a lazy paginated scan.
    async fn discover(&self) -> ExportResult<Vec<Row>> {
        let pages: Vec<Vec<Row>> = self
            .source
            .scan_table(ENTITY_TABLE, self.config.scan.batch_size)
            .try_collect()
            .await?;

        Ok(pages.into_iter().flatten().collect())
    }

    /// Writes the basic export of every discovered entity not yet fully processed.
    ///
    /// Returns the phase counters and the number of entities skipped as already processed.
    async fn run_basic_phase(
        &self,
        cache: &EntityCache,
        context: &mut RunContext,
        entity_rows: Vec<Row>,
        fully_processed: &HashSet<EntityId>,
    ) -> (PhaseSummary, usize) {
        let mut summary = PhaseSummary::default();
        let mut already_processed = 0;

        for row in entity_rows {
            let entity = match ValidatedEntity::validate(row) {
                Ok(entity) => entity,
                Err(err) => {
                    warn!(error = %err, "entity failed validation, skipping");
                    summary.skipped += 1;
                    continue;
                }
            };

            let entity_id = entity.entity_id;
            if fully_processed.contains(&entity_id) {
                debug!(%entity_id, "entity already fully processed");
                already_processed += 1;
                context.entities.insert(entity_id, entity);
                continue;
            }

            match self.process_basic(cache, context, &entity).await {
                Ok(()) => summary.processed += 1,
                Err(err) => {
                    error!(%entity_id, error = %err, "basic export failed");
                    summary.errored += 1;
                }
            }
            cache.evict_entity(entity_id).await;

            context.entities.insert(entity_id, entity);
        }

        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            errored = summary.errored,
            already_processed,
            "basic pass completed"
        );

        (summary, already_processed)
    }

    async fn process_basic(
        &self,
        cache: &EntityCache,
        context: &RunContext,
        entity: &ValidatedEntity,
    ) -> ExportResult<()> {
        let entity_id = entity.entity_id;
        let statistics = context.statistics.get(entity_id);
        let simple_shop = self.simple_shop_info(cache, context, entity_id).await;
        // The basic pass never queries locations, it only uses those already resident.
        let location_addresses = match cache.get(ENTITY_LOCATION.name, entity_id).await {
            Some(locations) => context.addresses.resolve_locations(&locations),
            None => Vec::new(),
        };

        let projection = EntityProjection::new(
            entity,
            context.addresses.resolve(&entity.row),
            ProcessingLevel::Basic,
        )
        .with_location_addresses(location_addresses)
        .with_statistics(statistics)
        .with_simple_shop(simple_shop);

        let categories: Vec<CategoryPayload> = Category::ALL
            .into_iter()
            .map(|category| CategoryPayload::empty(category, entity_id))
            .collect();

        self.writer.create_directory(entity_id).await?;
        self.writer
            .write_category_files(entity_id, &categories)
            .await?;
        self.writer
            .update_entity_projection(entity_id, &projection)
            .await?;
        self.writer
            .record_basic_statistics(entity_id, &statistics)
            .await?;

        debug!(%entity_id, "basic export written");

        Ok(())
    }

    /// Writes the full export of one entity and hands it to the downstream collaborators.
    ///
    /// Returns the number of downstream steps that failed. Those failures never undo the
    /// persisted data or the completion marker.
    async fn process_full(
        &self,
        cache: &EntityCache,
        context: &RunContext,
        entity_id: EntityId,
    ) -> ExportResult<usize> {
        let assembler = CategoryAssembler::new(&self.source, cache);
        let export = assembler.load_all_categories(entity_id).await?;
        let entity = ValidatedEntity::validate(export.entity)?;

        let simple_shop = self.simple_shop_info(cache, context, entity_id).await;
        let locations = cache.load(&self.source, &ENTITY_LOCATION, entity_id).await;
        let projection = EntityProjection::new(
            &entity,
            context.addresses.resolve(&entity.row),
            ProcessingLevel::Full,
        )
        .with_location_addresses(context.addresses.resolve_locations(&locations))
        .with_statistics(context.statistics.get(entity_id))
        .with_simple_shop(simple_shop);

        self.writer.create_directory(entity_id).await?;
        self.writer
            .write_category_files(entity_id, &export.categories)
            .await?;
        self.writer
            .update_entity_projection(entity_id, &projection)
            .await?;

        let mut failures = 0;

        let entities = BTreeMap::from([(entity_id, entity.row.clone())]);
        let scope = DownstreamScope {
            entities: &entities,
            mode: self.config.mode,
            target: self.config.target_entity_id.map(EntityId::new),
            simple_shops: &context.simple_shops,
        };

        if let Err(err) = self.downstream.process_customers(scope).await {
            warn!(%entity_id, error = %err, "customer processing failed");
            failures += 1;
        }
        if let Err(err) = self.downstream.process_service_orders(scope).await {
            warn!(%entity_id, error = %err, "service order processing failed");
            failures += 1;
        }

        self.writer.regenerate_index(entity_id, true).await?;

        if let Err(err) = self.downstream.aggregate_invoices(entity_id).await {
            warn!(%entity_id, error = %err, "invoice aggregation failed");
            failures += 1;
        }
        if let Err(err) = self.downstream.aggregate_repair_orders(entity_id).await {
            warn!(%entity_id, error = %err, "repair order aggregation failed");
            failures += 1;
        }

        if self.remote_sync.enabled() {
            let local_dir = self.writer.entity_path(entity_id);
            let label = format!("entity {entity_id}");
            if let Err(err) = self
                .remote_sync
                .sync_directory(&local_dir, &entity_id.to_string(), &label)
                .await
            {
                warn!(%entity_id, error = %err, "remote sync failed");
                failures += 1;
            }
        }

        info!(%entity_id, downstream_failures = failures, "entity fully processed");

        Ok(failures)
    }

    /// Builds the Simple Shop markers of an entity, or [`None`] when it is not a Simple Shop.
    async fn simple_shop_info(
        &self,
        cache: &EntityCache,
        context: &RunContext,
        entity_id: EntityId,
    ) -> Option<SimpleShopInfo> {
        if !context.simple_shops.contains(&entity_id) {
            return None;
        }

        let locations = cache.load(&self.source, &ENTITY_LOCATION, entity_id).await;
        let employees = cache.load(&self.source, &ENTITY_EMPLOYEE, entity_id).await;

        Some(SimpleShopInfo::from_rows(&locations, &employees))
    }
}
