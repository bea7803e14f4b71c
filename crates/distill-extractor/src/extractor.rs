//! Core KnowledgeExtractor implementation

use crate::chunking::TextChunker;
use crate::config::{ExtractionConfig, ProcessingStrategy};
use crate::context::ContextManager;
use crate::discoverer::RelationshipDiscoverer;
use crate::error::ExtractorError;
use crate::merger::{AliasTable, EntityMerger};
use crate::parser::{parse_response, FALLBACK_RELATION};
use crate::prompt::PromptBuilder;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::similarity::NameSimilarity;
use crate::stats::ProcessingStatistics;
use crate::types::{ChunkResult, ExtractionResult, ProcessingEstimate, RawEntity, RawRelationship};
use distill_domain::traits::ExtractionOracle;
use distill_domain::{normalize_label, DynamicEntity, DynamicRelationship};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress hook: `(finished_units, total_units, entity_count, relationship_count)`
pub type ProgressFn = dyn Fn(usize, usize, usize, usize) + Send + Sync;

/// Failure hook, called once per failed unit with the unit index
pub type ErrorCallback = Arc<dyn Fn(&ExtractorError, usize) + Send + Sync>;

/// Assumed wall time of one oracle call when estimating
const ESTIMATED_SECONDS_PER_CALL: f64 = 3.0;

/// One oracle call's worth of text
#[derive(Debug, Clone)]
struct WorkUnit {
    index: usize,
    chunk_indices: Vec<usize>,
    text: String,
}

/// What a worker hands back to the run owner
#[derive(Debug)]
struct ChunkOutcome {
    result: ChunkResult,
    error: Option<ExtractorError>,
}

/// Everything one run mutates; owned by the run, never shared with workers
struct RunState {
    merged: BTreeMap<String, DynamicEntity>,
    aliases: AliasTable,
    context: ContextManager,
    chunk_results: Vec<ChunkResult>,
    stats: ProcessingStatistics,
}

impl RunState {
    fn new(config: &ExtractionConfig, total_chunks: usize, total_units: usize) -> Self {
        let mut context = ContextManager::new(config);
        context.clear_context();

        let mut stats = ProcessingStatistics::new(config.strategy);
        stats.total_chunks = total_chunks;
        stats.total_units = total_units;

        Self {
            merged: BTreeMap::new(),
            aliases: AliasTable::default(),
            context,
            chunk_results: Vec::with_capacity(total_units),
            stats,
        }
    }
}

/// Calls the oracle for a single unit: prompt, timeout, retries, parse
struct ChunkRunner<O> {
    oracle: Arc<O>,
    timeout: Duration,
    retry: RetryPolicy,
    cancel: CancellationToken,
    total_units: usize,
}

impl<O> Clone for ChunkRunner<O> {
    fn clone(&self) -> Self {
        Self {
            oracle: Arc::clone(&self.oracle),
            timeout: self.timeout,
            retry: self.retry.clone(),
            cancel: self.cancel.clone(),
            total_units: self.total_units,
        }
    }
}

impl<O: ExtractionOracle> ChunkRunner<O> {
    async fn run(&self, unit: &WorkUnit, payload: String) -> ChunkOutcome {
        let started = Instant::now();
        let prompt = PromptBuilder::new(payload)
            .with_position(unit.index, self.total_units)
            .build();

        debug!(unit = unit.index, prompt_chars = prompt.len(), "Calling oracle");

        let this = self;
        let prompt = prompt.as_str();
        let RetryOutcome { result, attempts } = self
            .retry
            .retry("oracle_call", ExtractorError::is_retryable, move || this.call(prompt))
            .await;

        // A backoff cut short by cancellation hands back the last attempt's error
        let result = match result {
            Err(_) if self.cancel.is_cancelled() => Err(ExtractorError::Cancelled),
            other => other,
        };

        let parsed = result.and_then(|response| parse_response(&response));

        let mut chunk = ChunkResult {
            chunk_index: unit.index,
            chunk_indices: unit.chunk_indices.clone(),
            entities: Vec::new(),
            relationships: Vec::new(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            text_length: unit.text.chars().count(),
            attempts,
            error: None,
        };

        match parsed {
            Ok(records) => {
                debug!(
                    unit = unit.index,
                    entities = records.entities.len(),
                    relationships = records.relationships.len(),
                    rejected = records.rejected,
                    "Parsed oracle response"
                );
                chunk.entities = records.entities;
                chunk.relationships = records.relationships;
                ChunkOutcome {
                    result: chunk,
                    error: None,
                }
            }
            Err(e) => {
                chunk.error = Some(e.to_string());
                ChunkOutcome {
                    result: chunk,
                    error: Some(e),
                }
            }
        }
    }

    async fn call(&self, prompt: &str) -> Result<String, ExtractorError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ExtractorError::Cancelled),
            response = timeout(self.timeout, self.oracle.complete(prompt)) => match response {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(ExtractorError::Oracle(e.to_string())),
                Err(_) => Err(ExtractorError::Timeout(self.timeout.as_secs())),
            },
        }
    }
}

/// Turns text into a consolidated knowledge graph using an extraction oracle
pub struct KnowledgeExtractor<O>
where
    O: ExtractionOracle,
{
    oracle: Arc<O>,
    config: ExtractionConfig,
    merger: EntityMerger,
    discoverer: RelationshipDiscoverer,
    error_callback: Option<ErrorCallback>,
    cancel: CancellationToken,
}

impl<O> KnowledgeExtractor<O>
where
    O: ExtractionOracle + 'static,
{
    /// Create an extractor; fails with every configuration problem at once
    pub fn new(oracle: O, config: ExtractionConfig) -> Result<Self, ExtractorError> {
        let problems = config.validate();
        if !problems.is_empty() {
            return Err(ExtractorError::Config(problems));
        }

        Ok(Self {
            oracle: Arc::new(oracle),
            merger: EntityMerger::new(&config),
            discoverer: RelationshipDiscoverer::new(&config),
            config,
            error_callback: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Call `callback` once for every unit that fails
    pub fn with_error_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ExtractorError, usize) + Send + Sync + 'static,
    {
        self.error_callback = Some(Arc::new(callback));
        self
    }

    /// Abort runs with [`ExtractorError::Cancelled`] once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replace the entity name similarity measure
    pub fn with_similarity(mut self, similarity: Box<dyn NameSimilarity>) -> Self {
        self.merger = self.merger.with_similarity(similarity);
        self
    }

    /// The configuration in use
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Chunk `text` and extract a knowledge graph from it
    ///
    /// Blank text yields an empty result rather than an error.
    pub async fn extract_full(
        &self,
        text: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<ExtractionResult, ExtractorError> {
        let chunks = self.chunker().chunk(text);
        debug!(text_chars = text.chars().count(), chunks = chunks.len(), "Chunked input");
        self.extract_chunks(chunks, progress).await
    }

    /// Extract a knowledge graph from caller-provided chunks
    pub async fn extract_chunks(
        &self,
        chunks: Vec<String>,
        progress: Option<&ProgressFn>,
    ) -> Result<ExtractionResult, ExtractorError> {
        let chunks: Vec<String> = chunks.into_iter().filter(|c| !c.trim().is_empty()).collect();
        if chunks.is_empty() {
            info!("No text to extract from");
            return Ok(ExtractionResult::empty(&self.config));
        }
        if self.cancel.is_cancelled() {
            return Err(ExtractorError::Cancelled);
        }

        let started = Instant::now();
        let units = plan_units(&chunks, &self.config);
        let mut state = RunState::new(&self.config, chunks.len(), units.len());

        info!(
            strategy = self.config.strategy.as_str(),
            chunks = chunks.len(),
            units = units.len(),
            model = self.oracle.model_name(),
            "Starting extraction"
        );

        match self.config.strategy {
            ProcessingStrategy::Incremental | ProcessingStrategy::SlidingWindow => {
                self.run_sequential(units, &mut state, progress).await?
            }
            ProcessingStrategy::Parallel => self.run_parallel(units, &mut state, progress).await?,
        }

        let result = self.finalize(state, started);

        info!(
            entities = result.entities.len(),
            relationships = result.relationships.len(),
            failed_units = result.statistics.failed_units,
            total_time_ms = result.statistics.total_time_ms,
            "Extraction complete"
        );

        Ok(result)
    }

    /// Estimate the cost of extracting `text` without calling the oracle
    pub fn estimate_processing_time(&self, text: &str) -> ProcessingEstimate {
        let chunks = self.chunker().chunk(text);
        let calls = plan_units(&chunks, &self.config).len();

        let waves = match self.config.strategy {
            ProcessingStrategy::Parallel => calls.div_ceil(self.config.max_concurrent_chunks.max(1)),
            _ => calls,
        };

        ProcessingEstimate {
            estimated_time_seconds: waves as f64 * ESTIMATED_SECONDS_PER_CALL,
            estimated_chunks: chunks.len(),
            estimated_oracle_calls: calls,
            strategy: self.config.strategy,
            text_length: text.chars().count(),
        }
    }

    fn chunker(&self) -> TextChunker {
        TextChunker::new(self.config.chunk_size, self.config.chunk_overlap)
    }

    fn runner(&self, total_units: usize) -> ChunkRunner<O> {
        ChunkRunner {
            oracle: Arc::clone(&self.oracle),
            timeout: self.config.chunk_timeout(),
            retry: RetryPolicy::from_config(&self.config).with_cancellation(self.cancel.clone()),
            cancel: self.cancel.clone(),
            total_units,
        }
    }

    /// Units one at a time, each prompt carrying the context built so far
    async fn run_sequential(
        &self,
        units: Vec<WorkUnit>,
        state: &mut RunState,
        progress: Option<&ProgressFn>,
    ) -> Result<(), ExtractorError> {
        let runner = self.runner(units.len());

        for unit in units {
            if self.cancel.is_cancelled() {
                return Err(ExtractorError::Cancelled);
            }
            let payload = state.context.build_chunk_context(&unit.text, unit.index);
            let outcome = runner.run(&unit, payload).await;
            self.settle(outcome, state, progress)?;
        }

        Ok(())
    }

    /// All units at once, bounded by a semaphore; merged in unit order afterwards
    async fn run_parallel(
        &self,
        units: Vec<WorkUnit>,
        state: &mut RunState,
        progress: Option<&ProgressFn>,
    ) -> Result<(), ExtractorError> {
        let runner = self.runner(units.len());
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_chunks.max(1)));
        let mut tasks = JoinSet::new();

        for unit in units {
            let runner = runner.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| ExtractorError::Worker(e.to_string()))?;
                let payload = unit.text.clone();
                Ok::<ChunkOutcome, ExtractorError>(runner.run(&unit, payload).await)
            });
        }

        let mut outcomes = Vec::new();
        loop {
            let joined = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(ExtractorError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(ExtractorError::Worker(e.to_string()));
                }
            };

            if let Some(error) = &outcome.error {
                if *error == ExtractorError::Cancelled {
                    tasks.abort_all();
                    return Err(ExtractorError::Cancelled);
                }
                if !self.config.continue_on_chunk_error {
                    tasks.abort_all();
                    return Err(self.unit_failed(outcome.result.chunk_index, error));
                }
            }
            outcomes.push(outcome);
        }

        outcomes.sort_by_key(|outcome| outcome.result.chunk_index);
        for outcome in outcomes {
            self.settle(outcome, state, progress)?;
        }

        Ok(())
    }

    /// Report a failed unit; returns the run-aborting error
    fn unit_failed(&self, chunk_index: usize, error: &ExtractorError) -> ExtractorError {
        warn!(unit = chunk_index, error = %error, "Unit failed");
        if let Some(callback) = &self.error_callback {
            callback(error, chunk_index);
        }
        ExtractorError::ChunkFailed {
            chunk_index,
            source: Box::new(error.clone()),
        }
    }

    /// Fold a finished unit into the run state
    fn settle(
        &self,
        outcome: ChunkOutcome,
        state: &mut RunState,
        progress: Option<&ProgressFn>,
    ) -> Result<(), ExtractorError> {
        let ChunkOutcome { result, error } = outcome;

        if let Some(error) = error {
            if error == ExtractorError::Cancelled {
                return Err(error);
            }
            let abort = self.unit_failed(result.chunk_index, &error);
            if !self.config.continue_on_chunk_error {
                return Err(abort);
            }
        }

        state.stats.record_unit(&result);

        if result.is_success() {
            let mut mentions: Vec<DynamicEntity> = std::mem::take(&mut state.merged).into_values().collect();
            mentions.extend(result.entities.iter().map(|raw| entity_from_raw(raw, &result)));

            let outcome = self.merger.merge_with_aliases(mentions);
            state.merged = outcome.entities;
            state.aliases.absorb(outcome.aliases);
            state.context.apply_renames(&state.aliases);

            let canonical = canonicalize(&result, &state.aliases, &state.merged);
            state.context.update_context(result.chunk_index, &canonical, &state.merged);
        }

        state.chunk_results.push(result);

        if let Some(progress) = progress {
            progress(
                state.stats.finished_units(),
                state.stats.total_units,
                state.merged.len(),
                state.stats.raw_relationships,
            );
        }

        Ok(())
    }

    fn finalize(&self, state: RunState, started: Instant) -> ExtractionResult {
        let RunState {
            merged,
            aliases,
            context,
            chunk_results,
            mut stats,
        } = state;

        let canonical: Vec<ChunkResult> = chunk_results
            .iter()
            .map(|result| canonicalize(result, &aliases, &merged))
            .collect();

        let mut relationships: BTreeMap<(String, String, String), DynamicRelationship> = BTreeMap::new();
        for result in canonical.iter().filter(|r| r.is_success()) {
            for raw in &result.relationships {
                if !merged.contains_key(&raw.source) || !merged.contains_key(&raw.target) {
                    debug!(source = %raw.source, target = %raw.target, "Dropping relationship with unknown endpoint");
                    continue;
                }
                if raw.source == raw.target {
                    debug!(entity = %raw.source, "Dropping self relationship");
                    continue;
                }
                upsert(&mut relationships, relationship_from_raw(raw, result));
            }
        }

        let discovered = self.discoverer.discover_relationships(&canonical, &merged);
        let discovery_stats = self.discoverer.get_discovery_statistics(&discovered);
        stats.discovered_relationships = discovered.len();
        for relationship in discovered {
            upsert(&mut relationships, relationship);
        }

        let merge_stats = self.merger.get_merge_statistics(stats.raw_entities, merged.len());

        let entities: Vec<DynamicEntity> = merged
            .into_values()
            .filter(|e| e.confidence >= self.config.min_entity_confidence)
            .collect();
        let kept: BTreeSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let relationships: Vec<DynamicRelationship> = relationships
            .into_values()
            .filter(|r| {
                r.confidence >= self.config.min_relationship_confidence
                    && kept.contains(r.source.as_str())
                    && kept.contains(r.target.as_str())
            })
            .collect();

        stats.final_entities = entities.len();
        stats.final_relationships = relationships.len();
        stats.total_time_ms = started.elapsed().as_millis() as u64;

        ExtractionResult {
            entities,
            relationships,
            statistics: stats,
            config: self.config.clone(),
            entity_merge_stats: merge_stats,
            relationship_discovery_stats: discovery_stats,
            context_statistics: context.get_context_statistics(),
            chunk_results,
        }
    }
}

/// Split chunks into work units for the configured strategy
fn plan_units(chunks: &[String], config: &ExtractionConfig) -> Vec<WorkUnit> {
    if config.strategy != ProcessingStrategy::SlidingWindow {
        return chunks
            .iter()
            .enumerate()
            .map(|(index, text)| WorkUnit {
                index,
                chunk_indices: vec![index],
                text: text.clone(),
            })
            .collect();
    }

    if chunks.is_empty() {
        return Vec::new();
    }
    let window = config.sliding_window_size.clamp(1, chunks.len());
    let step = (window / 2).max(1);

    let mut units = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window).min(chunks.len());
        units.push(WorkUnit {
            index: units.len(),
            chunk_indices: (start..end).collect(),
            text: chunks[start..end].join("\n\n"),
        });
        if end == chunks.len() {
            break;
        }
        start += step;
    }
    units
}

fn entity_from_raw(raw: &RawEntity, unit: &ChunkResult) -> DynamicEntity {
    let mut entity = DynamicEntity::new(raw.name.trim()).with_confidence(raw.confidence);
    for label in &raw.types {
        entity.add_type(label);
    }
    for (key, value) in &raw.properties {
        entity.set_property(key.clone(), value.clone(), raw.confidence);
    }
    entity.description = raw.description.clone();
    entity.add_context(
        format!("chunk_{}", unit.chunk_index),
        json!({ "chunk_indices": unit.chunk_indices }),
    );
    entity
}

fn relationship_from_raw(raw: &RawRelationship, unit: &ChunkResult) -> DynamicRelationship {
    let mut labels = raw.types.iter().map(|t| normalize_label(t)).filter(|t| !t.is_empty());
    let primary = labels.next().unwrap_or_else(|| FALLBACK_RELATION.to_string());

    let mut relationship = DynamicRelationship::new(raw.source.clone(), raw.target.clone(), &primary)
        .with_confidence(raw.confidence)
        .with_strength(raw.strength);
    for label in labels {
        relationship.add_type(&label);
    }
    for (key, value) in &raw.properties {
        relationship.set_property(key.clone(), value.clone());
    }
    if let Some(description) = &raw.description {
        relationship.set_property("description", json!(description));
    }
    relationship.add_context(
        format!("chunk_{}", unit.chunk_index),
        json!({ "chunk_indices": unit.chunk_indices }),
    );
    relationship
}

/// Insert a relationship, folding it into an existing one with the same endpoints and primary type
fn upsert(
    relationships: &mut BTreeMap<(String, String, String), DynamicRelationship>,
    relationship: DynamicRelationship,
) {
    let key = (
        relationship.source.clone(),
        relationship.target.clone(),
        relationship.primary_type().unwrap_or(FALLBACK_RELATION).to_string(),
    );
    match relationships.get_mut(&key) {
        Some(existing) => existing.merge_with(&relationship),
        None => {
            relationships.insert(key, relationship);
        }
    }
}

/// A copy of `result` with every entity name rewritten to its canonical form
fn canonicalize(
    result: &ChunkResult,
    aliases: &AliasTable,
    merged: &BTreeMap<String, DynamicEntity>,
) -> ChunkResult {
    let mut copy = result.clone();
    for entity in &mut copy.entities {
        if let Some(name) = canonical_name(&entity.name, aliases, merged) {
            entity.name = name;
        }
    }
    for relationship in &mut copy.relationships {
        if let Some(name) = canonical_name(&relationship.source, aliases, merged) {
            relationship.source = name;
        }
        if let Some(name) = canonical_name(&relationship.target, aliases, merged) {
            relationship.target = name;
        }
    }
    copy
}

fn canonical_name(
    raw: &str,
    aliases: &AliasTable,
    merged: &BTreeMap<String, DynamicEntity>,
) -> Option<String> {
    if let Some(canonical) = aliases.resolve(raw) {
        if merged.contains_key(canonical) {
            return Some(canonical.to_string());
        }
    }
    let trimmed = raw.trim();
    merged.contains_key(trimmed).then(|| trimmed.to_string())
}
