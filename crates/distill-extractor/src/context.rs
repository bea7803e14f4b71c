//! Cross-chunk context tracking
//!
//! Tracks which entities earlier units produced and renders a short summary of
//! them ahead of later chunks, so the oracle keeps names consistent and can
//! relate new text to what it has already seen.

use crate::config::ExtractionConfig;
use crate::merger::AliasTable;
use crate::rules::RuleTable;
use crate::types::ChunkResult;
use distill_domain::DynamicEntity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Properties worth showing next to a key entity
const KEY_PROPERTIES: &[&str] = &["company", "role", "location", "industry", "type"];

const MENTION_WEIGHT: f64 = 0.3;
const CONFIDENCE_WEIGHT: f64 = 0.3;
const PROPERTY_WEIGHT: f64 = 0.2;
const HIGH_VALUE_BONUS: f64 = 0.2;

/// Confidence at which an entity is always worth mentioning
const CONFIDENT_ENTITY: f64 = 0.8;

/// What the context manager remembers about a merged entity
#[derive(Debug, Clone, PartialEq)]
struct EntitySnapshot {
    types: BTreeSet<String>,
    confidence: f64,
    properties: BTreeMap<String, Value>,
}

impl From<&DynamicEntity> for EntitySnapshot {
    fn from(entity: &DynamicEntity) -> Self {
        Self {
            types: entity.types.clone(),
            confidence: entity.confidence,
            properties: entity.properties.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct UnitHistory {
    chunk_index: usize,
    entities_found: usize,
    entity_names: Vec<String>,
}

/// Summary of the tracked context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextStatistics {
    /// Canonical entities known
    pub total_entities: usize,
    /// Entities currently ranked as key entities
    pub key_entities_count: usize,
    /// Units folded into the context
    pub chunks_processed: usize,
    /// Up to ten most-mentioned entities with their mention counts
    pub most_mentioned_entities: Vec<(String, usize)>,
    /// Up to ten most common entity types with their counts
    pub entity_type_distribution: Vec<(String, usize)>,
    /// Mean entity records per unit
    pub average_entities_per_chunk: f64,
}

/// Tracks entity state across processed units
pub struct ContextManager {
    enabled: bool,
    max_context_entities: usize,
    window_size: usize,
    rules: RuleTable,
    entities: BTreeMap<String, EntitySnapshot>,
    mentions: BTreeMap<String, usize>,
    type_counts: BTreeMap<String, usize>,
    history: Vec<UnitHistory>,
    key_entities: Vec<String>,
}

impl ContextManager {
    /// Create an empty context manager
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            enabled: config.enable_context_enhancement,
            max_context_entities: config.max_context_entities,
            window_size: config.context_window_size,
            rules: RuleTable::standard(),
            entities: BTreeMap::new(),
            mentions: BTreeMap::new(),
            type_counts: BTreeMap::new(),
            history: Vec::new(),
            key_entities: Vec::new(),
        }
    }

    /// Payload for a unit: the chunk text, prefixed with context when there is any
    pub fn build_chunk_context(&self, chunk_text: &str, chunk_index: usize) -> String {
        if !self.enabled || chunk_index == 0 || self.key_entities.is_empty() {
            return chunk_text.to_string();
        }

        let mut sections = Vec::new();

        let key = self.render_key_entities();
        if !key.is_empty() {
            sections.push(format!("### Key entities\n{}", key));
        }
        let types = self.render_type_distribution();
        if !types.is_empty() {
            sections.push(format!("### Entity types\n{}", types));
        }
        let recent = self.render_recent_entities(chunk_index);
        if !recent.is_empty() {
            sections.push(format!("### Recently mentioned\n{}", recent));
        }

        debug!(
            chunk_index,
            key_entities = self.key_entities.len(),
            "Built context-enhanced payload"
        );

        format!(
            "## Context from earlier text\n\
             These entities were already identified earlier in the document:\n\n\
             {}\n\n\
             ## Current text\n\
             Use the context above to keep entity names consistent and to find \
             relationships that span parts of the document.\n\n\
             {}",
            sections.join("\n\n"),
            chunk_text
        )
    }

    /// Fold a finished unit into the context
    ///
    /// `chunk_result` entity names should already be canonical; `merged` is the
    /// full set of canonical entities after the unit was merged.
    pub fn update_context(
        &mut self,
        chunk_index: usize,
        chunk_result: &ChunkResult,
        merged: &BTreeMap<String, DynamicEntity>,
    ) {
        self.entities = merged
            .iter()
            .map(|(name, entity)| (name.clone(), EntitySnapshot::from(entity)))
            .collect();

        let mut names = Vec::new();
        for raw in &chunk_result.entities {
            let name = raw.name.trim();
            if name.is_empty() {
                continue;
            }
            *self.mentions.entry(name.to_string()).or_insert(0) += 1;
            names.push(name.to_string());

            for label in &raw.types {
                let label = distill_domain::normalize_label(label);
                if !label.is_empty() {
                    *self.type_counts.entry(label).or_insert(0) += 1;
                }
            }
        }

        self.history.push(UnitHistory {
            chunk_index,
            entities_found: chunk_result.entities.len(),
            entity_names: names,
        });

        self.rank_key_entities();
    }

    /// Re-key mention counts after entities were merged under new names
    pub fn apply_renames(&mut self, aliases: &AliasTable) {
        let mut renamed: BTreeMap<String, usize> = BTreeMap::new();
        for (name, count) in std::mem::take(&mut self.mentions) {
            let canonical = aliases.resolve(&name).unwrap_or(&name).to_string();
            *renamed.entry(canonical).or_insert(0) += count;
        }
        self.mentions = renamed;

        for unit in &mut self.history {
            for name in &mut unit.entity_names {
                if let Some(canonical) = aliases.resolve(name) {
                    *name = canonical.to_string();
                }
            }
        }

        self.rank_key_entities();
    }

    /// Whether an entity deserves a place in later prompts
    pub fn should_include_entity_in_context(&self, name: &str) -> bool {
        self.key_entities.iter().any(|key| key == name)
            || self.mention_count(name) >= 2
            || self
                .entities
                .get(name)
                .is_some_and(|e| e.confidence >= CONFIDENT_ENTITY)
    }

    /// One-line summary of a known entity
    pub fn entity_context_summary(&self, name: &str) -> Option<String> {
        let entity = self.entities.get(name)?;

        let mut parts = vec![
            format!("Entity: {}", name),
            format!("Types: {}", join_types(&entity.types, usize::MAX)),
            format!("Confidence: {:.2}", entity.confidence),
            format!("Mentions: {}", self.mention_count(name)),
        ];
        if !entity.properties.is_empty() {
            let props: Vec<String> = entity
                .properties
                .iter()
                .take(3)
                .map(|(k, v)| format!("{}: {}", k, display_value(v)))
                .collect();
            parts.push(format!("Properties: {}", props.join("; ")));
        }

        Some(parts.join(" | "))
    }

    /// Names of the current key entities, best first
    pub fn key_entities(&self) -> &[String] {
        &self.key_entities
    }

    /// How often an entity has been mentioned so far
    pub fn mention_count(&self, name: &str) -> usize {
        self.mentions.get(name).copied().unwrap_or(0)
    }

    /// Statistics for the run result
    pub fn get_context_statistics(&self) -> ContextStatistics {
        let found: usize = self.history.iter().map(|h| h.entities_found).sum();
        ContextStatistics {
            total_entities: self.entities.len(),
            key_entities_count: self.key_entities.len(),
            chunks_processed: self.history.len(),
            most_mentioned_entities: most_common(&self.mentions, 10),
            entity_type_distribution: most_common(&self.type_counts, 10),
            average_entities_per_chunk: if self.history.is_empty() {
                0.0
            } else {
                found as f64 / self.history.len() as f64
            },
        }
    }

    /// Forget everything; called at the start of every run
    pub fn clear_context(&mut self) {
        self.entities.clear();
        self.mentions.clear();
        self.type_counts.clear();
        self.history.clear();
        self.key_entities.clear();
        info!("Context cleared");
    }

    fn score(&self, name: &str, entity: &EntitySnapshot) -> f64 {
        let mut score = self.mention_count(name) as f64 * MENTION_WEIGHT
            + entity.confidence * CONFIDENCE_WEIGHT
            + entity.properties.len() as f64 * PROPERTY_WEIGHT;
        if self.rules.has_high_value_type(&entity.types) {
            score += HIGH_VALUE_BONUS;
        }
        score
    }

    fn rank_key_entities(&mut self) {
        let mut scored: Vec<(f64, &String)> = self
            .entities
            .iter()
            .map(|(name, entity)| (self.score(name, entity), name))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        self.key_entities = scored
            .into_iter()
            .take(self.max_context_entities)
            .map(|(_, name)| name.clone())
            .collect();
    }

    fn render_key_entities(&self) -> String {
        self.key_entities
            .iter()
            .filter_map(|name| {
                let entity = self.entities.get(name)?;
                let mut line = format!("- **{}** ({})", name, join_types(&entity.types, 3));

                let props: Vec<String> = entity
                    .properties
                    .iter()
                    .filter(|(key, _)| KEY_PROPERTIES.contains(&key.as_str()))
                    .take(2)
                    .map(|(key, value)| format!("{}: {}", key, display_value(value)))
                    .collect();
                if !props.is_empty() {
                    line.push_str(&format!(" - {}", props.join(" | ")));
                }

                line.push_str(&format!(" [mentioned {} times]", self.mention_count(name)));
                Some(line)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_type_distribution(&self) -> String {
        most_common(&self.type_counts, 5)
            .into_iter()
            .map(|(label, count)| format!("- {}: {}", label.to_uppercase(), count))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_recent_entities(&self, chunk_index: usize) -> String {
        let window_start = chunk_index.saturating_sub(self.window_size);

        let mut recent: BTreeMap<String, usize> = BTreeMap::new();
        for unit in &self.history {
            if unit.chunk_index >= window_start && unit.chunk_index < chunk_index {
                for name in &unit.entity_names {
                    *recent.entry(name.clone()).or_insert(0) += 1;
                }
            }
        }

        let ranked = if recent.is_empty() {
            most_common(&self.mentions, 5)
        } else {
            most_common(&recent, 5)
        };

        ranked
            .into_iter()
            .filter_map(|(name, _)| {
                let entity = self.entities.get(&name)?;
                Some(format!("- {} ({})", name, join_types(&entity.types, 2)))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn most_common(counts: &BTreeMap<String, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    // Stable sort keeps names ascending within equal counts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

fn join_types(types: &BTreeSet<String>, limit: usize) -> String {
    types.iter().take(limit).cloned().collect::<Vec<_>>().join(", ")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
