//! Entity merging
//!
//! Collapses entity mentions that denote the same thing into one canonical
//! record. Grouping is seeded: each ungrouped entity pulls in every later
//! ungrouped entity that resembles it. Passes repeat until nothing merges, so
//! the output is a fixed point and merging it again changes nothing.

use crate::config::{ConfidenceMergeStrategy, ExtractionConfig};
use crate::rules::RuleTable;
use crate::similarity::{AliasRules, NameSimilarity, SequenceRatio};
use distill_domain::DynamicEntity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Confidence assumed for a property with no recorded confidence on the incoming side
const INCOMING_PROPERTY_CONFIDENCE: f64 = 0.5;

/// Share of the similarity threshold that suffices for type-compatible entities
const COMPATIBLE_TYPE_FACTOR: f64 = 0.8;

/// Raw entity name -> canonical entity name
///
/// Keys are trimmed and lower-cased so lookups tolerate the casing drift
/// typical of oracle output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasTable {
    names: BTreeMap<String, String>,
}

impl AliasTable {
    fn key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Map `raw` to `canonical`
    pub fn insert(&mut self, raw: &str, canonical: &str) {
        self.names.insert(Self::key(raw), canonical.to_string());
    }

    /// Canonical name for a raw name
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        self.names.get(&Self::key(raw)).map(String::as_str)
    }

    /// Fold in the renames from a later merge
    ///
    /// Entries that pointed at a name which has since been merged away are
    /// repointed to its new canonical name.
    pub fn absorb(&mut self, later: AliasTable) {
        for canonical in self.names.values_mut() {
            if let Some(renamed) = later.names.get(&Self::key(canonical)) {
                *canonical = renamed.clone();
            }
        }
        self.names.extend(later.names);
    }

    /// Number of known raw names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no names are known
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Canonical entities plus the renames that produced them
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Canonical name -> canonical entity
    pub entities: BTreeMap<String, DynamicEntity>,
    /// Every input name -> its canonical name
    pub aliases: AliasTable,
}

/// Counts describing one merge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeStatistics {
    /// Entity mentions before merging
    pub original_entities: usize,
    /// Canonical entities after merging
    pub merged_entities: usize,
    /// Fraction of mentions merged away
    pub merge_ratio: f64,
    /// Mentions merged away
    pub entities_saved: usize,
}

/// Resolves duplicate and aliased entities into canonical records
pub struct EntityMerger {
    similarity_threshold: f64,
    aliasing: bool,
    confidence_strategy: ConfidenceMergeStrategy,
    similarity: Box<dyn NameSimilarity>,
    alias_rules: AliasRules,
    rules: RuleTable,
}

impl EntityMerger {
    /// Create a merger from the run configuration
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            similarity_threshold: config.entity_similarity_threshold,
            aliasing: config.enable_entity_aliasing,
            confidence_strategy: config.confidence_merge_strategy,
            similarity: Box::new(SequenceRatio),
            alias_rules: AliasRules::default(),
            rules: RuleTable::standard(),
        }
    }

    /// Replace the name similarity measure
    pub fn with_similarity(mut self, similarity: Box<dyn NameSimilarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Replace the alias heuristics
    pub fn with_alias_rules(mut self, alias_rules: AliasRules) -> Self {
        self.alias_rules = alias_rules;
        self
    }

    /// Replace the type rule table
    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    /// Merge entity mentions into canonical entities keyed by name
    pub fn merge_entities(&self, entities: Vec<DynamicEntity>) -> BTreeMap<String, DynamicEntity> {
        self.merge_with_aliases(entities).entities
    }

    /// Merge entity mentions, also reporting which input name became which canonical name
    pub fn merge_with_aliases(&self, entities: Vec<DynamicEntity>) -> MergeOutcome {
        let mut aliases = AliasTable::default();
        for entity in &entities {
            aliases.insert(&entity.name, &entity.name);
        }

        let mut current = entities;
        let mut pass = 0;
        loop {
            let groups = self.group(&current);
            if groups.iter().all(|group| group.len() == 1) {
                break;
            }
            pass += 1;

            let mut slots: Vec<Option<DynamicEntity>> = current.into_iter().map(Some).collect();
            let mut renames = AliasTable::default();
            let mut next = Vec::with_capacity(groups.len());

            for group in groups {
                let members: Vec<DynamicEntity> =
                    group.iter().filter_map(|&i| slots[i].take()).collect();
                if let Some(merged) = self.merge_group(members, &mut renames) {
                    next.push(merged);
                }
            }

            debug!(pass, remaining = next.len(), "Merge pass complete");
            aliases.absorb(renames);
            current = next;
        }

        let entities = current
            .into_iter()
            .map(|entity| (entity.name.clone(), entity))
            .collect();

        MergeOutcome { entities, aliases }
    }

    /// Merge statistics for a run
    pub fn get_merge_statistics(&self, original: usize, merged: usize) -> MergeStatistics {
        let saved = original.saturating_sub(merged);
        MergeStatistics {
            original_entities: original,
            merged_entities: merged,
            merge_ratio: if original > 0 {
                saved as f64 / original as f64
            } else {
                0.0
            },
            entities_saved: saved,
        }
    }

    /// Whether two entities denote the same thing
    pub fn are_similar(&self, a: &DynamicEntity, b: &DynamicEntity) -> bool {
        if a.name.to_lowercase() == b.name.to_lowercase() {
            return true;
        }

        let similarity = self.similarity.similarity(&a.name, &b.name);
        if similarity >= self.similarity_threshold {
            return true;
        }

        // Alias rules only apply between entities of the same kind, or when one is untyped
        let same_kind = a.types.is_empty()
            || b.types.is_empty()
            || self.rules.types_compatible(&a.types, &b.types);
        if self.aliasing && same_kind {
            let types: BTreeSet<String> = a.types.union(&b.types).cloned().collect();
            if self.alias_rules.are_aliases(&a.name, &b.name, &types, &self.rules) {
                return true;
            }
        }

        self.rules.types_compatible(&a.types, &b.types)
            && similarity >= self.similarity_threshold * COMPATIBLE_TYPE_FACTOR
    }

    fn group(&self, entities: &[DynamicEntity]) -> Vec<Vec<usize>> {
        let mut grouped = vec![false; entities.len()];
        let mut groups = Vec::new();

        for seed in 0..entities.len() {
            if grouped[seed] {
                continue;
            }
            grouped[seed] = true;
            let mut group = vec![seed];

            for other in seed + 1..entities.len() {
                if !grouped[other] && self.are_similar(&entities[seed], &entities[other]) {
                    grouped[other] = true;
                    group.push(other);
                }
            }
            groups.push(group);
        }

        groups
    }

    fn merge_group(
        &self,
        mut members: Vec<DynamicEntity>,
        renames: &mut AliasTable,
    ) -> Option<DynamicEntity> {
        if members.len() <= 1 {
            return members.pop();
        }

        // First member wins confidence ties
        let mut primary_index = 0;
        for (i, member) in members.iter().enumerate() {
            if member.confidence > members[primary_index].confidence {
                primary_index = i;
            }
        }
        let mut primary = members.remove(primary_index);

        for secondary in members {
            renames.insert(&secondary.name, &primary.name);
            debug!(from = %secondary.name, into = %primary.name, "Merging entity");
            self.fold(&mut primary, secondary);
        }
        renames.insert(&primary.name, &primary.name);

        Some(primary)
    }

    fn fold(&self, primary: &mut DynamicEntity, secondary: DynamicEntity) {
        let primary_weight = primary.properties.len();
        let secondary_weight = secondary.properties.len();

        for label in &secondary.types {
            primary.add_type(label);
        }

        for (key, value) in secondary.properties {
            let incoming = secondary
                .property_confidence
                .get(&key)
                .copied()
                .unwrap_or(INCOMING_PROPERTY_CONFIDENCE);
            let (current, current_confidence) = match primary.property_with_confidence(&key) {
                (Some(current), confidence) => (current.clone(), confidence),
                (None, _) => {
                    primary.set_property(key, value, incoming);
                    continue;
                }
            };

            if incoming > current_confidence {
                primary.set_property(key.clone(), value.clone(), incoming);
                primary.record_change(key, current, value);
            } else if incoming == current_confidence && current != value {
                let combined = combine_values(&current, &value);
                if combined != current {
                    primary.set_property(key, combined, current_confidence);
                }
            }
        }

        if primary.description.is_none() {
            primary.description = secondary.description;
        }
        primary.contexts.extend(secondary.contexts);
        for source in secondary.sources {
            primary.add_source(source);
        }

        let combined = match self.confidence_strategy {
            ConfidenceMergeStrategy::Max => primary.confidence.max(secondary.confidence),
            ConfidenceMergeStrategy::WeightedAvg => {
                let total = primary_weight + secondary_weight;
                if total == 0 {
                    primary.confidence
                } else {
                    (primary.confidence * primary_weight as f64
                        + secondary.confidence * secondary_weight as f64)
                        / total as f64
                }
            }
            ConfidenceMergeStrategy::Accumulate => {
                (primary.confidence + secondary.confidence * 0.1).min(1.0)
            }
        };
        primary.set_confidence(combined);
    }
}

/// Resolve an equal-confidence conflict: union lists, prefer the longer string
fn combine_values(current: &Value, incoming: &Value) -> Value {
    match (current, incoming) {
        (Value::Array(existing), Value::Array(more)) => {
            let mut union = existing.clone();
            for item in more {
                if !union.contains(item) {
                    union.push(item.clone());
                }
            }
            Value::Array(union)
        }
        (Value::String(existing), Value::String(other))
            if other.chars().count() > existing.chars().count() =>
        {
            incoming.clone()
        }
        _ => current.clone(),
    }
}
