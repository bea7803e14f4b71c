//! Entity module - a named thing learned from text
//!
//! Entities are mutable during a run: they gain types, properties, and
//! context observations as more text mentions them. Every property carries its
//! own confidence so later, more certain mentions can overwrite earlier ones.

use crate::id::EntityId;
use crate::labels::normalize_label;
use crate::time::current_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Default confidence for entities and properties with no stated confidence
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// One observation of an entity in some context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextObservation {
    /// When the observation was made (ms since Unix epoch)
    pub timestamp: u64,
    /// Where the observation came from (e.g. `chunk_3`)
    pub source: String,
    /// Free-form payload
    pub data: Value,
}

/// A logged property change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    /// When the change happened (ms since Unix epoch)
    pub timestamp: u64,
    /// Property name
    pub property: String,
    /// Value before the change
    pub old_value: Value,
    /// Value after the change
    pub new_value: Value,
}

/// A dynamically typed entity
///
/// # Invariants
///
/// - `confidence` and every value in `property_confidence` lie in [0, 1]
/// - type labels are normalized (see [`normalize_label`])
/// - `updated_at >= created_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicEntity {
    /// Unique identifier
    pub id: EntityId,

    /// Display name
    pub name: String,

    /// Type labels; an entity may carry several at once
    pub types: BTreeSet<String>,

    /// Property values
    pub properties: BTreeMap<String, Value>,

    /// Confidence per property
    pub property_confidence: BTreeMap<String, f64>,

    /// Optional free-text description
    pub description: Option<String>,

    /// Ordered context observations
    pub contexts: Vec<ContextObservation>,

    /// Source tags (e.g. chunk identifiers)
    pub sources: BTreeSet<String>,

    /// Overall confidence
    pub confidence: f64,

    /// Ordered property-change log
    pub temporal_changes: Vec<PropertyChange>,

    /// Creation time (ms since Unix epoch)
    pub created_at: u64,

    /// Last modification time (ms since Unix epoch)
    pub updated_at: u64,
}

/// Snapshot of how far an entity has evolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionSummary {
    /// Entity name
    pub entity_name: String,
    /// Current type labels
    pub current_types: Vec<String>,
    /// Number of properties
    pub property_count: usize,
    /// Number of context observations
    pub context_count: usize,
    /// Number of logged property changes
    pub change_count: usize,
    /// Number of distinct sources
    pub source_count: usize,
    /// Overall confidence
    pub confidence: f64,
    /// Last modification time (ms since Unix epoch)
    pub last_updated: u64,
}

impl DynamicEntity {
    /// Create an entity with default confidence and no types
    ///
    /// # Examples
    ///
    /// ```
    /// use distill_domain::DynamicEntity;
    ///
    /// let entity = DynamicEntity::new("Alice");
    /// assert_eq!(entity.name, "Alice");
    /// assert_eq!(entity.confidence, 0.5);
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        let now = current_timestamp();
        Self {
            id: EntityId::new(),
            name: name.into(),
            types: BTreeSet::new(),
            properties: BTreeMap::new(),
            property_confidence: BTreeMap::new(),
            description: None,
            contexts: Vec::new(),
            sources: BTreeSet::new(),
            confidence: DEFAULT_CONFIDENCE,
            temporal_changes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style overall confidence (clamped to [0, 1])
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.set_confidence(confidence);
        self
    }

    /// Builder-style type label
    pub fn with_type(mut self, label: &str) -> Self {
        self.add_type(label);
        self
    }

    /// Set the overall confidence, clamped to [0, 1]
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = clamp_unit(confidence);
        self.touch();
    }

    /// Add a type label; returns false when the label was already present or empty
    pub fn add_type(&mut self, label: &str) -> bool {
        let label = normalize_label(label);
        if label.is_empty() {
            return false;
        }
        let added = self.types.insert(label);
        if added {
            self.touch();
        }
        added
    }

    /// Case-insensitive type membership
    pub fn has_type(&self, label: &str) -> bool {
        self.types.contains(&normalize_label(label))
    }

    /// Set a property with its confidence (clamped to [0, 1])
    pub fn set_property(&mut self, key: impl Into<String>, value: Value, confidence: f64) {
        let key = key.into();
        self.property_confidence.insert(key.clone(), clamp_unit(confidence));
        self.properties.insert(key, value);
        self.touch();
    }

    /// Property value with its confidence; missing properties report 0.0
    pub fn property_with_confidence(&self, key: &str) -> (Option<&Value>, f64) {
        let value = self.properties.get(key);
        let confidence = self.property_confidence.get(key).copied().unwrap_or(0.0);
        (value, confidence)
    }

    /// Append a context observation and register its source
    pub fn add_context(&mut self, source: impl Into<String>, data: Value) {
        let source = source.into();
        self.sources.insert(source.clone());
        self.contexts.push(ContextObservation {
            timestamp: current_timestamp(),
            source,
            data,
        });
        self.touch();
    }

    /// Register a source tag without a context payload
    pub fn add_source(&mut self, source: impl Into<String>) {
        self.sources.insert(source.into());
    }

    /// Log a property change
    pub fn record_change(&mut self, property: impl Into<String>, old_value: Value, new_value: Value) {
        self.temporal_changes.push(PropertyChange {
            timestamp: current_timestamp(),
            property: property.into(),
            old_value,
            new_value,
        });
    }

    /// Summarize how this entity evolved
    pub fn evolution_summary(&self) -> EvolutionSummary {
        EvolutionSummary {
            entity_name: self.name.clone(),
            current_types: self.types.iter().cloned().collect(),
            property_count: self.properties.len(),
            context_count: self.contexts.len(),
            change_count: self.temporal_changes.len(),
            source_count: self.sources.len(),
            confidence: self.confidence,
            last_updated: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = current_timestamp().max(self.created_at);
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_confidence_always_in_unit_interval(c in proptest::num::f64::ANY) {
            let entity = DynamicEntity::new("x").with_confidence(c);
            prop_assert!((0.0..=1.0).contains(&entity.confidence));
        }

        #[test]
        fn prop_property_confidence_in_unit_interval(c in -10.0f64..10.0) {
            let mut entity = DynamicEntity::new("x");
            entity.set_property("k", Value::Null, c);
            let (_, stored) = entity.property_with_confidence("k");
            prop_assert!((0.0..=1.0).contains(&stored));
        }
    }
}
