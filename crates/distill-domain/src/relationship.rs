//! Relationship module - typed, directed edges between entities

use crate::entity::{clamp_unit, ContextObservation, DEFAULT_CONFIDENCE};
use crate::id::RelationshipId;
use crate::labels::normalize_label;
use crate::time::current_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A logged change to some temporal aspect of a relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalChange {
    /// When the change happened (ms since Unix epoch)
    pub timestamp: u64,
    /// Which aspect changed (e.g. `strength`)
    pub aspect: String,
    /// Value before the change
    pub old_value: Value,
    /// Value after the change
    pub new_value: Value,
}

/// A relationship between two entities, identified by name
///
/// Confidence is how certain we are the relationship exists; strength is how
/// important it is. The two are independent.
///
/// Type labels keep set semantics but remember insertion order, so the first
/// asserted label is the primary type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicRelationship {
    /// Unique identifier
    pub id: RelationshipId,

    /// Source entity name
    pub source: String,

    /// Target entity name
    pub target: String,

    /// Type labels, first one primary
    pub types: Vec<String>,

    /// Property values (including discovery provenance)
    pub properties: BTreeMap<String, Value>,

    /// Ordered context observations
    pub contexts: Vec<ContextObservation>,

    /// Certainty in [0, 1]
    pub confidence: f64,

    /// Importance in [0, 1]
    pub strength: f64,

    /// Whether the relationship holds in both directions
    pub bidirectional: bool,

    /// Start of the validity window (ms since Unix epoch)
    pub valid_from: Option<u64>,

    /// End of the validity window (ms since Unix epoch)
    pub valid_until: Option<u64>,

    /// Ordered temporal-change log
    pub temporal_changes: Vec<TemporalChange>,

    /// Creation time (ms since Unix epoch)
    pub created_at: u64,

    /// Last modification time (ms since Unix epoch)
    pub updated_at: u64,
}

impl DynamicRelationship {
    /// Create a relationship with one type label and default confidence/strength
    ///
    /// # Examples
    ///
    /// ```
    /// use distill_domain::DynamicRelationship;
    ///
    /// let rel = DynamicRelationship::new("Alice", "Acme", "WORKS FOR");
    /// assert_eq!(rel.primary_type(), Some("works_for"));
    /// ```
    pub fn new(source: impl Into<String>, target: impl Into<String>, label: &str) -> Self {
        let now = current_timestamp();
        let mut rel = Self {
            id: RelationshipId::new(),
            source: source.into(),
            target: target.into(),
            types: Vec::new(),
            properties: BTreeMap::new(),
            contexts: Vec::new(),
            confidence: DEFAULT_CONFIDENCE,
            strength: DEFAULT_CONFIDENCE,
            bidirectional: false,
            valid_from: None,
            valid_until: None,
            temporal_changes: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        rel.add_type(label);
        rel
    }

    /// Builder-style confidence (clamped)
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    /// Builder-style strength (clamped)
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = clamp_unit(strength);
        self
    }

    /// Builder-style property
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Add a type label; returns false when already present or empty
    pub fn add_type(&mut self, label: &str) -> bool {
        let label = normalize_label(label);
        if label.is_empty() || self.types.contains(&label) {
            return false;
        }
        self.types.push(label);
        self.touch();
        true
    }

    /// Case-insensitive type membership
    pub fn has_type(&self, label: &str) -> bool {
        let label = normalize_label(label);
        self.types.iter().any(|t| *t == label)
    }

    /// The first asserted type label
    pub fn primary_type(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }

    /// Set a property value
    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
        self.touch();
    }

    /// Append a context observation
    pub fn add_context(&mut self, source: impl Into<String>, data: Value) {
        self.contexts.push(ContextObservation {
            timestamp: current_timestamp(),
            source: source.into(),
            data,
        });
        self.touch();
    }

    /// Log a change to a temporal aspect
    pub fn record_temporal_change(&mut self, aspect: impl Into<String>, old_value: Value, new_value: Value) {
        self.temporal_changes.push(TemporalChange {
            timestamp: current_timestamp(),
            aspect: aspect.into(),
            old_value,
            new_value,
        });
    }

    /// Whether the relationship is valid at `at` (ms since Unix epoch)
    ///
    /// Open ends of the validity window are unbounded.
    pub fn is_active(&self, at: u64) -> bool {
        if matches!(self.valid_from, Some(from) if at < from) {
            return false;
        }
        if matches!(self.valid_until, Some(until) if at > until) {
            return false;
        }
        true
    }

    /// Fold another observation of the same edge into this one
    ///
    /// Types are unioned, missing properties copied, contexts and change logs
    /// appended, confidence and strength take the maximum, and the validity
    /// window widens to cover both.
    pub fn merge_with(&mut self, other: &DynamicRelationship) {
        for label in &other.types {
            self.add_type(label);
        }

        for (key, value) in &other.properties {
            self.properties.entry(key.clone()).or_insert_with(|| value.clone());
        }

        self.contexts.extend(other.contexts.iter().cloned());
        self.temporal_changes.extend(other.temporal_changes.iter().cloned());

        if other.confidence > self.confidence {
            self.record_temporal_change(
                "confidence",
                Value::from(self.confidence),
                Value::from(other.confidence),
            );
            self.confidence = other.confidence;
        }
        self.strength = self.strength.max(other.strength);
        self.bidirectional |= other.bidirectional;

        if let Some(from) = other.valid_from {
            if self.valid_from.map_or(true, |mine| from < mine) {
                self.valid_from = Some(from);
            }
        }
        if let Some(until) = other.valid_until {
            if self.valid_until.map_or(true, |mine| until > mine) {
                self.valid_until = Some(until);
            }
        }

        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = current_timestamp().max(self.created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_type_is_first_asserted() {
        let mut rel = DynamicRelationship::new("a", "b", "works_for");
        rel.add_type("associated_with");
        assert_eq!(rel.primary_type(), Some("works_for"));
        assert!(rel.has_type("ASSOCIATED WITH"));
        assert!(!rel.add_type("Works-For"));
    }

    #[test]
    fn test_empty_label_yields_no_type() {
        let rel = DynamicRelationship::new("a", "b", "");
        assert_eq!(rel.primary_type(), None);
    }

    #[test]
    fn test_is_active_window() {
        let mut rel = DynamicRelationship::new("a", "b", "works_for");
        assert!(rel.is_active(0));

        rel.valid_from = Some(100);
        rel.valid_until = Some(200);
        assert!(!rel.is_active(99));
        assert!(rel.is_active(100));
        assert!(rel.is_active(200));
        assert!(!rel.is_active(201));
    }

    #[test]
    fn test_merge_with_takes_max_and_unions() {
        let mut a = DynamicRelationship::new("x", "y", "works_for")
            .with_confidence(0.6)
            .with_strength(0.9)
            .with_property("since", json!(2020));
        let b = DynamicRelationship::new("x", "y", "employed_by")
            .with_confidence(0.8)
            .with_strength(0.4)
            .with_property("since", json!(1999))
            .with_property("role", json!("ceo"));

        a.merge_with(&b);

        assert_eq!(a.types, vec!["works_for".to_string(), "employed_by".to_string()]);
        assert_eq!(a.confidence, 0.8);
        assert_eq!(a.strength, 0.9);
        assert_eq!(a.properties["since"], json!(2020));
        assert_eq!(a.properties["role"], json!("ceo"));
        assert_eq!(a.temporal_changes.len(), 1);
    }

    #[test]
    fn test_merge_widens_validity_window() {
        let mut a = DynamicRelationship::new("x", "y", "r");
        a.valid_from = Some(100);
        a.valid_until = Some(200);

        let mut b = DynamicRelationship::new("x", "y", "r");
        b.valid_from = Some(50);
        b.valid_until = Some(150);

        a.merge_with(&b);
        assert_eq!(a.valid_from, Some(50));
        assert_eq!(a.valid_until, Some(200));
    }
}
