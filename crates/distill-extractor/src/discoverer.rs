//! Cross-chunk relationship discovery
//!
//! Infers relationships no single oracle response stated: weak links between
//! entities that appear in the same unit, and composed links derived from two
//! stated relationships that share an intermediate entity.

use crate::config::ExtractionConfig;
use crate::rules::RuleTable;
use crate::types::ChunkResult;
use distill_domain::{normalize_label, DynamicEntity, DynamicRelationship};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// `discovery_method` property value for co-occurrence links
pub const METHOD_COOCCURRENCE: &str = "cooccurrence";

/// `discovery_method` property value for transitive links
pub const METHOD_TRANSITIVE: &str = "transitive_inference";

/// Share of a transitive link's confidence used as its strength
const TRANSITIVE_STRENGTH_FACTOR: f64 = 0.8;

/// Summary of a discovery pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryStatistics {
    /// Relationships discovered
    pub total_discovered: usize,
    /// Count per discovery method
    pub discovery_methods: BTreeMap<String, usize>,
    /// Count per primary relationship type
    pub relation_types: BTreeMap<String, usize>,
    /// Mean confidence (0 when nothing was discovered)
    pub average_confidence: f64,
    /// Mean strength (0 when nothing was discovered)
    pub average_strength: f64,
}

/// A stated relationship, aggregated over every unit that stated it
#[derive(Debug, Clone)]
struct StatedEdge {
    confidence: f64,
    units: BTreeSet<usize>,
}

/// A transitive candidate, kept per (source, target, type)
#[derive(Debug, Clone)]
struct Inference {
    confidence: f64,
    intermediate: String,
    first_label: String,
    second_label: String,
    units: BTreeSet<usize>,
}

/// Discovers relationships that span units
pub struct RelationshipDiscoverer {
    enabled: bool,
    threshold: f64,
    rules: RuleTable,
}

impl RelationshipDiscoverer {
    /// Create a discoverer from the run configuration
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            enabled: config.enable_cross_chunk_relations,
            threshold: config.relation_confidence_threshold,
            rules: RuleTable::standard(),
        }
    }

    /// Replace the rule table
    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    /// Discover relationships across units
    ///
    /// Entity and relationship names in `chunk_results` must already be
    /// canonical, i.e. keys of `merged`.
    pub fn discover_relationships(
        &self,
        chunk_results: &[ChunkResult],
        merged: &BTreeMap<String, DynamicEntity>,
    ) -> Vec<DynamicRelationship> {
        if !self.enabled {
            return Vec::new();
        }

        let mut candidates = self.cooccurrence(chunk_results, merged);
        candidates.extend(self.transitive(chunk_results, merged));

        let discovered: Vec<DynamicRelationship> = candidates
            .into_iter()
            .filter(|relationship| self.is_valid(relationship, merged))
            .collect();

        debug!(count = discovered.len(), "Discovered cross-chunk relationships");
        discovered
    }

    /// Statistics over a set of discovered relationships
    pub fn get_discovery_statistics(&self, relationships: &[DynamicRelationship]) -> DiscoveryStatistics {
        let mut stats = DiscoveryStatistics {
            total_discovered: relationships.len(),
            ..Default::default()
        };
        if relationships.is_empty() {
            return stats;
        }

        for relationship in relationships {
            let method = relationship
                .properties
                .get("discovery_method")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            *stats.discovery_methods.entry(method).or_insert(0) += 1;

            if let Some(label) = relationship.primary_type() {
                *stats.relation_types.entry(label.to_string()).or_insert(0) += 1;
            }
        }

        let n = relationships.len() as f64;
        stats.average_confidence = relationships.iter().map(|r| r.confidence).sum::<f64>() / n;
        stats.average_strength = relationships.iter().map(|r| r.strength).sum::<f64>() / n;
        stats
    }

    fn cooccurrence(
        &self,
        chunk_results: &[ChunkResult],
        merged: &BTreeMap<String, DynamicEntity>,
    ) -> Vec<DynamicRelationship> {
        let mut appearances: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
        for result in chunk_results.iter().filter(|r| r.is_success()) {
            for raw in &result.entities {
                if let Some((name, _)) = merged.get_key_value(raw.name.trim()) {
                    appearances.entry(name.as_str()).or_default().insert(result.chunk_index);
                }
            }
        }

        let names: Vec<&str> = appearances.keys().copied().collect();
        let mut relationships = Vec::new();

        for (i, &first) in names.iter().enumerate() {
            for &second in &names[i + 1..] {
                let shared: Vec<usize> = appearances[first]
                    .intersection(&appearances[second])
                    .copied()
                    .collect();
                if shared.is_empty() {
                    continue;
                }

                let (Some(a), Some(b)) = (merged.get(first), merged.get(second)) else {
                    continue;
                };
                let Some((label, first_is_source)) = self.rules.cooccurrence_relation(&a.types, &b.types) else {
                    continue;
                };
                let (source, target) = if first_is_source {
                    (first, second)
                } else {
                    (second, first)
                };

                let n = shared.len() as f64;
                relationships.push(
                    DynamicRelationship::new(source, target, &label)
                        .with_confidence((0.2 * n + 0.5).min(1.0))
                        .with_strength((0.3 * n + 0.4).min(1.0))
                        .with_property("discovery_method", json!(METHOD_COOCCURRENCE))
                        .with_property("common_chunks", json!(shared))
                        .with_property("cooccurrence_frequency", json!(shared.len())),
                );
            }
        }

        relationships
    }

    fn transitive(
        &self,
        chunk_results: &[ChunkResult],
        merged: &BTreeMap<String, DynamicEntity>,
    ) -> Vec<DynamicRelationship> {
        // (source, target, label) -> best stated confidence
        let mut edges: BTreeMap<(String, String, String), StatedEdge> = BTreeMap::new();
        for result in chunk_results.iter().filter(|r| r.is_success()) {
            for raw in &result.relationships {
                let source = raw.source.trim();
                let target = raw.target.trim();
                if !merged.contains_key(source) || !merged.contains_key(target) {
                    continue;
                }
                for label in raw.types.iter().map(|t| normalize_label(t)).filter(|t| !t.is_empty()) {
                    let edge = edges
                        .entry((source.to_string(), target.to_string(), label))
                        .or_insert(StatedEdge {
                            confidence: 0.0,
                            units: BTreeSet::new(),
                        });
                    edge.confidence = edge.confidence.max(raw.confidence);
                    edge.units.insert(result.chunk_index);
                }
            }
        }

        let mut inferred: BTreeMap<(String, String, String), Inference> = BTreeMap::new();
        for ((a, b, first_label), first) in &edges {
            for ((c, d, second_label), second) in &edges {
                if b != c || a == d {
                    continue;
                }
                let Some(rule) = self.rules.transitive_rule(first_label, second_label) else {
                    continue;
                };

                let confidence = rule.base_confidence * first.confidence * second.confidence;
                if confidence < self.threshold {
                    continue;
                }

                let key = (a.clone(), d.clone(), rule.relation.clone());
                let better = inferred
                    .get(&key)
                    .is_none_or(|existing| confidence > existing.confidence);
                if better {
                    inferred.insert(
                        key,
                        Inference {
                            confidence,
                            intermediate: b.clone(),
                            first_label: first_label.clone(),
                            second_label: second_label.clone(),
                            units: first.units.union(&second.units).copied().collect(),
                        },
                    );
                }
            }
        }

        inferred
            .into_iter()
            .map(|((source, target, label), inference)| {
                let units: Vec<usize> = inference.units.into_iter().collect();
                DynamicRelationship::new(source, target, &label)
                    .with_confidence(inference.confidence)
                    .with_strength(inference.confidence * TRANSITIVE_STRENGTH_FACTOR)
                    .with_property("discovery_method", json!(METHOD_TRANSITIVE))
                    .with_property("intermediate_entity", json!(inference.intermediate))
                    .with_property("source_relation", json!(inference.first_label))
                    .with_property("target_relation", json!(inference.second_label))
                    .with_property("inference_confidence", json!(inference.confidence))
                    .with_property("supporting_chunks", json!(units))
            })
            .collect()
    }

    fn is_valid(&self, relationship: &DynamicRelationship, merged: &BTreeMap<String, DynamicEntity>) -> bool {
        if relationship.confidence < self.threshold {
            debug!(
                source = %relationship.source,
                target = %relationship.target,
                confidence = relationship.confidence,
                "Dropping low-confidence discovery"
            );
            return false;
        }
        if relationship.source == relationship.target {
            return false;
        }

        let (Some(source), Some(target)) = (merged.get(&relationship.source), merged.get(&relationship.target))
        else {
            debug!(source = %relationship.source, target = %relationship.target, "Dropping discovery with unknown endpoint");
            return false;
        };

        let label = relationship.primary_type().unwrap_or_default();
        let fits = self.rules.relation_fits(label, &source.types, &target.types);
        if !fits {
            debug!(
                source = %relationship.source,
                target = %relationship.target,
                label,
                "Dropping discovery with incompatible endpoint types"
            );
        }
        fits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawEntity, RawRelationship};

    fn entity(name: &str, label: &str) -> (String, DynamicEntity) {
        (name.to_string(), DynamicEntity::new(name).with_type(label).with_confidence(0.9))
    }

    fn unit(index: usize, entities: &[&str], relationships: Vec<RawRelationship>) -> ChunkResult {
        ChunkResult {
            chunk_index: index,
            chunk_indices: vec![index],
            entities: entities.iter().map(|n| RawEntity::new(*n)).collect(),
            relationships,
            processing_time_ms: 1,
            text_length: 10,
            attempts: 1,
            error: None,
        }
    }

    fn edge(source: &str, target: &str, label: &str, confidence: f64) -> RawRelationship {
        let mut raw = RawRelationship::new(source, target, label);
        raw.confidence = confidence;
        raw
    }

    fn discoverer(threshold: f64) -> RelationshipDiscoverer {
        let mut config = ExtractionConfig::default();
        config.relation_confidence_threshold = threshold;
        RelationshipDiscoverer::new(&config)
    }

    #[test]
    fn test_disabled_discovers_nothing() {
        let mut config = ExtractionConfig::default();
        config.enable_cross_chunk_relations = false;
        let merged: BTreeMap<_, _> = [entity("Alice", "person"), entity("Acme", "organization")].into();
        let results = vec![unit(0, &["Alice", "Acme"], Vec::new())];

        let found = RelationshipDiscoverer::new(&config).discover_relationships(&results, &merged);
        assert!(found.is_empty());
    }

    #[test]
    fn test_cooccurrence_strength_and_orientation() {
        let merged: BTreeMap<_, _> = [entity("Acme", "organization"), entity("Alice", "person")].into();
        let results = vec![
            unit(0, &["Alice", "Acme"], Vec::new()),
            unit(1, &["Acme", "Alice"], Vec::new()),
        ];

        let found = discoverer(0.6).discover_relationships(&results, &merged);
        assert_eq!(found.len(), 1);
        let link = &found[0];
        assert_eq!(link.source, "Alice");
        assert_eq!(link.target, "Acme");
        assert_eq!(link.primary_type(), Some("associated_with"));
        assert!((link.confidence - 0.9).abs() < 1e-9);
        assert!((link.strength - 1.0).abs() < 1e-9);
        assert_eq!(link.properties["cooccurrence_frequency"], json!(2));
        assert_eq!(link.properties["common_chunks"], json!([0, 1]));
    }

    #[test]
    fn test_no_rule_no_cooccurrence() {
        let merged: BTreeMap<_, _> = [entity("Rust", "concept"), entity("RustConf", "event")].into();
        let results = vec![unit(0, &["Rust", "RustConf"], Vec::new())];
        assert!(discoverer(0.4).discover_relationships(&results, &merged).is_empty());
    }

    #[test]
    fn test_failed_units_are_ignored() {
        let merged: BTreeMap<_, _> = [entity("Alice", "person"), entity("Acme", "organization")].into();
        let mut failed = unit(0, &["Alice", "Acme"], Vec::new());
        failed.error = Some("timeout".to_string());
        assert!(discoverer(0.4).discover_relationships(&[failed], &merged).is_empty());
    }

    #[test]
    fn test_transitive_inference() {
        let merged: BTreeMap<_, _> = [
            entity("Alice", "person"),
            entity("Acme", "organization"),
            entity("Globex", "organization"),
        ]
        .into();
        let results = vec![
            unit(0, &["Alice"], vec![edge("Alice", "Acme", "works_for", 0.9)]),
            unit(1, &["Globex"], vec![edge("Acme", "Globex", "part_of", 0.9)]),
        ];

        let found = discoverer(0.4).discover_relationships(&results, &merged);
        let inferred: Vec<_> = found
            .iter()
            .filter(|r| r.properties["discovery_method"] == json!(METHOD_TRANSITIVE))
            .collect();
        assert_eq!(inferred.len(), 1);

        let link = inferred[0];
        assert_eq!((link.source.as_str(), link.target.as_str()), ("Alice", "Globex"));
        assert_eq!(link.primary_type(), Some("indirectly_works_for"));
        assert!((link.confidence - 0.486).abs() < 1e-9);
        assert!((link.strength - 0.3888).abs() < 1e-9);
        assert_eq!(link.properties["intermediate_entity"], json!("Acme"));
        assert_eq!(link.properties["supporting_chunks"], json!([0, 1]));
    }

    #[test]
    fn test_transitive_below_threshold_is_dropped() {
        let merged: BTreeMap<_, _> = [
            entity("Alice", "person"),
            entity("Acme", "organization"),
            entity("Globex", "organization"),
        ]
        .into();
        let results = vec![unit(
            0,
            &[],
            vec![edge("Alice", "Acme", "works_for", 0.9), edge("Acme", "Globex", "part_of", 0.9)],
        )];
        assert!(discoverer(0.6).discover_relationships(&results, &merged).is_empty());
    }

    #[test]
    fn test_transitive_type_constraint() {
        // Source is not a person, so indirectly_works_for is rejected
        let merged: BTreeMap<_, _> = [
            entity("Robot", "product"),
            entity("Acme", "organization"),
            entity("Globex", "organization"),
        ]
        .into();
        let results = vec![unit(
            0,
            &[],
            vec![edge("Robot", "Acme", "works_for", 1.0), edge("Acme", "Globex", "part_of", 1.0)],
        )];
        assert!(discoverer(0.4).discover_relationships(&results, &merged).is_empty());
    }

    #[test]
    fn test_transitive_keeps_best_path() {
        let merged: BTreeMap<_, _> = [
            entity("Paris Office", "organization"),
            entity("France", "location"),
            entity("Europe", "location"),
            entity("Île-de-France", "location"),
        ]
        .into();
        let results = vec![unit(
            0,
            &[],
            vec![
                edge("Paris Office", "France", "located_in", 0.9),
                edge("France", "Europe", "located_in", 0.9),
                edge("Paris Office", "Île-de-France", "located_in", 1.0),
                edge("Île-de-France", "Europe", "located_in", 1.0),
            ],
        )];

        let found = discoverer(0.4).discover_relationships(&results, &merged);
        let to_europe: Vec<_> = found
            .iter()
            .filter(|r| r.source == "Paris Office" && r.target == "Europe")
            .collect();
        assert_eq!(to_europe.len(), 1);
        assert!((to_europe[0].confidence - 0.7).abs() < 1e-9);
        assert_eq!(to_europe[0].properties["intermediate_entity"], json!("Île-de-France"));
    }

    #[test]
    fn test_statistics() {
        let merged: BTreeMap<_, _> = [
            entity("Alice", "person"),
            entity("Acme", "organization"),
            entity("Globex", "organization"),
        ]
        .into();
        let results = vec![
            unit(0, &["Alice", "Acme"], vec![edge("Alice", "Acme", "works_for", 0.9)]),
            unit(1, &["Acme", "Globex"], vec![edge("Acme", "Globex", "part_of", 0.9)]),
        ];

        let discoverer = discoverer(0.4);
        let found = discoverer.discover_relationships(&results, &merged);
        let stats = discoverer.get_discovery_statistics(&found);

        assert_eq!(stats.total_discovered, 3);
        assert_eq!(stats.discovery_methods[METHOD_COOCCURRENCE], 2);
        assert_eq!(stats.discovery_methods[METHOD_TRANSITIVE], 1);
        assert_eq!(stats.relation_types["associated_with"], 1);
        assert_eq!(stats.relation_types["related_organization"], 1);

        let empty = discoverer.get_discovery_statistics(&[]);
        assert_eq!(empty, DiscoveryStatistics::default());
    }
}
