//! Versioned type and inference rule table
//!
//! Every table that interprets type labels lives here: the type hierarchy used
//! for compatibility, the high-value types used for context ranking, the
//! co-occurrence table, the transitive inference rules, and the
//! relationship/endpoint constraints used during validation.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Version of the standard rule table; bump when any rule changes
pub const RULE_TABLE_VERSION: u32 = 1;

/// A co-occurrence rule: entities of these types seen together imply `relation`
/// from the `source_type` entity to the `target_type` entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CooccurrenceRule {
    /// Type the source must carry
    pub source_type: String,
    /// Type the target must carry
    pub target_type: String,
    /// Relationship label to infer
    pub relation: String,
}

/// A transitive rule outcome: the inferred label and its base confidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitiveRule {
    /// Relationship label to infer
    pub relation: String,
    /// Multiplier applied to the product of the two edge confidences
    pub base_confidence: f64,
}

/// Constraint on the endpoints of relationships whose label contains `fragment`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointConstraint {
    /// Label fragment the constraint applies to (e.g. `works_for`)
    pub fragment: String,
    /// Acceptable source types; empty means any
    pub source_types: BTreeSet<String>,
    /// Acceptable target types; empty means any
    pub target_types: BTreeSet<String>,
    /// Both ends must fit (otherwise either end suffices)
    pub require_both: bool,
}

impl EndpointConstraint {
    fn accepts(&self, source: &BTreeSet<String>, target: &BTreeSet<String>) -> bool {
        let fits = |allowed: &BTreeSet<String>, actual: &BTreeSet<String>| {
            !allowed.is_empty() && !allowed.is_disjoint(actual)
        };
        let source_ok = fits(&self.source_types, source);
        let target_ok = fits(&self.target_types, target);

        if self.require_both {
            (self.source_types.is_empty() || source_ok) && (self.target_types.is_empty() || target_ok)
        } else {
            source_ok || target_ok
        }
    }
}

/// Type and inference rules
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTable {
    /// Table version
    pub version: u32,
    /// Specialized type -> more general types it implies
    pub hierarchy: BTreeMap<String, BTreeSet<String>>,
    /// Types that boost an entity's context ranking
    pub high_value_types: BTreeSet<String>,
    /// Directed co-occurrence rules, checked in order
    pub cooccurrence: Vec<CooccurrenceRule>,
    /// (first edge label, second edge label) -> inferred relationship
    pub transitive: BTreeMap<(String, String), TransitiveRule>,
    /// Endpoint constraints, first matching fragment wins
    pub constraints: Vec<EndpointConstraint>,
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl RuleTable {
    /// The standard rule table
    pub fn standard() -> Self {
        let hierarchy = [
            ("company", &["organization"][..]),
            ("tech_company", &["organization", "company"][..]),
            ("software_engineer", &["person", "employee"][..]),
            ("ceo", &["person", "executive"][..]),
            ("startup_founder", &["person", "entrepreneur"][..]),
        ]
        .iter()
        .map(|(specific, general)| (specific.to_string(), set(general)))
        .collect();

        let cooccurrence = [
            ("person", "organization", "associated_with"),
            ("organization", "location", "potentially_located_in"),
            ("product", "organization", "potentially_created_by"),
        ]
        .iter()
        .map(|(s, t, r)| CooccurrenceRule {
            source_type: s.to_string(),
            target_type: t.to_string(),
            relation: r.to_string(),
        })
        .collect();

        let transitive = [
            ("works_for", "part_of", "indirectly_works_for", 0.6),
            ("works_for", "subsidiary_of", "indirectly_works_for", 0.6),
            ("located_in", "part_of", "indirectly_located_in", 0.5),
            ("located_in", "located_in", "located_in", 0.7),
            ("part_of", "part_of", "part_of", 0.7),
        ]
        .iter()
        .map(|(ab, bd, relation, base)| {
            (
                (ab.to_string(), bd.to_string()),
                TransitiveRule {
                    relation: relation.to_string(),
                    base_confidence: *base,
                },
            )
        })
        .collect();

        let constraints = vec![
            EndpointConstraint {
                fragment: "works_for".to_string(),
                source_types: set(&["person"]),
                target_types: set(&["organization"]),
                require_both: true,
            },
            EndpointConstraint {
                fragment: "located_in".to_string(),
                source_types: set(&["organization", "person"]),
                target_types: set(&["location"]),
                require_both: false,
            },
            EndpointConstraint {
                fragment: "created_by".to_string(),
                source_types: set(&["product"]),
                target_types: set(&["organization", "person"]),
                require_both: true,
            },
        ];

        Self {
            version: RULE_TABLE_VERSION,
            hierarchy,
            high_value_types: set(&["person", "organization", "company", "tech_company", "ceo"]),
            cooccurrence,
            transitive,
            constraints,
        }
    }

    /// The labels plus every more general label they imply
    pub fn expand_types(&self, types: &BTreeSet<String>) -> BTreeSet<String> {
        let mut expanded = types.clone();
        let mut frontier: Vec<String> = types.iter().cloned().collect();

        while let Some(label) = frontier.pop() {
            if let Some(general) = self.hierarchy.get(&label) {
                for g in general {
                    if expanded.insert(g.clone()) {
                        frontier.push(g.clone());
                    }
                }
            }
        }

        expanded
    }

    /// Whether two type sets overlap once specializations are expanded
    pub fn types_compatible(&self, a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
        !self.expand_types(a).is_disjoint(&self.expand_types(b))
    }

    /// Whether any label is high-value
    pub fn has_high_value_type(&self, types: &BTreeSet<String>) -> bool {
        !types.is_disjoint(&self.high_value_types)
    }

    /// Relationship implied by two co-occurring entities, oriented as
    /// `(relation, a_is_source)`
    pub fn cooccurrence_relation(
        &self,
        a: &BTreeSet<String>,
        b: &BTreeSet<String>,
    ) -> Option<(String, bool)> {
        let a = self.expand_types(a);
        let b = self.expand_types(b);

        for rule in &self.cooccurrence {
            if a.contains(&rule.source_type) && b.contains(&rule.target_type) {
                return Some((rule.relation.clone(), true));
            }
            if b.contains(&rule.source_type) && a.contains(&rule.target_type) {
                return Some((rule.relation.clone(), false));
            }
        }

        let shared: BTreeSet<&String> = a.intersection(&b).collect();
        if shared.contains(&"organization".to_string()) {
            return Some(("related_organization".to_string(), true));
        }
        if shared.contains(&"person".to_string()) {
            return Some(("associated_person".to_string(), true));
        }
        let related = shared
            .into_iter()
            .next()
            .map(|label| (format!("related_{}", label), true));
        related
    }

    /// Transitive rule for an (A->B, B->D) pair of labels
    pub fn transitive_rule(&self, first: &str, second: &str) -> Option<&TransitiveRule> {
        self.transitive.get(&(first.to_string(), second.to_string()))
    }

    /// Whether a relationship label fits its endpoint types
    pub fn relation_fits(
        &self,
        label: &str,
        source: &BTreeSet<String>,
        target: &BTreeSet<String>,
    ) -> bool {
        let source = self.expand_types(source);
        let target = self.expand_types(target);
        match self.constraints.iter().find(|c| label.contains(c.fragment.as_str())) {
            Some(constraint) => constraint.accepts(&source, &target),
            None => true,
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::standard()
    }
}
