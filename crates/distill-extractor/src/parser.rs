//! Parse oracle output into raw entity and relationship records
//!
//! The structured form is one JSON object per line (a single JSON array of
//! objects is accepted too). Lines that are not valid JSON records fall back to
//! the legacy pipe-delimited form:
//!
//! ```text
//! ENTITY|name|type[,type..]|description
//! RELATIONSHIP|source|target|type|description
//! name|type|description
//! source|target|relation
//! ```
//!
//! Legacy records carry confidence and strength 0.5.

use crate::error::ExtractorError;
use crate::types::{ParsedRecords, RawEntity, RawRelationship};
use distill_domain::normalize_label;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Default confidence and strength for records that state none
pub const DEFAULT_RECORD_CONFIDENCE: f64 = 0.5;

/// Relationship type used when a record states none
pub const FALLBACK_RELATION: &str = "related_to";

/// Entity type labels recognised in bare three-field legacy lines, with the
/// label they normalize to
const LEGACY_ENTITY_TYPES: &[(&str, &str)] = &[
    ("person", "person"),
    ("organization", "organization"),
    ("organisation", "organization"),
    ("company", "company"),
    ("location", "location"),
    ("place", "location"),
    ("product", "product"),
    ("concept", "concept"),
    ("event", "event"),
    ("人物", "person"),
    ("组织", "organization"),
    ("公司", "company"),
    ("地点", "location"),
    ("产品", "product"),
    ("概念", "concept"),
    ("事件", "event"),
];

enum Record {
    Entity(RawEntity),
    Relationship(RawRelationship),
}

/// Parse an oracle response
///
/// Returns an error only when the response has content but not a single
/// record could be recovered from it.
pub fn parse_response(response: &str) -> Result<ParsedRecords, ExtractorError> {
    let body = strip_code_fences(response);
    let trimmed = body.trim();

    let mut parsed = ParsedRecords::default();
    if trimmed.is_empty() {
        return Ok(parsed);
    }

    if trimmed.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
            for (idx, item) in items.iter().enumerate() {
                match parse_json_record(item) {
                    Ok(record) => push(&mut parsed, record),
                    Err(reason) => {
                        debug!("Dropping array item {}: {}", idx, reason);
                        parsed.rejected += 1;
                    }
                }
            }
            return Ok(parsed);
        }
    }

    let mut content_lines = 0;
    for line in trimmed.lines() {
        let line = strip_bullet(line.trim());
        if line.is_empty() || matches!(line, "[" | "]" | "," | "{" | "}") {
            continue;
        }
        content_lines += 1;

        match parse_line(line) {
            Some(record) => push(&mut parsed, record),
            None => {
                debug!("Dropping unparseable line: {}", line);
                parsed.rejected += 1;
            }
        }
    }

    if parsed.is_empty() && content_lines > 0 {
        return Err(ExtractorError::InvalidFormat(format!(
            "no records in {} response lines",
            content_lines
        )));
    }

    Ok(parsed)
}

fn push(parsed: &mut ParsedRecords, record: Record) {
    match record {
        Record::Entity(e) => parsed.entities.push(e),
        Record::Relationship(r) => parsed.relationships.push(r),
    }
}

/// Structured first, legacy second
fn parse_line(line: &str) -> Option<Record> {
    if line.starts_with('{') {
        let json_text = line.trim_end_matches(',');
        match serde_json::from_str::<Value>(json_text) {
            Ok(value) => match parse_json_record(&value) {
                Ok(record) => return Some(record),
                Err(reason) => debug!("Structured record rejected: {}", reason),
            },
            Err(e) => debug!("Line is not JSON ({}), trying legacy format", e),
        }
    }

    if line.contains('|') {
        return parse_legacy_line(line);
    }

    None
}

/// Remove markdown code fence lines
fn strip_code_fences(response: &str) -> String {
    response
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_bullet(line: &str) -> &str {
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim_start();
        }
    }
    line
}

fn parse_json_record(value: &Value) -> Result<Record, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "Record is not a JSON object".to_string())?;

    let kind = obj
        .get("kind")
        .or_else(|| obj.get("record_type"))
        .and_then(Value::as_str)
        .map(|k| k.trim().to_lowercase());

    match kind.as_deref() {
        Some("entity") => parse_entity_json(obj).map(Record::Entity),
        Some("relationship") | Some("relation") => parse_relationship_json(obj).map(Record::Relationship),
        Some(other) => Err(format!("Unknown record kind '{}'", other)),
        None if obj.contains_key("source") && obj.contains_key("target") => {
            parse_relationship_json(obj).map(Record::Relationship)
        }
        None if obj.contains_key("name") => parse_entity_json(obj).map(Record::Entity),
        None => Err("Record has no kind".to_string()),
    }
}

fn parse_entity_json(obj: &Map<String, Value>) -> Result<RawEntity, String> {
    let name = required_name(obj, "name")?;
    let types = labels(obj, &["types", "type"]);
    let confidence = unit_value(obj, "confidence")?;

    Ok(RawEntity {
        name,
        types,
        properties: properties(obj),
        confidence,
        description: optional_string(obj, "description"),
    })
}

fn parse_relationship_json(obj: &Map<String, Value>) -> Result<RawRelationship, String> {
    let source = required_name(obj, "source")?;
    let target = required_name(obj, "target")?;
    let mut types = labels(obj, &["types", "type", "relation"]);
    if types.is_empty() {
        types.push(FALLBACK_RELATION.to_string());
    }

    Ok(RawRelationship {
        source,
        target,
        types,
        properties: properties(obj),
        confidence: unit_value(obj, "confidence")?,
        strength: unit_value(obj, "strength")?,
        description: optional_string(obj, "description"),
    })
}

fn required_name(obj: &Map<String, Value>, key: &str) -> Result<String, String> {
    let name = obj
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() {
        return Err(format!("Missing or empty '{}'", key));
    }
    Ok(name.to_string())
}

/// Labels from the first key present, as an array or a single string
fn labels(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let raw = keys.iter().find_map(|k| obj.get(*k));
    let mut out: Vec<String> = match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(normalize_label)
            .collect(),
        Some(Value::String(s)) => s.split(',').map(normalize_label).collect(),
        _ => Vec::new(),
    };
    out.retain(|l| !l.is_empty());
    out.dedup();
    out
}

fn properties(obj: &Map<String, Value>) -> BTreeMap<String, Value> {
    match obj.get("properties") {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => BTreeMap::new(),
    }
}

/// A number in [0, 1]; absent means the default
fn unit_value(obj: &Map<String, Value>, key: &str) -> Result<f64, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(DEFAULT_RECORD_CONFIDENCE),
        Some(value) => {
            let v = value
                .as_f64()
                .ok_or_else(|| format!("'{}' is not a number", key))?;
            if (0.0..=1.0).contains(&v) {
                Ok(v)
            } else {
                Err(format!("'{}' out of range: {}", key, v))
            }
        }
    }
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_legacy_line(line: &str) -> Option<Record> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    let tag = parts.first().map(|p| p.to_uppercase()).unwrap_or_default();

    match (tag.as_str(), parts.len()) {
        ("ENTITY", n) if n >= 3 => {
            let types = parts[2].split(',').map(legacy_entity_type).collect();
            legacy_entity(parts[1], types, parts.get(3).copied())
        }
        ("RELATIONSHIP", n) if n >= 4 => {
            legacy_relationship(parts[1], parts[2], parts[3], parts.get(4).copied())
        }
        (_, 3) => match known_entity_type(parts[1]) {
            Some(label) => legacy_entity(parts[0], vec![label.to_string()], Some(parts[2])),
            None if looks_like_label(parts[2]) => legacy_relationship(parts[0], parts[1], parts[2], None),
            None => legacy_relationship(parts[0], parts[1], FALLBACK_RELATION, Some(parts[2])),
        },
        _ => None,
    }
}

fn legacy_entity(name: &str, types: Vec<String>, description: Option<&str>) -> Option<Record> {
    if name.is_empty() {
        return None;
    }
    let mut entity = RawEntity::new(name);
    entity.types = types.into_iter().filter(|t| !t.is_empty()).collect();
    entity.description = description.filter(|d| !d.is_empty()).map(str::to_string);
    Some(Record::Entity(entity))
}

fn legacy_relationship(
    source: &str,
    target: &str,
    label: &str,
    description: Option<&str>,
) -> Option<Record> {
    if source.is_empty() || target.is_empty() {
        return None;
    }
    let label = normalize_label(label);
    let label = if label.is_empty() { FALLBACK_RELATION.to_string() } else { label };
    let mut rel = RawRelationship::new(source, target, label);
    rel.description = description.filter(|d| !d.is_empty()).map(str::to_string);
    Some(Record::Relationship(rel))
}

fn known_entity_type(field: &str) -> Option<&'static str> {
    let label = normalize_label(field);
    LEGACY_ENTITY_TYPES
        .iter()
        .find(|(raw, _)| label == *raw || label.contains(raw))
        .map(|(_, normalized)| *normalized)
}

fn legacy_entity_type(field: &str) -> String {
    known_entity_type(field)
        .map(str::to_string)
        .unwrap_or_else(|| normalize_label(field))
}

/// Short, label-like text (at most four words, no sentence punctuation)
fn looks_like_label(field: &str) -> bool {
    !field.is_empty()
        && field.split_whitespace().count() <= 4
        && !field.ends_with(['.', '。', '!', '?'])
}
