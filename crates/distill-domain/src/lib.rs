//! Distill Domain Layer
//!
//! Core record types and trait interfaces for the Distill knowledge extraction
//! engine. Everything the pipeline produces, merges, and emits is expressed in
//! terms of the types defined here.
//!
//! ## Key Concepts
//!
//! - **DynamicEntity**: a named thing with a set of type labels, confidence-scored
//!   properties, and a log of how it changed while text was being processed
//! - **DynamicRelationship**: a typed, directed edge between two entity names with
//!   independent confidence (certainty) and strength (importance)
//! - **ExtractionOracle**: the external text-to-records inference boundary
//!
//! ## Architecture
//!
//! This crate holds no pipeline logic. The extractor crate owns chunking,
//! merging, and discovery; infrastructure crates implement the oracle trait.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod id;
pub mod labels;
pub mod relationship;
pub mod time;
pub mod traits;

// Re-exports for convenience
pub use entity::{ContextObservation, DynamicEntity, EvolutionSummary, PropertyChange};
pub use id::{EntityId, RelationshipId};
pub use labels::normalize_label;
pub use relationship::{DynamicRelationship, TemporalChange};
pub use time::current_timestamp;
pub use traits::ExtractionOracle;
