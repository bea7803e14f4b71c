//! Prompt construction for entity and relationship extraction

/// Builds the oracle prompt for one work unit
pub struct PromptBuilder {
    payload: String,
    position: Option<(usize, usize)>,
}

impl PromptBuilder {
    /// Create a builder around the unit payload (possibly context-enhanced)
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            position: None,
        }
    }

    /// Tell the oracle which unit of how many this is
    pub fn with_position(mut self, unit_index: usize, total_units: usize) -> Self {
        self.position = Some((unit_index, total_units));
        self
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(EXTRACTION_INSTRUCTIONS);
        prompt.push_str("\n\n");

        if let Some((index, total)) = self.position {
            if total > 1 {
                prompt.push_str(&format!(
                    "This is part {} of {} of a longer document.\n\n",
                    index + 1,
                    total
                ));
            }
        }

        prompt.push_str("Text to analyze:\n");
        prompt.push_str("---\n");
        prompt.push_str(self.payload.trim());
        prompt.push_str("\n---\n\n");

        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        prompt
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"You extract a knowledge graph from text.

Identify every entity (people, organizations, locations, products, concepts, events)
and every relationship between them that the text states or clearly implies.

Output one JSON object per line and nothing else. Each line is one of:

{"kind": "entity", "name": "<name>", "types": ["<type>", ...], "properties": {"<key>": <value>}, "confidence": <0..1>}
{"kind": "relationship", "source": "<entity name>", "target": "<entity name>", "types": ["<type>"], "properties": {}, "confidence": <0..1>, "strength": <0..1>}

Guidelines:
- Types are lower snake case, e.g. person, organization, location, product, works_for, part_of, located_in.
- An entity may have several types.
- Use the same name for the same entity every time it appears.
- Relationship endpoints must be names of entities you also output.
- confidence is how certain the fact is; strength is how important the relationship is.

Example:
{"kind": "entity", "name": "Marie Curie", "types": ["person", "scientist"], "properties": {"field": "physics"}, "confidence": 0.95}
{"kind": "entity", "name": "University of Paris", "types": ["organization"], "properties": {}, "confidence": 0.9}
{"kind": "relationship", "source": "Marie Curie", "target": "University of Paris", "types": ["works_for"], "properties": {}, "confidence": 0.9, "strength": 0.8}"#;

const OUTPUT_FORMAT_REMINDER: &str =
    "Respond with JSON lines only. If the text contains no entities, respond with an empty line.";
