//! Scenario tests for the KnowledgeExtractor

#[cfg(test)]
mod tests {
    use crate::{
        ExtractionConfig, ExtractionResult, ExtractorError, KnowledgeExtractor, ProcessingStrategy,
        ProgressFn, METHOD_TRANSITIVE,
    };
    use distill_llm::MockOracle;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const ALICE: &str = "Alice works at Acme Corp.";
    const ACME: &str = "Acme Corp is part of Globex Group.";
    const BOB: &str = "Bob also works at Acme Corp.";

    fn entity(name: &str, label: &str, confidence: f64) -> String {
        json!({"kind": "entity", "name": name, "types": [label], "confidence": confidence}).to_string()
    }

    fn relationship(source: &str, target: &str, label: &str, confidence: f64) -> String {
        json!({
            "kind": "relationship",
            "source": source,
            "target": target,
            "types": [label],
            "confidence": confidence,
            "strength": 0.8
        })
        .to_string()
    }

    fn lines(records: &[String]) -> String {
        records.join("\n")
    }

    /// Oracle scripted for the Alice / Acme / Globex / Bob document
    fn company_oracle() -> MockOracle {
        let oracle = MockOracle::default();
        oracle.add_response(
            ALICE,
            lines(&[
                entity("Alice", "person", 0.9),
                entity("Acme Corp", "organization", 0.9),
                relationship("Alice", "Acme Corp", "works_for", 0.9),
            ]),
        );
        oracle.add_response(
            ACME,
            lines(&[
                entity("Acme Corp", "organization", 0.9),
                entity("Globex Group", "organization", 0.9),
                relationship("Acme Corp", "Globex Group", "part_of", 0.9),
            ]),
        );
        oracle.add_response(
            BOB,
            lines(&[
                entity("Bob", "person", 0.9),
                entity("Acme Corp", "organization", 0.9),
                relationship("Bob", "Acme Corp", "works_for", 0.9),
            ]),
        );
        oracle
    }

    fn company_chunks() -> Vec<String> {
        vec![ALICE.to_string(), ACME.to_string(), BOB.to_string()]
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig {
            relation_confidence_threshold: 0.4,
            retry_backoff_ms: 1,
            max_retry_backoff_ms: 2,
            ..ExtractionConfig::default()
        }
    }

    fn entity_names(result: &ExtractionResult) -> BTreeSet<String> {
        result.entities.iter().map(|e| e.name.clone()).collect()
    }

    /// Order-insensitive view of a result, ignoring ids and timestamps
    fn projection(result: &ExtractionResult) -> (Vec<(String, Vec<String>, u64)>, Vec<(String, String, Vec<String>, u64)>) {
        let entities = result
            .entities
            .iter()
            .map(|e| (e.name.clone(), e.types.iter().cloned().collect(), (e.confidence * 1e6) as u64))
            .collect();
        let relationships = result
            .relationships
            .iter()
            .map(|r| (r.source.clone(), r.target.clone(), r.types.clone(), (r.confidence * 1e6) as u64))
            .collect();
        (entities, relationships)
    }

    #[tokio::test]
    async fn test_incremental_company_document() {
        let oracle = company_oracle();
        let handle = oracle.clone();
        let extractor = KnowledgeExtractor::new(oracle, config()).unwrap();

        let progress_log = Arc::new(Mutex::new(Vec::new()));
        let log = progress_log.clone();
        let progress: &ProgressFn = &move |done, total, entities, relationships| {
            log.lock().unwrap().push((done, total, entities, relationships));
        };

        let result = extractor.extract_chunks(company_chunks(), Some(progress)).await.unwrap();

        let expected: BTreeSet<String> = ["Acme Corp", "Alice", "Bob", "Globex Group"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(entity_names(&result), expected);

        let works_for = result.relationships_between("Alice", "Acme Corp");
        assert!(works_for.iter().any(|r| r.has_type("works_for")));
        assert!(works_for.iter().any(|r| r.has_type("associated_with")));

        let inferred = result.relationships_between("Alice", "Globex Group");
        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].primary_type(), Some("indirectly_works_for"));
        assert!((inferred[0].confidence - 0.486).abs() < 1e-9);
        assert_eq!(inferred[0].properties["intermediate_entity"], json!("Acme Corp"));
        assert_eq!(result.relationships_between("Bob", "Globex Group").len(), 1);

        assert_eq!(result.entity_merge_stats.original_entities, 6);
        assert_eq!(result.entity_merge_stats.merged_entities, 4);
        assert_eq!(result.entity_merge_stats.entities_saved, 2);

        assert_eq!(result.statistics.total_chunks, 3);
        assert_eq!(result.statistics.processed_chunks, 3);
        assert_eq!(result.statistics.success_rate, 1.0);
        assert_eq!(result.statistics.final_entities, 4);
        assert_eq!(handle.call_count(), 3);

        let log = progress_log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2], (3, 3, 4, 3));
    }

    #[tokio::test]
    async fn test_later_prompts_carry_context() {
        let oracle = company_oracle();
        let handle = oracle.clone();
        let extractor = KnowledgeExtractor::new(oracle, config()).unwrap();

        extractor.extract_chunks(company_chunks(), None).await.unwrap();

        let prompts = handle.prompts();
        assert!(!prompts[0].contains("## Context from earlier text"));
        assert!(prompts[1].contains("## Context from earlier text"));
        assert!(prompts[1].contains("**Alice**"));
        assert!(prompts[2].contains("**Globex Group**"));
    }

    #[tokio::test]
    async fn test_parallel_result_does_not_depend_on_completion_order() {
        let mut parallel = config();
        parallel.strategy = ProcessingStrategy::Parallel;

        let in_order = KnowledgeExtractor::new(company_oracle(), parallel.clone())
            .unwrap()
            .extract_chunks(company_chunks(), None)
            .await
            .unwrap();

        // First unit finishes last
        let reversed_oracle = company_oracle();
        reversed_oracle.set_delay(ALICE, Duration::from_millis(80));
        reversed_oracle.set_delay(ACME, Duration::from_millis(40));
        let reversed = KnowledgeExtractor::new(reversed_oracle, parallel)
            .unwrap()
            .extract_chunks(company_chunks(), None)
            .await
            .unwrap();

        assert_eq!(projection(&in_order), projection(&reversed));
        let order: Vec<usize> = reversed.chunk_results.iter().map(|r| r.chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_parallel_prompts_have_no_context() {
        let mut parallel = config();
        parallel.strategy = ProcessingStrategy::Parallel;
        let oracle = company_oracle();
        let handle = oracle.clone();

        KnowledgeExtractor::new(oracle, parallel)
            .unwrap()
            .extract_chunks(company_chunks(), None)
            .await
            .unwrap();

        assert!(handle
            .prompts()
            .iter()
            .all(|p| !p.contains("## Context from earlier text")));
    }

    #[tokio::test]
    async fn test_sliding_window_makes_one_call_per_group() {
        let mut sliding = config();
        sliding.strategy = ProcessingStrategy::SlidingWindow;
        let oracle = MockOracle::new(lines(&[
            entity("Alice", "person", 0.9),
            entity("Acme Corp", "organization", 0.9),
        ]));
        let handle = oracle.clone();

        let result = KnowledgeExtractor::new(oracle, sliding)
            .unwrap()
            .extract_chunks(company_chunks(), None)
            .await
            .unwrap();

        assert_eq!(handle.call_count(), 1);
        assert_eq!(result.chunk_results.len(), 1);
        assert_eq!(result.chunk_results[0].chunk_indices, vec![0, 1, 2]);
        assert_eq!(result.statistics.processed_chunks, 3);
        assert!(handle.prompts()[0].contains(ALICE) && handle.prompts()[0].contains(BOB));
    }

    #[tokio::test]
    async fn test_empty_input_returns_empty_result() {
        let oracle = MockOracle::default();
        let handle = oracle.clone();
        let extractor = KnowledgeExtractor::new(oracle, config()).unwrap();

        let result = extractor.extract_full("", None).await.unwrap();
        assert!(result.entities.is_empty());
        assert!(result.relationships.is_empty());
        assert_eq!(result.statistics.total_chunks, 0);

        let result = extractor.extract_full("   \n\t", None).await.unwrap();
        assert_eq!(result.statistics.total_chunks, 0);
        assert_eq!(handle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_extract_full_single_chunk() {
        let oracle = company_oracle();
        let extractor = KnowledgeExtractor::new(oracle, config()).unwrap();

        let result = extractor.extract_full(ALICE, None).await.unwrap();
        assert_eq!(result.statistics.total_chunks, 1);
        assert!(result.entity("Alice").is_some());
        assert!(result.entity("Acme Corp").is_some());
    }

    #[tokio::test]
    async fn test_confidence_filtering_is_exact() {
        let oracle = MockOracle::new(lines(&[
            entity("Alice", "person", 0.3),
            entity("Ghost", "person", 0.29),
            entity("Acme Corp", "organization", 0.9),
            relationship("Alice", "Acme Corp", "works_for", 0.4),
            relationship("Ghost", "Acme Corp", "works_for", 0.9),
            relationship("Acme Corp", "Alice", "employs", 0.39),
        ]));
        let mut cfg = config();
        cfg.enable_cross_chunk_relations = false;

        let result = KnowledgeExtractor::new(oracle, cfg)
            .unwrap()
            .extract_chunks(vec!["text".to_string()], None)
            .await
            .unwrap();

        assert!(result.entity("Alice").is_some());
        assert!(result.entity("Ghost").is_none());
        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.relationships[0].source, "Alice");
    }

    #[tokio::test]
    async fn test_relationships_with_unknown_endpoints_are_dropped() {
        let oracle = MockOracle::new(lines(&[
            entity("Alice", "person", 0.9),
            relationship("Alice", "Nobody", "knows", 0.9),
            relationship("Alice", "alice", "knows", 0.9),
        ]));

        let result = KnowledgeExtractor::new(oracle, config())
            .unwrap()
            .extract_chunks(vec!["text".to_string()], None)
            .await
            .unwrap();

        assert_eq!(result.entities.len(), 1);
        assert!(result.relationships.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_relationships_are_folded() {
        let oracle = MockOracle::new(lines(&[
            entity("Alice", "person", 0.9),
            entity("Acme Corp", "organization", 0.9),
            relationship("Alice", "Acme Corp", "works_for", 0.6),
            relationship("Alice", "Acme Corp", "works_for", 0.8),
        ]));
        let mut cfg = config();
        cfg.enable_cross_chunk_relations = false;

        let result = KnowledgeExtractor::new(oracle, cfg)
            .unwrap()
            .extract_chunks(vec!["text".to_string()], None)
            .await
            .unwrap();

        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.relationships[0].confidence, 0.8);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let oracle = MockOracle::default();
        oracle.add_transient_error(ALICE, 2, entity("Alice", "person", 0.9));
        let handle = oracle.clone();

        let result = KnowledgeExtractor::new(oracle, config())
            .unwrap()
            .extract_chunks(vec![ALICE.to_string()], None)
            .await
            .unwrap();

        assert!(result.entity("Alice").is_some());
        assert_eq!(result.chunk_results[0].attempts, 3);
        assert_eq!(result.statistics.retries, 2);
        assert_eq!(handle.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_unit_contributes_nothing() {
        let oracle = MockOracle::default();
        oracle.add_response(ALICE, entity("Alice", "person", 0.9));
        oracle.add_error(ACME);
        oracle.add_response(BOB, entity("Bob", "person", 0.9));
        let mut cfg = config();
        cfg.max_retries = 1;

        let failures = Arc::new(Mutex::new(Vec::new()));
        let seen = failures.clone();
        let extractor = KnowledgeExtractor::new(oracle, cfg)
            .unwrap()
            .with_error_callback(move |_, index| seen.lock().unwrap().push(index));

        let result = extractor.extract_chunks(company_chunks(), None).await.unwrap();

        assert_eq!(entity_names(&result).len(), 2);
        assert_eq!(result.statistics.failed_units, 1);
        assert_eq!(result.statistics.processed_chunks, 2);
        assert!((result.statistics.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!(result.chunk_results[1].error.is_some());
        assert_eq!(result.chunk_results[1].attempts, 2);
        assert_eq!(*failures.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_failing_unit_aborts_when_configured() {
        let oracle = MockOracle::default();
        oracle.add_response(ALICE, entity("Alice", "person", 0.9));
        oracle.add_error(ACME);
        oracle.add_response(BOB, entity("Bob", "person", 0.9));
        let mut cfg = config();
        cfg.max_retries = 0;
        cfg.continue_on_chunk_error = false;

        for strategy in [ProcessingStrategy::Incremental, ProcessingStrategy::Parallel] {
            cfg.strategy = strategy;
            let extractor = KnowledgeExtractor::new(oracle.clone(), cfg.clone()).unwrap();
            match extractor.extract_chunks(company_chunks(), None).await {
                Err(ExtractorError::ChunkFailed { chunk_index, source }) => {
                    assert_eq!(chunk_index, 1);
                    assert!(matches!(*source, ExtractorError::Oracle(_)));
                }
                other => panic!("expected ChunkFailed, got {:?}", other.map(|r| r.entities.len())),
            }
        }
    }

    #[tokio::test]
    async fn test_unparseable_response_is_not_retried() {
        let oracle = MockOracle::new("I could not find anything useful here.");
        let handle = oracle.clone();

        let result = KnowledgeExtractor::new(oracle, config())
            .unwrap()
            .extract_chunks(vec!["text".to_string()], None)
            .await
            .unwrap();

        assert_eq!(handle.call_count(), 1);
        assert_eq!(result.statistics.failed_units, 1);
        assert!(result.chunk_results[0]
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Invalid record format")));
    }

    #[tokio::test]
    async fn test_oracle_call_times_out() {
        let oracle = MockOracle::default();
        oracle.add_response(ALICE, entity("Alice", "person", 0.9));
        oracle.set_delay(ALICE, Duration::from_secs(5));
        let mut cfg = config();
        cfg.chunk_timeout_secs = 1;
        cfg.max_retries = 0;

        let result = KnowledgeExtractor::new(oracle, cfg)
            .unwrap()
            .extract_chunks(vec![ALICE.to_string()], None)
            .await
            .unwrap();

        assert_eq!(
            result.chunk_results[0].error.as_deref(),
            Some("Oracle call timed out after 1s")
        );
        assert!(result.entities.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let extractor = KnowledgeExtractor::new(company_oracle(), config())
            .unwrap()
            .with_cancellation(token);

        let outcome = extractor.extract_chunks(company_chunks(), None).await;
        assert!(matches!(outcome, Err(ExtractorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_in_flight_call() {
        let oracle = company_oracle();
        oracle.set_delay(ALICE, Duration::from_secs(30));

        for strategy in [ProcessingStrategy::Incremental, ProcessingStrategy::Parallel] {
            let token = CancellationToken::new();
            let mut cfg = config();
            cfg.strategy = strategy;
            let extractor = KnowledgeExtractor::new(oracle.clone(), cfg)
                .unwrap()
                .with_cancellation(token.clone());

            let canceller = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                canceller.cancel();
            });

            let outcome = tokio::time::timeout(
                Duration::from_secs(5),
                extractor.extract_chunks(company_chunks(), None),
            )
            .await
            .expect("cancellation should end the run promptly");
            assert!(matches!(outcome, Err(ExtractorError::Cancelled)));
        }
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_is_not_a_unit_failure() {
        for (strategy, continue_on_chunk_error) in [
            (ProcessingStrategy::Incremental, false),
            (ProcessingStrategy::Incremental, true),
            (ProcessingStrategy::Parallel, false),
        ] {
            let oracle = MockOracle::default();
            oracle.add_error(ALICE);
            let mut cfg = config();
            cfg.strategy = strategy;
            cfg.max_retries = 3;
            cfg.retry_backoff_ms = 10_000;
            cfg.max_retry_backoff_ms = 10_000;
            cfg.continue_on_chunk_error = continue_on_chunk_error;

            let failures = Arc::new(Mutex::new(Vec::new()));
            let seen = failures.clone();
            let token = CancellationToken::new();
            let extractor = KnowledgeExtractor::new(oracle, cfg)
                .unwrap()
                .with_cancellation(token.clone())
                .with_error_callback(move |_, index| seen.lock().unwrap().push(index));

            let canceller = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                canceller.cancel();
            });

            let outcome = tokio::time::timeout(
                Duration::from_secs(5),
                extractor.extract_chunks(company_chunks(), None),
            )
            .await
            .expect("cancellation should cut the backoff short");

            assert!(
                matches!(outcome, Err(ExtractorError::Cancelled)),
                "{:?} (continue: {})",
                strategy,
                continue_on_chunk_error
            );
            assert!(failures.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_distinct_entities_keep_their_relationships() {
        let oracle = MockOracle::new(lines(&[
            entity("Alice", "person", 0.9),
            entity("Globex", "organization", 0.9),
            entity("Paris", "location", 0.9),
            relationship("Alice", "Globex", "works_for", 0.9),
            relationship("Globex", "Paris", "located_in", 0.9),
        ]));

        let result = KnowledgeExtractor::new(oracle, ExtractionConfig::default())
            .unwrap()
            .extract_chunks(vec!["text".to_string()], None)
            .await
            .unwrap();

        assert_eq!(result.entities.len(), 3);
        assert!(result
            .relationships_between("Alice", "Globex")
            .iter()
            .any(|r| r.has_type("works_for")));
        assert!(result
            .relationships_between("Globex", "Paris")
            .iter()
            .any(|r| r.has_type("located_in")));
    }

    #[tokio::test]
    async fn test_default_threshold_limits_transitive_inference() {
        let defaults = ExtractionConfig::default();

        // 0.6 * 0.9 * 0.9 stays under the default threshold
        let result = KnowledgeExtractor::new(company_oracle(), defaults.clone())
            .unwrap()
            .extract_chunks(company_chunks(), None)
            .await
            .unwrap();
        assert!(result.relationships_between("Alice", "Globex Group").is_empty());
        assert!(result
            .relationships_between("Alice", "Acme Corp")
            .iter()
            .any(|r| r.has_type("associated_with")));
        assert!(!result
            .relationship_discovery_stats
            .discovery_methods
            .contains_key(METHOD_TRANSITIVE));

        // part_of chains carry a higher base confidence and clear it
        let oracle = MockOracle::new(lines(&[
            entity("Lab One", "organization", 0.95),
            entity("Research Division", "organization", 0.95),
            entity("Globex Group", "organization", 0.95),
            relationship("Lab One", "Research Division", "part_of", 0.95),
            relationship("Research Division", "Globex Group", "part_of", 0.95),
        ]));
        let result = KnowledgeExtractor::new(oracle, defaults)
            .unwrap()
            .extract_chunks(vec!["text".to_string()], None)
            .await
            .unwrap();
        let inferred: Vec<_> = result
            .relationships_between("Lab One", "Globex Group")
            .into_iter()
            .filter(|r| r.primary_type() == Some("part_of"))
            .collect();
        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].properties["discovery_method"], json!(METHOD_TRANSITIVE));
        assert!((inferred[0].confidence - 0.7 * 0.95 * 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_context_statistics_are_reported() {
        let result = KnowledgeExtractor::new(company_oracle(), config())
            .unwrap()
            .extract_chunks(company_chunks(), None)
            .await
            .unwrap();

        let stats = &result.context_statistics;
        assert_eq!(stats.chunks_processed, 3);
        assert_eq!(stats.total_entities, 4);
        assert_eq!(stats.most_mentioned_entities[0], ("Acme Corp".to_string(), 3));
        assert!((stats.average_entities_per_chunk - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_result_serializes_to_json() {
        let result = KnowledgeExtractor::new(company_oracle(), config())
            .unwrap()
            .extract_chunks(company_chunks(), None)
            .await
            .unwrap();

        let value = serde_json::to_value(&result).unwrap();
        for key in [
            "entities",
            "relationships",
            "statistics",
            "config",
            "entity_merge_stats",
            "relationship_discovery_stats",
            "context_statistics",
            "chunk_results",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["entity_merge_stats"]["entities_saved"], 2);
    }
}

#[cfg(test)]
mod proptests {
    use crate::{ExtractionConfig, KnowledgeExtractor, ProcessingStrategy};
    use distill_llm::MockOracle;
    use proptest::prelude::*;
    use serde_json::json;

    /// Names far enough apart that the merger keeps them separate
    const NAMES: [&str; 6] = ["Alice", "Globex", "Paris", "Quantum", "Rivera", "Tokyo"];

    fn response(entities: &[(usize, f64)], relationships: &[(usize, usize, f64)]) -> String {
        let mut lines: Vec<String> = entities
            .iter()
            .map(|(id, confidence)| {
                json!({"kind": "entity", "name": NAMES[*id], "types": ["concept"], "confidence": confidence})
                    .to_string()
            })
            .collect();
        lines.extend(relationships.iter().map(|(s, t, confidence)| {
            json!({
                "kind": "relationship",
                "source": NAMES[*s],
                "target": NAMES[*t],
                "types": ["related_to"],
                "confidence": confidence
            })
            .to_string()
        }));
        lines.join("\n")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_output_respects_confidence_floors(
            entities in prop::collection::vec((0usize..6, 0.0f64..=1.0), 1..8),
            relationships in prop::collection::vec((0usize..6, 0usize..6, 0.0f64..=1.0), 0..8),
            min_entity in 0.0f64..=1.0,
            min_relationship in 0.0f64..=1.0,
            parallel in any::<bool>(),
        ) {
            let config = ExtractionConfig {
                min_entity_confidence: min_entity,
                min_relationship_confidence: min_relationship,
                strategy: if parallel { ProcessingStrategy::Parallel } else { ProcessingStrategy::Incremental },
                ..ExtractionConfig::default()
            };
            let oracle = MockOracle::new(response(&entities, &relationships));
            let extractor = KnowledgeExtractor::new(oracle, config).unwrap();

            let result = tokio_test::block_on(
                extractor.extract_chunks(vec!["one".to_string(), "two".to_string()], None),
            )
            .unwrap();

            let names: std::collections::BTreeSet<&str> =
                result.entities.iter().map(|e| e.name.as_str()).collect();
            for entity in &result.entities {
                prop_assert!(entity.confidence >= min_entity && entity.confidence <= 1.0);
            }
            for relationship in &result.relationships {
                prop_assert!(relationship.confidence >= min_relationship && relationship.confidence <= 1.0);
                prop_assert!((0.0..=1.0).contains(&relationship.strength));
                prop_assert!(names.contains(relationship.source.as_str()));
                prop_assert!(names.contains(relationship.target.as_str()));
                prop_assert_ne!(&relationship.source, &relationship.target);
            }

            // Every stated relationship between two surviving entities is kept
            for (s, t, confidence) in &relationships {
                let (source, target) = (NAMES[*s], NAMES[*t]);
                if s != t
                    && *confidence >= min_relationship
                    && names.contains(source)
                    && names.contains(target)
                {
                    prop_assert!(result
                        .relationships_between(source, target)
                        .iter()
                        .any(|r| r.has_type("related_to")));
                }
            }

            let merge = &result.entity_merge_stats;
            prop_assert_eq!(merge.original_entities - merge.entities_saved, merge.merged_entities);
        }
    }
}
