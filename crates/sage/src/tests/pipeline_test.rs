//! Tests for the `HierarchicalSage` pipeline facade
//!
//! These tests verify:
//! - Operations fail with `NotReady` before their inputs exist
//! - Rebuilding the graph invalidates embeddings and clusters
//! - The full offline run produces a serializable report

#[cfg(test)]
mod tests {
    use crate::{Dataset, HierarchicalSage, Interaction, Metric, SageConfig, SageError};
    use std::io::Write;

    const BRANDS: [&str; 4] = ["Acme", "Globex", "Initech", "Umbrella"];
    const CATEGORIES: [&str; 3] = ["Kitchen", "Garden", "Office"];

    fn catalog_rows(n: usize) -> Vec<Vec<Option<String>>> {
        (0..n)
            .map(|i| {
                vec![
                    Some(format!("{}", 1000 + i)),
                    Some(format!("{}.5", (i * 37) % 200)),
                    Some(format!("{}", (i * 13) % 5)),
                    Some(BRANDS[i % BRANDS.len()].to_string()),
                    Some(CATEGORIES[(i / 7) % CATEGORIES.len()].to_string()),
                    Some(format!("durable product model{}", i % 6)),
                ]
            })
            .collect()
    }

    fn headers() -> Vec<String> {
        ["product_id", "Price", "Rating", "Brand", "Category", "Title"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn catalog(n: usize) -> Dataset {
        Dataset::from_records(headers(), catalog_rows(n)).unwrap()
    }

    fn small_config() -> SageConfig {
        SageConfig {
            embedding_dim: 6,
            k_values: vec![1, 3],
            n_folds: 3,
            simulation: crate::SimulationConfig {
                n_users: 12,
                ..crate::SimulationConfig::default()
            },
            ..SageConfig::default()
        }
    }

    #[test]
    fn test_operations_require_graph() {
        let mut sage = HierarchicalSage::new(small_config());

        assert!(matches!(
            sage.generate_embeddings(),
            Err(SageError::NotReady("graph"))
        ));
        assert!(matches!(
            sage.simulate_interactions(),
            Err(SageError::NotReady("graph"))
        ));
        assert!(matches!(
            sage.cross_validate(&[]),
            Err(SageError::NotReady("graph"))
        ));
        assert!(matches!(
            sage.recommend_similar_boards("board_0_category_0", 5, false),
            Err(SageError::NotReady(_))
        ));
        assert!(matches!(
            sage.cluster_boards(),
            Err(SageError::NotReady(_))
        ));
    }

    #[test]
    fn test_build_and_recommend() {
        let mut sage = HierarchicalSage::new(small_config());
        sage.build_graph(&catalog(60)).unwrap();
        let embeddings = sage.generate_embeddings().unwrap();
        assert!(embeddings.iter().all(|(_, v)| v.len() == 6));

        let query = sage.embeddings().unwrap().board_ids().next().unwrap().to_string();
        let results = sage.recommend_similar_boards(&query, 3, true).unwrap();

        assert!(results.len() <= 3);
        assert!(results.iter().all(|(id, _)| id != &query));
        let children = sage.graph().unwrap().sub_boards(&query);
        assert!(results.iter().all(|(id, _)| !children.contains(&id.as_str())));
    }

    #[test]
    fn test_rebuild_discards_embeddings() {
        let mut sage = HierarchicalSage::new(small_config());
        sage.build_graph(&catalog(30)).unwrap();
        sage.generate_embeddings().unwrap();
        sage.cluster_boards().unwrap();
        assert!(sage.clusters().is_some());

        sage.build_graph(&catalog(40)).unwrap();
        assert!(sage.embeddings().is_none());
        assert!(sage.clusters().is_none());
    }

    #[test]
    fn test_evaluate_generates_embeddings() {
        let mut sage = HierarchicalSage::new(small_config());
        sage.build_graph(&catalog(30)).unwrap();
        assert!(sage.embeddings().is_none());

        let held_out = vec![
            Interaction::new("u1", "1000", 4.0),
            Interaction::new("u1", "1003", 4.5),
        ];
        let result = sage.evaluate(&held_out, None).unwrap();

        assert!(sage.embeddings().is_some());
        assert_eq!(result.users_evaluated, 1);
        for metric in Metric::ALL {
            for k in [1, 3] {
                let value = result.get(metric, k).unwrap();
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn test_cluster_assignment_aligned_with_boards() {
        let mut sage = HierarchicalSage::new(small_config());
        sage.build_graph(&catalog(80)).unwrap();
        sage.generate_embeddings().unwrap();
        let assignment = sage.cluster_boards().unwrap().clone();

        let boards: Vec<String> = sage
            .embeddings()
            .unwrap()
            .board_ids()
            .map(str::to_string)
            .collect();
        assert_eq!(assignment.board_names, boards);
        assert_eq!(assignment.labels.len(), boards.len());
        assert!(assignment.labels.iter().all(|&l| l < assignment.optimal_k.max(1)));
        assert_eq!(
            assignment.k_candidates.len(),
            assignment.silhouette_scores.len()
        );
    }

    #[test]
    fn test_run_pipeline_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", headers().join(",")).unwrap();
        for row in catalog_rows(50) {
            let cells: Vec<String> = row.into_iter().map(|c| c.unwrap_or_default()).collect();
            writeln!(file, "{}", cells.join(",")).unwrap();
        }
        drop(file);

        let mut sage = HierarchicalSage::new(small_config());
        let report = sage.run_pipeline(&path, None, true).unwrap();

        assert_eq!(report.graph.pins, 50);
        assert_eq!(report.graph.max_level, 1);
        assert_eq!(report.cross_validation.folds.len(), 3);
        assert!(report.interactions > 0);
        assert!(report.sample_recommendations.is_some());
        assert_eq!(
            report.embeddings.as_ref().map(|e| e.len()),
            Some(report.graph.boards)
        );

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["cross_validation"]["metrics"]["hit_ratio"]["1"]["mean"].is_number());
        assert!(json["clusters"]["board_names"].is_array());
    }

    #[test]
    fn test_run_pipeline_missing_dataset() {
        let mut sage = HierarchicalSage::new(small_config());
        let result = sage.run_pipeline("/no/such/catalog.csv", None, false);
        assert!(matches!(result, Err(SageError::NotFound { .. })));
    }
}
