//! Board-to-board recommendation by cosine similarity

use crate::error::{Result, SageError};
use crate::graph::Graph;
use crate::propagation::BoardEmbeddings;
use ndarray::Array1;
use std::collections::HashSet;
use tracing::{debug, warn};

/// A recommended board and its similarity to the query
pub type ScoredBoard = (String, f32);

pub fn norm(v: &Array1<f32>) -> f32 {
    v.dot(v).sqrt()
}

/// Cosine similarity; 0 when either vector has zero norm or lengths differ
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        a.dot(b) / (norm_a * norm_b)
    }
}

/// Rank boards by similarity to `query_board`
///
/// The query itself and boards with zero-norm embeddings are never returned.
/// With `exclude_children`, direct sub-boards of the query are skipped too.
/// Ties keep embedding iteration order.
///
/// # Errors
///
/// `BoardNotFound` if the query has no embedding.
pub fn recommend(
    embeddings: &BoardEmbeddings,
    graph: &Graph,
    query_board: &str,
    top_k: usize,
    exclude_children: bool,
) -> Result<Vec<ScoredBoard>> {
    let query = embeddings
        .get(query_board)
        .ok_or_else(|| SageError::BoardNotFound(query_board.to_string()))?;

    let query_norm = norm(query);
    if query_norm == 0.0 {
        warn!(board = query_board, "Query board has a zero embedding, no recommendations");
        return Ok(Vec::new());
    }

    let children: HashSet<&str> = if exclude_children {
        graph.sub_boards(query_board).into_iter().collect()
    } else {
        HashSet::new()
    };

    let mut scored: Vec<ScoredBoard> = embeddings
        .iter()
        .filter(|(id, _)| *id != query_board && !children.contains(id))
        .filter_map(|(id, vector)| {
            let candidate_norm = norm(vector);
            if candidate_norm == 0.0 {
                return None;
            }
            Some((id.to_string(), query.dot(vector) / (query_norm * candidate_norm)))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    debug!(board = query_board, results = scored.len(), "Recommended boards");
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn setup() -> (BoardEmbeddings, Graph) {
        let mut graph = Graph::new(2);
        for id in ["query", "child", "near", "far", "zero"] {
            graph.add_board(id, 0).unwrap();
        }
        graph.add_parent("query", "child").unwrap();

        let mut embeddings = BoardEmbeddings::new(2);
        embeddings.insert("query", array![1.0, 0.0]).unwrap();
        embeddings.insert("child", array![1.0, 0.1]).unwrap();
        embeddings.insert("near", array![1.0, 0.5]).unwrap();
        embeddings.insert("far", array![0.0, 1.0]).unwrap();
        embeddings.insert("zero", array![0.0, 0.0]).unwrap();
        (embeddings, graph)
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&array![1.0, 0.0], &array![0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&array![2.0, 0.0], &array![1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&array![0.0, 0.0], &array![1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&array![1.0], &array![1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_recommend_orders_and_skips() {
        let (embeddings, graph) = setup();
        let results = recommend(&embeddings, &graph, "query", 10, false).unwrap();

        let ids: Vec<_> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["child", "near", "far"]);
        assert_eq!(results[2].1, 0.0);
    }

    #[test]
    fn test_recommend_excludes_children() {
        let (embeddings, graph) = setup();
        let results = recommend(&embeddings, &graph, "query", 10, true).unwrap();
        assert!(results.iter().all(|(id, _)| id != "child"));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_recommend_truncates() {
        let (embeddings, graph) = setup();
        let results = recommend(&embeddings, &graph, "query", 1, false).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "child");
    }

    #[test]
    fn test_recommend_unknown_board() {
        let (embeddings, graph) = setup();
        let result = recommend(&embeddings, &graph, "nope", 5, false);
        assert!(matches!(result, Err(SageError::BoardNotFound(id)) if id == "nope"));
    }

    #[test]
    fn test_zero_query_returns_empty() {
        let (embeddings, graph) = setup();
        assert!(recommend(&embeddings, &graph, "zero", 5, false)
            .unwrap()
            .is_empty());
    }
}
