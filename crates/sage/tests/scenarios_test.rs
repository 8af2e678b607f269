//! End-to-end scenarios on hand-built graphs
//!
//! - Scenario A: direct pin mean with alpha = 0
//! - Scenario B: orthogonal embeddings score zero
//! - Scenario C: a perfect top-1 hit scores 1 on every metric
//! - Scenario D: users without resolvable ground truth are excluded

use ndarray::array;
use pinsage::{propagate, recommend, BoardEmbeddings, Evaluator, Graph, Interaction, Metric};

#[test]
fn scenario_a_alpha_zero_is_direct_mean() {
    let mut graph = Graph::new(2);
    graph.add_pin("pin_p1", array![1.0, 0.0]).unwrap();
    graph.add_pin("pin_p2", array![0.0, 1.0]).unwrap();
    graph.add_board("root", 0).unwrap();
    graph.add_contains("root", "pin_p1").unwrap();
    graph.add_contains("root", "pin_p2").unwrap();

    let embeddings = propagate(&graph, 0.0, 3).unwrap();
    assert_eq!(embeddings.get("root").unwrap(), &array![0.5, 0.5]);
}

#[test]
fn scenario_a_ignores_sub_boards() {
    let mut graph = Graph::new(2);
    graph.add_pin("pin_p1", array![1.0, 0.0]).unwrap();
    graph.add_pin("pin_p2", array![0.0, 1.0]).unwrap();
    graph.add_pin("pin_p3", array![7.0, 7.0]).unwrap();
    graph.add_board("root", 0).unwrap();
    graph.add_board("leaf", 1).unwrap();
    graph.add_contains("root", "pin_p1").unwrap();
    graph.add_contains("root", "pin_p2").unwrap();
    graph.add_contains("leaf", "pin_p3").unwrap();
    graph.add_parent("root", "leaf").unwrap();

    let embeddings = propagate(&graph, 0.0, 3).unwrap();
    assert_eq!(embeddings.get("root").unwrap(), &array![0.5, 0.5]);

    let embeddings = propagate(&graph, 1.0, 3).unwrap();
    assert_eq!(embeddings.get("root").unwrap(), &array![7.0, 7.0]);
}

#[test]
fn scenario_b_orthogonal_boards_score_zero() {
    let graph = {
        let mut graph = Graph::new(2);
        graph.add_board("query", 0).unwrap();
        graph.add_board("candidate", 0).unwrap();
        graph
    };

    let mut embeddings = BoardEmbeddings::new(2);
    embeddings.insert("query", array![1.0, 0.0]).unwrap();
    embeddings.insert("candidate", array![0.0, 1.0]).unwrap();

    let results = recommend(&embeddings, &graph, "query", 5, false).unwrap();
    assert_eq!(results, vec![("candidate".to_string(), 0.0)]);
}

/// Two boards with near-identical embeddings and one orthogonal board
fn evaluation_graph() -> Graph {
    let mut graph = Graph::new(2);
    graph.add_pin("pin_1", array![1.0, 0.0]).unwrap();
    graph.add_pin("pin_2", array![0.95, 0.05]).unwrap();
    graph.add_pin("pin_3", array![0.0, 1.0]).unwrap();
    for board in ["board_0_history", "board_0_truth", "board_0_other"] {
        graph.add_board(board, 0).unwrap();
    }
    graph.add_contains("board_0_history", "pin_1").unwrap();
    graph.add_contains("board_0_truth", "pin_2").unwrap();
    graph.add_contains("board_0_other", "pin_3").unwrap();
    graph
}

#[test]
fn scenario_c_perfect_top_one() {
    let graph = evaluation_graph();
    let embeddings = propagate(&graph, 0.6, 3).unwrap();

    let history = vec![Interaction::new("alice", "1", 5.0)];
    let held_out = vec![Interaction::new("alice", "2", 4.0)];

    let result =
        Evaluator::evaluate(&embeddings, &graph, &held_out, Some(history.as_slice()), &[1])
            .unwrap();

    assert_eq!(result.users_evaluated, 1);
    for metric in Metric::ALL {
        assert_eq!(result.get(metric, 1), Some(1.0), "{} should be 1", metric);
    }
}

#[test]
fn scenario_d_unresolvable_user_is_excluded() {
    let graph = evaluation_graph();
    let embeddings = propagate(&graph, 0.6, 3).unwrap();

    let history = vec![
        Interaction::new("alice", "1", 5.0),
        Interaction::new("bob", "1", 5.0),
    ];
    let alice_only = vec![Interaction::new("alice", "2", 4.0)];
    let with_bob = vec![
        Interaction::new("alice", "2", 4.0),
        Interaction::new("bob", "not-in-catalog", 4.0),
    ];

    let baseline =
        Evaluator::evaluate(&embeddings, &graph, &alice_only, Some(history.as_slice()), &[1, 2])
            .unwrap();
    let result =
        Evaluator::evaluate(&embeddings, &graph, &with_bob, Some(history.as_slice()), &[1, 2])
            .unwrap();

    assert_eq!(result.users_evaluated, 1);
    assert_eq!(result.users_skipped, 1);
    assert_eq!(result.metrics, baseline.metrics);
}
