//! Offline ranking evaluation and k-fold cross-validation
//!
//! Each user's history pins map to the boards that contain them; those boards
//! are used as queries, their recommendations merged, and the merged ranking is
//! scored against the boards containing the user's held-out pins.

use crate::error::{Result, SageError};
use crate::graph::Graph;
use crate::propagation::{propagate, BoardEmbeddings};
use crate::recommend::{recommend, ScoredBoard};
use crate::types::{Interaction, Metric, MetricSummary};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// |top-k ∩ relevant| / |relevant|
pub fn hit_ratio_at_k(ranked: &[&str], relevant: &HashSet<&str>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    hits_at_k(ranked, relevant, k) as f64 / relevant.len() as f64
}

/// |top-k ∩ relevant| / k
pub fn accuracy_at_k(ranked: &[&str], relevant: &HashSet<&str>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits_at_k(ranked, relevant, k) as f64 / k as f64
}

/// Reciprocal rank of the first relevant entry within the top k
pub fn mrr_at_k(ranked: &[&str], relevant: &HashSet<&str>, k: usize) -> f64 {
    ranked
        .iter()
        .take(k)
        .position(|board| relevant.contains(board))
        .map_or(0.0, |rank| 1.0 / (rank + 1) as f64)
}

/// Binary-relevance NDCG over the top k
pub fn ndcg_at_k(ranked: &[&str], relevant: &HashSet<&str>, k: usize) -> f64 {
    let dcg: f64 = ranked
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, board)| relevant.contains(*board))
        .map(|(rank, _)| 1.0 / ((rank + 2) as f64).log2())
        .sum();

    let idcg: f64 = (0..relevant.len().min(k))
        .map(|rank| 1.0 / ((rank + 2) as f64).log2())
        .sum();

    if idcg > 0.0 {
        dcg / idcg
    } else {
        0.0
    }
}

fn hits_at_k(ranked: &[&str], relevant: &HashSet<&str>, k: usize) -> usize {
    ranked
        .iter()
        .take(k)
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|board| relevant.contains(*board))
        .count()
}

fn validate_k_values(k_values: &[usize]) -> Result<()> {
    if k_values.is_empty() {
        return Err(SageError::invalid("k_values", "at least one cutoff is required"));
    }
    if k_values.contains(&0) {
        return Err(SageError::invalid("k_values", "cutoffs must be at least 1"));
    }
    Ok(())
}

/// Mean metric values per cutoff
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub metrics: BTreeMap<Metric, BTreeMap<usize, f64>>,
    pub users_evaluated: usize,
    pub users_skipped: usize,
}

impl EvaluationResult {
    pub fn get(&self, metric: Metric, k: usize) -> Option<f64> {
        self.metrics.get(&metric)?.get(&k).copied()
    }
}

/// Per-user ranking evaluation
pub struct Evaluator;

impl Evaluator {
    /// Score recommendations for every user in `held_out`
    ///
    /// `history` supplies the pins used to pick query boards. When absent,
    /// each user's held-out pins serve as their own history.
    pub fn evaluate(
        embeddings: &BoardEmbeddings,
        graph: &Graph,
        held_out: &[Interaction],
        history: Option<&[Interaction]>,
        k_values: &[usize],
    ) -> Result<EvaluationResult> {
        validate_k_values(k_values)?;
        let max_k = k_values.iter().copied().max().unwrap_or(1);

        info!(
            interactions = held_out.len(),
            k_values = ?k_values,
            "Evaluating recommendation performance"
        );

        let held_out_by_user = group_by_user(held_out);
        let history_by_user: Option<HashMap<&str, Vec<&str>>> =
            history.map(|records| group_by_user(records).into_iter().collect());

        let mut samples: BTreeMap<Metric, BTreeMap<usize, Vec<f64>>> = Metric::ALL
            .iter()
            .map(|&metric| (metric, k_values.iter().map(|&k| (k, Vec::new())).collect()))
            .collect();
        let mut users_evaluated = 0;
        let mut users_skipped = 0;

        for (user, test_pins) in &held_out_by_user {
            let history_pins = match &history_by_user {
                Some(by_user) => by_user.get(user).map(Vec::as_slice).unwrap_or(&[]),
                None => test_pins.as_slice(),
            };

            let user_boards = boards_for_pins(graph, history_pins);
            let truth: HashSet<&str> = boards_for_pins(graph, test_pins).into_iter().collect();
            if user_boards.is_empty() || truth.is_empty() {
                debug!(user = %user, "Skipping user without resolvable boards");
                users_skipped += 1;
                continue;
            }

            let ranking = merged_ranking(embeddings, graph, &user_boards, max_k)?;
            let ranked: Vec<&str> = ranking.iter().map(|(board, _)| board.as_str()).collect();

            for &k in k_values {
                let values = [
                    (Metric::Accuracy, accuracy_at_k(&ranked, &truth, k)),
                    (Metric::HitRatio, hit_ratio_at_k(&ranked, &truth, k)),
                    (Metric::Mrr, mrr_at_k(&ranked, &truth, k)),
                    (Metric::Ndcg, ndcg_at_k(&ranked, &truth, k)),
                ];
                for (metric, value) in values {
                    if let Some(per_k) = samples.get_mut(&metric).and_then(|m| m.get_mut(&k)) {
                        per_k.push(value);
                    }
                }
            }
            users_evaluated += 1;
        }

        let metrics = samples
            .into_iter()
            .map(|(metric, per_k)| {
                let means = per_k
                    .into_iter()
                    .map(|(k, values)| (k, MetricSummary::from_samples(&values).mean))
                    .collect();
                (metric, means)
            })
            .collect();

        info!(users_evaluated, users_skipped, "Evaluation finished");
        Ok(EvaluationResult {
            metrics,
            users_evaluated,
            users_skipped,
        })
    }
}

/// Users in first-appearance order with their pin ids
fn group_by_user(interactions: &[Interaction]) -> Vec<(&str, Vec<&str>)> {
    let mut order: Vec<(&str, Vec<&str>)> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    for interaction in interactions {
        let pos = *position
            .entry(interaction.user_id.as_str())
            .or_insert_with(|| {
                order.push((interaction.user_id.as_str(), Vec::new()));
                order.len() - 1
            });
        order[pos].1.push(interaction.pin_id.as_str());
    }
    order
}

/// Distinct boards containing any of `pins`, in discovery order
fn boards_for_pins<'g>(graph: &'g Graph, pins: &[&str]) -> Vec<&'g str> {
    let mut seen = HashSet::new();
    let mut boards = Vec::new();
    for pin in pins {
        let Some(pin_id) = graph.resolve_pin(pin) else {
            continue;
        };
        for board in graph.boards_containing(pin_id) {
            if seen.insert(board) {
                boards.push(board);
            }
        }
    }
    boards
}

/// Union of per-board recommendations, keeping each board's best score
fn merged_ranking(
    embeddings: &BoardEmbeddings,
    graph: &Graph,
    query_boards: &[&str],
    top_k: usize,
) -> Result<Vec<ScoredBoard>> {
    let mut merged: Vec<ScoredBoard> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for &board in query_boards {
        if !embeddings.contains(board) {
            continue;
        }
        for (candidate, score) in recommend(embeddings, graph, board, top_k, false)? {
            match position.get(&candidate) {
                Some(&pos) => {
                    if score > merged[pos].1 {
                        merged[pos].1 = score;
                    }
                }
                None => {
                    position.insert(candidate.clone(), merged.len());
                    merged.push((candidate, score));
                }
            }
        }
    }

    merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Ok(merged)
}

/// One train/test partition of interaction indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffled k-fold split of `0..n`
///
/// The first `n % n_folds` folds get one extra test index. Train indices keep
/// ascending order.
pub fn kfold_split(n: usize, n_folds: usize, seed: u64) -> Result<Vec<Fold>> {
    if n_folds < 2 {
        return Err(SageError::invalid("n_folds", "must be at least 2"));
    }
    if n_folds > n {
        return Err(SageError::invalid(
            "n_folds",
            format!("cannot split {} interactions into {} folds", n, n_folds),
        ));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let fold_size = n / n_folds;
    let remainder = n % n_folds;

    let mut folds = Vec::with_capacity(n_folds);
    let mut start = 0;
    for fold in 0..n_folds {
        let size = fold_size + usize::from(fold < remainder);
        let test = indices[start..start + size].to_vec();
        let in_test: HashSet<usize> = test.iter().copied().collect();
        let train = (0..n).filter(|idx| !in_test.contains(idx)).collect();
        folds.push(Fold { train, test });
        start += size;
    }

    Ok(folds)
}

/// Mean and spread of every metric across folds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidationReport {
    pub n_folds: usize,
    pub rebuild_per_fold: bool,
    pub metrics: BTreeMap<Metric, BTreeMap<usize, MetricSummary>>,
    pub folds: Vec<EvaluationResult>,
}

impl CrossValidationReport {
    pub fn get(&self, metric: Metric, k: usize) -> Option<MetricSummary> {
        self.metrics.get(&metric)?.get(&k).copied()
    }
}

/// K-fold cross-validation over interaction records
#[derive(Debug, Clone)]
pub struct CrossValidator {
    pub n_folds: usize,
    pub seed: u64,
    pub alpha: f32,
    pub max_depth: usize,
    /// Propagate over a graph restricted to each fold's training pins
    pub rebuild_per_fold: bool,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self {
            n_folds: 5,
            seed: 42,
            alpha: 0.6,
            max_depth: 3,
            rebuild_per_fold: false,
        }
    }
}

impl CrossValidator {
    /// Embeddings of a graph that only keeps `contains` edges to training pins
    ///
    /// Boards whose pins all fall outside `train` end up with zero
    /// embeddings and so never appear as candidates.
    pub fn fold_embeddings(&self, graph: &Graph, train: &[Interaction]) -> Result<BoardEmbeddings> {
        let fold_graph = graph.restricted_to_pins(train.iter().map(|i| i.pin_id.as_str()));
        propagate(&fold_graph, self.alpha, self.max_depth)
    }

    pub fn run(
        &self,
        graph: &Graph,
        interactions: &[Interaction],
        k_values: &[usize],
    ) -> Result<CrossValidationReport> {
        validate_k_values(k_values)?;
        let folds = kfold_split(interactions.len(), self.n_folds, self.seed)?;
        info!(
            n_folds = self.n_folds,
            rebuild_per_fold = self.rebuild_per_fold,
            "Performing cross-validation"
        );

        let shared = if self.rebuild_per_fold {
            None
        } else {
            Some(propagate(graph, self.alpha, self.max_depth)?)
        };

        let mut fold_results = Vec::with_capacity(folds.len());
        for (fold_no, fold) in folds.iter().enumerate() {
            debug!(
                fold = fold_no + 1,
                train = fold.train.len(),
                test = fold.test.len(),
                "Processing fold"
            );

            let train: Vec<Interaction> =
                fold.train.iter().map(|&i| interactions[i].clone()).collect();
            let test: Vec<Interaction> =
                fold.test.iter().map(|&i| interactions[i].clone()).collect();

            let rebuilt;
            let embeddings = match &shared {
                Some(embeddings) => embeddings,
                None => {
                    rebuilt = self.fold_embeddings(graph, &train)?;
                    &rebuilt
                }
            };

            let result = Evaluator::evaluate(embeddings, graph, &test, Some(train.as_slice()), k_values)?;
            fold_results.push(result);
        }

        let metrics = Metric::ALL
            .iter()
            .map(|&metric| {
                let per_k = k_values
                    .iter()
                    .map(|&k| {
                        let values: Vec<f64> = fold_results
                            .iter()
                            .filter_map(|result| result.get(metric, k))
                            .collect();
                        (k, MetricSummary::from_samples(&values))
                    })
                    .collect();
                (metric, per_k)
            })
            .collect();

        Ok(CrossValidationReport {
            n_folds: self.n_folds,
            rebuild_per_fold: self.rebuild_per_fold,
            metrics,
            folds: fold_results,
        })
    }
}
