//! Seeded k-means clustering and silhouette scoring
//!
//! Used twice: to synthesize the category hierarchy from catalog features,
//! and to group boards by embedding for downstream visualization.

use crate::error::{Result, SageError};
use crate::propagation::BoardEmbeddings;
use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Lloyd's algorithm with k-means++ initialization and multiple restarts
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    n_init: usize,
    max_iter: usize,
    tol: f64,
    seed: u64,
}

/// Result of a k-means fit
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    pub inertia: f64,
}

impl KMeans {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self {
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed,
        }
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Cluster the rows of `x`
    ///
    /// `n_clusters` is clamped to the number of rows. The restart with the
    /// lowest inertia wins; ties keep the earliest restart.
    pub fn fit(&self, x: &Array2<f64>) -> Result<KMeansFit> {
        let n = x.nrows();
        if n == 0 {
            return Err(SageError::invalid("x", "cannot cluster an empty matrix"));
        }
        if self.n_clusters == 0 {
            return Err(SageError::invalid("n_clusters", "must be at least 1"));
        }

        let k = self.n_clusters.min(n);
        let tol = self.tol * mean_variance(x);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut best: Option<KMeansFit> = None;
        for run in 0..self.n_init {
            let fit = self.lloyd(x, k, tol, &mut rng);
            debug!(run, k, inertia = fit.inertia, "k-means restart finished");

            let better = best
                .as_ref()
                .map_or(true, |current| fit.inertia < current.inertia);
            if better {
                best = Some(fit);
            }
        }

        best.ok_or_else(|| SageError::invalid("n_init", "must be at least 1"))
    }

    fn lloyd(&self, x: &Array2<f64>, k: usize, tol: f64, rng: &mut StdRng) -> KMeansFit {
        let mut centroids = init_plus_plus(x, k, rng);
        let mut labels = vec![0usize; x.nrows()];

        for _ in 0..self.max_iter {
            assign(x, &centroids, &mut labels);

            let mut updated = Array2::<f64>::zeros(centroids.dim());
            let mut counts = vec![0usize; k];
            for (row, &label) in x.axis_iter(Axis(0)).zip(labels.iter()) {
                let mut target = updated.row_mut(label);
                target += &row;
                counts[label] += 1;
            }

            for c in 0..k {
                if counts[c] > 0 {
                    updated.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // empty cluster: move it onto the point farthest from its centroid
                    let far = farthest_point(x, &centroids, &labels);
                    updated.row_mut(c).assign(&x.row(far));
                    labels[far] = c;
                }
            }

            let shift: f64 = (&updated - &centroids).iter().map(|v| v * v).sum();
            centroids = updated;
            if shift <= tol {
                break;
            }
        }

        assign(x, &centroids, &mut labels);
        let inertia = x
            .axis_iter(Axis(0))
            .zip(labels.iter())
            .map(|(row, &label)| squared_distance(row, centroids.row(label)))
            .sum();

        KMeansFit {
            labels,
            centroids,
            inertia,
        }
    }
}

fn mean_variance(x: &Array2<f64>) -> f64 {
    if x.ncols() == 0 {
        return 0.0;
    }
    let n = x.nrows() as f64;
    let total: f64 = x
        .axis_iter(Axis(1))
        .map(|column| {
            let mean = column.sum() / n;
            column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
        })
        .sum();
    total / x.ncols() as f64
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    squared_distance(a, b).sqrt()
}

fn init_plus_plus(x: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = x.nrows();
    let mut centroids = Array2::<f64>::zeros((k, x.ncols()));
    centroids.row_mut(0).assign(&x.row(rng.gen_range(0..n)));

    let mut closest: Vec<f64> = x
        .axis_iter(Axis(0))
        .map(|row| squared_distance(row, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = closest.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = n - 1;
            for (idx, d) in closest.iter().enumerate() {
                if target < *d {
                    pick = idx;
                    break;
                }
                target -= d;
            }
            pick
        } else {
            rng.gen_range(0..n)
        };

        centroids.row_mut(c).assign(&x.row(chosen));
        for (idx, row) in x.axis_iter(Axis(0)).enumerate() {
            closest[idx] = closest[idx].min(squared_distance(row, centroids.row(c)));
        }
    }

    centroids
}

fn assign(x: &Array2<f64>, centroids: &Array2<f64>, labels: &mut [usize]) {
    for (idx, row) in x.axis_iter(Axis(0)).enumerate() {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
            let dist = squared_distance(row, centroid);
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        labels[idx] = best;
    }
}

fn farthest_point(x: &Array2<f64>, centroids: &Array2<f64>, labels: &[usize]) -> usize {
    x.axis_iter(Axis(0))
        .zip(labels.iter())
        .map(|(row, &label)| squared_distance(row, centroids.row(label)))
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (idx, dist)| {
            if dist > best.1 {
                (idx, dist)
            } else {
                best
            }
        })
        .0
}

/// Mean silhouette coefficient with euclidean distance
///
/// Points in singleton clusters score 0. Returns 0 when there are fewer than
/// two clusters or every point is its own cluster.
pub fn silhouette_score(x: &Array2<f64>, labels: &[usize]) -> f64 {
    let n = x.nrows();
    let n_labels = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut sizes = vec![0usize; n_labels];
    for &label in labels {
        sizes[label] += 1;
    }
    let n_clusters = sizes.iter().filter(|&&s| s > 0).count();
    if n_clusters < 2 || n_clusters >= n {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }

        let mut sums = vec![0.0; n_labels];
        for j in 0..n {
            if i != j {
                sums[labels[j]] += euclidean(x.row(i), x.row(j));
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..n_labels)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    total / n as f64
}

/// Cluster labels aligned with an ordered list of board ids
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAssignment {
    pub board_names: Vec<String>,
    pub labels: Vec<usize>,
    pub optimal_k: usize,
    /// Candidate cluster counts, aligned with `silhouette_scores`
    pub k_candidates: Vec<usize>,
    pub silhouette_scores: Vec<f64>,
}

/// Group boards by embedding, picking k by silhouette score
pub fn cluster_boards(
    embeddings: &BoardEmbeddings,
    min_clusters: usize,
    max_clusters: usize,
    seed: u64,
) -> Result<ClusterAssignment> {
    if min_clusters < 2 {
        return Err(SageError::invalid("min_clusters", "must be at least 2"));
    }
    if max_clusters < min_clusters {
        return Err(SageError::invalid(
            "max_clusters",
            format!("must be >= min_clusters ({})", min_clusters),
        ));
    }

    let board_names: Vec<String> = embeddings.board_ids().map(str::to_string).collect();
    let n = board_names.len();

    if n < min_clusters {
        warn!(
            boards = n,
            min_clusters, "Not enough boards for clustering, assigning a single cluster"
        );
        return Ok(ClusterAssignment {
            labels: vec![0; n],
            board_names,
            optimal_k: 1,
            k_candidates: Vec::new(),
            silhouette_scores: Vec::new(),
        });
    }

    let x = embeddings.to_matrix();
    let upper = (max_clusters + 1).min(n);

    let mut k_candidates = Vec::new();
    let mut silhouette_scores = Vec::new();
    for k in min_clusters..upper {
        let fit = KMeans::new(k, seed).fit(&x)?;
        let score = silhouette_score(&x, &fit.labels);
        debug!(k, score, "Silhouette score for candidate k");
        k_candidates.push(k);
        silhouette_scores.push(score);
    }

    let optimal_k = silhouette_scores
        .iter()
        .enumerate()
        .fold(None::<(usize, f64)>, |best, (idx, &score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((idx, score)),
        })
        .map_or(min_clusters.min(n), |(idx, _)| k_candidates[idx]);

    let labels = KMeans::new(optimal_k, seed).fit(&x)?.labels;
    info!(boards = n, optimal_k, "Boards clustered");

    Ok(ClusterAssignment {
        board_names,
        labels,
        optimal_k,
        k_candidates,
        silhouette_scores,
    })
}
