//! PinSage-style hierarchical board recommender
//!
//! Builds a graph of boards (synthetic categories) containing pins (products),
//! propagates pin features up the board hierarchy, and recommends boards by
//! embedding similarity. Offline evaluation covers hit ratio, accuracy, MRR
//! and NDCG, with k-fold cross-validation.
//!
//! The pipeline is synchronous and deterministic for a fixed seed.

pub mod builder;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod graph;
pub mod propagation;
pub mod recommend;
pub mod simulation;
pub mod types;

pub use builder::GraphBuilder;
pub use cluster::{cluster_boards, silhouette_score, ClusterAssignment, KMeans};
pub use config::SageConfig;
pub use dataset::{load_interactions, Column, ColumnKind, Dataset};
pub use error::{Result, SageError};
pub use evaluation::{
    accuracy_at_k, hit_ratio_at_k, kfold_split, mrr_at_k, ndcg_at_k, CrossValidationReport,
    CrossValidator, EvaluationResult, Evaluator, Fold,
};
pub use graph::{Graph, GraphStats, Node, NodeKind, Relation};
pub use propagation::{propagate, BoardEmbeddings};
pub use recommend::{cosine_similarity, recommend, ScoredBoard};
pub use simulation::{simulate_interactions, SimulationConfig};
pub use types::{Interaction, Metric, MetricSummary};

use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Recommendations for one query board, included in pipeline reports
#[derive(Debug, Clone, Serialize)]
pub struct SampleRecommendation {
    pub query: String,
    pub results: Vec<ScoredBoard>,
}

/// Outcome of a full offline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub graph: GraphStats,
    pub embedding_dim: usize,
    pub alpha: f32,
    pub max_depth: usize,
    pub clusters: ClusterAssignment,
    pub interactions: usize,
    pub cross_validation: CrossValidationReport,
    pub sample_recommendations: Option<SampleRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<BoardEmbeddings>,
}

/// Pipeline owner: configuration, graph and the current board embeddings
pub struct HierarchicalSage {
    config: SageConfig,
    graph: Option<Graph>,
    embeddings: Option<BoardEmbeddings>,
    clusters: Option<ClusterAssignment>,
}

impl HierarchicalSage {
    pub fn new(config: SageConfig) -> Self {
        Self {
            config,
            graph: None,
            embeddings: None,
            clusters: None,
        }
    }

    pub fn config(&self) -> &SageConfig {
        &self.config
    }

    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    pub fn embeddings(&self) -> Option<&BoardEmbeddings> {
        self.embeddings.as_ref()
    }

    pub fn clusters(&self) -> Option<&ClusterAssignment> {
        self.clusters.as_ref()
    }

    fn require_graph(&self) -> Result<&Graph> {
        self.graph.as_ref().ok_or(SageError::NotReady("graph"))
    }

    fn require_embeddings(&self) -> Result<&BoardEmbeddings> {
        self.embeddings
            .as_ref()
            .ok_or(SageError::NotReady("board embeddings"))
    }

    pub fn load_dataset(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        Dataset::load(path, self.config.max_items)
    }

    /// Build the graph, discarding embeddings and clusters of any previous graph
    pub fn build_graph(&mut self, dataset: &Dataset) -> Result<&Graph> {
        let graph = GraphBuilder::new(self.config.embedding_dim, self.config.seed).build(dataset)?;
        self.embeddings = None;
        self.clusters = None;
        Ok(self.graph.insert(graph))
    }

    /// Set a graph built elsewhere
    pub fn set_graph(&mut self, graph: Graph) {
        self.graph = Some(graph);
        self.embeddings = None;
        self.clusters = None;
    }

    pub fn generate_embeddings(&mut self) -> Result<&BoardEmbeddings> {
        let embeddings = propagate(self.require_graph()?, self.config.alpha, self.config.max_depth)?;
        self.clusters = None;
        Ok(self.embeddings.insert(embeddings))
    }

    pub fn recommend_similar_boards(
        &self,
        query_board: &str,
        top_k: usize,
        exclude_children: bool,
    ) -> Result<Vec<ScoredBoard>> {
        recommend(
            self.require_embeddings()?,
            self.require_graph()?,
            query_board,
            top_k,
            exclude_children,
        )
    }

    /// Evaluate held-out interactions, generating embeddings first if needed
    pub fn evaluate(
        &mut self,
        held_out: &[Interaction],
        history: Option<&[Interaction]>,
    ) -> Result<EvaluationResult> {
        if self.embeddings.is_none() {
            self.generate_embeddings()?;
        }
        Evaluator::evaluate(
            self.require_embeddings()?,
            self.require_graph()?,
            held_out,
            history,
            &self.config.k_values,
        )
    }

    pub fn cross_validate(&self, interactions: &[Interaction]) -> Result<CrossValidationReport> {
        self.config
            .cross_validator()
            .run(self.require_graph()?, interactions, &self.config.k_values)
    }

    pub fn cluster_boards(&mut self) -> Result<&ClusterAssignment> {
        let assignment = cluster_boards(
            self.require_embeddings()?,
            self.config.min_clusters,
            self.config.max_clusters,
            self.config.seed,
        )?;
        Ok(self.clusters.insert(assignment))
    }

    pub fn simulate_interactions(&self) -> Result<Vec<Interaction>> {
        simulate_interactions(self.require_graph()?, &self.config.simulation)
    }

    /// Load, build, propagate, cluster and cross-validate in one go
    ///
    /// Interactions are simulated when none are given.
    pub fn run_pipeline(
        &mut self,
        dataset_path: impl AsRef<Path>,
        interactions: Option<Vec<Interaction>>,
        include_embeddings: bool,
    ) -> Result<PipelineReport> {
        let dataset = self.load_dataset(dataset_path)?;
        self.build_graph(&dataset)?;
        self.generate_embeddings()?;
        let clusters = self.cluster_boards()?.clone();

        let interactions = match interactions {
            Some(interactions) => interactions,
            None => self.simulate_interactions()?,
        };
        let cross_validation = self.cross_validate(&interactions)?;

        let embeddings = self.require_embeddings()?;
        let sample_recommendations = match embeddings.board_ids().next() {
            Some(query) => Some(SampleRecommendation {
                query: query.to_string(),
                results: self.recommend_similar_boards(query, self.config.top_k, false)?,
            }),
            None => None,
        };

        let graph = self.require_graph()?;
        info!(
            boards = graph.board_count(),
            pins = graph.pin_count(),
            optimal_k = clusters.optimal_k,
            "Pipeline finished"
        );

        Ok(PipelineReport {
            graph: graph.stats(),
            embedding_dim: self.config.embedding_dim,
            alpha: self.config.alpha,
            max_depth: self.config.max_depth,
            clusters,
            interactions: interactions.len(),
            cross_validation,
            sample_recommendations,
            embeddings: include_embeddings.then(|| embeddings.clone()),
        })
    }
}

#[cfg(test)]
mod tests;
