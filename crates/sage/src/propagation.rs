//! Hierarchical board embeddings
//!
//! A board's embedding blends the mean of its direct pins with the mean of its
//! sub-board embeddings:
//!
//! ```text
//! embedding(b, d) = direct(b)                                       if b has no sub-boards
//!                 = (1 - alpha) * direct(b) + alpha * mean(embedding(s, d + 1))
//! embedding(b, d) = 0                                               if d > max_depth
//! ```
//!
//! Evaluated bottom-up one depth level at a time, so cycles among boards are
//! cut off at `max_depth` without recursion.

use crate::error::{Result, SageError};
use crate::graph::{Graph, NodeIndex, Relation};
use ndarray::{Array1, Array2};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use tracing::{debug, info};

/// Board id -> embedding, iterated in board insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct BoardEmbeddings {
    dim: usize,
    ids: Vec<String>,
    vectors: Vec<Array1<f32>>,
    index: HashMap<String, usize>,
}

impl BoardEmbeddings {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ids: Vec::new(),
            vectors: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert or replace an embedding
    pub fn insert(&mut self, id: impl Into<String>, vector: Array1<f32>) -> Result<()> {
        if vector.len() != self.dim {
            return Err(SageError::invalid(
                "embedding",
                format!("expected length {}, got {}", self.dim, vector.len()),
            ));
        }

        let id = id.into();
        match self.index.get(&id) {
            Some(&pos) => self.vectors[pos] = vector,
            None => {
                self.index.insert(id.clone(), self.ids.len());
                self.ids.push(id);
                self.vectors.push(vector);
            }
        }
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Array1<f32>> {
        self.index.get(id).map(|&pos| &self.vectors[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn board_ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Array1<f32>)> {
        self.ids.iter().map(String::as_str).zip(self.vectors.iter())
    }

    /// Embeddings stacked row-wise in iteration order
    pub fn to_matrix(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.len(), self.dim), |(i, j)| self.vectors[i][j] as f64)
    }
}

impl Serialize for BoardEmbeddings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (id, vector) in self.iter() {
            map.serialize_entry(id, &vector.to_vec())?;
        }
        map.end()
    }
}

/// Compute the embedding of every board in `graph`
///
/// # Errors
///
/// `InvalidParameter` if `alpha` is outside `[0, 1]`.
pub fn propagate(graph: &Graph, alpha: f32, max_depth: usize) -> Result<BoardEmbeddings> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(SageError::invalid(
            "alpha",
            format!("must be within [0, 1], got {}", alpha),
        ));
    }

    info!(alpha, max_depth, "Generating hierarchical board embeddings");

    let dim = graph.embedding_dim();
    let boards: Vec<NodeIndex> = graph.board_indices().collect();
    let position: HashMap<NodeIndex, usize> = boards
        .iter()
        .enumerate()
        .map(|(pos, &idx)| (idx, pos))
        .collect();

    let direct: Vec<Array1<f32>> = boards
        .iter()
        .map(|&board| direct_embedding(graph, board, dim))
        .collect();
    let subs: Vec<Vec<usize>> = boards
        .iter()
        .map(|&board| {
            graph
                .targets(board, Relation::Parent)
                .filter_map(|child| position.get(&child).copied())
                .collect()
        })
        .collect();

    // Start from depth max_depth + 1, where every embedding is zero
    let mut deeper: Vec<Array1<f32>> = vec![Array1::zeros(dim); boards.len()];
    let mut levels = 0usize;
    for depth in (0..=max_depth).rev() {
        let current: Vec<Array1<f32>> = (0..boards.len())
            .map(|b| blend(&direct[b], &subs[b], &deeper, alpha))
            .collect();
        levels += 1;

        let stationary = current == deeper;
        deeper = current;
        if stationary {
            debug!(depth, "Board embeddings reached a fixed point");
            break;
        }
    }
    debug!(levels, "Propagation levels evaluated");

    let mut embeddings = BoardEmbeddings::new(dim);
    for (&board, vector) in boards.iter().zip(deeper) {
        embeddings.insert(graph.node_at(board).id.clone(), vector)?;
    }

    info!(boards = embeddings.len(), "Generated board embeddings");
    Ok(embeddings)
}

fn direct_embedding(graph: &Graph, board: NodeIndex, dim: usize) -> Array1<f32> {
    let mut sum = Array1::<f32>::zeros(dim);
    let mut count = 0usize;
    for pin in graph.targets(board, Relation::Contains) {
        if let Some(features) = graph.node_at(pin).features() {
            sum += features;
            count += 1;
        }
    }

    if count > 0 {
        sum /= count as f32;
    }
    sum
}

fn blend(direct: &Array1<f32>, subs: &[usize], deeper: &[Array1<f32>], alpha: f32) -> Array1<f32> {
    if subs.is_empty() {
        return direct.clone();
    }

    let mut sub_mean = Array1::<f32>::zeros(direct.len());
    for &sub in subs {
        sub_mean += &deeper[sub];
    }
    sub_mean /= subs.len() as f32;

    direct * (1.0 - alpha) + sub_mean * alpha
}
