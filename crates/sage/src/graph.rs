//! Board/pin graph
//!
//! Nodes live in an arena addressed by insertion index, with an id lookup on
//! the side. Two edge kinds exist: `Contains` (board -> pin) and `Parent`
//! (parent board -> child board). Edges are deduplicated. Multiple parents and
//! even cycles among boards are representable; propagation bounds its depth.

use crate::error::{Result, SageError};
use ndarray::Array1;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub type NodeIndex = usize;

/// Prefix of every pin node id
pub const PIN_PREFIX: &str = "pin_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Board -> pin
    Contains,
    /// Parent board -> child board
    Parent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Pin { features: Array1<f32> },
    Board { level: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_pin(&self) -> bool {
        matches!(self.kind, NodeKind::Pin { .. })
    }

    pub fn is_board(&self) -> bool {
        matches!(self.kind, NodeKind::Board { .. })
    }

    pub fn features(&self) -> Option<&Array1<f32>> {
        match &self.kind {
            NodeKind::Pin { features } => Some(features),
            NodeKind::Board { .. } => None,
        }
    }

    pub fn level(&self) -> Option<usize> {
        match self.kind {
            NodeKind::Board { level } => Some(level),
            NodeKind::Pin { .. } => None,
        }
    }
}

/// Summary counts reported after construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub pins: usize,
    pub boards: usize,
    pub edges: usize,
    pub max_level: usize,
}

#[derive(Debug, Clone)]
pub struct Graph {
    embedding_dim: usize,
    nodes: Vec<Node>,
    index: HashMap<String, NodeIndex>,
    outgoing: Vec<Vec<(NodeIndex, Relation)>>,
    incoming: Vec<Vec<(NodeIndex, Relation)>>,
    edge_set: HashSet<(NodeIndex, NodeIndex, Relation)>,
}

impl Graph {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            embedding_dim,
            nodes: Vec::new(),
            index: HashMap::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            edge_set: HashSet::new(),
        }
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn push(&mut self, node: Node) -> NodeIndex {
        let idx = self.nodes.len();
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        idx
    }

    /// Insert a pin; ids must be unique and features must have the graph's dimension
    pub fn add_pin(&mut self, id: impl Into<String>, features: Array1<f32>) -> Result<NodeIndex> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(SageError::invalid("pin_id", format!("duplicate node id '{}'", id)));
        }
        if features.len() != self.embedding_dim {
            return Err(SageError::invalid(
                "features",
                format!(
                    "pin '{}' has {} features, expected {}",
                    id,
                    features.len(),
                    self.embedding_dim
                ),
            ));
        }

        Ok(self.push(Node {
            id,
            kind: NodeKind::Pin { features },
        }))
    }

    /// Insert a board, or return the existing board with the same id
    pub fn add_board(&mut self, id: impl Into<String>, level: usize) -> Result<NodeIndex> {
        let id = id.into();
        if let Some(&idx) = self.index.get(&id) {
            return match self.nodes[idx].kind {
                NodeKind::Board { .. } => Ok(idx),
                NodeKind::Pin { .. } => Err(SageError::invalid(
                    "board_id",
                    format!("'{}' already names a pin", id),
                )),
            };
        }

        Ok(self.push(Node {
            id,
            kind: NodeKind::Board { level },
        }))
    }

    /// Link a board to a pin it contains; returns false if the edge already existed
    pub fn add_contains(&mut self, board: &str, pin: &str) -> Result<bool> {
        let from = self.board_index(board)?;
        let to = self.pin_index(pin)?;
        Ok(self.link(from, to, Relation::Contains))
    }

    /// Link a parent board to a child board; returns false if the edge already existed
    pub fn add_parent(&mut self, parent: &str, child: &str) -> Result<bool> {
        let from = self.board_index(parent)?;
        let to = self.board_index(child)?;
        Ok(self.link(from, to, Relation::Parent))
    }

    pub(crate) fn link(&mut self, from: NodeIndex, to: NodeIndex, relation: Relation) -> bool {
        if !self.edge_set.insert((from, to, relation)) {
            return false;
        }
        self.outgoing[from].push((to, relation));
        self.incoming[to].push((from, relation));
        true
    }

    fn board_index(&self, id: &str) -> Result<NodeIndex> {
        match self.index.get(id) {
            Some(&idx) if self.nodes[idx].is_board() => Ok(idx),
            _ => Err(SageError::BoardNotFound(id.to_string())),
        }
    }

    fn pin_index(&self, id: &str) -> Result<NodeIndex> {
        match self.index.get(id) {
            Some(&idx) if self.nodes[idx].is_pin() => Ok(idx),
            _ => Err(SageError::invalid("pin_id", format!("pin '{}' not in graph", id))),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node_at(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx]
    }

    /// Resolve a raw product key or a full pin id to the pin node id
    pub fn resolve_pin(&self, key: &str) -> Option<&str> {
        if let Some(node) = self.node(key).filter(|node| node.is_pin()) {
            return Some(node.id.as_str());
        }
        self.node(&format!("{}{}", PIN_PREFIX, key))
            .filter(|node| node.is_pin())
            .map(|node| node.id.as_str())
    }

    pub fn pins(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_pin())
    }

    /// Boards in insertion order
    pub fn boards(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_board())
    }

    pub(crate) fn board_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).filter(|&idx| self.nodes[idx].is_board())
    }

    pub(crate) fn targets(
        &self,
        idx: NodeIndex,
        relation: Relation,
    ) -> impl Iterator<Item = NodeIndex> + '_ {
        self.outgoing[idx]
            .iter()
            .filter(move |(_, r)| *r == relation)
            .map(|(to, _)| *to)
    }

    pub(crate) fn sources(
        &self,
        idx: NodeIndex,
        relation: Relation,
    ) -> impl Iterator<Item = NodeIndex> + '_ {
        self.incoming[idx]
            .iter()
            .filter(move |(_, r)| *r == relation)
            .map(|(from, _)| *from)
    }

    /// Pins directly contained in a board
    pub fn contains(&self, board: &str) -> Vec<&str> {
        self.ids_of(self.index_of(board).map(|idx| self.targets(idx, Relation::Contains)))
    }

    /// Direct child boards of a board
    pub fn sub_boards(&self, board: &str) -> Vec<&str> {
        self.ids_of(self.index_of(board).map(|idx| self.targets(idx, Relation::Parent)))
    }

    /// Boards that directly contain a pin
    pub fn boards_containing(&self, pin: &str) -> Vec<&str> {
        self.ids_of(self.index_of(pin).map(|idx| self.sources(idx, Relation::Contains)))
    }

    fn ids_of(&self, indices: Option<impl Iterator<Item = NodeIndex>>) -> Vec<&str> {
        indices
            .map(|iter| iter.map(|idx| self.nodes[idx].id.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn has_edge(&self, from: &str, to: &str, relation: Relation) -> bool {
        match (self.index_of(from), self.index_of(to)) {
            (Some(from), Some(to)) => self.edge_set.contains(&(from, to, relation)),
            _ => false,
        }
    }

    pub fn pin_count(&self) -> usize {
        self.pins().count()
    }

    pub fn board_count(&self) -> usize {
        self.boards().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_set.len()
    }

    pub fn max_level(&self) -> usize {
        self.boards().filter_map(Node::level).max().unwrap_or(0)
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            pins: self.pin_count(),
            boards: self.board_count(),
            edges: self.edge_count(),
            max_level: self.max_level(),
        }
    }

    /// Copy of the graph keeping every node and `Parent` edge, but only the
    /// `Contains` edges that point at one of `pins`
    ///
    /// Pins may be given as raw product keys or full pin ids; unknown ones are ignored.
    pub fn restricted_to_pins<'a>(&self, pins: impl IntoIterator<Item = &'a str>) -> Graph {
        let keep: HashSet<NodeIndex> = pins
            .into_iter()
            .filter_map(|key| self.resolve_pin(key))
            .filter_map(|id| self.index_of(id))
            .collect();

        let mut restricted = Graph {
            embedding_dim: self.embedding_dim,
            nodes: self.nodes.clone(),
            index: self.index.clone(),
            outgoing: vec![Vec::new(); self.nodes.len()],
            incoming: vec![Vec::new(); self.nodes.len()],
            edge_set: HashSet::new(),
        };

        for (from, edges) in self.outgoing.iter().enumerate() {
            for &(to, relation) in edges {
                if relation == Relation::Parent || keep.contains(&to) {
                    restricted.link(from, to, relation);
                }
            }
        }

        restricted
    }
}
