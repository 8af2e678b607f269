//! Graph construction from a product catalog
//!
//! Products become pins. A two-level category hierarchy is synthesized by
//! clustering standardized numeric features, and every level of a product's
//! path becomes a board that contains it.

use crate::cluster::KMeans;
use crate::dataset::Dataset;
use crate::error::{Result, SageError};
use crate::features::{Pca, StandardScaler, TfidfVectorizer};
use crate::graph::{Graph, Relation, PIN_PREFIX};
use ndarray::{concatenate, Array1, Array2, Axis};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Columns that contribute to the category string when present
pub const CATEGORICAL_COLUMNS: [&str; 6] =
    ["Brand", "Category", "Season", "Holiday", "Gender", "Location"];

pub const PRODUCT_ID_COLUMN: &str = "product_id";

/// Main categories with at least this many members are sub-clustered
const SUBCLUSTER_MIN_MEMBERS: usize = 10;

pub struct GraphBuilder {
    embedding_dim: usize,
    seed: u64,
}

impl GraphBuilder {
    pub fn new(embedding_dim: usize, seed: u64) -> Self {
        Self {
            embedding_dim,
            seed,
        }
    }

    pub fn build(&self, dataset: &Dataset) -> Result<Graph> {
        if self.embedding_dim == 0 {
            return Err(SageError::invalid("embedding_dim", "must be at least 1"));
        }

        info!("Processing data and creating graph structure");
        let (rows, keys) = product_keys(dataset);
        if rows.is_empty() {
            return Err(SageError::EmptyDataset);
        }
        let n = rows.len();

        let numeric = dataset.numeric_columns(&[PRODUCT_ID_COLUMN]);
        let text = dataset.text_columns(&[PRODUCT_ID_COLUMN]);
        let categorical: Vec<(usize, &str)> = CATEGORICAL_COLUMNS
            .iter()
            .filter_map(|name| dataset.column(name).map(|idx| (idx, *name)))
            .collect();
        info!(
            numeric = numeric.len(),
            text = text.len(),
            categorical = categorical.len(),
            "Available feature columns"
        );

        let scaled = StandardScaler::fit_transform(&numeric_matrix(dataset, &rows, &numeric));

        let main_k = (n / 100).clamp(3, 10).min(n);
        let main = KMeans::new(main_k, self.seed).fit(&scaled)?.labels;
        let sub = self.sub_categories(&scaled, &main)?;

        let documents: Vec<String> = rows
            .iter()
            .map(|&row| {
                format!(
                    "{} {}",
                    feature_string(dataset, row, &text),
                    category_string(dataset, row, &categorical)
                )
            })
            .collect();
        let text_features = tfidf_features(&documents, n);

        let combined = concatenate(Axis(1), &[scaled.view(), text_features.view()])
            .map_err(|e| SageError::Linalg(e.to_string()))?;
        let pin_features = self.reduce(&combined)?;

        let mut graph = Graph::new(self.embedding_dim);
        let mut pin_indices = Vec::with_capacity(n);
        for (key, features) in keys.iter().zip(pin_features) {
            pin_indices.push(graph.add_pin(format!("{}{}", PIN_PREFIX, key), features)?);
        }

        for (i, &pin) in pin_indices.iter().enumerate() {
            let path = [
                format!("category_{}", main[i]),
                format!("subcategory_{}_{}", main[i], sub[i]),
            ];

            let mut parent = None;
            for (level, category) in path.iter().enumerate() {
                let board = graph.add_board(format!("board_{}_{}", level, category), level)?;
                graph.link(board, pin, Relation::Contains);
                if let Some(parent) = parent {
                    graph.link(parent, board, Relation::Parent);
                }
                parent = Some(board);
            }
        }

        info!(
            boards = graph.board_count(),
            pins = graph.pin_count(),
            edges = graph.edge_count(),
            levels = graph.max_level() + 1,
            "Graph created"
        );

        Ok(graph)
    }

    fn sub_categories(&self, scaled: &Array2<f64>, main: &[usize]) -> Result<Vec<usize>> {
        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (row, &label) in main.iter().enumerate() {
            members.entry(label).or_default().push(row);
        }

        let mut sub = vec![0usize; main.len()];
        for (category, rows) in members {
            if rows.len() < SUBCLUSTER_MIN_MEMBERS {
                continue;
            }

            let k = (rows.len() / 5).min(3);
            let subset = scaled.select(Axis(0), &rows);
            let labels = KMeans::new(k, self.seed).fit(&subset)?.labels;
            debug!(category, members = rows.len(), k, "Sub-clustered category");

            for (row, label) in rows.into_iter().zip(labels) {
                sub[row] = label;
            }
        }

        Ok(sub)
    }

    fn reduce(&self, combined: &Array2<f64>) -> Result<Vec<Array1<f32>>> {
        let components = self
            .embedding_dim
            .min(combined.ncols())
            .min(combined.nrows());
        info!(components, "Reducing pin features via PCA");

        let (_, projected) = Pca::fit_transform(combined, components)?;

        Ok(projected
            .axis_iter(Axis(0))
            .map(|row| {
                let mut padded = Array1::<f32>::zeros(self.embedding_dim);
                for (j, value) in row.iter().enumerate() {
                    padded[j] = *value as f32;
                }
                padded
            })
            .collect())
    }
}

/// Row indices that survive key handling, with their unique product keys
///
/// Rows without a product id are dropped. If any id repeats, every key gets a
/// `_<row index>` suffix. Without a `product_id` column, keys are `1..=n`.
fn product_keys(dataset: &Dataset) -> (Vec<usize>, Vec<String>) {
    let Some(column) = dataset.column(PRODUCT_ID_COLUMN) else {
        info!("Creating numerical product IDs");
        let rows: Vec<usize> = (0..dataset.n_rows()).collect();
        let keys = rows.iter().map(|row| (row + 1).to_string()).collect();
        return (rows, keys);
    };

    let mut rows = Vec::new();
    let mut keys = Vec::new();
    for row in 0..dataset.n_rows() {
        if let Some(id) = dataset.cell(row, column) {
            rows.push(row);
            keys.push(id.to_string());
        }
    }

    let dropped = dataset.n_rows() - rows.len();
    if dropped > 0 {
        warn!(dropped, "Dropped rows without a product id");
    }

    let distinct: HashSet<&String> = keys.iter().collect();
    if distinct.len() == keys.len() {
        return (rows, keys);
    }

    warn!("Duplicate product IDs found, making them unique");
    let mut seen = HashSet::new();
    let keys = rows
        .iter()
        .zip(keys.iter())
        .map(|(row, key)| {
            let mut candidate = format!("{}_{}", key, row);
            let mut attempt = 1;
            while seen.contains(&candidate) {
                candidate = format!("{}_{}_{}", key, row, attempt);
                attempt += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect();

    (rows, keys)
}

fn numeric_matrix(dataset: &Dataset, rows: &[usize], columns: &[usize]) -> Array2<f64> {
    if columns.is_empty() {
        return Array2::zeros((rows.len(), 1));
    }

    Array2::from_shape_fn((rows.len(), columns.len()), |(i, j)| {
        dataset.number(rows[i], columns[j]).unwrap_or(0.0)
    })
}

fn category_string(dataset: &Dataset, row: usize, columns: &[(usize, &str)]) -> String {
    columns
        .iter()
        .filter_map(|(idx, name)| dataset.cell(row, *idx).map(|v| format!("{}:{}", name, v)))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn feature_string(dataset: &Dataset, row: usize, columns: &[usize]) -> String {
    columns
        .iter()
        .filter_map(|&idx| dataset.cell(row, idx))
        .collect::<Vec<_>>()
        .join(" ")
}

fn tfidf_features(documents: &[String], n: usize) -> Array2<f64> {
    if documents.iter().all(|doc| doc.trim().is_empty()) {
        return Array2::zeros((n, 1));
    }

    let max_features = (n / 10).clamp(1, 50);
    let mut tfidf = TfidfVectorizer::new(max_features);
    let matrix = tfidf.fit_transform(documents);
    if matrix.ncols() == 0 {
        warn!("Text columns produced an empty vocabulary, skipping TF-IDF features");
        return Array2::zeros((n, 1));
    }

    debug!(vocabulary = ?tfidf.vocabulary(), "TF-IDF vocabulary");
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnKind;

    fn catalog(ids: &[Option<&str>]) -> Dataset {
        let rows = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                vec![
                    id.map(str::to_string),
                    Some(format!("{}", (i * 7) % 13)),
                    Some(format!("{}", i % 4)),
                    Some(if i % 2 == 0 { "Acme" } else { "Globex" }.to_string()),
                    Some(format!("sturdy item number{}", i % 3)),
                ]
            })
            .collect();

        Dataset::from_records(
            vec![
                "product_id".into(),
                "Price".into(),
                "Stock".into(),
                "Brand".into(),
                "Title".into(),
            ],
            rows,
        )
        .unwrap()
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{}", i)).collect()
    }

    #[test]
    fn test_build_two_level_hierarchy() {
        let keys = ids(40);
        let dataset = catalog(&keys.iter().map(|k| Some(k.as_str())).collect::<Vec<_>>());
        let graph = GraphBuilder::new(8, 42).build(&dataset).unwrap();

        assert_eq!(graph.pin_count(), 40);
        assert_eq!(graph.max_level(), 1);
        assert!(graph.node("pin_p0").is_some());

        for pin in graph.pins() {
            assert_eq!(pin.features().map(|f| f.len()), Some(8));
            let boards = graph.boards_containing(&pin.id);
            assert_eq!(boards.len(), 2);
            assert!(boards[0].starts_with("board_0_category_"));
            assert!(boards[1].starts_with("board_1_subcategory_"));
            assert!(graph.has_edge(boards[0], boards[1], Relation::Parent));
        }

        // 40 rows -> 3 main categories
        let main = graph.boards().filter(|b| b.level() == Some(0)).count();
        assert_eq!(main, 3);
    }

    #[test]
    fn test_build_is_reproducible() {
        let keys = ids(30);
        let dataset = catalog(&keys.iter().map(|k| Some(k.as_str())).collect::<Vec<_>>());
        let a = GraphBuilder::new(4, 7).build(&dataset).unwrap();
        let b = GraphBuilder::new(4, 7).build(&dataset).unwrap();

        let boards_a: Vec<_> = a.boards().map(|n| n.id.clone()).collect();
        let boards_b: Vec<_> = b.boards().map(|n| n.id.clone()).collect();
        assert_eq!(boards_a, boards_b);
        for pin in a.pins() {
            assert_eq!(a.boards_containing(&pin.id), b.boards_containing(&pin.id));
        }
    }

    #[test]
    fn test_duplicate_ids_are_suffixed() {
        let dataset = catalog(&[Some("a"), Some("a"), None, Some("b"), Some("c")]);
        let graph = GraphBuilder::new(3, 1).build(&dataset).unwrap();

        let mut pins: Vec<_> = graph.pins().map(|n| n.id.clone()).collect();
        pins.sort();
        assert_eq!(pins, vec!["pin_a_0", "pin_a_1", "pin_b_3", "pin_c_4"]);
    }

    #[test]
    fn test_missing_product_column_uses_sequence() {
        let dataset = Dataset::from_records(
            vec!["Price".into()],
            vec![vec![Some("1".into())], vec![Some("2".into())], vec![Some("9".into())]],
        )
        .unwrap();
        let graph = GraphBuilder::new(5, 0).build(&dataset).unwrap();

        let pins: Vec<_> = graph.pins().map(|n| n.id.as_str()).collect();
        assert_eq!(pins, vec!["pin_1", "pin_2", "pin_3"]);
        for pin in graph.pins() {
            assert_eq!(pin.features().map(|f| f.len()), Some(5));
        }
    }

    #[test]
    fn test_rejects_zero_dimension() {
        let dataset = catalog(&[Some("a")]);
        let result = GraphBuilder::new(0, 0).build(&dataset);
        assert!(matches!(result, Err(SageError::InvalidParameter { .. })));
    }

    #[test]
    fn test_all_ids_missing_is_empty() {
        let dataset = catalog(&[None, None]);
        let result = GraphBuilder::new(2, 0).build(&dataset);
        assert!(matches!(result, Err(SageError::EmptyDataset)));
    }

    #[test]
    fn test_category_string_format() {
        let dataset = Dataset::from_records(
            vec!["Season".into(), "Brand".into()],
            vec![vec![Some("Winter".into()), Some("Acme".into())], vec![None, Some("Zed".into())]],
        )
        .unwrap();
        let categorical: Vec<(usize, &str)> = CATEGORICAL_COLUMNS
            .iter()
            .filter_map(|name| dataset.column(name).map(|idx| (idx, *name)))
            .collect();

        assert_eq!(
            category_string(&dataset, 0, &categorical),
            "Brand:Acme | Season:Winter"
        );
        assert_eq!(category_string(&dataset, 1, &categorical), "Brand:Zed");
    }

    #[test]
    fn test_na_and_non_finite_cells_keep_features_finite() {
        for marker in ["NaN", "N/A", "inf"] {
            let rows = (0..30)
                .map(|i| {
                    let price = if i == 3 {
                        marker.to_string()
                    } else {
                        format!("{}", (i * 7) % 13)
                    };
                    vec![
                        Some(format!("p{}", i)),
                        Some(price),
                        Some(format!("sturdy item number{}", i % 3)),
                    ]
                })
                .collect();
            let dataset = Dataset::from_records(
                vec!["product_id".into(), "Price".into(), "Title".into()],
                rows,
            )
            .unwrap();

            let price = dataset.column("Price").unwrap();
            assert_eq!(dataset.columns()[price].kind, ColumnKind::Numeric, "{}", marker);

            let graph = GraphBuilder::new(4, 42).build(&dataset).unwrap();
            for pin in graph.pins() {
                let features = pin.features().unwrap();
                assert!(
                    features.iter().all(|v| v.is_finite()),
                    "{} produced non-finite features for {}",
                    marker,
                    pin.id
                );
            }
        }
    }
}
