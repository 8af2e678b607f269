//! Feature pipeline: standard scaling, TF-IDF text vectors and PCA
//!
//! All transforms work on dense `ndarray` matrices with one row per catalog
//! item. PCA delegates the eigendecomposition to `nalgebra`.

use crate::error::{Result, SageError};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};
use std::collections::{BTreeMap, HashMap, HashSet};

/// English stop words removed before TF-IDF vocabulary selection
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing",
    "done", "down", "during", "each", "either", "else", "elsewhere", "enough", "etc", "even",
    "ever", "every", "everyone", "everything", "everywhere", "except", "few", "for", "former",
    "formerly", "from", "further", "had", "has", "have", "having", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hers", "herself", "him", "himself", "his", "how",
    "however", "i", "ie", "if", "in", "indeed", "into", "is", "it", "its", "itself", "just",
    "last", "latter", "least", "less", "many", "may", "me", "meanwhile", "might", "mine",
    "more", "moreover", "most", "mostly", "much", "must", "my", "myself", "namely", "neither",
    "never", "nevertheless", "next", "no", "nobody", "none", "nor", "not", "nothing", "now",
    "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other",
    "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps",
    "please", "rather", "same", "seem", "seemed", "seeming", "seems", "several", "she",
    "should", "since", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore",
    "therein", "thereupon", "these", "they", "this", "those", "though", "through",
    "throughout", "thru", "thus", "to", "together", "too", "toward", "towards", "under",
    "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were", "what",
    "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
    "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would",
    "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Zero-mean, unit-variance scaling per column
///
/// Uses population statistics. Columns with zero variance are divided by 1.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mean = x.sum_axis(Axis(0)) / n;

        let mut scale = Array1::<f64>::zeros(x.ncols());
        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let variance = column.iter().map(|v| (v - mean[j]).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            scale[j] = if std > 0.0 { std } else { 1.0 };
        }

        Self { mean, scale }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
            row /= &self.scale;
        }
        out
    }

    pub fn fit_transform(x: &Array2<f64>) -> Array2<f64> {
        Self::fit(x).transform(x)
    }
}

/// Term-frequency / inverse-document-frequency vectorizer
///
/// Tokens are lowercase runs of at least two word characters. The vocabulary
/// keeps the `max_features` most frequent terms across the corpus (ties broken
/// alphabetically) and columns are ordered alphabetically. Rows are
/// l2-normalized.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
    stop_words: HashSet<&'static str>,
    vocabulary: Vec<String>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features,
            stop_words: ENGLISH_STOP_WORDS.iter().copied().collect(),
            vocabulary: Vec::new(),
            idf: Vec::new(),
        }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|token| token.chars().count() >= 2)
            .map(str::to_lowercase)
            .filter(|token| !self.stop_words.contains(token.as_str()))
            .collect()
    }

    /// Fit the vocabulary and return the document-term matrix
    ///
    /// An empty vocabulary yields a matrix with zero columns.
    pub fn fit_transform(&mut self, documents: &[String]) -> Array2<f64> {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|doc| self.tokenize(doc)).collect();

        let mut term_counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen = HashSet::new();
            for token in tokens {
                *term_counts.entry(token.as_str()).or_default() += 1;
                if seen.insert(token.as_str()) {
                    *doc_freq.entry(token.as_str()).or_default() += 1;
                }
            }
        }

        // BTreeMap iteration is alphabetical, so the stable sort keeps ties ordered by term
        let mut ranked: Vec<(&str, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(self.max_features);

        let mut vocabulary: Vec<String> = ranked.iter().map(|(term, _)| term.to_string()).collect();
        vocabulary.sort();

        let n_docs = documents.len() as f64;
        self.idf = vocabulary
            .iter()
            .map(|term| {
                let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let column_of: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.as_str(), idx))
            .collect();

        let mut matrix = Array2::<f64>::zeros((documents.len(), vocabulary.len()));
        for (row, tokens) in tokenized.iter().enumerate() {
            for token in tokens {
                if let Some(&col) = column_of.get(token.as_str()) {
                    matrix[[row, col]] += 1.0;
                }
            }
            for (col, idf) in self.idf.iter().enumerate() {
                matrix[[row, col]] *= idf;
            }

            let norm = matrix.row(row).iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                matrix.row_mut(row).mapv_inplace(|v| v / norm);
            }
        }

        self.vocabulary = vocabulary;
        matrix
    }
}

/// Principal component projection
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    mean: Array1<f64>,
    components: Array2<f64>,
    explained_variance: Vec<f64>,
}

impl Pca {
    /// Fit on `x` and return the projected rows
    ///
    /// `n_components` is clamped to `min(n_features, n_rows)`.
    pub fn fit_transform(x: &Array2<f64>, n_components: usize) -> Result<(Self, Array2<f64>)> {
        let (n_rows, n_features) = x.dim();
        if n_rows == 0 || n_features == 0 {
            return Err(SageError::invalid(
                "features",
                "PCA requires at least one row and one feature",
            ));
        }

        let n_components = n_components.min(n_features).min(n_rows);
        let mean = x.sum_axis(Axis(0)) / n_rows as f64;

        let mut centered = x.clone();
        for mut row in centered.axis_iter_mut(Axis(0)) {
            row -= &mean;
        }

        let denom = (n_rows.saturating_sub(1)).max(1) as f64;
        let cov = centered.t().dot(&centered) / denom;
        let cov = DMatrix::from_fn(n_features, n_features, |i, j| cov[[i, j]]);

        let eigen = SymmetricEigen::try_new(cov, f64::EPSILON, 0).ok_or_else(|| {
            SageError::Linalg("covariance eigendecomposition did not converge".to_string())
        })?;

        let mut order: Vec<usize> = (0..n_features).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut components = Array2::<f64>::zeros((n_components, n_features));
        let mut explained_variance = Vec::with_capacity(n_components);
        for (c, &idx) in order.iter().take(n_components).enumerate() {
            explained_variance.push(eigen.eigenvalues[idx].max(0.0));

            let column = eigen.eigenvectors.column(idx);
            let pivot = column
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };

            for j in 0..n_features {
                components[[c, j]] = sign * column[j];
            }
        }

        let projected = centered.dot(&components.t());
        let pca = Self {
            n_components,
            mean,
            components,
            explained_variance,
        };

        Ok((pca, projected))
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut centered = x.clone();
        for mut row in centered.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
        }
        centered.dot(&self.components.t())
    }
}
