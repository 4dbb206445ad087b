//! Random forest regression: bootstrapped CART trees with random feature subsets per split.
use std::time::Instant;

use linfa::prelude::*;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Ix1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::{
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_FEATURES, DEFAULT_MIN_SAMPLES_LEAF, DEFAULT_MIN_SAMPLES_SPLIT,
    DEFAULT_N_TREES,
};
use crate::error::{CalorieError, Result};

/// Fixed forest hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Features considered at each split.
    pub max_features: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    /// `None` seeds from OS entropy, so predictions vary slightly run to run.
    pub seed: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            max_features: DEFAULT_MAX_FEATURES,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: DEFAULT_MIN_SAMPLES_SPLIT,
            min_samples_leaf: DEFAULT_MIN_SAMPLES_LEAF,
            bootstrap: true,
            seed: None,
        }
    }
}

impl ForestParams {
    fn check(&self) -> Result<()> {
        if self.n_trees == 0 || self.max_features == 0 || self.max_depth == 0 {
            return Err(CalorieError::InvalidInput(format!(
                "n_trees, max_features and max_depth must be positive: {:?}", self
            )));
        }
        if self.min_samples_leaf == 0 || self.min_samples_split < 2 {
            return Err(CalorieError::InvalidInput(format!(
                "min_samples_leaf must be >= 1 and min_samples_split >= 2: {:?}", self
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// One regression tree, nodes stored in an arena with the root at 0.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    params: &'a ForestParams,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    /// Number of rows going left once `rows` is sorted by `feature`.
    n_left: usize,
    score: f64,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, rows: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let id = self.nodes.len();
        let mean = rows.iter().map(|&i| self.y[i]).sum::<f64>() / rows.len() as f64;
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= self.params.max_depth || rows.len() < self.params.min_samples_split {
            return id;
        }
        let Some(best) = self.best_split(rows, rng) else {
            return id;
        };

        let x = self.x;
        rows.sort_by(|&a, &b| x[(a, best.feature)].total_cmp(&x[(b, best.feature)]));
        let (left_rows, right_rows) = rows.split_at_mut(best.n_left);
        let left = self.build(left_rows, depth + 1, rng);
        let right = self.build(right_rows, depth + 1, rng);
        self.nodes[id] = Node::Split { feature: best.feature, threshold: best.threshold, left, right };
        id
    }

    /// Try features in random order; stop after `max_features` of them, or keep
    /// going past constant ones until at least one valid split is found.
    fn best_split(&self, rows: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf;
        let total: f64 = rows.iter().map(|&i| self.y[i]).sum();
        let parent = total * total / n as f64;

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);

        let mut best: Option<BestSplit> = None;
        let mut visited = 0;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);
        for feature in features {
            if visited >= self.params.max_features && best.is_some() {
                break;
            }
            visited += 1;

            pairs.clear();
            pairs.extend(rows.iter().map(|&i| (self.x[(i, feature)], self.y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for k in 1..n {
                left_sum += pairs[k - 1].1;
                if pairs[k - 1].0 == pairs[k].0 || k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let right_sum = total - left_sum;
                // maximising this is the same as minimising the children's squared error
                let score = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
                if score > parent + parent.abs() * 1e-12 && best.as_ref().map_or(true, |b| score > b.score) {
                    // adjacent floats can have a midpoint that rounds up onto the right value
                    let mut threshold = (pairs[k - 1].0 + pairs[k].0) / 2.0;
                    if threshold == pairs[k].0 {
                        threshold = pairs[k - 1].0;
                    }
                    best = Some(BestSplit { feature, threshold, n_left: k, score });
                }
            }
        }
        best
    }
}

impl RegressionTree {
    fn fit<'a>(x: ArrayView2<'a, f64>, y: ArrayView1<'a, f64>, rows: &mut [usize],
               params: &'a ForestParams, rng: &mut StdRng) -> Self {
        let mut builder = TreeBuilder { x, y, params, nodes: Vec::new() };
        builder.build(rows, 0, rng);
        RegressionTree { nodes: builder.nodes }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { value } => return value,
                Node::Split { feature, threshold, left, right } => {
                    id = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Averaging ensemble of regression trees. Fit once, then immutable.
#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        RandomForest { params, trees: Vec::new(), n_features: 0 }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Fit on a linfa dataset of encoded features and calorie targets.
    pub fn fit(&mut self, dataset: &Dataset<f64, f64, Ix1>) -> Result<()> {
        self.params.check()?;
        let x = dataset.records();
        let y = dataset.targets();
        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(CalorieError::InsufficientData(format!(
                "cannot fit a forest on a {}x{} matrix", n, x.ncols()
            )));
        }

        let started = Instant::now();
        let mut master = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut trees = Vec::with_capacity(self.params.n_trees);
        let mut rows: Vec<usize> = Vec::with_capacity(n);
        for _ in 0..self.params.n_trees {
            let mut rng = StdRng::seed_from_u64(master.random());
            rows.clear();
            if self.params.bootstrap {
                rows.extend((0..n).map(|_| rng.random_range(0..n)));
            } else {
                rows.extend(0..n);
            }
            trees.push(RegressionTree::fit(x.view(), y.view(), &mut rows, &self.params, &mut rng));
        }
        self.trees = trees;
        self.n_features = x.ncols();
        info!(
            trees = self.trees.len(),
            rows = n,
            features = self.n_features,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Forest fitted"
        );
        Ok(())
    }

    /// One prediction per input row, in row order.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(CalorieError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(CalorieError::SchemaMismatch(format!(
                "model expects {} feature column(s), got {}", self.n_features, x.ncols()
            )));
        }
        let n_trees = self.trees.len() as f64;
        let preds = x
            .rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect::<Vec<_>>();
        debug!(rows = preds.len(), "Forest predicted");
        Ok(Array1::from(preds))
    }
}
