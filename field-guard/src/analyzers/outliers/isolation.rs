//! Univariate isolation forest.
//!
//! Reference: Liu, Ting & Zhou (2008). "Isolation Forest", ICDM.
//!
//! Each tree recursively splits a random subsample at uniformly drawn points until
//! every value is isolated or the depth limit `ceil(log2(psi))` is reached. A value's
//! anomaly score is `2^(-E(h) / c(psi))`, where `E(h)` is its mean path length over
//! all trees and `c` the expected path length of an unsuccessful BST search.
//! Scores near 1 are anomalous, scores around 0.5 are ordinary.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cancellation::CancellationToken;
use crate::error::{EngineError, Result};

const EULER_GAMMA: f64 = 0.577_215_664_9;

enum Node {
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// A fitted ensemble over one column of values.
pub struct IsolationForest {
    trees: Vec<Node>,
    normalizer: f64,
}

impl IsolationForest {
    /// Fits `trees` trees on subsamples of `sample_size` values.
    ///
    /// Identical inputs (values, tree count, sample size, seed) always produce an
    /// identical forest.
    pub fn fit(
        values: &[f64],
        trees: usize,
        sample_size: usize,
        seed: u64,
        token: &CancellationToken,
    ) -> Result<Self> {
        if values.len() < 2 {
            return Err(EngineError::InsufficientData {
                required: 2,
                actual: values.len(),
            });
        }
        let psi = sample_size.min(values.len());
        let max_depth = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut forest = Vec::with_capacity(trees);
        for _ in 0..trees {
            token.check()?;
            let subsample: Vec<f64> = rand::seq::index::sample(&mut rng, values.len(), psi)
                .into_iter()
                .map(|i| values[i])
                .collect();
            forest.push(build_tree(subsample, max_depth, &mut rng));
        }

        Ok(Self {
            trees: forest,
            normalizer: average_path_length(psi),
        })
    }

    /// Anomaly score in (0, 1].
    pub fn score(&self, value: f64) -> f64 {
        if self.normalizer <= 0.0 || self.trees.is_empty() {
            return 0.5;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|tree| path_length(tree, value, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / self.normalizer)
    }
}

fn build_tree(values: Vec<f64>, depth: usize, rng: &mut StdRng) -> Node {
    if values.len() <= 1 || depth == 0 {
        return Node::Leaf { size: values.len() };
    }
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if min >= max {
        return Node::Leaf { size: values.len() };
    }

    // interpolated rather than `min + u * (max - min)`, which overflows for spans
    // wider than f64::MAX
    let u: f64 = rng.random();
    let threshold = min * (1.0 - u) + max * u;
    let (left, right): (Vec<f64>, Vec<f64>) = values.into_iter().partition(|v| *v < threshold);
    if left.is_empty() || right.is_empty() {
        return Node::Leaf {
            size: left.len() + right.len(),
        };
    }
    Node::Split {
        threshold,
        left: Box::new(build_tree(left, depth - 1, rng)),
        right: Box::new(build_tree(right, depth - 1, rng)),
    }
}

fn path_length(node: &Node, value: f64, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            threshold,
            left,
            right,
        } => {
            if value < *threshold {
                path_length(left, value, depth + 1)
            } else {
                path_length(right, value, depth + 1)
            }
        }
    }
}

/// c(n) = 2 H(n - 1) - 2 (n - 1) / n
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
