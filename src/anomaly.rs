//! Unsupervised outlier scoring of transaction magnitudes.
//!
//! An isolation forest: random axis-aligned splits isolate unusual values in
//! fewer steps than common ones, so a short average path means an outlier.
//! Only `|amount|` is scored, so a large refund and a large purchase look
//! the same to the model.

use log::debug;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::config::PipelineConfig;
use crate::schema::Transaction;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful search in a binary search tree of `n` points.
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

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn grow(values: &mut [f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        if depth >= max_depth || values.len() <= 1 {
            return Node::Leaf { size: values.len() };
        }

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if min >= max {
            return Node::Leaf { size: values.len() };
        }

        let threshold = rng.gen_range(min..max);
        let mut split = 0;
        for i in 0..values.len() {
            if values[i] <= threshold {
                values.swap(i, split);
                split += 1;
            }
        }

        let (left, right) = values.split_at_mut(split);
        Node::Split {
            threshold,
            left: Box::new(Node::grow(left, depth + 1, max_depth, rng)),
            right: Box::new(Node::grow(right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, value: f64) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    threshold,
                    left,
                    right,
                } => {
                    node = if value <= *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForest {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl IsolationForest {
    pub fn new(n_estimators: usize, max_samples: usize, contamination: f64, seed: u64) -> Self {
        Self {
            n_estimators,
            max_samples,
            contamination,
            seed,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.n_estimators,
            config.max_samples,
            config.contamination,
            config.anomaly_seed,
        )
    }

    /// Anomaly score in (0, 1] for each value; higher is more isolated.
    ///
    /// The forest is grown on `values` and then scores the same values.
    pub fn score(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        if n == 0 {
            return Vec::new();
        }

        let sample_size = self.max_samples.min(n).max(1);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees: Vec<Node> = (0..self.n_estimators.max(1))
            .map(|_| {
                let mut sample: Vec<f64> = index::sample(&mut rng, n, sample_size)
                    .into_iter()
                    .map(|i| values[i])
                    .collect();
                Node::grow(&mut sample, 0, max_depth, &mut rng)
            })
            .collect();

        let normalizer = average_path_length(sample_size).max(f64::MIN_POSITIVE);

        values
            .iter()
            .map(|&v| {
                let mean_path =
                    trees.iter().map(|t| t.path_length(v)).sum::<f64>() / trees.len() as f64;
                2f64.powf(-mean_path / normalizer)
            })
            .collect()
    }

    /// Flag the `contamination` share of values with the highest scores.
    ///
    /// The cut-off is the linearly interpolated percentile of the negated
    /// scores; a value is an outlier only when strictly beyond it, so a set of
    /// identical values has no outliers.
    pub fn fit_predict(&self, values: &[f64]) -> Vec<bool> {
        let normality: Vec<f64> = self.score(values).into_iter().map(|s| -s).collect();
        if normality.is_empty() {
            return Vec::new();
        }

        let offset = percentile(&normality, self.contamination * 100.0);
        normality.iter().map(|&s| s < offset).collect()
    }
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Attach `is_anomaly` to every transaction.
///
/// Sets smaller than `min_anomaly_sample` are all marked normal without
/// scoring. Returns the number of anomalies found.
pub fn detect_anomalies(transactions: &mut [Transaction], config: &PipelineConfig) -> usize {
    if transactions.len() < config.min_anomaly_sample {
        debug!(
            "Only {} transactions, skipping anomaly scoring",
            transactions.len()
        );
        for txn in transactions.iter_mut() {
            txn.is_anomaly = Some(false);
        }
        return 0;
    }

    let magnitudes: Vec<f64> = transactions.iter().map(|t| t.amount.abs()).collect();
    let flags = IsolationForest::from_config(config).fit_predict(&magnitudes);

    for (txn, flag) in transactions.iter_mut().zip(flags) {
        txn.is_anomaly = Some(flag);
    }

    let count = transactions.iter().filter(|t| t.is_anomalous()).count();
    debug!(
        "Isolation forest flagged {} of {} transactions",
        count,
        transactions.len()
    );
    count
}
