//! Score-vector metrics: argmax, top-k ranking, cross-entropy and running
//! averages for per-batch progress reporting.
//!
//! Ranking ties are always broken by the lowest class index so that results
//! do not depend on sort stability or platform.

use std::cmp::Ordering;

use crate::error::{CoreError, CoreResult};

/// Index of the highest score; the lowest index wins ties.
///
/// Returns `None` for an empty vector.
#[must_use]
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        match best {
            Some((_, best_score)) if score.total_cmp(&best_score) != Ordering::Greater => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}

/// Indices of the `k` highest scores, best first. `k` is clamped to the
/// vector length.
#[must_use]
pub fn top_k_indices(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(k.min(scores.len()));
    order
}

/// Softmax cross-entropy of raw scores against a label, via log-sum-exp.
pub fn cross_entropy(scores: &[f32], label: usize) -> CoreResult<f64> {
    if label >= scores.len() {
        return Err(CoreError::ShapeMismatch {
            expected: scores.len(),
            found: label + 1,
        });
    }
    let max = scores
        .iter()
        .map(|s| f64::from(*s))
        .fold(f64::NEG_INFINITY, f64::max);
    let sum_exp: f64 = scores.iter().map(|s| (f64::from(*s) - max).exp()).sum();
    Ok(max + sum_exp.ln() - f64::from(scores[label]))
}

/// Percentage of rows whose label is within the top `k` scores, for every
/// `k` in `ks`.
pub fn batch_topk_accuracy(scores: &[Vec<f32>], labels: &[usize], ks: &[usize]) -> CoreResult<Vec<f64>> {
    if scores.len() != labels.len() {
        return Err(CoreError::ShapeMismatch {
            expected: scores.len(),
            found: labels.len(),
        });
    }
    if scores.is_empty() {
        return Ok(vec![0.0; ks.len()]);
    }
    let max_k = ks.iter().copied().max().unwrap_or(1);
    let mut hits = vec![0usize; ks.len()];
    for (row, &label) in scores.iter().zip(labels) {
        let ranked = top_k_indices(row, max_k);
        for (slot, &k) in ks.iter().enumerate() {
            if ranked.iter().take(k).any(|&class| class == label) {
                hits[slot] += 1;
            }
        }
    }
    Ok(hits
        .into_iter()
        .map(|h| h as f64 * 100.0 / scores.len() as f64)
        .collect())
}

/// Current value and running average of a per-batch quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    pub val: f64,
    pub sum: f64,
    pub count: usize,
    pub avg: f64,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `val` observed `n` times (e.g. a batch mean over `n` samples).
    pub fn update(&mut self, val: f64, n: usize) {
        self.val = val;
        self.sum += val * n as f64;
        self.count += n;
        if self.count > 0 {
            self.avg = self.sum / self.count as f64;
        }
    }
}
