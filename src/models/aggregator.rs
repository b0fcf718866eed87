//! Probability aggregation for tree ensembles and model outputs

/// Averages per-member class distributions into a single distribution.
///
/// Members vote with their full probability vector, the way a random forest
/// averages the leaf distributions of its trees.
pub struct ProbabilityAggregator {
    n_classes: usize,
}

impl ProbabilityAggregator {
    pub fn new(n_classes: usize) -> Self {
        Self { n_classes }
    }

    /// Mean of the given distributions.
    ///
    /// Returns a uniform distribution when there are no members.
    pub fn aggregate<'a, I>(&self, votes: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let mut sum = vec![0.0; self.n_classes];
        let mut members = 0usize;

        for vote in votes {
            for (acc, p) in sum.iter_mut().zip(vote) {
                *acc += p;
            }
            members += 1;
        }

        if members == 0 {
            return uniform(self.n_classes);
        }

        let scale = members as f64;
        sum.iter_mut().for_each(|v| *v /= scale);
        sum
    }
}

/// Rescale non-negative scores so they sum to 1.
///
/// Returns `None` when the scores are not a usable distribution.
pub fn normalize(scores: &[f64]) -> Option<Vec<f64>> {
    if scores.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return None;
    }
    let total: f64 = scores.iter().sum();
    if total <= 0.0 {
        return None;
    }
    Some(scores.iter().map(|p| p / total).collect())
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Softmax over raw scores, shifted by the maximum for stability.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Logistic function
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn uniform(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}
