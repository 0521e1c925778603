//! Logistic regression trainer.
//!
//! Features are standardized per column (a zero spread is replaced by 1),
//! then weights are fitted by full-batch gradient descent on log-loss.
//! Pure and synchronous; callers run it on the blocking pool.

use integrisense_core::reading::FEATURE_COUNT;

use crate::error::TrainingError;
use crate::model::{sigmoid, Features, LogisticModel, Normalization};
use crate::source::TrainingSet;

/// Fewest samples a model is trained on.
pub const MIN_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub epochs: usize,
    pub learning_rate: f64,
    /// L2 penalty on the weights (not the bias).
    pub l2: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 500,
            learning_rate: 0.1,
            l2: 0.001,
        }
    }
}

/// Output of a successful training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainedModel {
    pub model: LogisticModel,
    pub normalization: Normalization,
    /// Mean log-loss on the training data after the last epoch.
    pub loss: f64,
}

pub fn train(set: &TrainingSet, params: &TrainingParams) -> Result<TrainedModel, TrainingError> {
    validate(set)?;

    let normalization = fit_normalization(&set.features);
    let scaled: Vec<Features> = set
        .features
        .iter()
        .map(|row| standardize(row, &normalization))
        .collect();
    let targets: Vec<f64> = set.labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();

    let n = scaled.len() as f64;
    let mut weights = [0.0; FEATURE_COUNT];
    let mut bias = 0.0;

    for _ in 0..params.epochs {
        let mut grad_w = [0.0; FEATURE_COUNT];
        let mut grad_b = 0.0;

        for (row, &y) in scaled.iter().zip(&targets) {
            let err = sigmoid(dot(&weights, row) + bias) - y;
            for i in 0..FEATURE_COUNT {
                grad_w[i] += err * row[i];
            }
            grad_b += err;
        }

        for i in 0..FEATURE_COUNT {
            weights[i] -= params.learning_rate * (grad_w[i] / n + params.l2 * weights[i]);
        }
        bias -= params.learning_rate * grad_b / n;
    }

    let model = LogisticModel::new(weights, bias);
    let loss = log_loss(&model, &scaled, &targets);
    if !loss.is_finite() || !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
        return Err(TrainingError::Diverged);
    }

    Ok(TrainedModel {
        model,
        normalization,
        loss,
    })
}

fn validate(set: &TrainingSet) -> Result<(), TrainingError> {
    if set.features.len() != set.labels.len() {
        return Err(TrainingError::LengthMismatch {
            rows: set.features.len(),
            labels: set.labels.len(),
        });
    }
    if set.features.len() < MIN_SAMPLES {
        return Err(TrainingError::InsufficientSamples {
            required: MIN_SAMPLES,
            actual: set.features.len(),
        });
    }
    if set.features.iter().flatten().any(|v| !v.is_finite()) {
        return Err(TrainingError::NonFinite);
    }
    let positives = set.labels.iter().filter(|&&l| l).count();
    if positives == 0 || positives == set.labels.len() {
        return Err(TrainingError::SingleClass);
    }
    Ok(())
}

fn fit_normalization(rows: &[Features]) -> Normalization {
    let n = rows.len() as f64;
    let mut mean = [0.0; FEATURE_COUNT];
    let mut std = [0.0; FEATURE_COUNT];

    for row in rows {
        for i in 0..FEATURE_COUNT {
            mean[i] += row[i] / n;
        }
    }
    for row in rows {
        for i in 0..FEATURE_COUNT {
            std[i] += (row[i] - mean[i]).powi(2) / n;
        }
    }
    for s in &mut std {
        *s = s.sqrt();
        if *s == 0.0 {
            *s = 1.0;
        }
    }

    Normalization { mean, std }
}

fn standardize(row: &Features, norm: &Normalization) -> Features {
    let mut out = [0.0; FEATURE_COUNT];
    for i in 0..FEATURE_COUNT {
        out[i] = (row[i] - norm.mean[i]) / norm.std[i];
    }
    out
}

fn dot(a: &Features, b: &Features) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn log_loss(model: &LogisticModel, rows: &[Features], targets: &[f64]) -> f64 {
    const EPS: f64 = 1e-12;
    let total: f64 = rows
        .iter()
        .zip(targets)
        .map(|(row, &y)| {
            let p = sigmoid(model.logit(row)).clamp(EPS, 1.0 - EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / rows.len() as f64
}
