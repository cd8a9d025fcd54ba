//! L2-regularized logistic regression over standardized features.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use research_core::{FeatureVector, LabeledRow, PipelineError, PipelineResult, ProbabilityModel};

use crate::error::{MLError, MLResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    pub learning_rate: f64,
    /// L2 penalty on the coefficients (not the intercept).
    pub l2: f64,
    pub max_iter: usize,
    /// Stop when the penalized log loss improves by less than this.
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            l2: 0.01,
            max_iter: 500,
            tolerance: 1e-7,
        }
    }
}

impl LogisticParams {
    pub fn validate(&self) -> MLResult<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(MLError::InvalidParams(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.l2 >= 0.0 && self.l2.is_finite()) {
            return Err(MLError::InvalidParams(format!("l2 must be >= 0, got {}", self.l2)));
        }
        if self.max_iter == 0 {
            return Err(MLError::InvalidParams("max_iter must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Small hyperparameter grid used when the caller does not supply one.
pub fn default_grid() -> Vec<LogisticParams> {
    let mut grid = Vec::new();
    for &l2 in &[0.0, 0.01, 0.1] {
        for &learning_rate in &[0.05, 0.2] {
            grid.push(LogisticParams {
                learning_rate,
                l2,
                ..LogisticParams::default()
            });
        }
    }
    grid
}

/// A fitted model. Standardization statistics come from the training rows
/// only and travel with the coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    feature_names: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
    coefficients: Vec<f64>,
    intercept: f64,
    params: LogisticParams,
    iterations: usize,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let exp_z = z.exp();
        exp_z / (1.0 + exp_z)
    }
}

fn log_loss(y: &Array1<f64>, p: &Array1<f64>) -> f64 {
    let eps = 1e-15;
    let n = y.len() as f64;
    -y.iter()
        .zip(p.iter())
        .map(|(&y, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            y * p.ln() + (1.0 - y) * (1.0 - p).ln()
        })
        .sum::<f64>()
        / n
}

fn extract(features: &FeatureVector, names: &[String]) -> PipelineResult<Vec<f64>> {
    names
        .iter()
        .map(|name| {
            features
                .get(name)
                .copied()
                .ok_or_else(|| PipelineError::MissingInput(format!("feature '{}'", name)))
        })
        .collect()
}

impl LogisticRegression {
    /// Fit by batch gradient descent.
    pub fn fit(rows: &[&LabeledRow], feature_names: &[String], params: &LogisticParams) -> MLResult<Self> {
        params.validate()?;
        if rows.is_empty() {
            return Err(PipelineError::EmptyData("no training rows".to_string()).into());
        }
        if feature_names.is_empty() {
            return Err(MLError::DimensionMismatch { expected: 1, got: 0 });
        }
        let positives = rows.iter().filter(|r| r.target).count();
        if positives == 0 || positives == rows.len() {
            return Err(MLError::SingleClass);
        }

        let n = rows.len();
        let d = feature_names.len();
        let mut raw = Array2::<f64>::zeros((n, d));
        for (i, row) in rows.iter().enumerate() {
            let values = extract(&row.row.features, feature_names)?;
            for (j, v) in values.into_iter().enumerate() {
                raw[[i, j]] = v;
            }
        }

        let means = raw.mean_axis(Axis(0)).ok_or(MLError::NotFitted)?;
        let scales = raw
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let x = (&raw - &means) / &scales;
        let y: Array1<f64> = rows.iter().map(|r| if r.target { 1.0 } else { 0.0 }).collect();

        let mut weights = Array1::<f64>::zeros(d);
        let mut bias = 0.0;
        let mut prev_loss = f64::INFINITY;
        let mut iterations = 0;

        for iter in 0..params.max_iter {
            iterations = iter + 1;
            let predictions = (x.dot(&weights) + bias).mapv(sigmoid);
            let errors = &predictions - &y;
            let dw = x.t().dot(&errors) / n as f64 + &weights * params.l2;
            let db = errors.sum() / n as f64;

            weights = &weights - &(dw * params.learning_rate);
            bias -= params.learning_rate * db;

            let loss = log_loss(&y, &predictions) + 0.5 * params.l2 * weights.dot(&weights);
            if (prev_loss - loss).abs() < params.tolerance {
                break;
            }
            prev_loss = loss;
        }

        tracing::debug!("Logistic fit: {} rows, {} features, {} iterations", n, d, iterations);

        Ok(Self {
            feature_names: feature_names.to_vec(),
            means: means.to_vec(),
            scales: scales.to_vec(),
            coefficients: weights.to_vec(),
            intercept: bias,
            params: *params,
            iterations,
        })
    }

    pub fn params(&self) -> &LogisticParams {
        &self.params
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl ProbabilityModel for LogisticRegression {
    fn predict_proba(&self, features: &FeatureVector) -> PipelineResult<f64> {
        let values = extract(features, &self.feature_names)?;
        let z = values
            .iter()
            .zip(self.means.iter().zip(self.scales.iter()))
            .zip(self.coefficients.iter())
            .map(|((v, (m, s)), w)| (v - m) / s * w)
            .sum::<f64>()
            + self.intercept;
        Ok(sigmoid(z))
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn name(&self) -> &str {
        "logistic_regression"
    }
}
