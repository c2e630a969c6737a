//! Pre-trained gesture classifier
//!
//! The model artifact is a JSON document tagged by `kind`. It is loaded once
//! at start-up and never mutated, so one instance is shared by every worker.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{FeatureVector, FEATURE_LEN};

/// Gesture label produced by the classifier
pub type Label = String;

/// Errors loading the classifier artifact. All of them are fatal at start-up.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Classifier model not found: {0}")]
    NotFound(String),
    #[error("Failed to read classifier model: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse classifier model: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Incompatible classifier model: {0}")]
    Incompatible(String),
}

/// Maps a feature vector to a label
pub trait GestureClassifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Label;
}

/// Serialized classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    /// One decision function per class (or a single row for two classes)
    Linear {
        labels: Vec<String>,
        coefficients: Vec<Vec<f32>>,
        intercepts: Vec<f32>,
    },
    /// Majority vote over the k closest training samples
    NearestNeighbors {
        k: usize,
        samples: Vec<Vec<f32>>,
        labels: Vec<String>,
    },
}

impl ClassifierModel {
    /// Load and validate a model file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::NotFound(path.display().to_string()));
        }

        let contents = fs::read_to_string(path)?;
        let model = Self::from_json(&contents)?;

        tracing::info!(
            "Loaded {} classifier from {:?} ({} labels)",
            model.kind(),
            path,
            model.distinct_labels().len()
        );
        Ok(model)
    }

    /// Parse and validate a model from JSON text
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let model: ClassifierModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    fn kind(&self) -> &'static str {
        match self {
            ClassifierModel::Linear { .. } => "linear",
            ClassifierModel::NearestNeighbors { .. } => "nearest-neighbors",
        }
    }

    /// Labels the model can emit, in first-seen order
    pub fn distinct_labels(&self) -> Vec<&str> {
        let labels = match self {
            ClassifierModel::Linear { labels, .. } => labels,
            ClassifierModel::NearestNeighbors { labels, .. } => labels,
        };
        let mut seen: Vec<&str> = Vec::new();
        for label in labels {
            if !seen.contains(&label.as_str()) {
                seen.push(label);
            }
        }
        seen
    }

    fn validate(&self) -> Result<(), ModelError> {
        let check_rows = |rows: &[Vec<f32>], what: &str| -> Result<(), ModelError> {
            match rows.iter().position(|r| r.len() != FEATURE_LEN) {
                Some(i) => Err(ModelError::Incompatible(format!(
                    "{} row {} has {} values, expected {}",
                    what,
                    i,
                    rows[i].len(),
                    FEATURE_LEN
                ))),
                None => Ok(()),
            }
        };

        match self {
            ClassifierModel::Linear {
                labels,
                coefficients,
                intercepts,
            } => {
                check_rows(coefficients, "coefficient")?;
                if coefficients.len() != intercepts.len() {
                    return Err(ModelError::Incompatible(format!(
                        "{} coefficient rows but {} intercepts",
                        coefficients.len(),
                        intercepts.len()
                    )));
                }
                let binary = coefficients.len() == 1 && labels.len() == 2;
                if !binary && (coefficients.len() != labels.len() || labels.len() < 2) {
                    return Err(ModelError::Incompatible(format!(
                        "{} labels for {} decision functions",
                        labels.len(),
                        coefficients.len()
                    )));
                }
            }
            ClassifierModel::NearestNeighbors { k, samples, labels } => {
                check_rows(samples, "sample")?;
                if samples.is_empty() || samples.len() != labels.len() {
                    return Err(ModelError::Incompatible(format!(
                        "{} samples with {} labels",
                        samples.len(),
                        labels.len()
                    )));
                }
                if *k == 0 {
                    return Err(ModelError::Incompatible("k must be at least 1".to_string()));
                }
            }
        }
        Ok(())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl GestureClassifier for ClassifierModel {
    fn predict(&self, features: &FeatureVector) -> Label {
        let x = features.values();
        match self {
            ClassifierModel::Linear {
                labels,
                coefficients,
                intercepts,
            } => {
                if coefficients.len() == 1 && labels.len() == 2 {
                    let score = dot(&coefficients[0], x) + intercepts[0];
                    return if score > 0.0 { labels[1].clone() } else { labels[0].clone() };
                }

                let mut best = 0;
                let mut best_score = f32::NEG_INFINITY;
                for (i, (row, bias)) in coefficients.iter().zip(intercepts).enumerate() {
                    let score = dot(row, x) + bias;
                    if score > best_score {
                        best = i;
                        best_score = score;
                    }
                }
                labels[best].clone()
            }
            ClassifierModel::NearestNeighbors { k, samples, labels } => {
                let mut ranked: Vec<(f32, usize)> = samples
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (squared_distance(s, x), i))
                    .collect();
                ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

                // (label, votes), ordered by the rank of each label's nearest sample
                let mut votes: Vec<(&str, usize)> = Vec::new();
                for &(_, i) in ranked.iter().take(*k) {
                    match votes.iter_mut().find(|(l, _)| *l == labels[i]) {
                        Some(entry) => entry.1 += 1,
                        None => votes.push((labels[i].as_str(), 1)),
                    }
                }

                let mut winner = votes[0];
                for &candidate in &votes[1..] {
                    if candidate.1 > winner.1 {
                        winner = candidate;
                    }
                }
                winner.0.to_string()
            }
        }
    }
}
