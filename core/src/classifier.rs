//! Logistic scorer over the named features of a FeatureBag.
//!
//! Weights come from config; training happens offline. A feature with no
//! weight contributes nothing, so one weight table serves all three
//! entity kinds.

use crate::{
    error::{RiskError, RiskResult},
    features::FeatureBag,
    signal::{ClassifierEngine, Prediction},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TOP_EXPLANATIONS: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    pub bias:    f64,
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct LinearClassifier {
    config: ClassifierConfig,
}

impl LinearClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ClassifierEngine for LinearClassifier {
    fn predict(&self, features: &FeatureBag) -> RiskResult<Prediction> {
        let mut z = self.config.bias;
        let mut contributions: Vec<(String, f64)> = Vec::new();

        for (name, value) in features.numeric() {
            let Some(w) = self.config.weights.get(name) else { continue };
            let c = w * value;
            if c != 0.0 {
                contributions.push((name.to_string(), c));
            }
            z += c;
        }

        if !z.is_finite() {
            return Err(RiskError::collaborator(
                "classifier",
                format!("non-finite logit for {} features", features.kind()),
            ));
        }

        let p = sigmoid(z);
        contributions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let explanations = contributions
            .iter()
            .filter(|(_, c)| *c > 0.0)
            .take(TOP_EXPLANATIONS)
            .map(|(name, c)| format!("{name} raised risk (+{c:.2})"))
            .collect();

        Ok(Prediction {
            fraud_probability: p,
            confidence:        ((p - 0.5).abs() * 2.0).clamp(0.0, 1.0),
            feature_weights:   contributions.into_iter().collect(),
            explanations,
        })
    }
}
