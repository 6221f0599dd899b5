//! Classifier output: per-label probabilities and the verdict shown to users.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::labels::LabelMap;

/// Probabilities are rounded to this many decimals for presentation.
const PRECISION: f32 = 1000.0;

/// Label → probability mapping for a single image, in class-index order.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    scores: Vec<(String, f32)>,
}

impl Prediction {
    /// Pairs softmax probabilities with their labels, rounding each to 3 decimals.
    ///
    /// `probs` must have one entry per label.
    pub(crate) fn from_probabilities(labels: &LabelMap, probs: &[f32]) -> Self {
        let scores = labels
            .iter()
            .zip(probs)
            .map(|(label, p)| (label.to_string(), round(*p)))
            .collect();
        Self { scores }
    }

    /// Probability for `label`, if the label exists.
    pub fn get(&self, label: &str) -> Option<f32> {
        self.scores
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.scores.iter().map(|(l, p)| (l.as_str(), *p))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.scores.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn total(&self) -> f32 {
        self.scores.iter().map(|(_, p)| p).sum()
    }
}

fn round(p: f32) -> f32 {
    (p * PRECISION).round() / PRECISION
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (label, p)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            // Debug keeps the decimal point on whole numbers: 1.0, not 1.
            write!(f, "\"{label}\": {p:?}")?;
        }
        write!(f, "}}")
    }
}

impl Serialize for Prediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.scores.len()))?;
        for (label, p) in &self.scores {
            map.serialize_entry(label, p)?;
        }
        map.end()
    }
}

/// Human-readable reading of a fake/real prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Real { confidence: f32 },
    Fake { confidence: f32 },
}

impl Verdict {
    /// Real only when its score is strictly higher; missing labels score 0.
    pub fn from_prediction(prediction: &Prediction) -> Self {
        let fake = prediction.get("fake").unwrap_or(0.0);
        let real = prediction.get("real").unwrap_or(0.0);
        if real > fake {
            Verdict::Real { confidence: real }
        } else {
            Verdict::Fake { confidence: fake }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Real { confidence } => write!(
                f,
                "✓ CLASSIFIED AS REAL (confidence: {:.1}%)",
                confidence * 100.0
            ),
            Verdict::Fake { confidence } => write!(
                f,
                "⚠ CLASSIFIED AS FAKE (confidence: {:.1}%)",
                confidence * 100.0
            ),
        }
    }
}
