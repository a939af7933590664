use std::fmt;

use super::labels::ClassLabelMap;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("unexpected output shape: {0} values per item")]
    UnexpectedOutputShape(usize),
    #[error("model produced a non-finite score")]
    NonFiniteOutput,
    #[error("no label for class index {0}")]
    MissingLabel(usize),
    #[error("model prediction failed: {0}")]
    Runtime(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label: String,
    pub confidence: f32,
}

/// How raw scores are read, fixed once when the model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputHead {
    /// One value: P(positive class).
    Sigmoid,
    /// One probability per class.
    Softmax,
    /// Arity unknown until the first forward pass; dispatch on the length of each output.
    Dynamic,
}

impl fmt::Display for OutputHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputHead::Sigmoid => "sigmoid",
            OutputHead::Softmax => "softmax",
            OutputHead::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

impl OutputHead {
    pub fn from_arity(arity: usize) -> Option<Self> {
        match arity {
            1 => Some(OutputHead::Sigmoid),
            2 => Some(OutputHead::Softmax),
            _ => None,
        }
    }

    pub fn interpret(
        self,
        values: &[f32],
        labels: &ClassLabelMap,
    ) -> Result<PredictionResult, InferenceError> {
        let head = match self {
            OutputHead::Dynamic => OutputHead::from_arity(values.len())
                .ok_or(InferenceError::UnexpectedOutputShape(values.len()))?,
            OutputHead::Sigmoid if values.len() != 1 => {
                return Err(InferenceError::UnexpectedOutputShape(values.len()));
            }
            OutputHead::Softmax if values.len() != 2 => {
                return Err(InferenceError::UnexpectedOutputShape(values.len()));
            }
            resolved => resolved,
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::NonFiniteOutput);
        }

        let (index, confidence) = match head {
            OutputHead::Sigmoid => {
                let p = values[0];
                if p > 0.5 {
                    (ClassLabelMap::POSITIVE, p)
                } else {
                    (ClassLabelMap::NEGATIVE, 1.0 - p)
                }
            }
            _ => argmax(values),
        };
        let label = labels
            .get(index)
            .ok_or(InferenceError::MissingLabel(index))?
            .to_string();

        Ok(PredictionResult {
            label,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }
}

/// First maximum wins on ties.
fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 { (i, v) } else { best }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> ClassLabelMap {
        ClassLabelMap::default()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn sigmoid_high_score_is_good() {
        let r = OutputHead::Sigmoid.interpret(&[0.9], &labels()).unwrap();
        assert_eq!(r.label, "Good");
        assert!(approx(r.confidence, 0.9));
    }

    #[test]
    fn sigmoid_low_score_reports_confidence_of_chosen_label() {
        let r = OutputHead::Sigmoid.interpret(&[0.1], &labels()).unwrap();
        assert_eq!(r.label, "Bad");
        assert!(approx(r.confidence, 0.9));
    }

    #[test]
    fn sigmoid_exact_half_is_bad() {
        let r = OutputHead::Sigmoid.interpret(&[0.5], &labels()).unwrap();
        assert_eq!(r.label, "Bad");
        assert!(approx(r.confidence, 0.5));
    }

    #[test]
    fn softmax_picks_argmax_from_label_map() {
        let map = ClassLabelMap::parse(r#"{"0": "Rotten", "1": "Fresh"}"#).unwrap();
        let r = OutputHead::Softmax.interpret(&[0.2, 0.8], &map).unwrap();
        assert_eq!(r.label, "Fresh");
        assert!(approx(r.confidence, 0.8));
    }

    #[test]
    fn softmax_tie_takes_first_class() {
        let r = OutputHead::Softmax.interpret(&[0.5, 0.5], &labels()).unwrap();
        assert_eq!(r.label, "Bad");
    }

    #[test]
    fn confidence_is_clamped() {
        let r = OutputHead::Sigmoid.interpret(&[1.2], &labels()).unwrap();
        assert_eq!(r.confidence, 1.0);
        let r = OutputHead::Sigmoid.interpret(&[-0.3], &labels()).unwrap();
        assert_eq!(r.label, "Bad");
        assert_eq!(r.confidence, 1.0);
        let r = OutputHead::Softmax.interpret(&[-0.4, -0.1], &labels()).unwrap();
        assert_eq!(r.label, "Good");
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn dynamic_head_dispatches_on_length() {
        let r = OutputHead::Dynamic.interpret(&[0.7], &labels()).unwrap();
        assert_eq!(r.label, "Good");
        let r = OutputHead::Dynamic.interpret(&[0.7, 0.3], &labels()).unwrap();
        assert_eq!(r.label, "Bad");
        assert!(matches!(
            OutputHead::Dynamic.interpret(&[0.1, 0.2, 0.7], &labels()),
            Err(InferenceError::UnexpectedOutputShape(3))
        ));
    }

    #[test]
    fn resolved_head_rejects_mismatched_output() {
        assert!(matches!(
            OutputHead::Sigmoid.interpret(&[0.2, 0.8], &labels()),
            Err(InferenceError::UnexpectedOutputShape(2))
        ));
        assert!(matches!(
            OutputHead::Softmax.interpret(&[], &labels()),
            Err(InferenceError::UnexpectedOutputShape(0))
        ));
    }

    #[test]
    fn nan_scores_are_errors() {
        assert!(matches!(
            OutputHead::Sigmoid.interpret(&[f32::NAN], &labels()),
            Err(InferenceError::NonFiniteOutput)
        ));
    }

    #[test]
    fn arity_resolution() {
        assert_eq!(OutputHead::from_arity(1), Some(OutputHead::Sigmoid));
        assert_eq!(OutputHead::from_arity(2), Some(OutputHead::Softmax));
        assert_eq!(OutputHead::from_arity(5), None);
    }
}
