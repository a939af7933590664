use std::ops::RangeInclusive;

use rand::Rng;

use super::ModelHandle;
use crate::pipeline::{ClassLabelMap, InferenceError, PredictionResult, PreprocessedBatch};

const DEMO_CONFIDENCE: RangeInclusive<f32> = 0.75..=0.99;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub result: PredictionResult,
    pub demo_mode: bool,
}

/// Scores preprocessed batches against the bound model, or fabricates a flagged demo answer.
pub struct Classifier {
    handle: ModelHandle,
    labels: ClassLabelMap,
    input_size: u32,
}

impl Classifier {
    pub fn new(handle: ModelHandle, labels: ClassLabelMap, input_size: u32) -> Self {
        Self {
            handle,
            labels,
            input_size,
        }
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    pub fn labels(&self) -> &ClassLabelMap {
        &self.labels
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn classify(&self, batch: &PreprocessedBatch) -> Result<Prediction, InferenceError> {
        match &self.handle {
            ModelHandle::Loaded(model) => {
                let scores = model.score(batch)?;
                let result = model.head().interpret(&scores, &self.labels)?;
                Ok(Prediction {
                    result,
                    demo_mode: false,
                })
            }
            ModelHandle::Absent => Ok(Prediction {
                result: self.demo_prediction()?,
                demo_mode: true,
            }),
        }
    }

    fn demo_prediction(&self) -> Result<PredictionResult, InferenceError> {
        let mut rng = rand::rng();
        let index = if rng.random_bool(0.5) {
            ClassLabelMap::POSITIVE
        } else {
            ClassLabelMap::NEGATIVE
        };
        let label = self
            .labels
            .get(index)
            .ok_or(InferenceError::MissingLabel(index))?;
        Ok(PredictionResult {
            label: label.to_string(),
            confidence: rng.random_range(DEMO_CONFIDENCE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelDescription, ScoringModel};
    use crate::pipeline::decode::decode_image;
    use crate::pipeline::preprocess;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Arc;

    struct Fixed(Vec<f32>);

    impl ScoringModel for Fixed {
        fn forward(&self, _batch: &PreprocessedBatch) -> Result<Vec<f32>, InferenceError> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> ModelDescription {
            ModelDescription {
                runtime: "fixed",
                input_shape: vec![1, 8, 8, 3],
                output_shape: Some(vec![1, self.0.len()]),
            }
        }
    }

    struct Failing;

    impl ScoringModel for Failing {
        fn forward(&self, _batch: &PreprocessedBatch) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::Runtime("device lost".to_string()))
        }

        fn describe(&self) -> ModelDescription {
            ModelDescription {
                runtime: "failing",
                input_shape: vec![1, 8, 8, 3],
                output_shape: None,
            }
        }
    }

    fn batch() -> PreprocessedBatch {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        preprocess(&decode_image(&out.into_inner()).unwrap(), 8)
    }

    fn with_model(model: impl ScoringModel + 'static) -> Classifier {
        let handle = ModelHandle::loaded(Arc::new(model)).unwrap();
        Classifier::new(handle, ClassLabelMap::default(), 8)
    }

    #[test]
    fn demo_mode_is_flagged_and_bounded() {
        let classifier = Classifier::new(ModelHandle::Absent, ClassLabelMap::default(), 8);
        let batch = batch();
        for _ in 0..200 {
            let p = classifier.classify(&batch).unwrap();
            assert!(p.demo_mode);
            assert!(p.result.label == "Good" || p.result.label == "Bad");
            assert!(DEMO_CONFIDENCE.contains(&p.result.confidence));
        }
    }

    #[test]
    fn sigmoid_model_reports_chosen_label_probability() {
        let p = with_model(Fixed(vec![0.1])).classify(&batch()).unwrap();
        assert!(!p.demo_mode);
        assert_eq!(p.result.label, "Bad");
        assert!((p.result.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn softmax_model_uses_label_map() {
        let p = with_model(Fixed(vec![0.2, 0.8])).classify(&batch()).unwrap();
        assert_eq!(p.result.label, "Good");
        assert!((p.result.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn runtime_failures_surface_as_inference_errors() {
        let err = with_model(Failing).classify(&batch()).unwrap_err();
        assert!(matches!(err, InferenceError::Runtime(_)));
    }
}
