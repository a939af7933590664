pub mod decode;
pub mod labels;
pub mod preprocess;
pub mod result;

pub use decode::{DecodeError, DecodedImage, RawImageInput};
pub use labels::{ClassLabelMap, LabelMapError};
pub use preprocess::{PreprocessedBatch, preprocess};
pub use result::{InferenceError, OutputHead, PredictionResult};
