use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use image::{DynamicImage, GenericImageView};

/// Standard alphabet, padding optional.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64 encoding: {0}")]
    InvalidBase64(String),
    #[error("invalid image data: {0}")]
    InvalidImage(String),
    #[error("invalid dimensions: image is {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("not an image: content type {0:?} does not start with image/")]
    NotAnImage(Option<String>),
}

/// Image payload as it arrives on the wire.
#[derive(Debug)]
pub enum RawImageInput {
    Encoded(String),
    Upload {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    #[cfg(test)]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[cfg(test)]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl RawImageInput {
    pub fn decode(self) -> Result<DecodedImage, DecodeError> {
        let bytes = match self {
            RawImageInput::Encoded(encoded) => decode_base64(&encoded)?,
            RawImageInput::Upload {
                bytes,
                content_type,
            } => {
                check_content_type(content_type.as_deref())?;
                bytes
            }
        };
        decode_image(&bytes)
    }
}

/// Rejects uploads whose declared type is missing or not `image/*`.
pub fn check_content_type(content_type: Option<&str>) -> Result<(), DecodeError> {
    match content_type {
        Some(ct) if ct.trim().to_ascii_lowercase().starts_with("image/") => Ok(()),
        other => Err(DecodeError::NotAnImage(other.map(str::to_string))),
    }
}

/// Drops a `data:...,` header if present. The scheme is case-insensitive; a data URI without
/// a comma carries no payload.
pub fn strip_data_uri(input: &str) -> Result<&str, DecodeError> {
    let trimmed = input.trim_start();
    let is_data_uri = trimmed
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"));
    if !is_data_uri {
        return Ok(input);
    }
    trimmed
        .split_once(',')
        .map(|(_, payload)| payload)
        .ok_or_else(|| DecodeError::InvalidBase64("data URI has no payload".to_string()))
}

pub fn decode_base64(input: &str) -> Result<Vec<u8>, DecodeError> {
    let payload = strip_data_uri(input)?;
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_STANDARD
        .decode(compact)
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))
}

pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::InvalidImage("empty payload".to_string()));
    }
    let image =
        image::load_from_memory(bytes).map_err(|e| DecodeError::InvalidImage(e.to_string()))?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    log::debug!("Decoded {}x{} image ({:?})", width, height, image.color());
    Ok(DecodedImage { image })
}
