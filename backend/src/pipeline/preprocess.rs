use image::imageops::FilterType;
use ndarray::Array4;

use super::decode::DecodedImage;

/// Single-item NHWC batch, values in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct PreprocessedBatch {
    data: Array4<f32>,
}

impl PreprocessedBatch {
    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    #[cfg(test)]
    pub fn view(&self) -> ndarray::ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Row-major copy, the layout every runtime expects for `[1, S, S, 3]`.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

/// Stretches to `side`x`side` with Lanczos3 (not aspect preserving), forces RGB, scales to `[0, 1]`.
pub fn preprocess(image: &DecodedImage, side: u32) -> PreprocessedBatch {
    let rgb = image
        .image()
        .resize_exact(side, side, FilterType::Lanczos3)
        .to_rgb8();
    let s = side as usize;
    let data = Array4::from_shape_fn((1, s, s, 3), |(_, y, x, c)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });
    PreprocessedBatch { data }
}
