use crate::processing::post::TransformParams;
use common::span;
use image::{DynamicImage, ImageBuffer, Rgb, imageops::FilterType};
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;

pub struct PreProcessor {
    pub input_size: u32,
}

impl PreProcessor {
    pub fn new(input_size: u32) -> Self {
        Self { input_size }
    }

    /// Letterbox `image` into a square `input_size` canvas and lay it out as a
    /// `[1, 3, H, W]` tensor scaled to [0, 1].
    ///
    /// The returned transform maps model coordinates back onto `image`.
    pub fn preprocess(
        &self,
        image: &DynamicImage,
    ) -> anyhow::Result<(Array<f32, IxDyn>, TransformParams)> {
        let _s = span!("preprocess_image");

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        if width == 0 || height == 0 {
            anyhow::bail!("Image has no pixels ({}x{})", width, height);
        }

        tracing::trace!(width, height, input_size = self.input_size, "Preprocessing image");

        let size = self.input_size;
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);

        let resized = image::imageops::resize(&rgb, new_width, new_height, FilterType::Triangle);

        let mut letterboxed = ImageBuffer::from_pixel(
            size,
            size,
            Rgb([LETTERBOX_COLOR, LETTERBOX_COLOR, LETTERBOX_COLOR]),
        );
        let offset_x = (size - new_width) / 2;
        let offset_y = (size - new_height) / 2;
        image::imageops::overlay(&mut letterboxed, &resized, offset_x as i64, offset_y as i64);

        let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
        for (x, y, pixel) in letterboxed.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }

        let transform = TransformParams {
            orig_width: width,
            orig_height: height,
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        };

        Ok((input, transform))
    }
}
