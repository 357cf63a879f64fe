use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage};
use std::path::Path;

/// Model input, `[1][H][W][3]` RGB in `[0, 1]`, stored row-major.
#[derive(Debug, Clone)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImageTensor {
    pub fn blank(width: u32, height: u32) -> Self {
        Self { width, height, data: vec![0.0; (width * height * 3) as usize] }
    }

    pub fn shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let base = ((y * self.width + x) * 3) as usize;
        [self.data[base], self.data[base + 1], self.data[base + 2]]
    }
}

pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    image::open(path).with_context(|| format!("decode image {}", path.display()))
}

pub fn preprocess(img: &DynamicImage, width: u32, height: u32) -> ImageTensor {
    let rgb = img.to_rgb8();
    let resized = image::imageops::resize(&rgb, width, height, FilterType::Triangle);
    let data = resized.as_raw().iter().map(|v| *v as f32 / 255.0).collect();
    ImageTensor { width, height, data }
}
