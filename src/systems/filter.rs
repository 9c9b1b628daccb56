//! 画面增强 (夜视模式)

use image::{imageops, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;

/// 帧滤镜接口, 在检测之前作用于整帧
pub trait FrameFilter: Send {
    fn apply(&mut self, image: &RgbImage) -> RgbImage;
}

/// 直通滤镜
#[derive(Debug, Default)]
pub struct Passthrough;

impl FrameFilter for Passthrough {
    fn apply(&mut self, image: &RgbImage) -> RgbImage {
        image.clone()
    }
}

/// 夜视: 亮度直方图均衡 + 绿色调
#[derive(Debug, Default)]
pub struct NightVision;

impl FrameFilter for NightVision {
    fn apply(&mut self, image: &RgbImage) -> RgbImage {
        let luma = imageops::grayscale(image);
        let equalized = equalize_histogram(&luma);

        let mut out = RgbImage::new(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            let delta = equalized.get_pixel(x, y)[0] as f32 - luma.get_pixel(x, y)[0] as f32;
            let [r, g, b] = pixel.0.map(|c| (c as f32 + delta).clamp(0.0, 255.0));
            out.put_pixel(
                x,
                y,
                Rgb([
                    (r * 0.3) as u8,
                    (g * 1.3).min(255.0) as u8,
                    (b * 0.3) as u8,
                ]),
            );
        }
        out
    }
}
