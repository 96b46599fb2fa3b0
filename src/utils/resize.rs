/// RGB缩放 (fast_image_resize, 失败时回落到 image::imageops)
use fast_image_resize as fr;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::warn;

/// 插值方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// 双线性 (放大)
    Linear,
    /// 区域平均 (缩小)
    Area,
}

impl Interpolation {
    /// 缩小用区域平均, 放大用双线性
    pub fn for_scale(src_w: u32, dst_w: u32) -> Self {
        if dst_w < src_w {
            Interpolation::Area
        } else {
            Interpolation::Linear
        }
    }

    fn resize_alg(self) -> fr::ResizeAlg {
        match self {
            Interpolation::Linear => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
            Interpolation::Area => fr::ResizeAlg::Convolution(fr::FilterType::Box),
        }
    }
}

/// 缩放到 width x height (尺寸至少为1)
pub fn resize_rgb(src: &RgbImage, width: u32, height: u32, interp: Interpolation) -> RgbImage {
    let (width, height) = (width.max(1), height.max(1));
    if src.dimensions() == (width, height) {
        return src.clone();
    }
    if src.width() == 0 || src.height() == 0 {
        return RgbImage::new(width, height);
    }

    match resize_fast(src, width, height, interp) {
        Ok(image) => image,
        Err(e) => {
            warn!("⚠️ 快速缩放失败, 改用 imageops: {}", e);
            imageops::resize(src, width, height, FilterType::Triangle)
        }
    }
}

fn resize_fast(
    src: &RgbImage,
    width: u32,
    height: u32,
    interp: Interpolation,
) -> Result<RgbImage, String> {
    let src_image = fr::images::Image::from_vec_u8(
        src.width(),
        src.height(),
        src.as_raw().clone(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| e.to_string())?;
    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new().resize_alg(interp.resize_alg()),
        )
        .map_err(|e| e.to_string())?;

    RgbImage::from_raw(width, height, dst_image.buffer().to_vec())
        .ok_or_else(|| "buffer size mismatch".to_string())
}
