use anyhow::{Context, Result};
use fast_image_resize as fr;
use ndarray::Array3;

use crate::camera::Frame;
use crate::device::{TensorId, TensorScope};

/// MoveNet SinglePose Lightning の入力サイズ
pub const MOVENET_INPUT_SIZE: u32 = 192;

/// フレームを MoveNet 用の入力テンソルに変換
///
/// - size x size にバイリニアリサイズ（RGB8 のまま）
/// - f32 (0.0-255.0) の [size, size, 3] テンソル
/// - [1, size, size, 3] に整形
///
/// 途中のテンソルはすべて `scope` が所有する。
pub fn preprocess_for_movenet(scope: &mut TensorScope<'_>, frame: &Frame, size: u32) -> Result<TensorId> {
    anyhow::ensure!(!frame.is_empty(), "cannot preprocess an empty frame");

    let resized = resize_rgb(frame, size)?;
    let side = size as usize;
    let pixels = Array3::from_shape_vec((side, side, 3), resized)
        .context("resized buffer does not match the input size")?
        .mapv(f32::from);

    let pixels = scope.adopt(pixels.into_dyn());
    scope.reshape(pixels, &[1, side, side, 3])
}

/// RGB8 フレームを size x size に縮小（fast_image_resize のバイリニア）
fn resize_rgb(frame: &Frame, size: u32) -> Result<Vec<u8>> {
    let src = fr::images::ImageRef::new(frame.width(), frame.height(), frame.pixels(), fr::PixelType::U8x3)
        .context("failed to create fast_image_resize source")?;
    let mut dst = fr::images::Image::new(size, size, fr::PixelType::U8x3);

    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    fr::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("fast_image_resize MoveNet resize failed")?;

    Ok(dst.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceContext;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_constant_image_stays_constant() {
        let device = DeviceContext::new();
        let frame = Frame::filled(64, 48, [128, 64, 32]);
        device.tidy(|scope| {
            let id = preprocess_for_movenet(scope, &frame, MOVENET_INPUT_SIZE).unwrap();
            let t = scope.get(id);
            assert_approx_eq!(t[[0, 0, 0, 0]], 128.0, 1.0);
            assert_approx_eq!(t[[0, 100, 50, 1]], 64.0, 1.0);
            assert_approx_eq!(t[[0, 191, 191, 2]], 32.0, 1.0);
        });
    }

    #[test]
    fn test_keeps_left_right_layout() {
        // 左半分が黒、右半分が白
        let (w, h) = (80u32, 40u32);
        let pixels: Vec<u8> = (0..w * h)
            .flat_map(|i| {
                let v = if i % w < w / 2 { 0 } else { 255 };
                [v, v, v]
            })
            .collect();
        let frame = Frame::new(w, h, pixels).unwrap();

        let device = DeviceContext::new();
        device.tidy(|scope| {
            let id = preprocess_for_movenet(scope, &frame, MOVENET_INPUT_SIZE).unwrap();
            let t = scope.get(id);
            assert!(t[[0, 96, 10, 0]] < 1.0);
            assert!(t[[0, 96, 180, 0]] > 254.0);
        });
    }

    #[test]
    fn test_preprocess_shape_and_release() {
        let device = DeviceContext::new();
        let frame = Frame::filled(64, 48, [10, 20, 30]);
        let shape = device.tidy(|scope| {
            let id = preprocess_for_movenet(scope, &frame, MOVENET_INPUT_SIZE).unwrap();
            assert!(device.live_bytes() > 0);
            scope.get(id).shape().to_vec()
        });
        assert_eq!(shape, vec![1, 192, 192, 3]);
        assert_eq!(device.live_bytes(), 0);
    }

    #[test]
    fn test_preprocess_rejects_empty_frame() {
        let device = DeviceContext::new();
        let frame = Frame::filled(0, 0, [0, 0, 0]);
        device.tidy(|scope| {
            assert!(preprocess_for_movenet(scope, &frame, MOVENET_INPUT_SIZE).is_err());
        });
    }
}
