use super::keypoint::{Keypoint, ModelSpace, Normalized, Pose};

/// モデル入力空間 (input_resolution × input_resolution) の姿勢を
/// ソース映像のアスペクトに戻し、[0,1] に正規化する。
///
/// 縦横それぞれ独立した比率でスケールしてからソース寸法で割る。
/// 名前・スコア・順序はそのまま。
pub fn normalize(
    pose: &Pose<ModelSpace>,
    input_resolution: u32,
    source_width: u32,
    source_height: u32,
) -> Pose<Normalized> {
    let input = input_resolution as f32;
    let sw = source_width as f32;
    let sh = source_height as f32;
    let width_ratio = sw / input;
    let height_ratio = sh / input;

    Pose::new(pose.keypoints().iter().map(|kp| {
        Keypoint::new(
            kp.name,
            (kp.x * width_ratio) / sw,
            (kp.y * height_ratio) / sh,
            kp.score,
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::keypoint::KeypointName;
    use assert_approx_eq::assert_approx_eq;

    fn model_pose() -> Pose<ModelSpace> {
        Pose::new([
            Keypoint::new(KeypointName::RightAnkle, 180.0, 12.5, 0.2),
            Keypoint::new(KeypointName::Nose, 96.0, 48.0, 0.9),
            Keypoint::new(KeypointName::LeftHip, 0.0, 191.0, 0.55),
        ])
    }

    #[test]
    fn test_matches_scale_then_normalize() {
        let pose = model_pose();
        let (sw, sh) = (640u32, 320u32);
        let out = normalize(&pose, 192, sw, sh);

        let wr = sw as f32 / 192.0;
        let hr = sh as f32 / 192.0;
        for (src, dst) in pose.keypoints().iter().zip(out.keypoints()) {
            assert_eq!(dst.x, (src.x * wr) / sw as f32);
            assert_eq!(dst.y, (src.y * hr) / sh as f32);
        }
    }

    #[test]
    fn test_result_is_fraction_of_input_resolution() {
        let out = normalize(&model_pose(), 192, 1280, 720);
        let nose = out.get(KeypointName::Nose).copied().unwrap();
        assert_approx_eq!(nose.x, 0.5, 1e-6);
        assert_approx_eq!(nose.y, 0.25, 1e-6);
    }

    #[test]
    fn test_identity_ratio_divides_by_source() {
        let out = normalize(&model_pose(), 192, 192, 192);
        for (src, dst) in model_pose().keypoints().iter().zip(out.keypoints()) {
            assert_approx_eq!(dst.x, src.x / 192.0, 1e-6);
            assert_approx_eq!(dst.y, src.y / 192.0, 1e-6);
        }
    }

    #[test]
    fn test_preserves_name_score_and_order() {
        let pose = model_pose();
        let out = normalize(&pose, 192, 640, 480);
        assert_eq!(out.len(), pose.len());
        for (src, dst) in pose.keypoints().iter().zip(out.keypoints()) {
            assert_eq!(src.name, dst.name);
            assert_eq!(src.score, dst.score);
        }
    }

    #[test]
    fn test_empty_pose() {
        let out = normalize(&Pose::new([]), 192, 640, 480);
        assert!(out.is_empty());
    }
}
