use crate::pipeline::PublishedPose;
use crate::pose::{KeypointName, Normalized, Pose};

/// 骨格の接続定義 (開始キーポイント, 終了キーポイント)
pub const SKELETON_CONNECTIONS: [(KeypointName, KeypointName); 16] = [
    // 顔
    (KeypointName::Nose, KeypointName::LeftEye),
    (KeypointName::LeftEye, KeypointName::LeftEar),
    (KeypointName::Nose, KeypointName::RightEye),
    (KeypointName::RightEye, KeypointName::RightEar),
    // 上半身
    (KeypointName::LeftShoulder, KeypointName::RightShoulder),
    (KeypointName::LeftShoulder, KeypointName::LeftElbow),
    (KeypointName::LeftElbow, KeypointName::LeftWrist),
    (KeypointName::RightShoulder, KeypointName::RightElbow),
    (KeypointName::RightElbow, KeypointName::RightWrist),
    // 左半身
    (KeypointName::LeftShoulder, KeypointName::LeftHip),
    (KeypointName::LeftHip, KeypointName::LeftKnee),
    (KeypointName::LeftKnee, KeypointName::LeftAnkle),
    // 右半身
    (KeypointName::RightShoulder, KeypointName::RightHip),
    (KeypointName::RightHip, KeypointName::RightKnee),
    (KeypointName::RightKnee, KeypointName::RightAnkle),
    // 腰
    (KeypointName::LeftHip, KeypointName::RightHip),
];

/// この値を超えたものだけ描画する
pub const CONFIDENCE_THRESHOLD: f32 = 0.4;

/// 左半身のキーポイントの色 (RGB)
pub const LEFT_JOINT_COLOR: u32 = 0x008000; // 緑

/// それ以外のキーポイントの色 (RGB)
pub const JOINT_COLOR: u32 = 0xFFFF00; // 黄色

/// 骨格線と関節の縁取りの色 (RGB)
pub const SKELETON_COLOR: u32 = 0xFFFFFF; // 白

/// 描画先。座標はピクセル、色は 0xRRGGBB。
pub trait Canvas {
    fn clear(&mut self);
    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: u32, width: f32);
    /// 塗りつぶした円に縁取りを付ける
    fn circle(&mut self, center: (f32, f32), radius: f32, fill: u32, outline: u32, outline_width: f32);
}

/// 線と関節の寸法。信頼度の閾値は固定で、ここには含めない。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub joint_radius: f32,
    pub line_width: f32,
    pub outline_width: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            joint_radius: 5.0,
            line_width: 2.0,
            outline_width: 1.0,
        }
    }
}

pub fn joint_color(name: KeypointName) -> u32 {
    if name.is_left() {
        LEFT_JOINT_COLOR
    } else {
        JOINT_COLOR
    }
}

/// 最新の姿勢を毎回クリアしてから描き直す
#[derive(Debug, Default)]
pub struct SkeletonRenderer {
    style: RenderStyle,
    /// 最後に描いた (version, width, height)
    last: Option<(u64, u32, u32)>,
}

impl SkeletonRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self { style, last: None }
    }

    /// 姿勢のバージョンか描画サイズが前回から変わったか
    pub fn needs_redraw(&self, version: u64, width: u32, height: u32) -> bool {
        self.last != Some((version, width, height))
    }

    /// 公開中の姿勢が変わっていれば描き直す。描いたら true。
    pub fn render_published(&mut self, canvas: &mut dyn Canvas, published: &PublishedPose, width: u32, height: u32) -> bool {
        let (version, pose) = published.snapshot();
        if !self.needs_redraw(version, width, height) {
            return false;
        }
        self.render(canvas, pose.as_ref(), width, height);
        self.last = Some((version, width, height));
        true
    }

    /// 正規化座標 × 描画サイズで描く
    pub fn render(&self, canvas: &mut dyn Canvas, pose: Option<&Pose<Normalized>>, width: u32, height: u32) {
        canvas.clear();
        let Some(pose) = pose else {
            return;
        };

        let threshold = CONFIDENCE_THRESHOLD;
        let w = width as f32;
        let h = height as f32;

        // 骨格線を描画
        for (start, end) in SKELETON_CONNECTIONS.iter() {
            let (Some(a), Some(b)) = (pose.get(*start), pose.get(*end)) else {
                continue;
            };
            if a.exceeds(threshold) && b.exceeds(threshold) {
                canvas.line(
                    (a.x * w, a.y * h),
                    (b.x * w, b.y * h),
                    SKELETON_COLOR,
                    self.style.line_width,
                );
            }
        }

        // キーポイントを描画
        for kp in pose.keypoints().iter().filter(|kp| kp.exceeds(threshold)) {
            canvas.circle(
                (kp.x * w, kp.y * h),
                self.style.joint_radius,
                joint_color(kp.name),
                SKELETON_COLOR,
                self.style.outline_width,
            );
        }
    }
}
