use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

/// MoveNet の 17 キーポイント名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointName {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointName {
    pub const COUNT: usize = 17;

    /// モデル出力と同じ順序
    pub const ALL: [KeypointName; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }

    /// 体の左側か（鼻は左右どちらでもない）
    pub fn is_left(self) -> bool {
        matches!(
            self,
            Self::LeftEye
                | Self::LeftEar
                | Self::LeftShoulder
                | Self::LeftElbow
                | Self::LeftWrist
                | Self::LeftHip
                | Self::LeftKnee
                | Self::LeftAnkle
        )
    }
}

impl fmt::Display for KeypointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown keypoint name `{0}`")]
pub struct UnknownKeypoint(pub String);

impl FromStr for KeypointName {
    type Err = UnknownKeypoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownKeypoint(s.to_string()))
    }
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub name: KeypointName,
    pub x: f32,
    pub y: f32,
    /// 信頼度スコア（通常 0.0〜1.0）
    pub score: f32,
}

impl Keypoint {
    pub fn new(name: KeypointName, x: f32, y: f32, score: f32) -> Self {
        Self { name, x, y, score }
    }

    /// 信頼度が閾値を超えているか（閾値ちょうどは含まない）
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.score > threshold
    }
}

/// 推論直後のモデル入力ピクセル空間
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpace;

/// 表示サイズに依存しない [0,1]×[0,1] 空間
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized;

/// 1 回の推論で得られたキーポイント列。`S` は座標空間。
#[derive(Debug, Clone, PartialEq)]
pub struct Pose<S> {
    keypoints: Vec<Keypoint>,
    _space: PhantomData<S>,
}

impl<S> Pose<S> {
    /// 同じ名前が複数ある場合は最初のものだけ残す
    pub fn new(keypoints: impl IntoIterator<Item = Keypoint>) -> Self {
        let mut seen = [false; KeypointName::COUNT];
        let keypoints = keypoints
            .into_iter()
            .filter(|kp| {
                let slot = &mut seen[kp.name as usize];
                if *slot {
                    warn!(name = %kp.name, "duplicate keypoint dropped");
                    return false;
                }
                *slot = true;
                true
            })
            .collect();

        Self {
            keypoints,
            _space: PhantomData,
        }
    }

    pub fn get(&self, name: KeypointName) -> Option<&Keypoint> {
        self.keypoints.iter().find(|kp| kp.name == name)
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// 全キーポイントの平均信頼度
    pub fn average_confidence(&self) -> f32 {
        if self.keypoints.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.keypoints.iter().map(|k| k.score).sum();
        sum / self.keypoints.len() as f32
    }

    /// 名前付きレコード `(name, x, y, score)` から組み立てる。
    /// 語彙にない名前はログに残して捨てる。
    pub fn from_named<'a>(records: impl IntoIterator<Item = (&'a str, f32, f32, f32)>) -> Self {
        Self::new(records.into_iter().filter_map(|(name, x, y, score)| {
            match name.parse::<KeypointName>() {
                Ok(name) => Some(Keypoint::new(name, x, y, score)),
                Err(err) => {
                    warn!(%err, "rejected keypoint");
                    None
                }
            }
        }))
    }
}
