use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::{ArrayView4, ArrayViewD};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::keypoint::{Keypoint, KeypointName, ModelSpace, Pose};
use crate::device::Backend;

/// この平均スコア未満なら「人物なし」として扱う
pub const MIN_POSE_SCORE: f32 = 0.25;

const INPUT_NAME: &str = "serving_default_input_0";
const OUTPUT_NAME: &str = "StatefulPartitionedCall_0";

/// 読み込み済みの姿勢推定モデル
///
/// drop でモデル資源を解放する。
pub trait PoseModel: Send {
    /// [1, size, size, 3] の入力で 1 回推論する。
    /// 座標は入力ピクセル空間。人物が見つからなければ None。
    fn estimate(&mut self, input: ArrayView4<'_, f32>) -> Result<Option<Pose<ModelSpace>>>;
}

/// モデルを構築する。構築はセッションごとに高々 1 回。
pub trait ModelLoader: Send {
    fn load(&self, backend: Backend, input_size: u32) -> Result<Box<dyn PoseModel>>;
}

/// MoveNet SinglePose Lightning (ONNX)
pub struct MoveNet {
    session: Session,
    input_size: u32,
}

impl MoveNet {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P, backend: Backend, input_size: u32) -> Result<Self> {
        let session = build_session(model_path.as_ref(), backend)?;
        Ok(Self { session, input_size })
    }
}

fn build_session(model_path: &Path, backend: Backend) -> Result<Session> {
    let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "cuda")]
    let builder = if backend == Backend::Gpu {
        info!("attempting CUDA execution provider");
        builder.with_execution_providers([ort::execution_providers::CUDAExecutionProvider::default().build()])?
    } else {
        builder
    };

    #[cfg(not(feature = "cuda"))]
    if backend == Backend::Gpu {
        info!("built without `cuda`, running MoveNet on the CPU provider");
    }

    builder
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))
}

impl PoseModel for MoveNet {
    fn estimate(&mut self, input: ArrayView4<'_, f32>) -> Result<Option<Pose<ModelSpace>>> {
        let input_tensor = Tensor::from_array(input.to_owned())?;
        let outputs = self
            .session
            .run(ort::inputs![INPUT_NAME => input_tensor])
            .context("Inference failed")?;

        let output: ArrayViewD<f32> = outputs[OUTPUT_NAME]
            .try_extract_array()
            .context("Failed to extract output tensor")?;

        decode_movenet(output, self.input_size)
    }
}

impl Drop for MoveNet {
    fn drop(&mut self) {
        debug!("MoveNet session released");
    }
}

/// MoveNet の出力 [1, 1, 17, 3] (y, x, confidence; 0〜1) を
/// 入力ピクセル空間のキーポイントに変換
pub fn decode_movenet(output: ArrayViewD<'_, f32>, input_size: u32) -> Result<Option<Pose<ModelSpace>>> {
    anyhow::ensure!(
        output.shape() == [1, 1, KeypointName::COUNT, 3].as_slice(),
        "unexpected MoveNet output shape {:?}",
        output.shape()
    );

    let size = input_size as f32;
    let pose = Pose::new(KeypointName::ALL.iter().map(|&name| {
        let i = name as usize;
        let y = output[[0, 0, i, 0]];
        let x = output[[0, 0, i, 1]];
        let score = output[[0, 0, i, 2]];
        Keypoint::new(name, x * size, y * size, score)
    }));

    if pose.average_confidence() < MIN_POSE_SCORE {
        return Ok(None);
    }
    Ok(Some(pose))
}

/// ファイルから MoveNet を読み込むローダー
#[derive(Debug, Clone)]
pub struct MoveNetLoader {
    model_path: PathBuf,
}

impl MoveNetLoader {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }
}

impl ModelLoader for MoveNetLoader {
    fn load(&self, backend: Backend, input_size: u32) -> Result<Box<dyn PoseModel>> {
        info!(path = %self.model_path.display(), backend = backend.as_str(), "loading MoveNet");
        Ok(Box::new(MoveNet::new(&self.model_path, backend, input_size)?))
    }
}
