use std::sync::Arc;
use std::time::Instant;

use ndarray::Ix4;
use tracing::{debug, info};

use crate::camera::Frame;
use crate::device::{Backend, DeviceContext};
use crate::error::PipelineError;
use crate::pose::detector::{ModelLoader, PoseModel};
use crate::pose::preprocess::preprocess_for_movenet;
use crate::pose::{ModelSpace, Pose};

/// 姿勢推定モデル（遅延構築）を所有し、1 回ずつ推論する
pub struct InferenceEngine<L> {
    loader: L,
    device: Arc<DeviceContext>,
    backend: Backend,
    input_size: u32,
    model: Option<Box<dyn PoseModel>>,
}

impl<L: ModelLoader> InferenceEngine<L> {
    pub fn new(loader: L, device: Arc<DeviceContext>, backend: Backend, input_size: u32) -> Self {
        Self {
            loader,
            device,
            backend,
            input_size,
            model: None,
        }
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// 未構築ならモデルを構築する。何度呼んでもよい。
    pub fn ensure_loaded(&mut self) -> Result<&mut Box<dyn PoseModel>, PipelineError> {
        let model = match self.model.take() {
            Some(model) => model,
            None => self.construct()?,
        };
        Ok(self.model.insert(model))
    }

    fn construct(&mut self) -> Result<Box<dyn PoseModel>, PipelineError> {
        // セッション構築前にバックエンドを選ぶ
        self.device.acquire(self.backend);

        let started = Instant::now();
        let model = self
            .loader
            .load(self.backend, self.input_size)
            .map_err(|source| PipelineError::ModelInitialization { source })?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            backend = self.backend.as_str(),
            "pose model loaded"
        );
        Ok(model)
    }

    /// `frame` で 1 回推論する。途中のテンソルは 1 つのスコープに置き、
    /// 戻る前にまとめて解放する。
    ///
    /// 空フレームか人物なしなら None。
    pub fn estimate(&mut self, frame: &Frame) -> Result<Option<Pose<ModelSpace>>, PipelineError> {
        if frame.is_empty() {
            return Ok(None);
        }

        let input_size = self.input_size;
        let device = Arc::clone(&self.device);
        let model = self.ensure_loaded()?;

        let pose = device
            .tidy(|scope| -> anyhow::Result<Option<Pose<ModelSpace>>> {
                let input = preprocess_for_movenet(scope, frame, input_size)?;
                let input = scope.get(input).view().into_dimensionality::<Ix4>()?;
                model.estimate(input)
            })
            .map_err(|source| PipelineError::Inference { source })?;

        debug!(detected = pose.is_some(), live_bytes = device.live_bytes(), "estimate finished");
        Ok(pose)
    }

    /// モデルを解放する。次の [`ensure_loaded`](Self::ensure_loaded) で作り直す。
    pub fn dispose(&mut self) {
        if let Some(model) = self.model.take() {
            drop(model);
            info!("pose model disposed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeLoader, Probe};
    use crate::pose::MOVENET_INPUT_SIZE;

    fn engine(loader: FakeLoader) -> (InferenceEngine<FakeLoader>, Arc<DeviceContext>) {
        let device = Arc::new(DeviceContext::new());
        let engine = InferenceEngine::new(loader, Arc::clone(&device), Backend::Gpu, MOVENET_INPUT_SIZE);
        (engine, device)
    }

    #[test]
    fn test_model_is_created_lazily_once() {
        let probe = Probe::default();
        let (mut engine, device) = engine(FakeLoader::new(probe.clone()));
        assert!(!engine.is_loaded());
        assert_eq!(probe.loads(), 0);

        engine.ensure_loaded().unwrap();
        engine.ensure_loaded().unwrap();
        assert_eq!(probe.loads(), 1);
        assert_eq!(device.backend(), Backend::Gpu);
    }

    #[test]
    fn test_estimate_feeds_fixed_input_shape() {
        let probe = Probe::default();
        let (mut engine, _) = engine(FakeLoader::new(probe.clone()));
        let frame = Frame::filled(64, 32, [200, 100, 50]);

        let pose = engine.estimate(&frame).unwrap().unwrap();
        assert_eq!(pose.len(), 17);
        assert_eq!(probe.last_input_shape(), Some(vec![1, 192, 192, 3]));
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn test_device_memory_does_not_grow() {
        let probe = Probe::default();
        let (mut engine, device) = engine(FakeLoader::new(probe.clone()));
        let frame = Frame::filled(640, 480, [1, 2, 3]);

        for _ in 0..20 {
            engine.estimate(&frame).unwrap();
            assert_eq!(device.live_bytes(), 0);
        }
        assert!(device.peak_bytes() > 0);
        assert_eq!(probe.calls(), 20);
    }

    #[test]
    fn test_empty_frame_skips_model() {
        let probe = Probe::default();
        let (mut engine, _) = engine(FakeLoader::new(probe.clone()));
        assert!(engine.estimate(&Frame::filled(0, 0, [0, 0, 0])).unwrap().is_none());
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn test_no_detection_is_none() {
        let probe = Probe::default();
        let (mut engine, _) = engine(FakeLoader::new(probe.clone()).without_detections());
        let frame = Frame::filled(8, 8, [0, 0, 0]);
        assert!(engine.estimate(&frame).unwrap().is_none());
    }

    #[test]
    fn test_construction_failure_is_initialization_error() {
        let probe = Probe::default();
        let (mut engine, _) = engine(FakeLoader::new(probe.clone()).failing());
        let err = engine.estimate(&Frame::filled(8, 8, [0, 0, 0])).unwrap_err();
        assert!(err.is_initialization());
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn test_model_error_is_inference_error() {
        let probe = Probe::default();
        let (mut engine, device) = engine(FakeLoader::new(probe.clone()).erroring());
        let err = engine.estimate(&Frame::filled(8, 8, [0, 0, 0])).unwrap_err();
        assert!(matches!(err, PipelineError::Inference { .. }));
        assert_eq!(device.live_bytes(), 0);
    }

    #[test]
    fn test_dispose_then_reload() {
        let probe = Probe::default();
        let (mut engine, _) = engine(FakeLoader::new(probe.clone()));
        engine.ensure_loaded().unwrap();
        engine.dispose();
        engine.dispose();
        assert_eq!(probe.disposals(), 1);
        assert!(!engine.is_loaded());

        engine.ensure_loaded().unwrap();
        assert_eq!(probe.loads(), 2);
    }
}
