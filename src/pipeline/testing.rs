//! パイプラインのテスト用フェイク

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use anyhow::{bail, Result};
use ndarray::ArrayView4;

use crate::camera::{Frame, FrameSource};
use crate::device::Backend;
use crate::pose::detector::{ModelLoader, PoseModel};
use crate::pose::{Keypoint, KeypointName, ModelSpace, Pose};

/// テストから観測するカウンタ
#[derive(Clone, Default)]
pub(crate) struct Probe {
    loads: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    disposals: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    last_shape: Arc<Mutex<Option<Vec<usize>>>>,
}

impl Probe {
    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn last_input_shape(&self) -> Option<Vec<usize>> {
        self.last_shape.lock().unwrap().clone()
    }
}

/// open されるまで推論を止める
#[derive(Default)]
pub(crate) struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub(crate) fn closed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }
}

#[derive(Clone, Copy)]
enum Behaviour {
    Detect,
    Nothing,
    Error,
}

pub(crate) struct FakeLoader {
    probe: Probe,
    fail_load: bool,
    behaviour: Behaviour,
    gate: Option<Arc<Gate>>,
}

impl FakeLoader {
    pub(crate) fn new(probe: Probe) -> Self {
        Self {
            probe,
            fail_load: false,
            behaviour: Behaviour::Detect,
            gate: None,
        }
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub(crate) fn without_detections(mut self) -> Self {
        self.behaviour = Behaviour::Nothing;
        self
    }

    pub(crate) fn erroring(mut self) -> Self {
        self.behaviour = Behaviour::Error;
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, _backend: Backend, input_size: u32) -> Result<Box<dyn PoseModel>> {
        if self.fail_load {
            bail!("webgl backend unavailable");
        }
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeModel {
            probe: self.probe.clone(),
            behaviour: self.behaviour,
            gate: self.gate.clone(),
            input_size,
        }))
    }
}

struct FakeModel {
    probe: Probe,
    behaviour: Behaviour,
    gate: Option<Arc<Gate>>,
    input_size: u32,
}

impl PoseModel for FakeModel {
    fn estimate(&mut self, input: ArrayView4<'_, f32>) -> Result<Option<Pose<ModelSpace>>> {
        let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(active, Ordering::SeqCst);
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        *self.probe.last_shape.lock().unwrap() = Some(input.shape().to_vec());

        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.probe.active.fetch_sub(1, Ordering::SeqCst);

        let centre = self.input_size as f32 / 2.0;
        match self.behaviour {
            Behaviour::Detect => Ok(Some(Pose::new(
                KeypointName::ALL.map(|name| Keypoint::new(name, centre, centre, 0.9)),
            ))),
            Behaviour::Nothing => Ok(None),
            Behaviour::Error => bail!("tensor shape mismatch"),
        }
    }
}

impl Drop for FakeModel {
    fn drop(&mut self) {
        self.probe.disposals.fetch_add(1, Ordering::SeqCst);
    }
}

/// テストからフレームを差し替えられるソース
#[derive(Clone, Default)]
pub(crate) struct SwitchSource {
    frame: Arc<Mutex<Option<Frame>>>,
    polls: Arc<AtomicUsize>,
}

impl SwitchSource {
    pub(crate) fn with_frame(frame: Frame) -> Self {
        let source = Self::default();
        source.set(Some(frame));
        source
    }

    pub(crate) fn set(&self, frame: Option<Frame>) {
        *self.frame.lock().unwrap() = frame;
    }

    pub(crate) fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl FrameSource for SwitchSource {
    fn current_frame(&self) -> Option<Frame> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.frame.lock().unwrap().clone()
    }
}
