use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, error, info};

use super::clock::{FrameClock, TickId};
use super::engine::InferenceEngine;
use super::published::PublishedPose;
use super::worker::{Completion, InferenceWorker};
use crate::camera::FrameSource;
use crate::device::DeviceContext;
use crate::error::PipelineError;
use crate::pose::detector::ModelLoader;
use crate::pose::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// 最初のティック待ち
    Idle,
    /// モデル構築中
    Loading,
    Running,
    /// 停止済み。以降ティックしない。
    Stopped,
    /// 致命的エラーで終了
    Failed,
}

impl LoopState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Loading => "loading",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
            LoopState::Failed => "failed",
        }
    }
}

/// ティックで何をしたか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 古い・キャンセル済みの id、または失敗済み
    Ignored,
    /// モデル構築中
    Loading,
    /// 推論中なので新しく始めなかった
    Busy,
    /// フレームがまだ無い（エラーではない）
    FrameUnavailable,
    /// フレームを推論ワーカーに渡した
    Dispatched,
    Stopped,
}

/// 定期スループットログ用のカウンタ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub dispatched: u64,
    pub published: u64,
    pub empty_detections: u64,
    pub frames_unavailable: u64,
}

/// 自己再スケジュールする描画ループ。リフレッシュごとに 1 ティック、
/// 同時に走る推論は高々 1 つ。
pub struct RenderLoop<F, C: FrameClock> {
    state: LoopState,
    source: F,
    clock: C,
    worker: Option<InferenceWorker>,
    device: Arc<DeviceContext>,
    published: PublishedPose,
    input_size: u32,
    pending: Option<TickId>,
    in_flight: Option<Instant>,
    stats: LoopStats,
}

impl<F: FrameSource, C: FrameClock> RenderLoop<F, C> {
    /// 推論ワーカーを起動する。モデルは最初のティックで構築し、
    /// [`start`](Self::start) まで何もスケジュールしない。
    pub fn new<L>(engine: InferenceEngine<L>, device: Arc<DeviceContext>, source: F, clock: C) -> Result<Self>
    where
        L: ModelLoader + 'static,
    {
        let input_size = engine.input_size();
        let worker = InferenceWorker::spawn(engine)?;
        Ok(Self {
            state: LoopState::Idle,
            source,
            clock,
            worker: Some(worker),
            device,
            published: PublishedPose::new(),
            input_size,
            pending: None,
            in_flight: None,
            stats: LoopStats::default(),
        })
    }

    /// 最初のティックを要求
    pub fn start(&mut self) {
        if self.state == LoopState::Idle && self.pending.is_none() {
            self.pending = Some(self.clock.request_tick());
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// モデル構築が終わるまで true
    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoopState::Idle | LoopState::Loading)
    }

    /// レンダラ側のハンドル
    pub fn published(&self) -> PublishedPose {
        self.published.clone()
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// 1 回のリフレッシュを処理する。致命的エラーなら
    /// [`LoopState::Failed`] に入り、以降スケジュールしない。
    pub fn tick(&mut self, id: TickId) -> Result<TickOutcome, PipelineError> {
        match self.state {
            LoopState::Stopped => return Ok(TickOutcome::Stopped),
            LoopState::Failed => return Ok(TickOutcome::Ignored),
            _ => {}
        }
        if self.pending != Some(id) {
            return Ok(TickOutcome::Ignored);
        }
        self.pending = None;
        self.stats.ticks += 1;

        match self.step() {
            Ok(outcome) => {
                self.pending = Some(self.clock.request_tick());
                Ok(outcome)
            }
            Err(err) => {
                error!(error = %err, state = self.state.as_str(), "pose pipeline failed");
                self.state = LoopState::Failed;
                self.in_flight = None;
                Err(err)
            }
        }
    }

    fn step(&mut self) -> Result<TickOutcome, PipelineError> {
        let worker = self.worker.as_ref().ok_or(PipelineError::WorkerDisconnected)?;

        if self.state == LoopState::Idle {
            worker.load()?;
            self.in_flight = Some(Instant::now());
            self.transition(LoopState::Loading);
            return Ok(TickOutcome::Loading);
        }

        if let Some(started) = self.in_flight {
            match worker.try_complete()? {
                None if self.state == LoopState::Loading => return Ok(TickOutcome::Loading),
                None => return Ok(TickOutcome::Busy),
                Some(completion) => {
                    self.in_flight = None;
                    debug!(latency_ms = started.elapsed().as_millis() as u64, "job completed");
                    self.complete(completion)?;
                }
            }
        }

        let Some(frame) = self.source.current_frame().filter(|f| !f.is_empty()) else {
            self.stats.frames_unavailable += 1;
            return Ok(TickOutcome::FrameUnavailable);
        };

        let worker = self.worker.as_ref().ok_or(PipelineError::WorkerDisconnected)?;
        worker.estimate(frame)?;
        self.in_flight = Some(Instant::now());
        self.stats.dispatched += 1;
        Ok(TickOutcome::Dispatched)
    }

    fn complete(&mut self, completion: Completion) -> Result<(), PipelineError> {
        match completion {
            Completion::Loaded => self.transition(LoopState::Running),
            Completion::Estimated {
                pose: Some(pose),
                width,
                height,
            } => {
                self.published.publish(normalize(&pose, self.input_size, width, height));
                self.stats.published += 1;
            }
            Completion::Estimated { pose: None, .. } => {
                // 人物なし: 古い骨格を残さない
                self.published.clear();
                self.stats.empty_detections += 1;
            }
            Completion::Failed(err) => return Err(err),
        }
        Ok(())
    }
}

impl<F, C: FrameClock> RenderLoop<F, C> {
    /// 停止: 保留中のティックをキャンセルし、実行中の推論を待ってから
    /// モデルを解放し、デバイスを CPU に戻す。何度呼んでもよい。
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        if let Some(id) = self.pending.take() {
            self.clock.cancel_tick(id);
        }
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        self.in_flight = None;
        self.device.release();
        self.transition(LoopState::Stopped);
    }

    fn transition(&mut self, next: LoopState) {
        info!(from = self.state.as_str(), to = next.as_str(), "render loop state");
        self.state = next;
    }
}

impl<F, C: FrameClock> Drop for RenderLoop<F, C> {
    fn drop(&mut self) {
        self.stop();
    }
}
