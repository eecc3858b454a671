use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, error};

use super::engine::InferenceEngine;
use crate::camera::Frame;
use crate::error::PipelineError;
use crate::pose::detector::ModelLoader;
use crate::pose::{ModelSpace, Pose};

enum Job {
    Load,
    Estimate(Frame),
    Shutdown,
}

pub(crate) enum Completion {
    Loaded,
    Estimated {
        pose: Option<Pose<ModelSpace>>,
        width: u32,
        height: u32,
    },
    Failed(PipelineError),
}

/// 推論エンジンを専有する専用スレッド。ジョブは順番に処理し、
/// スレッド終了時にモデルを解放する。
pub(crate) struct InferenceWorker {
    jobs: Sender<Job>,
    completions: Receiver<Completion>,
    handle: Option<thread::JoinHandle<()>>,
}

impl InferenceWorker {
    pub(crate) fn spawn<L>(mut engine: InferenceEngine<L>) -> Result<Self>
    where
        L: ModelLoader + 'static,
    {
        let (jobs, job_rx) = mpsc::channel::<Job>();
        let (done_tx, completions) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("pose-inference".to_string())
            .spawn(move || {
                for job in job_rx {
                    let completion = match job {
                        Job::Load => match engine.ensure_loaded() {
                            Ok(_) => Completion::Loaded,
                            Err(err) => Completion::Failed(err),
                        },
                        Job::Estimate(frame) => match engine.estimate(&frame) {
                            Ok(pose) => Completion::Estimated {
                                pose,
                                width: frame.width(),
                                height: frame.height(),
                            },
                            Err(err) => Completion::Failed(err),
                        },
                        Job::Shutdown => break,
                    };
                    if done_tx.send(completion).is_err() {
                        break;
                    }
                }
                engine.dispose();
                debug!("inference worker exited");
            })
            .context("failed to spawn inference thread")?;

        Ok(Self {
            jobs,
            completions,
            handle: Some(handle),
        })
    }

    pub(crate) fn load(&self) -> Result<(), PipelineError> {
        self.submit(Job::Load)
    }

    pub(crate) fn estimate(&self, frame: Frame) -> Result<(), PipelineError> {
        self.submit(Job::Estimate(frame))
    }

    fn submit(&self, job: Job) -> Result<(), PipelineError> {
        self.jobs.send(job).map_err(|_| PipelineError::WorkerDisconnected)
    }

    /// 終わったジョブを待たずに確認
    pub(crate) fn try_complete(&self) -> Result<Option<Completion>, PipelineError> {
        match self.completions.try_recv() {
            Ok(completion) => Ok(Some(completion)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PipelineError::WorkerDisconnected),
        }
    }

    /// 実行中のジョブを終えさせ、モデルを解放してスレッドを join
    pub(crate) fn shutdown(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("inference thread panicked");
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
