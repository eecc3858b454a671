use anyhow::{Context, Result};
use opencv::{
    core::{AlgorithmHint, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use super::frame::{Frame, FrameSource};

/// OpenCVを使用したカメラキャプチャ
pub struct OpenCvCamera {
    capture: VideoCapture,
    width: u32,
    height: u32,
}

impl OpenCvCamera {
    /// 解像度を指定してカメラを開く
    pub fn open(index: i32, width: Option<u32>, height: Option<u32>) -> Result<Self> {
        let mut capture =
            VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32).context("Failed to open camera")?;

        if !capture.is_opened()? {
            anyhow::bail!("Camera {} is not available", index);
        }

        if let Some(w) = width {
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, w as f64)?;
        }
        if let Some(h) = height {
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, h as f64)?;
        }
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let actual_fps = capture.get(videoio::CAP_PROP_FPS)?;
        info!(index, width = actual_width, height = actual_height, fps = actual_fps, "camera opened");

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
        })
    }

    /// 解像度を取得
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// フレームを読み込んで RGB の Frame にする
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut bgr = Mat::default();
        self.capture
            .read(&mut bgr)
            .context("Failed to read frame")?;

        if bgr.empty() {
            anyhow::bail!("Empty frame received");
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;
        let rgb = if rgb.is_continuous() { rgb } else { rgb.try_clone()? };

        Frame::new(rgb.cols() as u32, rgb.rows() as u32, rgb.data_bytes()?.to_vec())
    }
}

/// 別スレッドでカメラキャプチャを行い、最新フレームを提供する
pub struct ThreadedCamera {
    latest: Arc<Mutex<Option<Frame>>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ThreadedCamera {
    pub fn start(index: i32, width: Option<u32>, height: Option<u32>) -> Result<Self> {
        let mut camera = OpenCvCamera::open(index, width, height)?;
        let (width, height) = camera.resolution();
        let latest = Arc::new(Mutex::new(None::<Frame>));
        let latest_ref = latest.clone();
        let running = Arc::new(AtomicBool::new(true));
        let running_ref = running.clone();

        let handle = thread::Builder::new()
            .name("camera".to_string())
            .spawn(move || {
                while running_ref.load(Ordering::Acquire) {
                    match camera.read_frame() {
                        Ok(frame) => {
                            *latest_ref.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
                        }
                        Err(e) => {
                            warn!(error = %e, "camera read failed");
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                }
            })
            .context("failed to spawn camera thread")?;
        info!(width, height, "camera thread started");

        Ok(Self {
            latest,
            running,
            handle: Some(handle),
        })
    }
}

impl FrameSource for ThreadedCamera {
    /// 最新フレーム。初回フレーム到着前のみ None。
    fn current_frame(&self) -> Option<Frame> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Drop for ThreadedCamera {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
