use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::pose::{Normalized, Pose};

/// 最新の正規化済み姿勢。書き手はスケジューラ、読み手はレンダラ。
/// キューせず上書きする。
#[derive(Debug, Clone, Default)]
pub struct PublishedPose {
    latest: Arc<Mutex<Option<Pose<Normalized>>>>,
    version: Arc<AtomicU64>,
}

impl PublishedPose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, pose: Pose<Normalized>) {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        *latest = Some(pose);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// 姿勢を消す。既に空ならバージョンも変えない。
    pub fn clear(&self) {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        if latest.take().is_some() {
            self.version.fetch_add(1, Ordering::Release);
        }
    }

    /// 変更のたびに増える
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn latest(&self) -> Option<Pose<Normalized>> {
        self.snapshot().1
    }

    /// バージョンと姿勢を同時に読む
    pub fn snapshot(&self) -> (u64, Option<Pose<Normalized>>) {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        (self.version(), latest.clone())
    }
}
