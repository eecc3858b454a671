//! パイプラインが共有する計算デバイスの状態。
//! 推論に使うバックエンドと、テンソルスコープ内で生きているバイト数。

mod scope;

pub use scope::{TensorId, TensorScope};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// 高速な実行プロバイダ（`cuda` feature なら CUDA）
    Gpu,
    Cpu,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Gpu => "gpu",
            Backend::Cpu => "cpu",
        }
    }
}

#[derive(Debug)]
pub struct DeviceContext {
    backend: Mutex<Backend>,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceContext {
    pub fn new() -> Self {
        Self {
            backend: Mutex::new(Backend::Cpu),
            live_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> Backend {
        *self.backend.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 以降のモデル構築に使うバックエンドを選ぶ
    pub fn acquire(&self, backend: Backend) {
        let mut current = self.backend.lock().unwrap_or_else(|e| e.into_inner());
        if *current != backend {
            info!(from = current.as_str(), to = backend.as_str(), "switching compute backend");
            *current = backend;
        }
    }

    /// CPU に戻してデバイス資源を解放する
    pub fn release(&self) {
        self.acquire(Backend::Cpu);
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Acquire)
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Acquire)
    }

    /// 新しいテンソルスコープで `f` を実行する。スコープ内のテンソルは
    /// `f` が戻るときにまとめて解放され、外には持ち出せない。
    ///
    /// `f` は同期なので、テンソルが生きている間に中断することはない。
    pub fn tidy<R>(&self, f: impl FnOnce(&mut TensorScope<'_>) -> R) -> R {
        let mut scope = TensorScope::new(self);
        f(&mut scope)
    }

    fn track(&self, bytes: usize) {
        let live = self.live_bytes.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.peak_bytes.fetch_max(live, Ordering::AcqRel);
    }

    fn untrack(&self, bytes: usize) {
        self.live_bytes.fetch_sub(bytes, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    #[test]
    fn test_starts_on_cpu_and_switches() {
        let device = DeviceContext::new();
        assert_eq!(device.backend(), Backend::Cpu);
        device.acquire(Backend::Gpu);
        assert_eq!(device.backend(), Backend::Gpu);
        device.release();
        assert_eq!(device.backend(), Backend::Cpu);
    }

    #[test]
    fn test_tidy_releases_everything() {
        let device = DeviceContext::new();
        let sum = device.tidy(|scope| {
            let a = scope.adopt(ArrayD::<f32>::ones(vec![4, 4]));
            let b = scope.adopt(ArrayD::<f32>::ones(vec![8]));
            assert_eq!(device.live_bytes(), (16 + 8) * 4);
            scope.get(a).sum() + scope.get(b).sum()
        });
        assert_eq!(sum, 24.0);
        assert_eq!(device.live_bytes(), 0);
        assert_eq!(device.peak_bytes(), 24 * 4);
    }

    #[test]
    fn test_repeated_scopes_do_not_grow() {
        let device = DeviceContext::new();
        for _ in 0..100 {
            device.tidy(|scope| {
                scope.adopt(ArrayD::<f32>::zeros(vec![192, 192, 3]));
            });
        }
        assert_eq!(device.live_bytes(), 0);
        assert_eq!(device.peak_bytes(), 192 * 192 * 3 * 4);
    }

    #[test]
    fn test_backend_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            backend: Backend,
        }
        let w: Wrapper = toml::from_str("backend = \"gpu\"").unwrap();
        assert_eq!(w.backend, Backend::Gpu);
    }
}
