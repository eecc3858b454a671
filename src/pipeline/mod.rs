//! フレームごとの処理: フレーム取得 → 推論ワーカー → 正規化 → 公開

pub mod clock;
pub mod engine;
pub mod published;
pub mod scheduler;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{FrameClock, RefreshClock, TickId};
pub use engine::InferenceEngine;
pub use published::PublishedPose;
pub use scheduler::{LoopState, LoopStats, RenderLoop, TickOutcome};
