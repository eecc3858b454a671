use thiserror::Error;

/// パイプラインのセッションを終わらせる致命的エラー
///
/// フレーム未到着と人物なしはエラーではない。前者は
/// [`crate::pipeline::TickOutcome`] で返し、後者は公開中の姿勢を消す。
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to create pose detection model")]
    ModelInitialization {
        #[source]
        source: anyhow::Error,
    },

    #[error("pose inference failed")]
    Inference {
        #[source]
        source: anyhow::Error,
    },

    #[error("inference worker stopped unexpectedly")]
    WorkerDisconnected,
}

impl PipelineError {
    /// このセッションではモデルが使えないエラーか
    pub fn is_initialization(&self) -> bool {
        matches!(self, PipelineError::ModelInitialization { .. })
    }
}
