/// 要求した 1 回分のリフレッシュ通知
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickId(u64);

/// 画面リフレッシュの通知元。未処理の要求はパイプラインごとに高々 1 つ。
/// キャンセルした要求は配送されない。
pub trait FrameClock {
    fn request_tick(&mut self) -> TickId;
    fn cancel_tick(&mut self, id: TickId);
}

/// 1 スロットのリフレッシュクロック。表示ループ側がリフレッシュごとに
/// [`fire`](Self::fire) を呼び、得た id をパイプラインに渡す。
#[derive(Debug, Default)]
pub struct RefreshClock {
    next_id: u64,
    pending: Option<TickId>,
    requested: u64,
    cancelled: u64,
}

impl RefreshClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保留中の要求を取り出す
    pub fn fire(&mut self) -> Option<TickId> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameClock for RefreshClock {
    fn request_tick(&mut self) -> TickId {
        self.next_id += 1;
        self.requested += 1;
        let id = TickId(self.next_id);
        self.pending = Some(id);
        id
    }

    fn cancel_tick(&mut self, id: TickId) {
        if self.pending == Some(id) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}
