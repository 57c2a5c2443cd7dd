/// # Summary
/// 单次摄入需要加载的 K 线范围。
///
/// # Invariants
/// - 回看以 K 线根数计量，与时间跨度无关，序列有缺口时仍成立。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleWindow {
    /// 从序列起点加载到 `end`（包含）
    FromStart { end: i64 },
    /// 加载 `anchor` 及之前最近 `context` 根，再加上 `(anchor, end]` 内的全部 K 线
    Tail { anchor: i64, context: usize, end: i64 },
}

impl CandleWindow {
    /// 本次摄入的截止时间
    pub fn end(&self) -> i64 {
        match self {
            CandleWindow::FromStart { end } | CandleWindow::Tail { end, .. } => *end,
        }
    }
}

/// # Summary
/// 决定一次摄入需要加载的 K 线窗口。
///
/// # Invariants
/// - 有 head 时窗口包含 head 及之前 `lookback` 根，使分型检测与全量计算看到相同的上下文。
/// - 首次计算最多回看 `cap` 根。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlanner {
    // 分型检测所需回看：2 * max(w_major, w_minor)
    lookback: usize,
    // 首次计算的回看上限
    cap: usize,
}

impl WindowPlanner {
    pub fn new(lookback: usize, cap: usize) -> Self {
        Self {
            lookback,
            cap: cap.max(lookback),
        }
    }

    /// # Summary
    /// 计算 K 线窗口。
    ///
    /// # Logic
    /// 1. 已有 head、非强制重建且 `up_to <= head`：无事可做，返回 None。
    /// 2. 强制重建：从序列起点开始。
    /// 3. 已有 head：取 head 及之前 `lookback` 根作为上下文。
    /// 4. 新序列：取 `up_to` 及之前最近 `cap` 根。
    ///
    /// # Arguments
    /// * `head_time` - 账本记录的最后处理时间。
    /// * `up_to` - 本次摄入的截止时间（包含）。
    /// * `forced` - 本次调用前是否发生了强制重建。
    pub fn plan(&self, head_time: Option<i64>, up_to: i64, forced: bool) -> Option<CandleWindow> {
        if forced {
            return Some(CandleWindow::FromStart { end: up_to });
        }
        match head_time {
            Some(head) if up_to <= head => None,
            Some(head) => Some(CandleWindow::Tail {
                anchor: head,
                context: self.lookback,
                end: up_to,
            }),
            None => Some(CandleWindow::Tail {
                anchor: up_to,
                context: self.cap,
                end: up_to,
            }),
        }
    }
}
