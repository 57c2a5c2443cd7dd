use serde::{Deserialize, Serialize};

/// # Summary
/// 单次 `ingest_closed` 调用的对外结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    // 本次调用是否触发了指纹重建
    pub rebuilt: bool,
    // 当前计算语义的指纹
    pub fingerprint: String,
}

/// # Summary
/// 指纹协调器的重建报告。
///
/// # Invariants
/// - `forced == false` 时 `trimmed_rows == 0`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildOutcome {
    pub forced: bool,
    pub keep_candles: usize,
    pub trimmed_rows: u64,
}
