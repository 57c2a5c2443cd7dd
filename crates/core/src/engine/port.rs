use crate::engine::entity::IngestOutcome;
use crate::engine::error::EngineError;
use async_trait::async_trait;

/// # Summary
/// 因子摄入能力接口。
/// 由 `crates/engine` 实现，通过 `crates/app` 注入到追赶循环，
/// 使调用方无需编译期依赖具体引擎实现。
///
/// # Invariants
/// - 同一序列的调用必须由调用方串行化。
/// - 调用要么完整提交，要么不写入任何内容，因此失败后可直接重试。
#[async_trait]
pub trait FactorIngest: Send + Sync {
    /// # Summary
    /// 把序列推进到 `up_to_time`（包含）为止的全部已收盘 K 线。
    ///
    /// # Arguments
    /// * `series_id` - 序列 ID。
    /// * `up_to_time` - 截止时间（包含）。
    ///
    /// # Returns
    /// * `IngestOutcome` - 是否重建以及当前指纹。
    async fn ingest_closed(
        &self,
        series_id: &str,
        up_to_time: i64,
    ) -> Result<IngestOutcome, EngineError>;
}
