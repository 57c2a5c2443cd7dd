use crate::market::entity::Candle;
use crate::store::error::StoreError;
use async_trait::async_trait;

/// # Summary
/// 外部 K 线存储的窄接口，因子引擎只通过它读取和裁剪行情。
///
/// # Invariants
/// - 返回的 K 线必须按 `candle_time` 升序排列且仅包含已收盘数据。
/// - 实现者应确保同一序列内 `candle_time` 唯一。
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// # Summary
    /// 读取指定时间闭区间内的已收盘 K 线。
    ///
    /// # Arguments
    /// * `series_id`: 序列 ID。
    /// * `start`: 开始时间（包含）。
    /// * `end`: 结束时间（包含）。
    /// * `limit`: 可选的数量上限，从最早一根开始计数。
    ///
    /// # Returns
    /// 升序排列的 K 线列表。
    async fn get_closed_between_times(
        &self,
        series_id: &str,
        start: i64,
        end: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, StoreError>;

    /// # Summary
    /// 读取 `candle_time <= end` 的最近 `limit` 根已收盘 K 线。
    ///
    /// # Logic
    /// 按根数而非时间跨度回看，序列中存在缺口（停盘、周末）时仍能拿到足够的上下文。
    ///
    /// # Returns
    /// 升序排列的 K 线列表，序列不足 `limit` 根时返回全部。
    async fn get_latest_closed_at_or_before(
        &self,
        series_id: &str,
        end: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, StoreError>;

    /// # Summary
    /// 将序列裁剪为最近的 `keep` 根 K 线。
    ///
    /// # Returns
    /// 被删除的行数。
    async fn trim_series_to_latest_n(&self, series_id: &str, keep: usize)
    -> Result<u64, StoreError>;

    /// # Summary
    /// 获取序列最新一根已收盘 K 线的时间。
    ///
    /// # Returns
    /// 序列为空时返回 None。
    async fn head_time(&self, series_id: &str) -> Result<Option<i64>, StoreError>;
}
