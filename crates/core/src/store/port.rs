use super::error::StoreError;
use crate::factor::entity::{EventRecord, FactorEvent, FactorHead};
use async_trait::async_trait;

/// # Summary
/// 一次写入的头快照。
#[derive(Debug, Clone, PartialEq)]
pub struct HeadWrite {
    pub factor_name: String,
    pub candle_time: i64,
    pub head: serde_json::Value,
}

/// # Summary
/// 单次摄入需要原子提交的全部内容。
///
/// # Invariants
/// - 所有内容属于同一个序列，在一个事务内提交。
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCommit {
    pub series_id: String,
    // 新产生的事件，重复键视为无操作
    pub events: Vec<FactorEvent>,
    // 头快照
    pub heads: Vec<HeadWrite>,
    // 推进后的 head_time，None 表示不推进
    pub head_time: Option<i64>,
    // 需要记录的新指纹
    pub fingerprint: Option<String>,
}

/// # Summary
/// 提交结果统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub inserted_events: u64,
    pub duplicate_events: u64,
    pub inserted_heads: u64,
}

/// # Summary
/// 清空序列时删除的行数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub deleted_events: u64,
    pub deleted_heads: u64,
}

/// # Summary
/// 因子账本存储接口：只追加事件日志 + 头快照 + 序列 head_time + 序列指纹。
///
/// # Invariants
/// - 所有数据按 `series_id` 隔离，事务不跨序列。
/// - `head_time` 单调不减，只有 `reset_series` 可以移除。
/// - 表结构迁移在实现的构造阶段一次性完成。
#[async_trait]
pub trait FactorLedger: Send + Sync {
    /// # Summary
    /// 获取序列最后一根完整处理的 K 线时间。
    async fn head_time(&self, series_id: &str) -> Result<Option<i64>, StoreError>;

    /// # Summary
    /// 获取序列已记录的计算指纹。
    async fn fingerprint(&self, series_id: &str) -> Result<Option<String>, StoreError>;

    /// # Summary
    /// 查询可见时间位于闭区间 `[start, end]` 的事件。
    ///
    /// # Arguments
    /// * `series_id`: 序列 ID。
    /// * `factor_name`: 为 None 时返回所有因子的事件。
    /// * `start`: 可见时间下界（包含）。
    /// * `end`: 可见时间上界（包含），即查询时刻。
    ///
    /// # Returns
    /// 按 `(visible_time, 插入序号)` 升序排列的事件。
    async fn events_between(
        &self,
        series_id: &str,
        factor_name: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<FactorEvent>, StoreError>;

    /// # Summary
    /// 获取 `candle_time <= time` 的最近一条头快照。
    async fn head_at_or_before(
        &self,
        series_id: &str,
        factor_name: &str,
        time: i64,
    ) -> Result<Option<FactorHead>, StoreError>;

    /// # Summary
    /// 获取某种类在 `visible_time <= at_or_before` 范围内最近的若干事件。
    ///
    /// # Returns
    /// 按插入顺序升序排列（最旧的在前）。
    async fn latest_events(
        &self,
        series_id: &str,
        kind: &str,
        at_or_before: i64,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// # Summary
    /// 分页扫描某种类的事件。
    ///
    /// # Logic
    /// 1. 过滤 `min_visible <= visible_time <= max_visible` 且 `id > after_id`。
    /// 2. 按插入序号升序返回至多 `limit` 条。
    async fn scan_events(
        &self,
        series_id: &str,
        kind: &str,
        min_visible: i64,
        max_visible: i64,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// # Summary
    /// 在一个事务内提交事件、头快照、head_time 与指纹。
    ///
    /// # Logic
    /// 1. 事件使用插入忽略，重复键计入 `duplicate_events`。
    /// 2. 头快照的 `seq` 取同一时刻已有最大值加一。
    /// 3. head_time 取新旧值中较大者。
    /// 4. 任一步失败则整体回滚。
    async fn commit(&self, commit: LedgerCommit) -> Result<CommitReport, StoreError>;

    /// # Summary
    /// 在一个事务内清空序列的事件、头快照与 head_time，并可选地记录新指纹。
    async fn reset_series(
        &self,
        series_id: &str,
        fingerprint: Option<&str>,
    ) -> Result<ResetReport, StoreError>;
}
