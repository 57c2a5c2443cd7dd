use crate::observe::error::ObserveError;

/// # Summary
/// 观测事件输出接口（尽力而为）。
///
/// # Invariants
/// - 实现必须是 `Send` 和 `Sync` 以支持并发调用。
/// - `emit` 是同步的，不得阻塞调用方过久。
pub trait ObservabilitySink: Send + Sync {
    /// # Summary
    /// 输出一条结构化观测事件。
    ///
    /// # Arguments
    /// * `pipe` - 所属管线 (例如: factor)。
    /// * `event` - 事件名 (例如: factor.ingest.done)。
    /// * `series_id` - 序列 ID。
    /// * `message` - 可读描述。
    /// * `data` - 附加结构化数据。
    ///
    /// # Returns
    /// * 失败返回 `Err(ObserveError)`，调用方只记录不传播。
    fn emit(
        &self,
        pipe: &str,
        event: &str,
        series_id: &str,
        message: &str,
        data: &serde_json::Value,
    ) -> Result<(), ObserveError>;
}
