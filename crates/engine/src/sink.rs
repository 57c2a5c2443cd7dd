use chanledger_core::observe::error::ObserveError;
use chanledger_core::observe::port::ObservabilitySink;
use tracing::info;

/// # Summary
/// 把观测事件写成结构化 `tracing` 日志的输出端。
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn emit(
        &self,
        pipe: &str,
        event: &str,
        series_id: &str,
        message: &str,
        data: &serde_json::Value,
    ) -> Result<(), ObserveError> {
        info!(pipe, event, series_id, data = %data, "{}", message);
        Ok(())
    }
}

/// 丢弃所有观测事件
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ObservabilitySink for NoopSink {
    fn emit(
        &self,
        _pipe: &str,
        _event: &str,
        _series_id: &str,
        _message: &str,
        _data: &serde_json::Value,
    ) -> Result<(), ObserveError> {
        Ok(())
    }
}
