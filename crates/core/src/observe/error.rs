use thiserror::Error;

/// # Summary
/// 观测输出错误枚举。
///
/// # Invariants
/// - 调用方只记录该错误，绝不因此让业务调用失败。
#[derive(Error, Debug)]
pub enum ObserveError {
    /// 输出端写入失败
    #[error("Sink error: {0}")]
    Sink(String),
}
