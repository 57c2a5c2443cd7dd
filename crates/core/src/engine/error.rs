use crate::store::error::StoreError;
use thiserror::Error;

/// # Summary
/// 因子依赖图的构造错误，均在构造阶段致命。
///
/// # Invariants
/// - 不允许静默降级为部分图。
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    // 因子名称为空
    #[error("Factor name must not be empty")]
    EmptyName,
    // 因子名称重复
    #[error("Duplicate factor name: {0}")]
    DuplicateName(String),
    // 依赖了未注册的因子
    #[error("Factor '{factor}' depends on unknown factor '{dependency}'")]
    MissingDependency { factor: String, dependency: String },
    // 依赖成环，附带环路径
    #[error("Dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// # Summary
/// 引擎域错误枚举。
///
/// # Invariants
/// - 涵盖依赖图、配置、逐根计算与底层存储的失败场景。
/// - 任一错误都意味着本次调用没有任何写入。
#[derive(Error, Debug)]
pub enum EngineError {
    // 依赖图构造失败
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    // 存储层错误（K 线存储或因子账本）
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    // 配置或序列参数非法
    #[error("Config error: {0}")]
    Config(String),
    // 逐根计算过程中的错误
    #[error("Tick error: {0}")]
    Tick(String),
}
