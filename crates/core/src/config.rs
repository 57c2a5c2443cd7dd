use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub factor: FactorConfig,
    // 需要追赶计算的序列 ID 列表
    pub series: Vec<String>,
    // 追赶循环的轮询间隔（秒）
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub data_dir: String,
}

/// # Summary
/// 因子引擎配置，对应外部配置提供者给出的原始取值。
///
/// # Invariants
/// - 原始值未经校验，引擎构造时会解析为有效设置。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FactorConfig {
    // 主级别分型窗口
    pub pivot_window_major: u32,
    // 次级别分型窗口
    pub pivot_window_minor: u32,
    // 首次计算时最多回看的 K 线数量
    pub lookback_candles: u32,
    // 状态重建时单页读取的事件上限
    pub state_rebuild_event_limit: u32,
    // 指纹失配重建时保留的 K 线尾部长度
    pub rebuild_keep_candles: u32,
    // 是否启用指纹失配自动重建
    pub auto_rebuild: bool,
    // 覆盖内置的计算逻辑版本号
    pub logic_version_override: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            factor: FactorConfig::default(),
            series: Vec::new(),
            poll_interval_secs: 5,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            pivot_window_major: 50,
            pivot_window_minor: 5,
            lookback_candles: 20_000,
            state_rebuild_event_limit: 50_000,
            rebuild_keep_candles: 2_000,
            auto_rebuild: true,
            logic_version_override: None,
        }
    }
}
