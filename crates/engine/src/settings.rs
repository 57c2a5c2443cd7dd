use chanledger_core::config::FactorConfig;
use chanledger_core::engine::error::EngineError;
use tracing::warn;

use crate::fingerprint::FACTOR_LOGIC_VERSION;

/// # Summary
/// 校验后的因子引擎设置，在引擎构造时由 `FactorConfig` 解析一次。
///
/// # Invariants
/// - 分型窗口、保留 K 线数与事件分页上限均至少为 1。
/// - `lookback_candles` 不小于 `required_lookback()`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorSettings {
    pub pivot_window_major: u32,
    pub pivot_window_minor: u32,
    pub lookback_candles: usize,
    pub state_rebuild_event_limit: usize,
    pub rebuild_keep_candles: usize,
    pub auto_rebuild: bool,
    pub logic_version: String,
}

impl FactorSettings {
    /// # Summary
    /// 把原始配置解析为有效设置。
    ///
    /// # Logic
    /// 1. 窗口、保留数量、分页上限为 0 时返回配置错误。
    /// 2. 回看上限小于分型检测所需的回看长度时抬高到所需长度。
    /// 3. 未覆盖逻辑版本时使用内置的 `FACTOR_LOGIC_VERSION`。
    ///
    /// # Arguments
    /// * `config` - 外部配置提供者给出的原始取值。
    ///
    /// # Returns
    /// * `Result<Self, EngineError>` - 有效设置或 `EngineError::Config`。
    pub fn resolve(config: &FactorConfig) -> Result<Self, EngineError> {
        if config.pivot_window_major == 0 || config.pivot_window_minor == 0 {
            return Err(EngineError::Config(
                "pivot windows must be at least 1".to_string(),
            ));
        }
        if config.rebuild_keep_candles == 0 {
            return Err(EngineError::Config(
                "rebuild_keep_candles must be at least 1".to_string(),
            ));
        }
        if config.state_rebuild_event_limit == 0 {
            return Err(EngineError::Config(
                "state_rebuild_event_limit must be at least 1".to_string(),
            ));
        }

        let mut settings = Self {
            pivot_window_major: config.pivot_window_major,
            pivot_window_minor: config.pivot_window_minor,
            lookback_candles: to_usize(config.lookback_candles)?,
            state_rebuild_event_limit: to_usize(config.state_rebuild_event_limit)?,
            rebuild_keep_candles: to_usize(config.rebuild_keep_candles)?,
            auto_rebuild: config.auto_rebuild,
            logic_version: config
                .logic_version_override
                .clone()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| FACTOR_LOGIC_VERSION.to_string()),
        };

        let required = settings.required_lookback()?;
        if settings.lookback_candles < required {
            warn!(
                "lookback_candles {} is below the required {}, raised",
                settings.lookback_candles, required
            );
            settings.lookback_candles = required;
        }
        Ok(settings)
    }

    /// 分型检测在第一根新 K 线之前需要的 K 线数：`2 * max(w_major, w_minor)`
    pub fn required_lookback(&self) -> Result<usize, EngineError> {
        let widest = to_usize(self.pivot_window_major.max(self.pivot_window_minor))?;
        widest
            .checked_mul(2)
            .ok_or_else(|| EngineError::Config("pivot window too large".to_string()))
    }
}

pub(crate) fn to_usize(value: u32) -> Result<usize, EngineError> {
    usize::try_from(value).map_err(|e| EngineError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let settings = FactorSettings::resolve(&FactorConfig::default()).unwrap();
        assert_eq!(settings.pivot_window_major, 50);
        assert_eq!(settings.required_lookback().unwrap(), 100);
        assert_eq!(settings.lookback_candles, 20_000);
        assert_eq!(settings.logic_version, FACTOR_LOGIC_VERSION);
    }

    #[test]
    fn test_resolve_raises_lookback_cap() {
        let config = FactorConfig {
            pivot_window_major: 10,
            pivot_window_minor: 3,
            lookback_candles: 5,
            ..FactorConfig::default()
        };
        let settings = FactorSettings::resolve(&config).unwrap();
        assert_eq!(settings.lookback_candles, 20);
    }

    #[test]
    fn test_resolve_rejects_zero_window() {
        let config = FactorConfig {
            pivot_window_minor: 0,
            ..FactorConfig::default()
        };
        assert!(matches!(
            FactorSettings::resolve(&config),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_logic_version_override() {
        let config = FactorConfig {
            logic_version_override: Some("custom-v9".to_string()),
            ..FactorConfig::default()
        };
        let settings = FactorSettings::resolve(&config).unwrap();
        assert_eq!(settings.logic_version, "custom-v9");
    }
}
